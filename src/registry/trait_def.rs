//! 服务注册发现 Trait 定义

use super::{RegisterOptions, RegistryOption, RegistryOptions, Service};
use crate::error::Result;
use async_trait::async_trait;

/// 服务注册发现 Trait
///
/// 注册必须是幂等的：同一节点重复注册只刷新其记录。
#[async_trait]
pub trait Registry: Send + Sync {
    fn init(&self, opts: Vec<RegistryOption>);

    fn options(&self) -> RegistryOptions;

    /// 注册服务
    async fn register(&self, service: &Service, opts: RegisterOptions) -> Result<()>;

    /// 注销服务（仅移除 `service.nodes` 中列出的节点）
    async fn deregister(&self, service: &Service) -> Result<()>;

    /// 获取服务的所有版本及其存活节点
    async fn get_service(&self, name: &str) -> Result<Vec<Service>>;

    /// 列出所有服务（不含节点）
    async fn list_services(&self) -> Result<Vec<Service>>;

    fn name(&self) -> &str;
}
