//! 节点选择模块
//!
//! 通过 Registry 解析服务实例，再按负载均衡策略挑选一个节点

pub mod cache;
pub mod default;
pub mod strategy;

use crate::error::{MicroError, Result};
use crate::registry::{Node, Registry};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use cache::CacheSelector;
pub use default::DefaultSelector;
pub use strategy::Strategy;

/// 缓存选择器的默认缓存时间
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// 选择器配置
#[derive(Clone)]
pub struct SelectorOptions {
    pub registry: Option<Arc<dyn Registry>>,
    pub strategy: Strategy,
    pub cache_ttl: Duration,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            registry: None,
            strategy: Strategy::Random,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// 选择器配置项
#[derive(Clone)]
pub enum SelectorOption {
    Registry(Arc<dyn Registry>),
    Strategy(Strategy),
    CacheTtl(Duration),
}

impl SelectorOptions {
    pub fn apply(&mut self, opts: Vec<SelectorOption>) {
        for opt in opts {
            match opt {
                SelectorOption::Registry(registry) => self.registry = Some(registry),
                SelectorOption::Strategy(strategy) => self.strategy = strategy,
                SelectorOption::CacheTtl(ttl) => self.cache_ttl = ttl,
            }
        }
    }

    pub(crate) fn registry(&self) -> Result<Arc<dyn Registry>> {
        self.registry
            .clone()
            .ok_or_else(|| MicroError::not_found("selector has no registry"))
    }
}

/// 选择器能力
#[async_trait]
pub trait Selector: Send + Sync {
    fn init(&self, opts: Vec<SelectorOption>);

    fn options(&self) -> SelectorOptions;

    /// 为服务挑选一个节点，没有可用节点时返回 `NotFound`
    async fn select(&self, service: &str) -> Result<Node>;

    /// 反馈一次调用结果
    fn mark(&self, service: &str, node: &Node, error: Option<&MicroError>);

    /// 丢弃服务的本地状态
    fn reset(&self, service: &str);

    fn name(&self) -> &str;
}
