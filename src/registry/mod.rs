//! 服务注册发现模块
//!
//! 定义 Registry 能力契约与服务记录，并提供进程内实现 `MemoryRegistry`

pub mod memory;
pub mod trait_def;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use memory::MemoryRegistry;
pub use trait_def::Registry;

/// 服务节点
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub address: String,
    pub metadata: HashMap<String, String>,
}

/// 服务记录（同名同版本的节点集合）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub version: String,
    pub metadata: HashMap<String, String>,
    pub nodes: Vec<Node>,
}

/// 单次注册参数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// 记录存活时间，零表示不过期
    pub ttl: Duration,
}

/// 注册中心配置
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    pub addrs: Vec<String>,
    pub timeout: Option<Duration>,
}

/// 注册中心配置项
#[derive(Debug, Clone)]
pub enum RegistryOption {
    Addrs(Vec<String>),
    Timeout(Duration),
}

impl RegistryOptions {
    pub fn apply(&mut self, opts: Vec<RegistryOption>) {
        for opt in opts {
            match opt {
                RegistryOption::Addrs(addrs) => self.addrs = addrs,
                RegistryOption::Timeout(timeout) => self.timeout = Some(timeout),
            }
        }
    }
}
