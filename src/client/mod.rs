//! 客户端模块
//!
//! 提供 Client 能力契约、`RpcClient` 实现以及客户端包装器

pub mod pool;
pub mod rpc;
pub mod wrapper;

use crate::broker::Broker;
use crate::error::Result;
use crate::registry::Registry;
use crate::selector::Selector;
use crate::transport::{Message, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use rpc::RpcClient;
pub use wrapper::{FROM_SERVICE_HEADER, HEADER_PREFIX, MetadataClient};

pub const DEFAULT_POOL_SIZE: usize = 1;
pub const DEFAULT_POOL_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// 远程调用请求
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub service: String,
    pub endpoint: String,
    pub header: HashMap<String, String>,
    pub body: Bytes,
}

impl Request {
    pub fn new(service: impl Into<String>, endpoint: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            service: service.into(),
            endpoint: endpoint.into(),
            header: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.insert(key.into(), value.into());
        self
    }
}

/// 远程调用响应
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub header: HashMap<String, String>,
    pub body: Bytes,
}

/// 客户端配置
#[derive(Clone)]
pub struct ClientOptions {
    pub broker: Option<Arc<dyn Broker>>,
    pub transport: Option<Arc<dyn Transport>>,
    pub selector: Option<Arc<dyn Selector>>,
    pub registry: Option<Arc<dyn Registry>>,
    pub pool_size: usize,
    pub pool_ttl: Duration,
    pub request_timeout: Duration,
    pub retries: u32,
    pub content_type: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            broker: None,
            transport: None,
            selector: None,
            registry: None,
            pool_size: DEFAULT_POOL_SIZE,
            pool_ttl: DEFAULT_POOL_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retries: DEFAULT_RETRIES,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

/// 客户端配置项
#[derive(Clone)]
pub enum ClientOption {
    Broker(Arc<dyn Broker>),
    Transport(Arc<dyn Transport>),
    Selector(Arc<dyn Selector>),
    Registry(Arc<dyn Registry>),
    PoolSize(usize),
    PoolTtl(Duration),
    RequestTimeout(Duration),
    Retries(u32),
    ContentType(String),
}

impl ClientOptions {
    pub fn apply(&mut self, opts: Vec<ClientOption>) {
        for opt in opts {
            match opt {
                ClientOption::Broker(broker) => self.broker = Some(broker),
                ClientOption::Transport(transport) => self.transport = Some(transport),
                ClientOption::Selector(selector) => self.selector = Some(selector),
                ClientOption::Registry(registry) => self.registry = Some(registry),
                ClientOption::PoolSize(size) => self.pool_size = size,
                ClientOption::PoolTtl(ttl) => self.pool_ttl = ttl,
                ClientOption::RequestTimeout(timeout) => self.request_timeout = timeout,
                ClientOption::Retries(retries) => self.retries = retries,
                ClientOption::ContentType(content_type) => self.content_type = content_type,
            }
        }
    }
}

/// 客户端能力
#[async_trait]
pub trait Client: Send + Sync {
    fn init(&self, opts: Vec<ClientOption>);

    fn options(&self) -> ClientOptions;

    async fn call(&self, request: Request) -> Result<Response>;

    async fn publish(&self, topic: &str, msg: Message) -> Result<()>;

    fn name(&self) -> &str;
}

/// 客户端包装器（中间件）
pub type ClientWrapper = Arc<dyn Fn(Arc<dyn Client>) -> Arc<dyn Client> + Send + Sync>;
