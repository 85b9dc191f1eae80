//! 服务端模块
//!
//! 提供 Server 能力契约与基于 Transport 的 `RpcServer`

pub mod rpc;

use crate::broker::{Broker, BrokerHandler};
use crate::client::Request;
use crate::error::Result;
use crate::registry::Registry;
use crate::transport::Transport;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use rpc::RpcServer;

pub const DEFAULT_NAME: &str = "flare.micro.server";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_ADDRESS: &str = "0.0.0.0:0";

/// 端点处理器
pub type Handler = Arc<dyn Fn(Request) -> BoxFuture<'static, anyhow::Result<Bytes>> + Send + Sync>;

/// 将异步闭包包装为 [`Handler`]
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Bytes>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// 服务端配置
#[derive(Clone)]
pub struct ServerOptions {
    pub broker: Option<Arc<dyn Broker>>,
    pub transport: Option<Arc<dyn Transport>>,
    pub registry: Option<Arc<dyn Registry>>,
    pub name: String,
    pub version: String,
    pub id: String,
    pub address: String,
    pub advertise: String,
    pub metadata: HashMap<String, String>,
    pub register_ttl: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            broker: None,
            transport: None,
            registry: None,
            name: DEFAULT_NAME.to_string(),
            version: DEFAULT_VERSION.to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            address: DEFAULT_ADDRESS.to_string(),
            advertise: String::new(),
            metadata: HashMap::new(),
            register_ttl: Duration::ZERO,
        }
    }
}

/// 服务端配置项
#[derive(Clone)]
pub enum ServerOption {
    Broker(Arc<dyn Broker>),
    Transport(Arc<dyn Transport>),
    Registry(Arc<dyn Registry>),
    Name(String),
    Version(String),
    Id(String),
    Address(String),
    Advertise(String),
    Metadata(HashMap<String, String>),
    RegisterTtl(Duration),
}

impl ServerOptions {
    pub fn apply(&mut self, opts: Vec<ServerOption>) {
        for opt in opts {
            match opt {
                ServerOption::Broker(broker) => self.broker = Some(broker),
                ServerOption::Transport(transport) => self.transport = Some(transport),
                ServerOption::Registry(registry) => self.registry = Some(registry),
                ServerOption::Name(name) => self.name = name,
                ServerOption::Version(version) => self.version = version,
                ServerOption::Id(id) => self.id = id,
                ServerOption::Address(address) => self.address = address,
                ServerOption::Advertise(advertise) => self.advertise = advertise,
                ServerOption::Metadata(metadata) => self.metadata = metadata,
                ServerOption::RegisterTtl(ttl) => self.register_ttl = ttl,
            }
        }
    }
}

/// 服务端能力
#[async_trait]
pub trait Server: Send + Sync {
    fn init(&self, opts: Vec<ServerOption>);

    fn options(&self) -> ServerOptions;

    /// 注册端点处理器
    fn handle(&self, endpoint: &str, handler: Handler);

    /// 注册主题订阅，启动时挂到 Broker 上
    fn subscribe(&self, topic: &str, handler: BrokerHandler);

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn register(&self) -> Result<()>;

    async fn deregister(&self) -> Result<()>;

    fn name(&self) -> &str;
}
