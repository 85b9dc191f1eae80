//! 消息代理抽象（发布 / 订阅）

pub mod memory;

use crate::error::Result;
use crate::transport::Message;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

pub use memory::MemoryBroker;

/// 订阅处理器
pub type BrokerHandler = Arc<dyn Fn(Message) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// 将异步闭包包装为 [`BrokerHandler`]
pub fn handler_fn<F, Fut>(f: F) -> BrokerHandler
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |msg| Box::pin(f(msg)))
}

/// 订阅凭据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub topic: String,
}

/// 消息代理配置
#[derive(Debug, Clone, Default)]
pub struct BrokerOptions {
    pub addrs: Vec<String>,
}

/// 消息代理配置项
#[derive(Debug, Clone)]
pub enum BrokerOption {
    Addrs(Vec<String>),
}

impl BrokerOptions {
    pub fn apply(&mut self, opts: Vec<BrokerOption>) {
        for opt in opts {
            match opt {
                BrokerOption::Addrs(addrs) => self.addrs = addrs,
            }
        }
    }
}

/// 消息代理能力
#[async_trait]
pub trait Broker: Send + Sync {
    fn init(&self, opts: Vec<BrokerOption>);

    fn options(&self) -> BrokerOptions;

    fn address(&self) -> String;

    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    async fn publish(&self, topic: &str, msg: Message) -> Result<()>;

    async fn subscribe(&self, topic: &str, handler: BrokerHandler) -> Result<Subscription>;

    async fn unsubscribe(&self, subscription: &Subscription) -> Result<()>;

    fn name(&self) -> &str;
}
