//! 进程内消息代理

use super::{Broker, BrokerHandler, BrokerOption, BrokerOptions, Subscription};
use crate::error::{MicroError, Result};
use crate::transport::Message;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// 进程内消息代理
///
/// 每次发布按订阅顺序依次调用同一主题下的所有处理器。
#[derive(Default)]
pub struct MemoryBroker {
    options: RwLock<BrokerOptions>,
    connected: AtomicBool,
    subscribers: RwLock<HashMap<String, Vec<(String, BrokerHandler)>>>,
}

impl MemoryBroker {
    pub fn new(opts: Vec<BrokerOption>) -> Self {
        let broker = Self::default();
        broker.init(opts);
        broker
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    fn init(&self, opts: Vec<BrokerOption>) {
        self.options.write().apply(opts);
    }

    fn options(&self) -> BrokerOptions {
        self.options.read().clone()
    }

    fn address(&self) -> String {
        self.options.read().addrs.first().cloned().unwrap_or_default()
    }

    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(&self, topic: &str, msg: Message) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(MicroError::broker("not connected"));
        }
        let handlers: Vec<BrokerHandler> = self
            .subscribers
            .read()
            .get(topic)
            .map(|subs| subs.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        for handler in handlers {
            handler(msg.clone())
                .await
                .map_err(|e| MicroError::broker(format!("subscriber on {topic} failed: {e}")))?;
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: BrokerHandler) -> Result<Subscription> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(MicroError::broker("not connected"));
        }
        let subscription = Subscription {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.to_string(),
        };
        self.subscribers
            .write()
            .entry(topic.to_string())
            .or_default()
            .push((subscription.id.clone(), handler));
        Ok(subscription)
    }

    async fn unsubscribe(&self, subscription: &Subscription) -> Result<()> {
        let mut subscribers = self.subscribers.write();
        if let Some(subs) = subscribers.get_mut(&subscription.topic) {
            subs.retain(|(id, _)| id != &subscription.id);
            if subs.is_empty() {
                subscribers.remove(&subscription.topic);
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
