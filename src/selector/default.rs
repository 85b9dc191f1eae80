//! 无缓存选择器：每次选择都直接查询 Registry

use super::strategy::flatten_nodes;
use super::{Selector, SelectorOption, SelectorOptions};
use crate::error::{MicroError, Result};
use crate::registry::Node;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::AtomicUsize;

#[derive(Default)]
pub struct DefaultSelector {
    options: RwLock<SelectorOptions>,
    counter: AtomicUsize,
}

impl DefaultSelector {
    pub fn new(opts: Vec<SelectorOption>) -> Self {
        let selector = Self::default();
        selector.init(opts);
        selector
    }
}

#[async_trait]
impl Selector for DefaultSelector {
    fn init(&self, opts: Vec<SelectorOption>) {
        self.options.write().apply(opts);
    }

    fn options(&self) -> SelectorOptions {
        self.options.read().clone()
    }

    async fn select(&self, service: &str) -> Result<Node> {
        let (registry, strategy) = {
            let options = self.options.read();
            (options.registry()?, options.strategy)
        };
        let services = registry.get_service(service).await?;
        strategy
            .pick(&flatten_nodes(&services), &self.counter)
            .ok_or_else(|| MicroError::not_found(format!("no nodes for service {service}")))
    }

    fn mark(&self, _service: &str, _node: &Node, _error: Option<&MicroError>) {}

    fn reset(&self, _service: &str) {}

    fn name(&self) -> &str {
        "default"
    }
}
