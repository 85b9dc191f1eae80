//! 缓存选择器
//!
//! 在 TTL 内复用 Registry 的查询结果；调用失败或 `reset` 会使缓存失效。

use super::strategy::flatten_nodes;
use super::{Selector, SelectorOption, SelectorOptions};
use crate::error::{MicroError, Result};
use crate::registry::{Node, Service};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use tokio::time::Instant;
use tracing::debug;

struct CacheEntry {
    services: Vec<Service>,
    fetched_at: Instant,
}

#[derive(Default)]
pub struct CacheSelector {
    options: RwLock<SelectorOptions>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    counter: AtomicUsize,
}

impl CacheSelector {
    pub fn new(opts: Vec<SelectorOption>) -> Self {
        let selector = Self::default();
        selector.init(opts);
        selector
    }

    fn cached(&self, service: &str) -> Option<Vec<Service>> {
        let ttl = self.options.read().cache_ttl;
        let cache = self.cache.read();
        cache
            .get(service)
            .filter(|entry| entry.fetched_at.elapsed() < ttl)
            .map(|entry| entry.services.clone())
    }

    async fn get_services(&self, service: &str) -> Result<Vec<Service>> {
        if let Some(services) = self.cached(service) {
            return Ok(services);
        }

        let registry = self.options.read().registry()?;
        let services = registry.get_service(service).await?;
        self.cache.write().insert(
            service.to_string(),
            CacheEntry {
                services: services.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(services)
    }
}

#[async_trait]
impl Selector for CacheSelector {
    fn init(&self, opts: Vec<SelectorOption>) {
        let registry_changed = opts
            .iter()
            .any(|opt| matches!(opt, SelectorOption::Registry(_)));
        self.options.write().apply(opts);
        // 缓存属于旧的 Registry
        if registry_changed {
            self.cache.write().clear();
        }
    }

    fn options(&self) -> SelectorOptions {
        self.options.read().clone()
    }

    async fn select(&self, service: &str) -> Result<Node> {
        let services = self.get_services(service).await?;
        let strategy = self.options.read().strategy;
        strategy
            .pick(&flatten_nodes(&services), &self.counter)
            .ok_or_else(|| MicroError::not_found(format!("no nodes for service {service}")))
    }

    fn mark(&self, service: &str, node: &Node, error: Option<&MicroError>) {
        if let Some(error) = error {
            debug!(service, node_id = %node.id, error = %error, "Dropping cached nodes after failed call");
            self.reset(service);
        }
    }

    fn reset(&self, service: &str) {
        self.cache.write().remove(service);
    }

    fn name(&self) -> &str {
        "cache"
    }
}
