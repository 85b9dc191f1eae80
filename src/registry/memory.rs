//! 进程内注册中心

use super::{Node, RegisterOptions, Registry, RegistryOption, RegistryOptions, Service};
use crate::error::{MicroError, Result};
use async_trait::async_trait;
use parking_lot::RwLock as OptionsLock;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

struct NodeRecord {
    node: Node,
    expires_at: Option<Instant>,
}

impl NodeRecord {
    fn is_alive(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Default)]
struct ServiceRecord {
    metadata: HashMap<String, String>,
    nodes: HashMap<String, NodeRecord>,
}

/// 进程内注册中心
///
/// 按 `(name, version)` 合并节点；带 TTL 注册的节点过期后对查询不可见。
#[derive(Default)]
pub struct MemoryRegistry {
    options: OptionsLock<RegistryOptions>,
    services: RwLock<HashMap<String, HashMap<String, ServiceRecord>>>,
}

impl MemoryRegistry {
    pub fn new(opts: Vec<RegistryOption>) -> Self {
        let registry = Self::default();
        registry.init(opts);
        registry
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    fn init(&self, opts: Vec<RegistryOption>) {
        self.options.write().apply(opts);
    }

    fn options(&self) -> RegistryOptions {
        self.options.read().clone()
    }

    async fn register(&self, service: &Service, opts: RegisterOptions) -> Result<()> {
        if service.name.is_empty() {
            return Err(MicroError::registration("service name is empty"));
        }
        let expires_at = (!opts.ttl.is_zero()).then(|| Instant::now() + opts.ttl);

        let mut services = self.services.write().await;
        let record = services
            .entry(service.name.clone())
            .or_default()
            .entry(service.version.clone())
            .or_default();
        record.metadata = service.metadata.clone();
        for node in &service.nodes {
            record.nodes.insert(
                node.id.clone(),
                NodeRecord {
                    node: node.clone(),
                    expires_at,
                },
            );
        }
        debug!(service = %service.name, version = %service.version, nodes = service.nodes.len(), "Service registered");
        Ok(())
    }

    async fn deregister(&self, service: &Service) -> Result<()> {
        let mut services = self.services.write().await;
        let Some(versions) = services.get_mut(&service.name) else {
            return Ok(());
        };
        if let Some(record) = versions.get_mut(&service.version) {
            for node in &service.nodes {
                record.nodes.remove(&node.id);
            }
            if record.nodes.is_empty() {
                versions.remove(&service.version);
            }
        }
        if versions.is_empty() {
            services.remove(&service.name);
        }
        debug!(service = %service.name, version = %service.version, "Service deregistered");
        Ok(())
    }

    async fn get_service(&self, name: &str) -> Result<Vec<Service>> {
        let now = Instant::now();
        let services = self.services.read().await;
        let versions = services
            .get(name)
            .ok_or_else(|| MicroError::not_found(format!("service {name}")))?;

        let found: Vec<Service> = versions
            .iter()
            .filter_map(|(version, record)| {
                let nodes: Vec<Node> = record
                    .nodes
                    .values()
                    .filter(|r| r.is_alive(now))
                    .map(|r| r.node.clone())
                    .collect();
                (!nodes.is_empty()).then(|| Service {
                    name: name.to_string(),
                    version: version.clone(),
                    metadata: record.metadata.clone(),
                    nodes,
                })
            })
            .collect();

        if found.is_empty() {
            return Err(MicroError::not_found(format!("service {name}")));
        }
        Ok(found)
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        let now = Instant::now();
        let services = self.services.read().await;
        let mut listed = Vec::new();
        for (name, versions) in services.iter() {
            for (version, record) in versions {
                if record.nodes.values().any(|r| r.is_alive(now)) {
                    listed.push(Service {
                        name: name.clone(),
                        version: version.clone(),
                        metadata: record.metadata.clone(),
                        nodes: Vec::new(),
                    });
                }
            }
        }
        Ok(listed)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
