//! 后端目录
//!
//! 每种能力各自维护一张“名称 -> 构造函数”的表。目录在进程启动时构建，
//! 之后只读，并以引用方式传给组装阶段。未注册的名称直接报错，不做回退。

use crate::broker::{Broker, BrokerOption, MemoryBroker};
use crate::client::{Client, ClientOption, RpcClient};
use crate::error::{MicroError, Result};
use crate::registry::{MemoryRegistry, Registry, RegistryOption};
use crate::selector::{CacheSelector, DefaultSelector, Selector, SelectorOption};
use crate::server::{RpcServer, Server, ServerOption};
use crate::transport::{MemoryTransport, Transport, TransportOption};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// 能力类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Registry,
    Broker,
    Transport,
    Selector,
    Client,
    Server,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendKind::Registry => "registry",
            BackendKind::Broker => "broker",
            BackendKind::Transport => "transport",
            BackendKind::Selector => "selector",
            BackendKind::Client => "client",
            BackendKind::Server => "server",
        };
        f.write_str(name)
    }
}

pub type RegistryFactory = Arc<dyn Fn(Vec<RegistryOption>) -> Arc<dyn Registry> + Send + Sync>;
pub type BrokerFactory = Arc<dyn Fn(Vec<BrokerOption>) -> Arc<dyn Broker> + Send + Sync>;
pub type TransportFactory = Arc<dyn Fn(Vec<TransportOption>) -> Arc<dyn Transport> + Send + Sync>;
pub type SelectorFactory = Arc<dyn Fn(Vec<SelectorOption>) -> Arc<dyn Selector> + Send + Sync>;
pub type ClientFactory = Arc<dyn Fn(Vec<ClientOption>) -> Arc<dyn Client> + Send + Sync>;
pub type ServerFactory = Arc<dyn Fn(Vec<ServerOption>) -> Arc<dyn Server> + Send + Sync>;

/// 单一能力的构造函数表
struct Factories<F> {
    kind: BackendKind,
    entries: HashMap<String, F>,
}

impl<F: Clone> Factories<F> {
    fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    fn insert(&mut self, name: &str, factory: F) {
        if self.entries.insert(name.to_string(), factory).is_some() {
            warn!(kind = %self.kind, name, "Backend constructor replaced");
        }
    }

    fn resolve(&self, name: &str) -> Result<F> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| MicroError::UnknownBackend {
                kind: self.kind,
                name: name.to_string(),
            })
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

/// 后端目录
pub struct BackendCatalog {
    registries: Factories<RegistryFactory>,
    brokers: Factories<BrokerFactory>,
    transports: Factories<TransportFactory>,
    selectors: Factories<SelectorFactory>,
    clients: Factories<ClientFactory>,
    servers: Factories<ServerFactory>,
}

impl Default for BackendCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendCatalog {
    /// 创建空目录
    pub fn new() -> Self {
        Self {
            registries: Factories::new(BackendKind::Registry),
            brokers: Factories::new(BackendKind::Broker),
            transports: Factories::new(BackendKind::Transport),
            selectors: Factories::new(BackendKind::Selector),
            clients: Factories::new(BackendKind::Client),
            servers: Factories::new(BackendKind::Server),
        }
    }

    /// 创建包含进程内后端的目录
    ///
    /// - registry / broker / transport: `memory`
    /// - selector: `default`、`cache`
    /// - client / server: `rpc`
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog
            .register_registry("memory", |opts| Arc::new(MemoryRegistry::new(opts)))
            .register_broker("memory", |opts| Arc::new(MemoryBroker::new(opts)))
            .register_transport("memory", |opts| Arc::new(MemoryTransport::new(opts)))
            .register_selector("default", |opts| Arc::new(DefaultSelector::new(opts)))
            .register_selector("cache", |opts| Arc::new(CacheSelector::new(opts)))
            .register_client("rpc", |opts| Arc::new(RpcClient::new(opts)))
            .register_server("rpc", |opts| Arc::new(RpcServer::new(opts)));
        catalog
    }

    pub fn register_registry<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(Vec<RegistryOption>) -> Arc<dyn Registry> + Send + Sync + 'static,
    {
        self.registries.insert(name, Arc::new(factory));
        self
    }

    pub fn register_broker<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(Vec<BrokerOption>) -> Arc<dyn Broker> + Send + Sync + 'static,
    {
        self.brokers.insert(name, Arc::new(factory));
        self
    }

    pub fn register_transport<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(Vec<TransportOption>) -> Arc<dyn Transport> + Send + Sync + 'static,
    {
        self.transports.insert(name, Arc::new(factory));
        self
    }

    pub fn register_selector<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(Vec<SelectorOption>) -> Arc<dyn Selector> + Send + Sync + 'static,
    {
        self.selectors.insert(name, Arc::new(factory));
        self
    }

    pub fn register_client<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(Vec<ClientOption>) -> Arc<dyn Client> + Send + Sync + 'static,
    {
        self.clients.insert(name, Arc::new(factory));
        self
    }

    pub fn register_server<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(Vec<ServerOption>) -> Arc<dyn Server> + Send + Sync + 'static,
    {
        self.servers.insert(name, Arc::new(factory));
        self
    }

    pub fn registry(&self, name: &str) -> Result<RegistryFactory> {
        self.registries.resolve(name)
    }

    pub fn broker(&self, name: &str) -> Result<BrokerFactory> {
        self.brokers.resolve(name)
    }

    pub fn transport(&self, name: &str) -> Result<TransportFactory> {
        self.transports.resolve(name)
    }

    pub fn selector(&self, name: &str) -> Result<SelectorFactory> {
        self.selectors.resolve(name)
    }

    pub fn client(&self, name: &str) -> Result<ClientFactory> {
        self.clients.resolve(name)
    }

    pub fn server(&self, name: &str) -> Result<ServerFactory> {
        self.servers.resolve(name)
    }

    /// 某种能力下已注册的名称（已排序）
    pub fn names(&self, kind: BackendKind) -> Vec<String> {
        match kind {
            BackendKind::Registry => self.registries.names(),
            BackendKind::Broker => self.brokers.names(),
            BackendKind::Transport => self.transports.names(),
            BackendKind::Selector => self.selectors.names(),
            BackendKind::Client => self.clients.names(),
            BackendKind::Server => self.servers.names(),
        }
    }
}
