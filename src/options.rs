//! 服务选项组装
//!
//! 按依赖顺序构建 registry -> transport -> broker -> selector -> client -> server，
//! 再按调用方给出的顺序应用 [`ServiceOption`]。替换共享组件时，依赖它的
//! 组件按 [`PROPAGATION_RULES`] 重新初始化，保证所有组件持有同一个实例。

use crate::broker::{Broker, BrokerOption};
use crate::catalog::BackendCatalog;
use crate::client::{Client, ClientOption, ClientWrapper, MetadataClient};
use crate::config::{
    DEFAULT_BROKER, DEFAULT_CLIENT, DEFAULT_REGISTRY, DEFAULT_SELECTOR, DEFAULT_SERVER,
    DEFAULT_TRANSPORT, ServiceConfig,
};
use crate::error::{MicroError, Result};
use crate::registry::{Registry, RegistryOption};
use crate::selector::{Selector, SelectorOption};
use crate::server::{Server, ServerOption};
use crate::transport::{Transport, TransportOption};
use crate::utils::{parse_duration, parse_metadata};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 生命周期钩子
pub type Hook = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// 将异步闭包包装为 [`Hook`]
pub fn hook_fn<F, Fut>(f: F) -> Hook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// 组装完成的服务选项
///
/// 组装后只读；心跳任务与主任务并发读取。
#[derive(Clone)]
pub struct Options {
    pub registry: Arc<dyn Registry>,
    pub broker: Arc<dyn Broker>,
    pub transport: Arc<dyn Transport>,
    pub selector: Arc<dyn Selector>,
    pub client: Arc<dyn Client>,
    pub server: Arc<dyn Server>,

    /// 心跳间隔，零表示不做周期注册
    pub register_interval: Duration,
    /// 注册 TTL，替换 Server 时重新下发
    pub register_ttl: Duration,

    pub before_start: Vec<Hook>,
    pub after_stop: Vec<Hook>,

    /// 取消后 `Service::run` 开始停机
    pub context: CancellationToken,
}

/// 服务选项（按顺序应用的命令）
#[derive(Clone)]
pub enum ServiceOption {
    Registry(Arc<dyn Registry>),
    Broker(Arc<dyn Broker>),
    Transport(Arc<dyn Transport>),
    Selector(Arc<dyn Selector>),
    Client(Arc<dyn Client>),
    Server(Arc<dyn Server>),
    Name(String),
    Id(String),
    Version(String),
    Metadata(HashMap<String, String>),
    RegisterTtl(Duration),
    RegisterInterval(Duration),
    /// 逆序应用，第一个包装器位于最外层
    WrapClient(Vec<ClientWrapper>),
    BeforeStart(Hook),
    AfterStop(Hook),
    Context(CancellationToken),
}

impl ServiceOption {
    pub fn before_start<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        ServiceOption::BeforeStart(hook_fn(f))
    }

    pub fn after_stop<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        ServiceOption::AfterStop(hook_fn(f))
    }
}

/// 共享组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Registry,
    Broker,
    Transport,
    Selector,
    Client,
    Server,
}

/// `(提供方, 依赖方)`：提供方被替换时依赖方需重新初始化，
/// 依赖方被替换时新实例需接入当前的提供方。
pub const PROPAGATION_RULES: &[(Component, Component)] = &[
    (Component::Registry, Component::Client),
    (Component::Registry, Component::Server),
    (Component::Registry, Component::Selector),
    (Component::Broker, Component::Client),
    (Component::Broker, Component::Server),
    (Component::Transport, Component::Client),
    (Component::Transport, Component::Server),
    (Component::Selector, Component::Client),
];

/// 替换 `changed` 后需要重新初始化的组件
pub fn dependents_of(changed: Component) -> Vec<Component> {
    PROPAGATION_RULES
        .iter()
        .filter(|(provider, _)| *provider == changed)
        .map(|(_, dependent)| *dependent)
        .collect()
}

/// `component` 依赖的组件
pub fn providers_of(component: Component) -> Vec<Component> {
    PROPAGATION_RULES
        .iter()
        .filter(|(_, dependent)| *dependent == component)
        .map(|(provider, _)| *provider)
        .collect()
}

/// 把 `provider` 的当前实例注入 `dependent`
fn inject(opts: &Options, provider: Component, dependent: Component) {
    match (provider, dependent) {
        (Component::Registry, Component::Client) => {
            opts.client.init(vec![ClientOption::Registry(opts.registry.clone())])
        }
        (Component::Registry, Component::Server) => {
            opts.server.init(vec![ServerOption::Registry(opts.registry.clone())])
        }
        (Component::Registry, Component::Selector) => {
            opts.selector.init(vec![SelectorOption::Registry(opts.registry.clone())])
        }
        (Component::Broker, Component::Client) => {
            opts.client.init(vec![ClientOption::Broker(opts.broker.clone())])
        }
        (Component::Broker, Component::Server) => {
            opts.server.init(vec![ServerOption::Broker(opts.broker.clone())])
        }
        (Component::Transport, Component::Client) => {
            opts.client.init(vec![ClientOption::Transport(opts.transport.clone())])
        }
        (Component::Transport, Component::Server) => {
            opts.server.init(vec![ServerOption::Transport(opts.transport.clone())])
        }
        (Component::Selector, Component::Client) => {
            opts.client.init(vec![ClientOption::Selector(opts.selector.clone())])
        }
        (provider, dependent) => {
            debug!(?provider, ?dependent, "No propagation rule");
        }
    }
}

/// 替换组件后恢复一致性
fn propagate(opts: &Options, changed: Component) {
    for provider in providers_of(changed) {
        inject(opts, provider, changed);
    }
    for dependent in dependents_of(changed) {
        inject(opts, changed, dependent);
    }
}

/// 应用单个选项
pub fn apply(opts: &mut Options, option: ServiceOption) {
    match option {
        ServiceOption::Registry(registry) => {
            opts.registry = registry;
            propagate(opts, Component::Registry);
        }
        ServiceOption::Broker(broker) => {
            opts.broker = broker;
            propagate(opts, Component::Broker);
        }
        ServiceOption::Transport(transport) => {
            opts.transport = transport;
            propagate(opts, Component::Transport);
        }
        ServiceOption::Selector(selector) => {
            opts.selector = selector;
            propagate(opts, Component::Selector);
        }
        ServiceOption::Client(client) => {
            opts.client = client;
            propagate(opts, Component::Client);
        }
        ServiceOption::Server(server) => {
            opts.server = server;
            propagate(opts, Component::Server);
            // 新 Server 沿用当前的注册 TTL
            if !opts.register_ttl.is_zero() {
                opts.server
                    .init(vec![ServerOption::RegisterTtl(opts.register_ttl)]);
            }
        }
        ServiceOption::Name(name) => opts.server.init(vec![ServerOption::Name(name)]),
        ServiceOption::Id(id) => opts.server.init(vec![ServerOption::Id(id)]),
        ServiceOption::Version(version) => opts.server.init(vec![ServerOption::Version(version)]),
        ServiceOption::Metadata(metadata) => {
            opts.server.init(vec![ServerOption::Metadata(metadata)])
        }
        ServiceOption::RegisterTtl(ttl) => {
            opts.register_ttl = ttl;
            opts.server.init(vec![ServerOption::RegisterTtl(ttl)]);
        }
        ServiceOption::RegisterInterval(interval) => opts.register_interval = interval,
        ServiceOption::WrapClient(wrappers) => {
            for wrapper in wrappers.iter().rev() {
                opts.client = wrapper(opts.client.clone());
            }
        }
        ServiceOption::BeforeStart(hook) => opts.before_start.push(hook),
        ServiceOption::AfterStop(hook) => opts.after_stop.push(hook),
        ServiceOption::Context(token) => opts.context = token,
    }
}

/// 配置中的时长字段，在构建任何组件之前统一解析
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfiguredDurations {
    pub client_request_timeout: Option<Duration>,
    pub client_pool_ttl: Option<Duration>,
    pub register_interval: Option<Duration>,
    pub register_ttl: Option<Duration>,
}

fn parse_field(field: &'static str, value: &str) -> Result<Option<Duration>> {
    if value.is_empty() {
        return Ok(None);
    }
    parse_duration(value)
        .map(Some)
        .ok_or_else(|| MicroError::InvalidDuration {
            field,
            value: value.to_string(),
        })
}

impl ConfiguredDurations {
    pub fn parse(config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            client_request_timeout: parse_field(
                "clientRequestTimeout",
                &config.client_request_timeout,
            )?,
            client_pool_ttl: parse_field("clientPoolTTL", &config.client_pool_ttl)?,
            register_interval: parse_field("registerInterval", &config.register_interval)?,
            register_ttl: parse_field("registerTTL", &config.register_ttl)?,
        })
    }
}

fn backend_name<'a>(configured: &'a str, default: &'a str) -> &'a str {
    if configured.is_empty() { default } else { configured }
}

/// 根据配置组装服务选项
///
/// 所有后端名称与时长字段都先校验，任何一项失败时不会构建任何组件。
/// 组装只做连线，不触发网络 I/O。
pub fn compose(
    config: &ServiceConfig,
    catalog: &BackendCatalog,
    overrides: Vec<ServiceOption>,
) -> Result<Options> {
    let durations = ConfiguredDurations::parse(config)?;

    let new_registry = catalog.registry(backend_name(&config.registry, DEFAULT_REGISTRY))?;
    let new_transport = catalog.transport(backend_name(&config.transport, DEFAULT_TRANSPORT))?;
    let new_broker = catalog.broker(backend_name(&config.broker, DEFAULT_BROKER))?;
    let new_selector = catalog.selector(backend_name(&config.selector, DEFAULT_SELECTOR))?;
    let new_client = catalog.client(backend_name(&config.client, DEFAULT_CLIENT))?;
    let new_server = catalog.server(backend_name(&config.server, DEFAULT_SERVER))?;

    let mut registry_opts = Vec::new();
    if !config.registry_address.is_empty() {
        registry_opts.push(RegistryOption::Addrs(config.registry_address.clone()));
    }
    let registry = new_registry(registry_opts);

    let mut transport_opts = Vec::new();
    if !config.transport_address.is_empty() {
        transport_opts.push(TransportOption::Addrs(config.transport_address.clone()));
    }
    let transport = new_transport(transport_opts);

    let mut broker_opts = Vec::new();
    if !config.broker_address.is_empty() {
        broker_opts.push(BrokerOption::Addrs(config.broker_address.clone()));
    }
    let broker = new_broker(broker_opts);

    let selector = new_selector(vec![SelectorOption::Registry(registry.clone())]);

    let mut client_opts = vec![
        ClientOption::Broker(broker.clone()),
        ClientOption::Transport(transport.clone()),
        ClientOption::Selector(selector.clone()),
        ClientOption::Registry(registry.clone()),
    ];
    if config.client_pool_size > 0 {
        client_opts.push(ClientOption::PoolSize(config.client_pool_size as usize));
    }
    // 客户端调优只接受正值，零或负值保留客户端默认
    if let Some(ttl) = durations.client_pool_ttl.filter(|d| !d.is_zero()) {
        client_opts.push(ClientOption::PoolTtl(ttl));
    }
    if let Some(timeout) = durations.client_request_timeout.filter(|d| !d.is_zero()) {
        client_opts.push(ClientOption::RequestTimeout(timeout));
    }
    if config.client_retries > 0 {
        client_opts.push(ClientOption::Retries(config.client_retries as u32));
    }
    let client: Arc<dyn Client> = Arc::new(MetadataClient::from_service(
        new_client(client_opts),
        &config.server_name,
    ));

    let mut server_opts = vec![
        ServerOption::Broker(broker.clone()),
        ServerOption::Transport(transport.clone()),
        ServerOption::Registry(registry.clone()),
    ];
    if !config.server_name.is_empty() {
        server_opts.push(ServerOption::Name(config.server_name.clone()));
    }
    if !config.server_version.is_empty() {
        server_opts.push(ServerOption::Version(config.server_version.clone()));
    }
    if !config.server_address.is_empty() {
        server_opts.push(ServerOption::Address(config.server_address.clone()));
    }
    if !config.server_advertise.is_empty() {
        server_opts.push(ServerOption::Advertise(config.server_advertise.clone()));
    }
    if !config.server_id.is_empty() {
        server_opts.push(ServerOption::Id(config.server_id.clone()));
    }
    if !config.server_metadata.is_empty() {
        server_opts.push(ServerOption::Metadata(parse_metadata(&config.server_metadata)));
    }
    let server = new_server(server_opts);

    let mut opts = Options {
        registry,
        broker,
        transport,
        selector,
        client,
        server,
        register_interval: Duration::ZERO,
        register_ttl: Duration::ZERO,
        before_start: Vec::new(),
        after_stop: Vec::new(),
        context: CancellationToken::new(),
    };

    let mut options = Vec::with_capacity(overrides.len() + 2);
    if let Some(interval) = durations.register_interval {
        options.push(ServiceOption::RegisterInterval(interval));
    }
    if let Some(ttl) = durations.register_ttl {
        options.push(ServiceOption::RegisterTtl(ttl));
    }
    options.extend(overrides);

    for option in options {
        apply(&mut opts, option);
    }

    debug!(
        registry = %opts.registry.name(),
        broker = %opts.broker.name(),
        transport = %opts.transport.name(),
        selector = %opts.selector.name(),
        client = %opts.client.name(),
        server = %opts.server.name(),
        register_interval = ?opts.register_interval,
        "Service options composed"
    );
    Ok(opts)
}
