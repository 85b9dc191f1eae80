//! 组装阶段测试：后端解析、时长校验与共享组件传播

mod common;

use async_trait::async_trait;
use bytes::Bytes;
use common::memory_config;
use flare_micro::client::ClientOptions;
use flare_micro::transport::Message;
use flare_micro::{
    BackendCatalog, BackendKind, Client, ClientOption, ClientWrapper, FROM_SERVICE_HEADER,
    MemoryBroker, MemoryRegistry, MemoryTransport, MicroError, Request, Response, ServiceOption,
    compose,
};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// 把请求头原样返回的客户端
#[derive(Default)]
struct EchoClient {
    options: RwLock<ClientOptions>,
}

#[async_trait]
impl Client for EchoClient {
    fn init(&self, opts: Vec<ClientOption>) {
        self.options.write().apply(opts);
    }

    fn options(&self) -> ClientOptions {
        self.options.read().clone()
    }

    async fn call(&self, request: Request) -> flare_micro::Result<Response> {
        Ok(Response {
            header: request.header,
            body: request.body,
        })
    }

    async fn publish(&self, _topic: &str, _msg: Message) -> flare_micro::Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// 在 `trace` 请求头上追加标签的包装器
struct TaggingClient {
    tag: &'static str,
    inner: Arc<dyn Client>,
}

#[async_trait]
impl Client for TaggingClient {
    fn init(&self, opts: Vec<ClientOption>) {
        self.inner.init(opts);
    }

    fn options(&self) -> ClientOptions {
        self.inner.options()
    }

    async fn call(&self, mut request: Request) -> flare_micro::Result<Response> {
        let trace = request.header.entry("trace".to_string()).or_default();
        if !trace.is_empty() {
            trace.push(',');
        }
        trace.push_str(self.tag);
        self.inner.call(request).await
    }

    async fn publish(&self, topic: &str, msg: Message) -> flare_micro::Result<()> {
        self.inner.publish(topic, msg).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

fn tagging(tag: &'static str) -> ClientWrapper {
    Arc::new(move |inner: Arc<dyn Client>| Arc::new(TaggingClient { tag, inner }) as Arc<dyn Client>)
}

/// 内置后端全部包一层计数器
fn counting_catalog(built: Arc<AtomicUsize>) -> BackendCatalog {
    let builtins = BackendCatalog::with_builtins();
    let mut catalog = BackendCatalog::new();

    let (registry, counter) = (builtins.registry("memory").unwrap(), built.clone());
    catalog.register_registry("memory", move |opts| {
        counter.fetch_add(1, Ordering::SeqCst);
        registry(opts)
    });
    let (broker, counter) = (builtins.broker("memory").unwrap(), built.clone());
    catalog.register_broker("memory", move |opts| {
        counter.fetch_add(1, Ordering::SeqCst);
        broker(opts)
    });
    let (transport, counter) = (builtins.transport("memory").unwrap(), built.clone());
    catalog.register_transport("memory", move |opts| {
        counter.fetch_add(1, Ordering::SeqCst);
        transport(opts)
    });
    let (selector, counter) = (builtins.selector("cache").unwrap(), built.clone());
    catalog.register_selector("cache", move |opts| {
        counter.fetch_add(1, Ordering::SeqCst);
        selector(opts)
    });
    let (client, counter) = (builtins.client("rpc").unwrap(), built.clone());
    catalog.register_client("rpc", move |opts| {
        counter.fetch_add(1, Ordering::SeqCst);
        client(opts)
    });
    let (server, counter) = (builtins.server("rpc").unwrap(), built);
    catalog.register_server("rpc", move |opts| {
        counter.fetch_add(1, Ordering::SeqCst);
        server(opts)
    });
    catalog
}

#[test]
fn builtin_names_are_listed_per_kind() {
    let catalog = BackendCatalog::with_builtins();
    assert_eq!(catalog.names(BackendKind::Registry), vec!["memory"]);
    assert_eq!(catalog.names(BackendKind::Selector), vec!["cache", "default"]);
    assert_eq!(catalog.names(BackendKind::Server), vec!["rpc"]);
}

#[test]
fn unknown_backend_is_reported_for_every_kind() {
    let catalog = BackendCatalog::with_builtins();
    let cases: [(BackendKind, fn(&mut flare_micro::ServiceConfig)); 6] = [
        (BackendKind::Registry, |c| c.registry = "zookeeper".into()),
        (BackendKind::Broker, |c| c.broker = "zookeeper".into()),
        (BackendKind::Transport, |c| c.transport = "zookeeper".into()),
        (BackendKind::Selector, |c| c.selector = "zookeeper".into()),
        (BackendKind::Client, |c| c.client = "zookeeper".into()),
        (BackendKind::Server, |c| c.server = "zookeeper".into()),
    ];

    for (expected, mutate) in cases {
        let mut config = memory_config("orders");
        mutate(&mut config);
        match compose(&config, &catalog, Vec::new()) {
            Err(MicroError::UnknownBackend { kind, name }) => {
                assert_eq!(kind, expected);
                assert_eq!(name, "zookeeper");
            }
            Err(other) => panic!("{expected}: unexpected error {other:?}"),
            Ok(_) => panic!("{expected}: compose should fail"),
        }
    }
}

#[test]
fn invalid_duration_fails_before_any_backend_is_built() {
    let built = Arc::new(AtomicUsize::new(0));
    let catalog = counting_catalog(built.clone());

    for field in ["clientRequestTimeout", "clientPoolTTL", "registerInterval", "registerTTL"] {
        let mut config = memory_config("orders");
        match field {
            "clientRequestTimeout" => config.client_request_timeout = "soon".into(),
            "clientPoolTTL" => config.client_pool_ttl = "soon".into(),
            "registerInterval" => config.register_interval = "soon".into(),
            _ => config.register_ttl = "soon".into(),
        }
        let err = compose(&config, &catalog, Vec::new()).err().expect("compose should fail");
        match err {
            MicroError::InvalidDuration { field: reported, value } => {
                assert_eq!(reported, field);
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(built.load(Ordering::SeqCst), 0);
}

#[test]
fn unknown_server_fails_before_any_backend_is_built() {
    let built = Arc::new(AtomicUsize::new(0));
    let catalog = counting_catalog(built.clone());
    let mut config = memory_config("orders");
    config.server = "grpc".into();

    assert!(compose(&config, &catalog, Vec::new()).is_err());
    assert_eq!(built.load(Ordering::SeqCst), 0);

    config.server = "rpc".into();
    assert!(compose(&config, &catalog, Vec::new()).is_ok());
    assert_eq!(built.load(Ordering::SeqCst), 6);
}

#[test]
fn config_values_reach_client_and_server() {
    let mut config = memory_config("orders");
    config.server_version = "2.0.0".into();
    config.server_id = "n1".into();
    config.server_address = "127.0.0.1:7000".into();
    config.server_metadata = vec!["a=1".into(), "b=2=3".into(), "c".into()];
    config.client_request_timeout = "250ms".into();
    config.client_retries = 4;

    let opts = compose(&config, &BackendCatalog::with_builtins(), Vec::new()).unwrap();

    let server = opts.server.options();
    assert_eq!(server.name, "orders");
    assert_eq!(server.version, "2.0.0");
    assert_eq!(server.id, "n1");
    assert_eq!(server.address, "127.0.0.1:7000");
    assert_eq!(server.register_ttl, Duration::from_secs(30));
    assert_eq!(server.metadata.len(), 3);
    assert_eq!(server.metadata["a"], "1");
    assert_eq!(server.metadata["b"], "2=3");
    assert_eq!(server.metadata["c"], "");

    let client = opts.client.options();
    assert_eq!(client.request_timeout, Duration::from_millis(250));
    assert_eq!(client.retries, 4);
    assert_eq!(client.pool_size, 4);
    assert_eq!(opts.register_interval, Duration::ZERO);
}

#[test]
fn registry_override_reaches_every_dependent() {
    let registry: Arc<dyn flare_micro::Registry> = Arc::new(MemoryRegistry::new(Vec::new()));
    let opts = compose(
        &memory_config("orders"),
        &BackendCatalog::with_builtins(),
        vec![ServiceOption::Registry(registry.clone())],
    )
    .unwrap();

    assert!(Arc::ptr_eq(&opts.registry, &registry));
    assert!(Arc::ptr_eq(&opts.client.options().registry.unwrap(), &registry));
    assert!(Arc::ptr_eq(&opts.server.options().registry.unwrap(), &registry));
    assert!(Arc::ptr_eq(&opts.selector.options().registry.unwrap(), &registry));
}

#[test]
fn broker_and_transport_overrides_reach_client_and_server() {
    let broker: Arc<dyn flare_micro::Broker> = Arc::new(MemoryBroker::new(Vec::new()));
    let transport: Arc<dyn flare_micro::Transport> = Arc::new(MemoryTransport::new(Vec::new()));
    let opts = compose(
        &memory_config("orders"),
        &BackendCatalog::with_builtins(),
        vec![
            ServiceOption::Broker(broker.clone()),
            ServiceOption::Transport(transport.clone()),
        ],
    )
    .unwrap();

    let client = opts.client.options();
    let server = opts.server.options();
    assert!(Arc::ptr_eq(&client.broker.unwrap(), &broker));
    assert!(Arc::ptr_eq(&server.broker.unwrap(), &broker));
    assert!(Arc::ptr_eq(&client.transport.unwrap(), &transport));
    assert!(Arc::ptr_eq(&server.transport.unwrap(), &transport));
}

#[test]
fn replaced_selector_is_wired_to_current_registry_and_client() {
    let catalog = BackendCatalog::with_builtins();
    let selector = catalog.selector("default").unwrap()(Vec::new());
    let opts = compose(
        &memory_config("orders"),
        &catalog,
        vec![ServiceOption::Selector(selector.clone())],
    )
    .unwrap();

    assert!(Arc::ptr_eq(&selector.options().registry.unwrap(), &opts.registry));
    assert!(Arc::ptr_eq(&opts.client.options().selector.unwrap(), &selector));
}

#[test]
fn caller_overrides_win_over_configured_registration_timing() {
    let opts = compose(
        &memory_config("orders"),
        &BackendCatalog::with_builtins(),
        vec![
            ServiceOption::RegisterTtl(Duration::from_secs(5)),
            ServiceOption::RegisterInterval(Duration::from_secs(2)),
            ServiceOption::Name("orders-v2".into()),
        ],
    )
    .unwrap();

    assert_eq!(opts.server.options().register_ttl, Duration::from_secs(5));
    assert_eq!(opts.register_interval, Duration::from_secs(2));
    assert_eq!(opts.server.options().name, "orders-v2");
}

#[test]
fn replaced_server_keeps_configured_register_ttl() {
    let catalog = BackendCatalog::with_builtins();
    let custom = catalog.server("rpc").unwrap()(Vec::new());
    assert_eq!(custom.options().register_ttl, Duration::ZERO);

    let opts = compose(
        &memory_config("orders"),
        &catalog,
        vec![ServiceOption::Server(custom.clone())],
    )
    .unwrap();

    assert!(Arc::ptr_eq(&opts.server, &custom));
    assert_eq!(custom.options().register_ttl, Duration::from_secs(30));
    assert!(Arc::ptr_eq(&custom.options().registry.unwrap(), &opts.registry));
}

#[test]
fn explicit_ttl_still_wins_over_server_replacement() {
    let catalog = BackendCatalog::with_builtins();
    let custom = catalog.server("rpc").unwrap()(Vec::new());

    let opts = compose(
        &memory_config("orders"),
        &catalog,
        vec![
            ServiceOption::RegisterTtl(Duration::from_secs(5)),
            ServiceOption::Server(custom),
        ],
    )
    .unwrap();

    assert_eq!(opts.server.options().register_ttl, Duration::from_secs(5));
}

#[tokio::test]
async fn client_wrappers_apply_first_outermost_and_keep_identity() {
    let mut catalog = BackendCatalog::with_builtins();
    catalog.register_client("echo", |opts| {
        let client = EchoClient::default();
        client.init(opts);
        Arc::new(client)
    });
    let mut config = memory_config("orders");
    config.client = "echo".into();

    let opts = compose(
        &config,
        &catalog,
        vec![ServiceOption::WrapClient(vec![tagging("outer"), tagging("inner")])],
    )
    .unwrap();

    let response = opts
        .client
        .call(Request::new("payments", "Charge", Bytes::new()))
        .await
        .unwrap();
    assert_eq!(response.header["trace"], "outer,inner");
    assert_eq!(response.header[FROM_SERVICE_HEADER], "orders");
}

#[tokio::test]
async fn identity_header_does_not_override_caller_value() {
    let mut catalog = BackendCatalog::with_builtins();
    catalog.register_client("echo", |_| Arc::new(EchoClient::default()));
    let mut config = memory_config("orders");
    config.client = "echo".into();

    let opts = compose(&config, &catalog, Vec::new()).unwrap();
    let request =
        Request::new("payments", "Charge", Bytes::new()).with_header(FROM_SERVICE_HEADER, "gateway");
    let response = opts.client.call(request).await.unwrap();
    assert_eq!(response.header[FROM_SERVICE_HEADER], "gateway");
}
