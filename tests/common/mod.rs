//! 集成测试共享的配置与模拟后端
#![allow(dead_code)]

use async_trait::async_trait;
use flare_micro::broker::BrokerHandler;
use flare_micro::registry::RegistryOptions;
use flare_micro::server::{Handler, ServerOptions};
use flare_micro::{
    MemoryRegistry, MicroError, RegisterOptions, Registry, RegistryOption, Result, Server,
    ServerOption, ServiceConfig, ServiceRecord,
};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// 全部使用进程内后端的配置
pub fn memory_config(name: &str) -> ServiceConfig {
    ServiceConfig {
        client: "rpc".into(),
        client_request_timeout: "1s".into(),
        client_retries: 1,
        client_pool_size: 4,
        client_pool_ttl: "1m".into(),
        server: "rpc".into(),
        server_name: name.into(),
        broker: "memory".into(),
        registry: "memory".into(),
        selector: "cache".into(),
        transport: "memory".into(),
        register_ttl: "30s".into(),
        register_interval: "0s".into(),
        ..ServiceConfig::default()
    }
}

/// 轮询直到条件成立，最多等待 `deadline`
pub async fn eventually(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

/// 记录调用次数的服务端，可按需注入失败
#[derive(Default)]
pub struct MockServer {
    options: RwLock<ServerOptions>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub registers: AtomicUsize,
    pub deregisters: AtomicUsize,
    pub fail_start: AtomicBool,
    pub fail_deregister: AtomicBool,
}

impl MockServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Server for MockServer {
    fn init(&self, opts: Vec<ServerOption>) {
        self.options.write().apply(opts);
    }

    fn options(&self) -> ServerOptions {
        self.options.read().clone()
    }

    fn handle(&self, _endpoint: &str, _handler: Handler) {}

    fn subscribe(&self, _topic: &str, _handler: BrokerHandler) {}

    async fn start(&self) -> Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(MicroError::transport("address in use"));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn register(&self) -> Result<()> {
        self.registers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn deregister(&self) -> Result<()> {
        self.deregisters.fetch_add(1, Ordering::SeqCst);
        if self.fail_deregister.load(Ordering::SeqCst) {
            return Err(MicroError::registration("registry unreachable"));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// 第二次注册失败的注册中心，其余调用委托给 `MemoryRegistry`
#[derive(Default)]
pub struct FlakyRegistry {
    inner: MemoryRegistry,
    pub registers: AtomicUsize,
}

impl FlakyRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn registers(&self) -> usize {
        self.registers.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registry for FlakyRegistry {
    fn init(&self, opts: Vec<RegistryOption>) {
        self.inner.init(opts);
    }

    fn options(&self) -> RegistryOptions {
        self.inner.options()
    }

    async fn register(&self, service: &ServiceRecord, opts: RegisterOptions) -> Result<()> {
        let call = self.registers.fetch_add(1, Ordering::SeqCst) + 1;
        if call == 2 {
            return Err(MicroError::registration("registry briefly unavailable"));
        }
        self.inner.register(service, opts).await
    }

    async fn deregister(&self, service: &ServiceRecord) -> Result<()> {
        self.inner.deregister(service).await
    }

    async fn get_service(&self, name: &str) -> Result<Vec<ServiceRecord>> {
        self.inner.get_service(name).await
    }

    async fn list_services(&self) -> Result<Vec<ServiceRecord>> {
        self.inner.list_services().await
    }

    fn name(&self) -> &str {
        "flaky"
    }
}
