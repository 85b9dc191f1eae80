//! 进程内示例服务
//!
//! ```bash
//! cargo run --example service -- demos/service.yaml
//! ```
//!
//! 启动后调用自身的 `Greeter.Hello` 端点并发布一条事件，Ctrl-C 退出。

use bytes::Bytes;
use flare_micro::broker::handler_fn as broker_handler;
use flare_micro::server::handler_fn;
use flare_micro::{
    BackendCatalog, FROM_SERVICE_HEADER, Message, Request, Service, ServiceConfig, ServiceOption,
    init_logging,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/service.yaml".to_string());
    let config = ServiceConfig::load(&path)?;
    init_logging(&config);

    let catalog = BackendCatalog::with_builtins();
    let service = Arc::new(Service::new(
        config,
        &catalog,
        vec![
            ServiceOption::before_start(|| async {
                info!("Warming caches");
                Ok(())
            }),
            ServiceOption::after_stop(|| async {
                info!("Flushed pending work");
                Ok(())
            }),
        ],
    )?);

    let server = service.server();
    server.handle(
        "Greeter.Hello",
        handler_fn(|req: Request| async move {
            let caller = req.header.get(FROM_SERVICE_HEADER).cloned().unwrap_or_default();
            let name = String::from_utf8_lossy(&req.body).into_owned();
            Ok(Bytes::from(format!("hello {name}, from {caller}")))
        }),
    );
    server.subscribe(
        "greeter.events",
        broker_handler(|msg: Message| async move {
            info!(body = %String::from_utf8_lossy(&msg.body), "📨 Event received");
            Ok(())
        }),
    );

    let runner = tokio::spawn({
        let service = service.clone();
        async move { service.run().await }
    });

    // 等待服务完成注册
    while service.state() < flare_micro::LifecycleState::Running && !runner.is_finished() {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let name = service.config().server_name.clone();
    let client = service.client();
    match client
        .call(Request::new(name.as_str(), "Greeter.Hello", "flare"))
        .await
    {
        Ok(response) => info!(reply = %String::from_utf8_lossy(&response.body), "Call succeeded"),
        Err(e) => tracing::warn!(error = %e, "Call failed"),
    }
    client
        .publish("greeter.events", Message::new("greeted flare"))
        .await?;

    runner.await??;
    Ok(())
}
