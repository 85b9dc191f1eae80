//! 生命周期测试：启动、心跳、信号等待与停机顺序

mod common;

use common::{FlakyRegistry, MockServer, eventually, memory_config};
use flare_micro::{
    BackendCatalog, HookPhase, LifecycleState, MicroError, Registry, Service, ServiceOption,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn mock_service(server: Arc<MockServer>, mut extra: Vec<ServiceOption>) -> Service {
    let mut overrides = vec![ServiceOption::Server(server)];
    overrides.append(&mut extra);
    Service::new(memory_config("orders"), &BackendCatalog::with_builtins(), overrides)
        .expect("compose mock service")
}

fn counting_hook(counter: Arc<AtomicUsize>, fail_with: Option<&'static str>) -> ServiceOption {
    ServiceOption::after_stop(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            match fail_with {
                Some(message) => Err(anyhow::anyhow!(message)),
                None => Ok(()),
            }
        }
    })
}

#[tokio::test]
async fn start_then_stop_walks_every_state() {
    let server = MockServer::new();
    let service = mock_service(server.clone(), Vec::new());
    assert_eq!(service.state(), LifecycleState::Created);

    service.start().await.unwrap();
    assert_eq!(service.state(), LifecycleState::Registered);
    assert_eq!(MockServer::count(&server.starts), 1);
    assert_eq!(MockServer::count(&server.registers), 1);

    service.stop().await.unwrap();
    assert_eq!(service.state(), LifecycleState::Stopped);
    assert_eq!(MockServer::count(&server.deregisters), 1);
    assert_eq!(MockServer::count(&server.stops), 1);
}

#[tokio::test]
async fn starting_twice_is_rejected() {
    let service = mock_service(MockServer::new(), Vec::new());
    service.start().await.unwrap();
    let err = service.start().await.unwrap_err();
    assert!(matches!(err, MicroError::Lifecycle(_)), "got {err:?}");
}

#[tokio::test]
async fn failed_server_start_skips_registration() {
    let server = MockServer::new();
    server.fail_start.store(true, Ordering::SeqCst);
    let service = mock_service(server.clone(), Vec::new());

    assert!(service.start().await.is_err());
    assert_eq!(MockServer::count(&server.registers), 0);
    assert_eq!(service.state(), LifecycleState::Created);
}

#[tokio::test]
async fn before_start_failure_stops_later_hooks_and_server_start() {
    let server = MockServer::new();
    let later = Arc::new(AtomicUsize::new(0));
    let later_hook = later.clone();
    let service = mock_service(
        server.clone(),
        vec![
            ServiceOption::before_start(|| async { Err(anyhow::anyhow!("migrations pending")) }),
            ServiceOption::before_start(move || {
                let later = later_hook.clone();
                async move {
                    later.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        ],
    );

    let err = service.start().await.unwrap_err();
    match err {
        MicroError::Hook { phase, source } => {
            assert_eq!(phase, HookPhase::BeforeStart);
            assert_eq!(source.to_string(), "migrations pending");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(later.load(Ordering::SeqCst), 0);
    assert_eq!(MockServer::count(&server.starts), 0);
    assert_eq!(service.state(), LifecycleState::Created);
}

#[tokio::test]
async fn stopping_twice_runs_shutdown_once() {
    let server = MockServer::new();
    let hooks = Arc::new(AtomicUsize::new(0));
    let service = mock_service(server.clone(), vec![counting_hook(hooks.clone(), None)]);

    service.start().await.unwrap();
    service.stop().await.unwrap();
    let err = service.stop().await.unwrap_err();

    assert!(matches!(err, MicroError::Lifecycle(_)), "got {err:?}");
    assert_eq!(hooks.load(Ordering::SeqCst), 1);
    assert_eq!(MockServer::count(&server.deregisters), 1);
    assert_eq!(MockServer::count(&server.stops), 1);
    assert_eq!(service.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn stopping_an_unstarted_service_is_rejected() {
    let server = MockServer::new();
    let service = mock_service(server.clone(), Vec::new());

    let err = service.stop().await.unwrap_err();

    assert!(matches!(err, MicroError::Lifecycle(_)), "got {err:?}");
    assert_eq!(MockServer::count(&server.deregisters), 0);
    assert_eq!(MockServer::count(&server.stops), 0);
    assert_eq!(service.state(), LifecycleState::Created);
}

#[tokio::test]
async fn stop_can_be_retried_after_deregistration_failure() {
    let server = MockServer::new();
    server.fail_deregister.store(true, Ordering::SeqCst);
    let service = mock_service(server.clone(), Vec::new());

    service.start().await.unwrap();
    assert!(service.stop().await.is_err());

    server.fail_deregister.store(false, Ordering::SeqCst);
    service.stop().await.unwrap();
    assert_eq!(MockServer::count(&server.deregisters), 2);
    assert_eq!(MockServer::count(&server.stops), 1);
    assert_eq!(service.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn deregistration_failure_leaves_server_running() {
    let server = MockServer::new();
    server.fail_deregister.store(true, Ordering::SeqCst);
    let hooks = Arc::new(AtomicUsize::new(0));
    let service = mock_service(server.clone(), vec![counting_hook(hooks.clone(), None)]);

    service.start().await.unwrap();
    let err = service.stop().await.unwrap_err();

    assert!(matches!(err, MicroError::Registration(_)), "got {err:?}");
    assert_eq!(MockServer::count(&server.stops), 0);
    assert_eq!(hooks.load(Ordering::SeqCst), 0);
    assert_eq!(service.state(), LifecycleState::Deregistering);
}

#[tokio::test]
async fn every_after_stop_hook_runs_and_first_error_wins() {
    let server = MockServer::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let service = mock_service(
        server.clone(),
        vec![
            counting_hook(calls.clone(), Some("flush failed")),
            counting_hook(calls.clone(), Some("close failed")),
            counting_hook(calls.clone(), None),
        ],
    );

    service.start().await.unwrap();
    let err = service.stop().await.unwrap_err();

    match err {
        MicroError::Hook { phase, source } => {
            assert_eq!(phase, HookPhase::AfterStop);
            assert_eq!(source.to_string(), "flush failed");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(MockServer::count(&server.stops), 1);
    assert_eq!(service.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn run_returns_after_context_cancellation() {
    let server = MockServer::new();
    let token = CancellationToken::new();
    let service = mock_service(server.clone(), vec![ServiceOption::Context(token.clone())]);

    let (result, ()) = tokio::join!(service.run(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    result.unwrap();
    assert_eq!(service.state(), LifecycleState::Stopped);
    assert_eq!(MockServer::count(&server.deregisters), 1);
    assert_eq!(MockServer::count(&server.stops), 1);
}

#[tokio::test(start_paused = true)]
async fn zero_register_interval_disables_heartbeat() {
    let server = MockServer::new();
    let token = CancellationToken::new();
    let service = mock_service(server.clone(), vec![ServiceOption::Context(token.clone())]);
    assert_eq!(service.options().register_interval, Duration::ZERO);

    let (result, ()) = tokio::join!(service.run(), async {
        // 一天，远超默认的 10s 心跳间隔
        for _ in 0..8640 {
            tokio::time::advance(Duration::from_secs(10)).await;
        }
        token.cancel();
    });

    result.unwrap();
    // 只有启动时的那一次注册
    assert_eq!(MockServer::count(&server.registers), 1);
}

#[tokio::test]
async fn heartbeat_reregisters_on_every_tick() {
    let server = MockServer::new();
    let token = CancellationToken::new();
    let service = mock_service(
        server.clone(),
        vec![
            ServiceOption::Context(token.clone()),
            ServiceOption::RegisterInterval(Duration::from_millis(20)),
        ],
    );

    let (result, ticked) = tokio::join!(service.run(), async {
        let ticked = eventually(Duration::from_secs(2), || {
            MockServer::count(&server.registers) >= 4
        })
        .await;
        token.cancel();
        ticked
    });

    result.unwrap();
    assert!(ticked, "heartbeat did not re-register");
}

#[tokio::test]
async fn heartbeat_survives_a_failed_registration() {
    let registry = FlakyRegistry::new();
    let token = CancellationToken::new();
    let service = Service::new(
        memory_config("orders"),
        &BackendCatalog::with_builtins(),
        vec![
            ServiceOption::Registry(registry.clone()),
            ServiceOption::RegisterInterval(Duration::from_millis(20)),
            ServiceOption::Context(token.clone()),
        ],
    )
    .unwrap();

    let (result, ticked) = tokio::join!(service.run(), async {
        let ticked = eventually(Duration::from_secs(2), || registry.registers() >= 4).await;
        token.cancel();
        ticked
    });

    // 第二次注册失败只记录日志，服务照常运行并正常停机
    result.unwrap();
    assert!(ticked, "heartbeat stopped after a failed registration");
    assert_eq!(service.state(), LifecycleState::Stopped);
    assert!(registry.get_service("orders").await.is_err());
}
