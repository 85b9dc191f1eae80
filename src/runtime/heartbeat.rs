//! 心跳任务：按固定间隔重新注册服务

use crate::server::Server;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 后台心跳任务
///
/// 停止时先取消再等待任务退出；任务只在两次 tick 之间检查取消，
/// 正在进行的注册不会被打断。
pub struct Heartbeat {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// 启动心跳；间隔为零时任务只等待停止信号
    pub fn spawn(server: Arc<dyn Server>, interval: Duration) -> Self {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run(server, interval, shutdown.clone()));
        Self { shutdown, handle }
    }

    /// 发送停止信号并等待任务退出
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Heartbeat task terminated abnormally");
        }
    }
}

async fn run(server: Arc<dyn Server>, interval: Duration, shutdown: CancellationToken) {
    if interval.is_zero() {
        debug!("Heartbeat disabled");
        shutdown.cancelled().await;
        return;
    }

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                match server.register().await {
                    Ok(()) => debug!("Heartbeat registration succeeded"),
                    Err(e) => warn!(error = %e, "Heartbeat registration failed, retrying on next tick"),
                }
            }
        }
    }
    debug!("Heartbeat stopped");
}
