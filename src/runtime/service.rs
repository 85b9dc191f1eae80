//! 服务生命周期控制

use super::heartbeat::Heartbeat;
use super::signal::wait_for_shutdown_signal;
use crate::catalog::BackendCatalog;
use crate::client::Client;
use crate::config::ServiceConfig;
use crate::error::{HookPhase, MicroError, Result};
use crate::options::{Options, ServiceOption, compose};
use crate::server::Server;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 生命周期状态（按推进顺序排列）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Created,
    Started,
    Registered,
    Running,
    Deregistering,
    Stopped,
}

/// 微服务实例
///
/// 配置与选项在构造后只读；状态转换见 [`LifecycleState`]。
pub struct Service {
    config: Arc<ServiceConfig>,
    opts: Options,
    state: Mutex<LifecycleState>,
}

impl Service {
    /// 组装选项并创建服务
    ///
    /// 配置错误或未知后端会直接返回致命错误，不会留下已构建的组件。
    pub fn new(
        config: ServiceConfig,
        catalog: &BackendCatalog,
        overrides: Vec<ServiceOption>,
    ) -> Result<Self> {
        let opts = compose(&config, catalog, overrides)?;
        Ok(Self::from_options(config, opts))
    }

    /// 使用已组装好的选项创建服务
    pub fn from_options(config: ServiceConfig, opts: Options) -> Self {
        Self {
            config: Arc::new(config),
            opts,
            state: Mutex::new(LifecycleState::Created),
        }
    }

    pub fn name(&self) -> &str {
        "flare-micro"
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    pub fn client(&self) -> Arc<dyn Client> {
        self.opts.client.clone()
    }

    pub fn server(&self) -> Arc<dyn Server> {
        self.opts.server.clone()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    fn transition(&self, next: LifecycleState) {
        let previous = std::mem::replace(&mut *self.state.lock(), next);
        info!(from = ?previous, to = ?next, service_name = %self.config.server_name, "Lifecycle transition");
    }

    /// 启动服务
    ///
    /// 任一步失败都直接返回，不做回滚：钩子或监听失败时尚未注册，无需注销。
    pub async fn start(&self) -> Result<()> {
        let state = self.state();
        if state != LifecycleState::Created {
            return Err(MicroError::Lifecycle(format!("cannot start from {state:?}")));
        }

        for hook in &self.opts.before_start {
            hook()
                .await
                .map_err(|e| MicroError::hook(HookPhase::BeforeStart, e))?;
        }

        self.opts.server.start().await?;
        self.transition(LifecycleState::Started);

        self.opts.server.register().await?;
        self.transition(LifecycleState::Registered);
        Ok(())
    }

    /// 停止服务
    ///
    /// 注销失败时立即返回，不停止 Server；停止 Server 失败时不执行钩子。
    /// after-stop 钩子全部执行，返回第一个失败。
    /// 未启动或已停止时返回 `Lifecycle` 错误；注销失败后可以再次调用。
    pub async fn stop(&self) -> Result<()> {
        let state = self.state();
        if matches!(state, LifecycleState::Created | LifecycleState::Stopped) {
            return Err(MicroError::Lifecycle(format!("cannot stop from {state:?}")));
        }
        self.transition(LifecycleState::Deregistering);

        if let Err(e) = self.opts.server.deregister().await {
            error!(error = %e, "Deregistration failed, server left running");
            return Err(e);
        }

        self.opts.server.stop().await?;
        self.transition(LifecycleState::Stopped);

        let mut first_error = None;
        for (index, hook) in self.opts.after_stop.iter().enumerate() {
            if let Err(e) = hook().await {
                warn!(hook = index, error = %e, "After-stop hook failed");
                if first_error.is_none() {
                    first_error = Some(MicroError::hook(HookPhase::AfterStop, e));
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// 启动服务并阻塞到终止信号或 `Options::context` 被取消，然后停机
    pub async fn run(&self) -> Result<()> {
        self.start().await?;
        self.transition(LifecycleState::Running);
        info!(
            service_name = %self.config.server_name,
            register_interval = ?self.opts.register_interval,
            "🚀 Service running"
        );

        let heartbeat = Heartbeat::spawn(self.opts.server.clone(), self.opts.register_interval);
        wait_for_termination(&self.opts.context).await;

        // 先停心跳再注销，避免注销后被迟到的心跳重新注册
        heartbeat.stop().await;
        self.stop().await?;

        info!(service_name = %self.config.server_name, "Service stopped");
        Ok(())
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

async fn wait_for_termination(context: &CancellationToken) {
    tokio::select! {
        signal = wait_for_shutdown_signal() => match signal {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                warn!(error = %e, "Failed to listen for shutdown signals, waiting for cancellation only");
                context.cancelled().await;
                info!("Service context cancelled");
            }
        },
        _ = context.cancelled() => info!("Service context cancelled"),
    }
}
