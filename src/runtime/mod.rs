//! 服务生命周期
//!
//! `Service` 持有组装好的 [`Options`](crate::options::Options)，负责：
//!
//! 1. **启动**：依次执行 before-start 钩子、启动 Server、首次注册
//! 2. **心跳**：后台按 `register_interval` 周期性重新注册，失败只记日志
//! 3. **等待**：终止信号与 `Options::context` 取消，先到者触发停机
//! 4. **停机**：先停心跳，再注销、停止 Server，最后执行 after-stop 钩子
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use flare_micro::{BackendCatalog, Service, ServiceConfig};
//!
//! # async fn example() -> flare_micro::Result<()> {
//! let config = ServiceConfig::load("./service.yaml")?;
//! let catalog = BackendCatalog::with_builtins();
//! let service = Service::new(config, &catalog, Vec::new())?;
//! service.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod heartbeat;
pub mod service;
pub mod signal;

pub use heartbeat::Heartbeat;
pub use service::{LifecycleState, Service};
pub use signal::wait_for_shutdown_signal;
