//! 日志初始化
//!
//! `RUST_LOG` 优先，否则使用配置中的 `logLevel`；`logFormat` 为 `json` 时输出 JSON。

use crate::config::{DEFAULT_LOG_LEVEL, ServiceConfig};
use tracing_subscriber::EnvFilter;

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// 安装全局 tracing subscriber
///
/// 已经安装过时不做任何事，返回 `false`。
pub fn init_logging(config: &ServiceConfig) -> bool {
    let level = if config.log_level.is_empty() {
        DEFAULT_LOG_LEVEL
    } else {
        config.log_level.as_str()
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true);

    let installed = match LogFormat::parse(&config.log_format) {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.is_ok()
}
