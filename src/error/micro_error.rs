//! Flare Micro 统一错误类型
//!
//! 配置类错误与后端解析错误是致命的（启动即失败），
//! 心跳注册错误可恢复，停机阶段的错误会上抛给调用方。

use crate::catalog::BackendKind;
use std::path::PathBuf;
use thiserror::Error;

/// 生命周期钩子所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    BeforeStart,
    AfterStop,
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookPhase::BeforeStart => f.write_str("before-start"),
            HookPhase::AfterStop => f.write_str("after-stop"),
        }
    }
}

/// Flare Micro 统一错误类型
#[derive(Error, Debug)]
pub enum MicroError {
    /// 配置文件不可读（包括路径为空）
    #[error("failed to read config {path:?}: {reason}")]
    ConfigRead { path: PathBuf, reason: String },

    /// 配置文件格式错误
    #[error("failed to parse config {path:?}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    /// 时长字段无法解析
    #[error("failed to parse {field}: {value:?}")]
    InvalidDuration { field: &'static str, value: String },

    /// 指定类型下未注册的后端
    #[error("unknown {kind} backend {name:?}")]
    UnknownBackend { kind: BackendKind, name: String },

    /// 钩子执行失败
    #[error("{phase} hook failed: {source}")]
    Hook {
        phase: HookPhase,
        #[source]
        source: anyhow::Error,
    },

    /// 注册 / 注销失败
    #[error("registration error: {0}")]
    Registration(String),

    /// 传输层启动 / 停止 / 收发失败
    #[error("transport error: {0}")]
    Transport(String),

    /// 消息代理错误
    #[error("broker error: {0}")]
    Broker(String),

    /// 客户端调用错误（远端处理器返回的错误也在此）
    #[error("client error: {0}")]
    Client(String),

    /// 服务或节点不存在
    #[error("not found: {0}")]
    NotFound(String),

    /// 请求超时
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// 非法的生命周期转换
    #[error("lifecycle error: {0}")]
    Lifecycle(String),
}

impl MicroError {
    pub fn registration(msg: impl Into<String>) -> Self {
        MicroError::Registration(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        MicroError::Transport(msg.into())
    }

    pub fn broker(msg: impl Into<String>) -> Self {
        MicroError::Broker(msg.into())
    }

    pub fn client(msg: impl Into<String>) -> Self {
        MicroError::Client(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        MicroError::NotFound(msg.into())
    }

    pub fn hook(phase: HookPhase, source: anyhow::Error) -> Self {
        MicroError::Hook { phase, source }
    }

    /// 是否为启动期致命错误（应直接终止进程）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MicroError::ConfigRead { .. }
                | MicroError::ConfigParse { .. }
                | MicroError::InvalidDuration { .. }
                | MicroError::UnknownBackend { .. }
        )
    }

    /// 客户端是否可以换节点重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, MicroError::Transport(_) | MicroError::Timeout(_))
    }
}

/// 统一 Result 类型
pub type Result<T> = std::result::Result<T, MicroError>;
