//! Flare Micro 错误处理模块
//!
//! 提供统一的错误类型以及致命 / 可恢复错误的分类

pub mod micro_error;

pub use micro_error::{HookPhase, MicroError, Result};
