//! 传输层抽象
//!
//! Server 通过 `listen` 接收连接，Client 通过 `dial` 建立连接，
//! 双方在 [`Socket`] 上收发 [`Message`]。

pub mod memory;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

pub use memory::MemoryTransport;

/// 目标服务名
pub const HEADER_SERVICE: &str = "Micro-Service";
/// 目标端点
pub const HEADER_ENDPOINT: &str = "Micro-Endpoint";
/// 远端处理器返回的错误
pub const HEADER_ERROR: &str = "Micro-Error";
/// 消息体编码
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

/// 传输层消息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub header: HashMap<String, String>,
    pub body: Bytes,
}

impl Message {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            header: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.insert(key.into(), value.into());
        self
    }
}

/// 传输层配置
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    pub addrs: Vec<String>,
    pub timeout: Option<Duration>,
}

/// 传输层配置项
#[derive(Debug, Clone)]
pub enum TransportOption {
    Addrs(Vec<String>),
    Timeout(Duration),
}

impl TransportOptions {
    pub fn apply(&mut self, opts: Vec<TransportOption>) {
        for opt in opts {
            match opt {
                TransportOption::Addrs(addrs) => self.addrs = addrs,
                TransportOption::Timeout(timeout) => self.timeout = Some(timeout),
            }
        }
    }
}

/// 双向连接
#[async_trait]
pub trait Socket: Send {
    async fn send(&mut self, msg: Message) -> Result<()>;

    async fn recv(&mut self) -> Result<Message>;

    fn local(&self) -> &str;

    fn remote(&self) -> &str;

    async fn close(&mut self);
}

/// 监听器
#[async_trait]
pub trait Listener: Send {
    /// 实际绑定的地址（端口为 0 时由传输层分配）
    fn addr(&self) -> String;

    async fn accept(&mut self) -> Result<Box<dyn Socket>>;

    async fn close(&mut self);
}

/// 传输层能力
#[async_trait]
pub trait Transport: Send + Sync {
    fn init(&self, opts: Vec<TransportOption>);

    fn options(&self) -> TransportOptions;

    async fn listen(&self, addr: &str) -> Result<Box<dyn Listener>>;

    async fn dial(&self, addr: &str) -> Result<Box<dyn Socket>>;

    fn name(&self) -> &str;
}
