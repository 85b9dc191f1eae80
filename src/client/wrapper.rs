//! 客户端包装器
//!
//! `MetadataClient` 为每次出站调用附加调用方身份，对调用者透明。

use super::{Client, ClientOption, ClientOptions, Request, Response};
use crate::error::Result;
use crate::transport::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub const HEADER_PREFIX: &str = "X-Micro-";
pub const FROM_SERVICE_HEADER: &str = "X-Micro-From-Service";

/// 附加固定请求头的客户端
///
/// 调用方已显式设置的同名请求头不会被覆盖。
pub struct MetadataClient {
    inner: Arc<dyn Client>,
    headers: HashMap<String, String>,
}

impl MetadataClient {
    pub fn new(inner: Arc<dyn Client>, headers: HashMap<String, String>) -> Self {
        Self { inner, headers }
    }

    /// 以服务名作为 `X-Micro-From-Service` 请求头
    pub fn from_service(inner: Arc<dyn Client>, service_name: &str) -> Self {
        let headers = HashMap::from([(FROM_SERVICE_HEADER.to_string(), service_name.to_string())]);
        Self::new(inner, headers)
    }

    fn stamp(&self, header: &mut HashMap<String, String>) {
        for (key, value) in &self.headers {
            header.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

#[async_trait]
impl Client for MetadataClient {
    fn init(&self, opts: Vec<ClientOption>) {
        self.inner.init(opts);
    }

    fn options(&self) -> ClientOptions {
        self.inner.options()
    }

    async fn call(&self, mut request: Request) -> Result<Response> {
        self.stamp(&mut request.header);
        self.inner.call(request).await
    }

    async fn publish(&self, topic: &str, mut msg: Message) -> Result<()> {
        self.stamp(&mut msg.header);
        self.inner.publish(topic, msg).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
