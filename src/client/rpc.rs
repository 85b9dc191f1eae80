//! 基于 Transport 的请求 / 响应客户端

use super::pool::{Conn, Pool};
use super::{Client, ClientOption, ClientOptions, Request, Response};
use crate::error::{MicroError, Result};
use crate::registry::Node;
use crate::transport::{
    HEADER_CONTENT_TYPE, HEADER_ENDPOINT, HEADER_ERROR, HEADER_SERVICE, Message, Transport,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// 请求 / 响应客户端
///
/// 通过 Selector 选择节点，经 Transport 发送请求；传输错误与超时按
/// `retries` 重试，远端处理器返回的错误不重试。
#[derive(Default)]
pub struct RpcClient {
    options: RwLock<ClientOptions>,
    pool: Pool,
}

impl RpcClient {
    pub fn new(opts: Vec<ClientOption>) -> Self {
        let client = Self::default();
        client.init(opts);
        client
    }

    async fn call_node(
        &self,
        transport: &Arc<dyn Transport>,
        node: &Node,
        msg: Message,
        opts: &ClientOptions,
    ) -> Result<Response> {
        let mut conn = match self.pool.get(&node.address, opts.pool_ttl) {
            Some(conn) => conn,
            None => Conn::fresh(transport.dial(&node.address).await?),
        };

        let exchange = async {
            conn.socket.send(msg).await?;
            conn.socket.recv().await
        };
        let reply = if opts.request_timeout.is_zero() {
            exchange.await
        } else {
            tokio::time::timeout(opts.request_timeout, exchange)
                .await
                .unwrap_or(Err(MicroError::Timeout(opts.request_timeout)))
        };

        // 出错的连接状态未知，不再放回池中
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                conn.socket.close().await;
                return Err(e);
            }
        };
        self.pool
            .release(&node.address, conn, opts.pool_size, opts.pool_ttl);

        if let Some(error) = reply.header.get(HEADER_ERROR) {
            return Err(MicroError::client(error.clone()));
        }
        Ok(Response {
            header: reply.header,
            body: reply.body,
        })
    }
}

#[async_trait]
impl Client for RpcClient {
    fn init(&self, opts: Vec<ClientOption>) {
        self.options.write().apply(opts);
    }

    fn options(&self) -> ClientOptions {
        self.options.read().clone()
    }

    async fn call(&self, request: Request) -> Result<Response> {
        let opts = self.options();
        let selector = opts
            .selector
            .clone()
            .ok_or_else(|| MicroError::client("client has no selector"))?;
        let transport = opts
            .transport
            .clone()
            .ok_or_else(|| MicroError::client("client has no transport"))?;

        let mut msg = Message {
            header: request.header.clone(),
            body: request.body.clone(),
        };
        msg.header.insert(HEADER_SERVICE.to_string(), request.service.clone());
        msg.header.insert(HEADER_ENDPOINT.to_string(), request.endpoint.clone());
        msg.header
            .entry(HEADER_CONTENT_TYPE.to_string())
            .or_insert_with(|| opts.content_type.clone());

        let attempts = opts.retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let node = selector.select(&request.service).await?;
            debug!(service = %request.service, endpoint = %request.endpoint, node_id = %node.id, attempt, "Calling node");

            match self.call_node(&transport, &node, msg.clone(), &opts).await {
                Ok(response) => {
                    selector.mark(&request.service, &node, None);
                    return Ok(response);
                }
                Err(e) => {
                    selector.mark(&request.service, &node, Some(&e));
                    if !e.is_retryable() || attempt >= attempts {
                        return Err(e);
                    }
                    warn!(service = %request.service, node_id = %node.id, attempt, error = %e, "Call failed, retrying");
                    tokio::time::sleep(retry_backoff(attempt)).await;
                }
            }
        }
    }

    async fn publish(&self, topic: &str, mut msg: Message) -> Result<()> {
        let opts = self.options();
        let broker = opts
            .broker
            .ok_or_else(|| MicroError::client("client has no broker"))?;
        msg.header
            .entry(HEADER_CONTENT_TYPE.to_string())
            .or_insert(opts.content_type);
        broker.publish(topic, msg).await
    }

    fn name(&self) -> &str {
        "rpc"
    }
}

/// 重试退避：10ms 起步，指数增长，上限 1s
fn retry_backoff(attempt: u32) -> Duration {
    let millis = 10u64.saturating_mul(1u64 << attempt.min(7));
    Duration::from_millis(millis.min(1000))
}
