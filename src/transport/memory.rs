//! 进程内传输层
//!
//! 地址只在同一个 `MemoryTransport` 实例内可见，消息不做任何序列化。

use super::{Listener, Message, Socket, Transport, TransportOption, TransportOptions};
use crate::error::{MicroError, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;
const FIRST_DYNAMIC_PORT: u64 = 10000;

type Listeners = Arc<Mutex<HashMap<String, mpsc::Sender<MemorySocket>>>>;

/// 进程内传输层
pub struct MemoryTransport {
    options: RwLock<TransportOptions>,
    listeners: Listeners,
    next_port: AtomicU64,
    next_conn: AtomicU64,
}

impl MemoryTransport {
    pub fn new(opts: Vec<TransportOption>) -> Self {
        let mut options = TransportOptions::default();
        options.apply(opts);
        Self {
            options: RwLock::new(options),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_port: AtomicU64::new(FIRST_DYNAMIC_PORT),
            next_conn: AtomicU64::new(1),
        }
    }

    /// 端口为 0 或缺省时分配一个未使用的端口
    fn resolve_addr(&self, addr: &str) -> String {
        let (host, port) = match addr.rsplit_once(':') {
            Some((host, port)) => (host, port),
            None => (addr, ""),
        };
        let host = if host.is_empty() { "127.0.0.1" } else { host };
        if !port.is_empty() && port != "0" {
            return format!("{host}:{port}");
        }

        let listeners = self.listeners.lock();
        loop {
            let port = self.next_port.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("{host}:{port}");
            if !listeners.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn init(&self, opts: Vec<TransportOption>) {
        self.options.write().apply(opts);
    }

    fn options(&self) -> TransportOptions {
        self.options.read().clone()
    }

    async fn listen(&self, addr: &str) -> Result<Box<dyn Listener>> {
        let addr = self.resolve_addr(addr);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let mut listeners = self.listeners.lock();
        if listeners.contains_key(&addr) {
            return Err(MicroError::transport(format!("address {addr} already in use")));
        }
        listeners.insert(addr.clone(), tx);
        debug!(address = %addr, "Memory transport listening");

        Ok(Box::new(MemoryListener {
            addr,
            incoming: rx,
            listeners: self.listeners.clone(),
            closed: false,
        }))
    }

    async fn dial(&self, addr: &str) -> Result<Box<dyn Socket>> {
        let sender = self
            .listeners
            .lock()
            .get(addr)
            .cloned()
            .ok_or_else(|| MicroError::transport(format!("connection refused: {addr}")))?;

        let conn = self.next_conn.fetch_add(1, Ordering::Relaxed);
        let local = format!("memory-conn-{conn}");
        let (client_tx, server_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (server_tx, client_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let server_side = MemorySocket {
            local: addr.to_string(),
            remote: local.clone(),
            tx: Some(server_tx),
            rx: server_rx,
        };
        sender
            .send(server_side)
            .await
            .map_err(|_| MicroError::transport(format!("connection refused: {addr}")))?;

        Ok(Box::new(MemorySocket {
            local,
            remote: addr.to_string(),
            tx: Some(client_tx),
            rx: client_rx,
        }))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

struct MemoryListener {
    addr: String,
    incoming: mpsc::Receiver<MemorySocket>,
    listeners: Listeners,
    closed: bool,
}

#[async_trait]
impl Listener for MemoryListener {
    fn addr(&self) -> String {
        self.addr.clone()
    }

    async fn accept(&mut self) -> Result<Box<dyn Socket>> {
        match self.incoming.recv().await {
            Some(socket) => Ok(Box::new(socket)),
            None => Err(MicroError::transport(format!("listener {} closed", self.addr))),
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.listeners.lock().remove(&self.addr);
        }
        self.incoming.close();
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        if !self.closed {
            self.listeners.lock().remove(&self.addr);
        }
    }
}

struct MemorySocket {
    local: String,
    remote: String,
    tx: Option<mpsc::Sender<Message>>,
    rx: mpsc::Receiver<Message>,
}

#[async_trait]
impl Socket for MemorySocket {
    async fn send(&mut self, msg: Message) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| MicroError::transport("socket closed"))?;
        tx.send(msg)
            .await
            .map_err(|_| MicroError::transport(format!("peer {} closed the connection", self.remote)))
    }

    async fn recv(&mut self) -> Result<Message> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| MicroError::transport(format!("peer {} closed the connection", self.remote)))
    }

    fn local(&self) -> &str {
        &self.local
    }

    fn remote(&self) -> &str {
        &self.remote
    }

    async fn close(&mut self) {
        self.tx.take();
        self.rx.close();
    }
}
