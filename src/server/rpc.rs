//! 基于 Transport 的服务端实现

use super::{Handler, Server, ServerOption, ServerOptions};
use crate::broker::{BrokerHandler, Subscription};
use crate::client::Request;
use crate::error::{MicroError, Result};
use crate::registry::{Node, RegisterOptions, Service};
use crate::transport::{HEADER_ENDPOINT, HEADER_ERROR, HEADER_SERVICE, Listener, Message, Socket};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type Handlers = Arc<RwLock<HashMap<String, Handler>>>;

/// 运行中的监听状态
struct Running {
    address: String,
    shutdown: CancellationToken,
    accept_loop: JoinHandle<()>,
    subscriptions: Vec<Subscription>,
}

/// 基于 Transport 的服务端
pub struct RpcServer {
    options: RwLock<ServerOptions>,
    handlers: Handlers,
    subscribers: Mutex<Vec<(String, BrokerHandler)>>,
    running: tokio::sync::Mutex<Option<Running>>,
    bound_address: RwLock<Option<String>>,
}

impl RpcServer {
    pub fn new(opts: Vec<ServerOption>) -> Self {
        let mut options = ServerOptions::default();
        options.apply(opts);
        Self {
            options: RwLock::new(options),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            subscribers: Mutex::new(Vec::new()),
            running: tokio::sync::Mutex::new(None),
            bound_address: RwLock::new(None),
        }
    }

    /// 注册到 Registry 的服务记录
    fn service_record(&self) -> (Service, RegisterOptions, ServerOptions) {
        let opts = self.options();
        let address = if !opts.advertise.is_empty() {
            opts.advertise.clone()
        } else {
            self.bound_address
                .read()
                .clone()
                .unwrap_or_else(|| opts.address.clone())
        };

        let mut metadata = opts.metadata.clone();
        metadata.insert("server".to_string(), self.name().to_string());
        if let Some(transport) = &opts.transport {
            metadata.insert("transport".to_string(), transport.name().to_string());
        }
        if let Some(broker) = &opts.broker {
            metadata.insert("broker".to_string(), broker.name().to_string());
        }
        if let Some(registry) = &opts.registry {
            metadata.insert("registry".to_string(), registry.name().to_string());
        }

        let service = Service {
            name: opts.name.clone(),
            version: opts.version.clone(),
            metadata: HashMap::new(),
            nodes: vec![Node {
                id: format!("{}-{}", opts.name, opts.id),
                address,
                metadata,
            }],
        };
        let register = RegisterOptions {
            ttl: opts.register_ttl,
        };
        (service, register, opts)
    }
}

impl Default for RpcServer {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Server for RpcServer {
    fn init(&self, opts: Vec<ServerOption>) {
        self.options.write().apply(opts);
    }

    fn options(&self) -> ServerOptions {
        self.options.read().clone()
    }

    fn handle(&self, endpoint: &str, handler: Handler) {
        self.handlers.write().insert(endpoint.to_string(), handler);
    }

    fn subscribe(&self, topic: &str, handler: BrokerHandler) {
        self.subscribers.lock().push((topic.to_string(), handler));
    }

    async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(MicroError::transport("server already started"));
        }

        let opts = self.options();
        let transport = opts
            .transport
            .clone()
            .ok_or_else(|| MicroError::transport("server has no transport"))?;
        let mut listener = transport.listen(&opts.address).await?;
        let address = listener.addr();

        let mut subscriptions = Vec::new();
        let subscribers = self.subscribers.lock().clone();
        if let Some(broker) = &opts.broker {
            let attached = async {
                broker.connect().await?;
                for (topic, handler) in subscribers {
                    subscriptions.push(broker.subscribe(&topic, handler).await?);
                }
                Ok::<(), MicroError>(())
            };
            if let Err(e) = attached.await {
                listener.close().await;
                return Err(e);
            }
        }

        let shutdown = CancellationToken::new();
        let accept_loop = tokio::spawn(accept_loop(
            listener,
            self.handlers.clone(),
            shutdown.clone(),
        ));

        info!(server = %opts.name, address = %address, transport = %transport.name(), "Server listening");
        *self.bound_address.write() = Some(address.clone());
        *running = Some(Running {
            address,
            shutdown,
            accept_loop,
            subscriptions,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };

        running.shutdown.cancel();
        if let Err(e) = running.accept_loop.await {
            warn!(error = %e, "Accept loop terminated abnormally");
        }

        let opts = self.options();
        if let Some(broker) = &opts.broker {
            for subscription in &running.subscriptions {
                broker.unsubscribe(subscription).await?;
            }
            broker.disconnect().await?;
        }

        *self.bound_address.write() = None;
        info!(server = %opts.name, address = %running.address, "Server stopped");
        Ok(())
    }

    async fn register(&self) -> Result<()> {
        let (service, register_opts, opts) = self.service_record();
        let registry = opts
            .registry
            .ok_or_else(|| MicroError::registration("server has no registry"))?;
        registry
            .register(&service, register_opts)
            .await
            .map_err(into_registration_error)?;
        debug!(service = %service.name, version = %service.version, "Registered with registry");
        Ok(())
    }

    async fn deregister(&self) -> Result<()> {
        let (service, _, opts) = self.service_record();
        let registry = opts
            .registry
            .ok_or_else(|| MicroError::registration("server has no registry"))?;
        registry
            .deregister(&service)
            .await
            .map_err(into_registration_error)?;
        info!(service = %service.name, "Deregistered from registry");
        Ok(())
    }

    fn name(&self) -> &str {
        "rpc"
    }
}

fn into_registration_error(e: MicroError) -> MicroError {
    match e {
        MicroError::Registration(_) => e,
        other => MicroError::registration(other.to_string()),
    }
}

async fn accept_loop(mut listener: Box<dyn Listener>, handlers: Handlers, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(socket) => {
                    tokio::spawn(serve_socket(socket, handlers.clone(), shutdown.child_token()));
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed, stopping listener");
                    break;
                }
            },
        }
    }
    listener.close().await;
}

async fn serve_socket(mut socket: Box<dyn Socket>, handlers: Handlers, shutdown: CancellationToken) {
    loop {
        let msg = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = socket.recv() => match received {
                Ok(msg) => msg,
                Err(_) => break,
            },
        };

        let reply = dispatch(msg, &handlers).await;
        if let Err(e) = socket.send(reply).await {
            debug!(remote = %socket.remote(), error = %e, "Failed to send reply");
            break;
        }
    }
    socket.close().await;
}

async fn dispatch(msg: Message, handlers: &Handlers) -> Message {
    let endpoint = msg.header.get(HEADER_ENDPOINT).cloned().unwrap_or_default();
    let handler = handlers.read().get(&endpoint).cloned();
    let Some(handler) = handler else {
        return Message::default().with_header(HEADER_ERROR, format!("unknown endpoint {endpoint:?}"));
    };

    let request = Request {
        service: msg.header.get(HEADER_SERVICE).cloned().unwrap_or_default(),
        endpoint,
        header: msg.header,
        body: msg.body,
    };
    match handler(request).await {
        Ok(body) => Message::new(body),
        Err(e) => Message::default().with_header(HEADER_ERROR, e.to_string()),
    }
}
