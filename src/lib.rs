//! Flare Micro
//!
//! Pluggable microservice bootstrap: resolves a layered configuration
//! (file, environment, defaults), wires registry, transport, broker, selector,
//! client and server backends from a [`BackendCatalog`], and drives the
//! resulting service through start, heartbeat registration, signal wait and
//! orderly shutdown.

pub mod broker;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod options;
pub mod registry;
pub mod selector;
pub mod server;
pub mod transport;
pub mod utils;

// 服务生命周期
pub mod runtime;

// Re-exports
pub use broker::{Broker, BrokerHandler, BrokerOption, MemoryBroker, Subscription};
pub use catalog::{BackendCatalog, BackendKind};
pub use client::{
    Client, ClientOption, ClientWrapper, FROM_SERVICE_HEADER, MetadataClient, Request, Response,
    RpcClient,
};
pub use config::{EnvSource, ProcessEnv, ServiceConfig};
pub use error::{HookPhase, MicroError, Result};
pub use logging::init_logging;
pub use options::{Component, Hook, Options, ServiceOption, compose, hook_fn};
pub use registry::{MemoryRegistry, Node, RegisterOptions, Registry, RegistryOption, Service as ServiceRecord};
pub use selector::{CacheSelector, DefaultSelector, Selector, SelectorOption, Strategy};
pub use server::{Handler, RpcServer, Server, ServerOption};
pub use transport::{Message, MemoryTransport, Transport, TransportOption};

// 运行时 re-exports
pub use runtime::{Heartbeat, LifecycleState, Service};
