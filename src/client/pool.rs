//! 连接池
//!
//! 按地址缓存空闲连接，超过 TTL 的连接在取出时丢弃。

use crate::transport::Socket;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

struct PooledSocket {
    socket: Box<dyn Socket>,
    created_at: Instant,
}

#[derive(Default)]
pub struct Pool {
    idle: Mutex<HashMap<String, Vec<PooledSocket>>>,
}

/// 从池中借出的连接
pub struct Conn {
    pub socket: Box<dyn Socket>,
    created_at: Instant,
}

impl Conn {
    pub fn fresh(socket: Box<dyn Socket>) -> Self {
        Self {
            socket,
            created_at: Instant::now(),
        }
    }
}

impl Pool {
    /// 取出一条未过期的空闲连接
    pub fn get(&self, addr: &str, ttl: Duration) -> Option<Conn> {
        let mut idle = self.idle.lock();
        let sockets = idle.get_mut(addr)?;
        let mut found = None;
        while let Some(pooled) = sockets.pop() {
            if pooled.created_at.elapsed() < ttl {
                found = Some(Conn {
                    socket: pooled.socket,
                    created_at: pooled.created_at,
                });
                break;
            }
        }
        if sockets.is_empty() {
            idle.remove(addr);
        }
        found
    }

    /// 归还连接；池满或已过期时直接丢弃
    pub fn release(&self, addr: &str, conn: Conn, size: usize, ttl: Duration) {
        if conn.created_at.elapsed() >= ttl {
            return;
        }
        let mut idle = self.idle.lock();
        let sockets = idle.entry(addr.to_string()).or_default();
        if sockets.len() < size {
            sockets.push(PooledSocket {
                socket: conn.socket,
                created_at: conn.created_at,
            });
        }
    }
}
