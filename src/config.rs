//! 服务配置
//!
//! 解析顺序：配置文件 -> 环境变量 -> 内置默认值。
//! 文件中已有的值永远不会被环境变量覆盖。

use crate::error::{MicroError, Result};
use crate::utils::split_list;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

pub const DEFAULT_CLIENT: &str = "grpc";
pub const DEFAULT_CLIENT_REQUEST_TIMEOUT: &str = "5s";
pub const DEFAULT_CLIENT_RETRIES: i32 = 1;
pub const DEFAULT_CLIENT_POOL_SIZE: i32 = 10;
pub const DEFAULT_CLIENT_POOL_TTL: &str = "1m";
pub const DEFAULT_REGISTER_TTL: &str = "30s";
pub const DEFAULT_REGISTER_INTERVAL: &str = "10s";

pub const DEFAULT_SERVER: &str = "grpc";
pub const DEFAULT_SERVER_VERSION: &str = "1.0.0";
pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0:0";

pub const DEFAULT_BROKER: &str = "http";
pub const DEFAULT_REGISTRY: &str = "consul";
pub const DEFAULT_SELECTOR: &str = "cache";
pub const DEFAULT_TRANSPORT: &str = "grpc";

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// 环境变量来源
///
/// 进程环境之外还可以用 `HashMap` 注入，便于测试。
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// 读取当前进程的环境变量
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// 扁平化的服务配置
///
/// 时长字段保留原始字符串，由组装阶段统一解析。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    pub client: String,
    pub client_request_timeout: String,
    pub client_retries: i32,
    pub client_pool_size: i32,
    #[serde(rename = "clientPoolTTL")]
    pub client_pool_ttl: String,

    pub server: String,
    pub server_name: String,
    pub server_version: String,
    #[serde(rename = "serverID")]
    pub server_id: String,
    pub server_address: String,
    pub server_advertise: String,
    #[serde(rename = "serverMetaData")]
    pub server_metadata: Vec<String>,

    pub broker: String,
    pub broker_address: Vec<String>,
    pub registry: String,
    pub registry_address: Vec<String>,
    pub selector: String,
    pub transport: String,
    pub transport_address: Vec<String>,

    #[serde(rename = "registerTTL")]
    pub register_ttl: String,
    pub register_interval: String,

    pub log_level: String,
    pub log_format: String,
}

fn fill_string(field: &mut String, env: &dyn EnvSource, key: &str) {
    if field.is_empty() {
        if let Some(value) = env.get(key) {
            *field = value;
        }
    }
}

fn fill_list(field: &mut Vec<String>, env: &dyn EnvSource, key: &str) {
    if field.is_empty() {
        if let Some(value) = env.get(key).filter(|v| !v.is_empty()) {
            *field = split_list(&value);
        }
    }
}

/// 数字型环境变量解析失败只记录日志，保持未设置
fn fill_int(field: &mut i32, env: &dyn EnvSource, key: &str) {
    if *field > 0 {
        return;
    }
    let Some(raw) = env.get(key).filter(|v| !v.is_empty()) else {
        return;
    };
    match raw.trim().parse::<i32>() {
        Ok(value) => *field = value,
        Err(e) => warn!(key, value = %raw, error = %e, "Ignoring unparseable integer from environment"),
    }
}

fn fill_default(field: &mut String, default: &str) {
    if field.is_empty() {
        *field = default.to_string();
    }
}

impl ServiceConfig {
    /// 从文件加载配置，再依次叠加环境变量与默认值
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_env(path, &ProcessEnv)
    }

    /// 同 [`ServiceConfig::load`]，环境变量来源可注入
    pub fn load_with_env(path: impl AsRef<Path>, env: &dyn EnvSource) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.load_from_env(env);
        config.load_defaults();
        debug!(config = ?config, "Service config resolved");
        Ok(config)
    }

    /// 仅读取并解析文件（`.toml` 按 TOML 解析，其余按 YAML）
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(MicroError::ConfigRead {
                path: path.to_path_buf(),
                reason: "config path is empty".to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| MicroError::ConfigRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let parsed = if is_toml {
            toml::from_str::<ServiceConfig>(&content).map_err(|e| e.to_string())
        } else if content.trim().is_empty() {
            Ok(ServiceConfig::default())
        } else {
            serde_saphyr::from_str::<ServiceConfig>(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|reason| MicroError::ConfigParse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// 未设置的字段从环境变量中获取
    pub fn load_from_env(&mut self, env: &dyn EnvSource) {
        fill_string(&mut self.client, env, "MICRO_CLIENT");
        fill_string(&mut self.client_request_timeout, env, "MICRO_CLIENT_REQUEST_TIMEOUT");
        fill_int(&mut self.client_retries, env, "MICRO_CLIENT_RETRIES");
        fill_int(&mut self.client_pool_size, env, "MICRO_CLIENT_POOL_SIZE");
        fill_string(&mut self.client_pool_ttl, env, "MICRO_CLIENT_POOL_TTL");

        fill_string(&mut self.server, env, "MICRO_SERVER");
        fill_string(&mut self.server_address, env, "MICRO_SERVER_ADDRESS");
        fill_string(&mut self.server_advertise, env, "MICRO_SERVER_ADVERTISE");
        fill_string(&mut self.server_id, env, "MICRO_SERVER_ID");
        fill_list(&mut self.server_metadata, env, "MICRO_SERVER_METADATA");
        fill_string(&mut self.server_name, env, "MICRO_SERVER_NAME");
        fill_string(&mut self.server_version, env, "MICRO_SERVER_VERSION");

        fill_string(&mut self.broker, env, "MICRO_BROKER");
        fill_list(&mut self.broker_address, env, "MICRO_BROKER_ADDRESS");
        fill_string(&mut self.registry, env, "MICRO_REGISTRY");
        fill_list(&mut self.registry_address, env, "MICRO_REGISTRY_ADDRESS");
        fill_string(&mut self.selector, env, "MICRO_SELECTOR");
        fill_string(&mut self.transport, env, "MICRO_TRANSPORT");
        fill_list(&mut self.transport_address, env, "MICRO_TRANSPORT_ADDRESS");

        fill_string(&mut self.log_level, env, "MICRO_LOG_LEVEL");
        fill_string(&mut self.log_format, env, "MICRO_LOG_FORMAT");
    }

    /// 剩余未设置的字段使用内置默认值
    pub fn load_defaults(&mut self) {
        fill_default(&mut self.client, DEFAULT_CLIENT);
        fill_default(&mut self.client_request_timeout, DEFAULT_CLIENT_REQUEST_TIMEOUT);
        if self.client_retries <= 0 {
            self.client_retries = DEFAULT_CLIENT_RETRIES;
        }
        if self.client_pool_size <= 0 {
            self.client_pool_size = DEFAULT_CLIENT_POOL_SIZE;
        }
        fill_default(&mut self.client_pool_ttl, DEFAULT_CLIENT_POOL_TTL);

        fill_default(&mut self.server, DEFAULT_SERVER);
        fill_default(&mut self.server_version, DEFAULT_SERVER_VERSION);
        fill_default(&mut self.server_address, DEFAULT_SERVER_ADDRESS);

        fill_default(&mut self.broker, DEFAULT_BROKER);
        fill_default(&mut self.registry, DEFAULT_REGISTRY);
        fill_default(&mut self.selector, DEFAULT_SELECTOR);
        fill_default(&mut self.transport, DEFAULT_TRANSPORT);

        fill_default(&mut self.register_ttl, DEFAULT_REGISTER_TTL);
        fill_default(&mut self.register_interval, DEFAULT_REGISTER_INTERVAL);

        fill_default(&mut self.log_level, DEFAULT_LOG_LEVEL);
        fill_default(&mut self.log_format, DEFAULT_LOG_FORMAT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn bad_integer_in_environment_is_ignored() {
        let mut config = ServiceConfig::default();
        config.load_from_env(&env(&[
            ("MICRO_CLIENT_RETRIES", "three"),
            ("MICRO_CLIENT_POOL_SIZE", "25"),
        ]));
        assert_eq!(config.client_retries, 0);
        assert_eq!(config.client_pool_size, 25);

        config.load_defaults();
        assert_eq!(config.client_retries, DEFAULT_CLIENT_RETRIES);
        assert_eq!(config.client_pool_size, 25);
    }

    #[test]
    fn environment_lists_are_comma_separated() {
        let mut config = ServiceConfig::default();
        config.load_from_env(&env(&[
            ("MICRO_REGISTRY_ADDRESS", "10.0.0.1:8500,10.0.0.2:8500"),
            ("MICRO_SERVER_METADATA", "zone=a,tier=edge"),
        ]));
        assert_eq!(config.registry_address, vec!["10.0.0.1:8500", "10.0.0.2:8500"]);
        assert_eq!(config.server_metadata, vec!["zone=a", "tier=edge"]);
    }
}
