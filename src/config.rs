use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SplunkSearchError};

/// Splunk 连接配置。宿主层按调用从环境变量构造,再作为值注入核心,
/// 核心代码不读环境。
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub scheme: String,
    /// 是否校验 TLS 证书。
    pub verify: bool,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// 已解析的认证方式。token 与账号密码同时给出时 token 优先。
#[derive(Debug, Clone)]
pub enum AuthMode {
    Token(String),
    Basic { username: String, password: String },
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8090,
            scheme: "https".to_string(),
            verify: false,
            token: None,
            username: None,
            password: None,
        }
    }
}

impl ConnectionConfig {
    /// 读取 SPLUNK_* 环境变量,解析失败时保留缺省值。
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(val) = std::env::var("SPLUNK_HOST") {
            cfg.host = val;
        }
        if let Ok(val) = std::env::var("SPLUNK_PORT") {
            if let Ok(port) = val.parse() {
                cfg.port = port;
            }
        }
        if let Ok(val) = std::env::var("SPLUNK_SCHEME") {
            cfg.scheme = val;
        }
        if let Ok(val) = std::env::var("SPLUNK_VERIFY") {
            cfg.verify = val.eq_ignore_ascii_case("true");
        }
        cfg.token = std::env::var("SPLUNK_TOKEN").ok().filter(|v| !v.is_empty());
        cfg.username = std::env::var("SPLUNK_USERNAME")
            .ok()
            .filter(|v| !v.is_empty());
        cfg.password = std::env::var("SPLUNK_PASSWORD")
            .ok()
            .filter(|v| !v.is_empty());
        cfg
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// 两种认证方式都缺失是配置错误,在连接时报告而不是进程启动时。
    pub fn auth(&self) -> Result<AuthMode> {
        if let Some(token) = &self.token {
            return Ok(AuthMode::Token(token.clone()));
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok(AuthMode::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => Err(SplunkSearchError::ConfigError(
                "set SPLUNK_TOKEN or SPLUNK_USERNAME/SPLUNK_PASSWORD".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    Stdio,
    Http,
    Both,
}

/// 服务进程配置,只管传输模式。连接参数始终走环境变量。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub mode: ServerMode,
    pub http_addr: Option<String>,
    pub http_port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: ServerMode::Stdio,
            http_addr: None,
            http_port: None,
        }
    }
}

impl ServerConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .or_else(|_| serde_json::from_str(&content))
            .map_err(|e: serde_json::Error| {
                SplunkSearchError::ConfigError(format!("parse {}: {e}", path.display()))
            })
    }
}
