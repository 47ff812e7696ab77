use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::debug;

use crate::config::{AuthMode, ConnectionConfig};
use crate::error::{Result, SplunkSearchError};
use crate::model::{IndexCatalog, LoginResponse};

const LOGIN_PATH: &str = "/services/auth/login";
const SERVER_INFO_PATH: &str = "/services/server/info";
const INDEXES_PATH: &str = "/services/data/indexes";

/// 单次操作内使用的已认证会话。每次工具调用单独建立,
/// 调用之间不共享、不缓存。
#[derive(Debug)]
pub struct SplunkSession {
    http: reqwest::Client,
    base_url: String,
    auth_header: String,
}

/// 连接工厂:按配置构造 HTTP 客户端并完成登录握手。
/// 账号密码模式走 /services/auth/login 换取 sessionKey;
/// token 模式用 server/info 探活,把被拒的 token 在连接阶段暴露出来。
pub async fn connect(config: &ConnectionConfig) -> Result<SplunkSession> {
    let auth = config.auth()?;
    let http = reqwest::Client::builder()
        .danger_accept_invalid_certs(!config.verify)
        .build()
        .map_err(|e| SplunkSearchError::ConfigError(format!("http client: {e}")))?;
    let base_url = config.base_url();

    match auth {
        AuthMode::Token(token) => {
            let session = SplunkSession {
                http,
                base_url,
                auth_header: format!("Bearer {token}"),
            };
            session.verify_token().await?;
            Ok(session)
        }
        AuthMode::Basic { username, password } => {
            let session_key = login(&http, &base_url, &username, &password).await?;
            Ok(SplunkSession {
                http,
                base_url,
                auth_header: format!("Splunk {session_key}"),
            })
        }
    }
}

async fn login(
    http: &reqwest::Client,
    base_url: &str,
    username: &str,
    password: &str,
) -> Result<String> {
    let url = format!("{base_url}{LOGIN_PATH}");
    let resp = http
        .post(&url)
        .form(&[
            ("username", username),
            ("password", password),
            ("output_mode", "json"),
        ])
        .send()
        .await
        .map_err(|e| SplunkSearchError::ConnectError {
            url: url.clone(),
            reason: e.to_string(),
        })?;

    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(SplunkSearchError::AuthError(format!(
            "login rejected for user {username}"
        )));
    }
    if !status.is_success() {
        return Err(SplunkSearchError::ConnectError {
            url,
            reason: format!("login returned status {status}"),
        });
    }

    let login: LoginResponse = resp
        .json()
        .await
        .map_err(|e| SplunkSearchError::ParseError(e.to_string()))?;
    debug!("login handshake ok");
    Ok(login.session_key)
}

impl SplunkSession {
    pub(crate) async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        self.http
            .post(&url)
            .header(AUTHORIZATION, &self.auth_header)
            .form(form)
            .send()
            .await
            .map_err(|e| SplunkSearchError::ConnectError {
                url,
                reason: e.to_string(),
            })
    }

    pub(crate) async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        self.http
            .get(&url)
            .header(AUTHORIZATION, &self.auth_header)
            .query(query)
            .send()
            .await
            .map_err(|e| SplunkSearchError::ConnectError {
                url,
                reason: e.to_string(),
            })
    }

    /// 索引目录,对应 splunklib 的 service.indexes。count=0 取全部。
    pub async fn index_names(&self) -> Result<Vec<String>> {
        let resp = self
            .get(INDEXES_PATH, &[("output_mode", "json"), ("count", "0")])
            .await?;
        if !resp.status().is_success() {
            return Err(engine_error(resp).await);
        }
        let catalog: IndexCatalog = resp
            .json()
            .await
            .map_err(|e| SplunkSearchError::ParseError(e.to_string()))?;
        Ok(catalog.entry.into_iter().map(|e| e.name).collect())
    }

    async fn verify_token(&self) -> Result<()> {
        let resp = self.get(SERVER_INFO_PATH, &[("output_mode", "json")]).await?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SplunkSearchError::AuthError(
                "bearer token rejected".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(SplunkSearchError::ConnectError {
                url: format!("{}{}", self.base_url, SERVER_INFO_PATH),
                reason: format!("server info returned status {status}"),
            });
        }
        Ok(())
    }
}

/// 非 2xx 响应统一转为 EngineHttp。消息优先取引擎 JSON 诊断文本,
/// 取不到就退回原始 body。
pub(crate) async fn engine_error(resp: reqwest::Response) -> SplunkSearchError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    SplunkSearchError::EngineHttp {
        status: Some(status),
        message: extract_engine_message(&body),
    }
}

fn extract_engine_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        messages: Vec<crate::model::EngineMessage>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(m) = parsed.messages.first() {
            if !m.text.is_empty() {
                return m.text.clone();
            }
        }
    }
    body.trim().to_string()
}
