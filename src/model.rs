use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 一行匹配结果。字段集合由引擎决定,本地不做校验。
pub type ResultRow = serde_json::Map<String, Value>;

/// search_splunk 的有损投影:只保留事件原文。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawMessage {
    pub message: String,
}

/// 检索时间窗。相对或绝对时间表达式原样透传引擎,本地不解析。
#[derive(Debug, Clone)]
pub struct TimeWindow {
    pub earliest: String,
    pub latest: String,
}

/// search_splunk 工具参数。参数名与缺省值沿用原工具契约。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSplunkParams {
    pub search_query: String,
    #[serde(default = "default_earliest_24h")]
    pub earliest_time: String,
    #[serde(default = "default_latest")]
    pub latest_time: String,
    #[serde(default = "default_max_results")]
    pub max_results: u64,
}

/// search 工具参数。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "default_earliest_7d")]
    pub earliest: String,
    #[serde(default = "default_latest")]
    pub latest: String,
    #[serde(default = "default_count")]
    pub count: u64,
}

/// search_index 工具参数。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIndexParams {
    pub index: String,
    #[serde(default)]
    pub filter: String,
    #[serde(default = "default_earliest_5d")]
    pub earliest: String,
    #[serde(default = "default_latest")]
    pub latest: String,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_earliest_24h() -> String {
    "-24h".to_string()
}

fn default_earliest_7d() -> String {
    "-7d".to_string()
}

fn default_earliest_5d() -> String {
    "-5d".to_string()
}

fn default_latest() -> String {
    "now".to_string()
}

fn default_max_results() -> u64 {
    100
}

fn default_count() -> u64 {
    200
}

fn default_limit() -> u64 {
    100
}

/// 面向调用方的检索结果。行、零行带诊断、引擎硬失败三选一,
/// 序列化形状与原工具一致:行是裸数组,另两种是带标记键的对象。
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Rows(Vec<ResultRow>),
    Warning(EngineWarning),
    Error(EngineFailure),
}

/// 查询执行了但引擎只返回诊断消息、零行结果。
#[derive(Debug, Clone, Serialize)]
pub struct EngineWarning {
    pub warning: &'static str,
    pub messages: Vec<String>,
    pub query: String,
    pub earliest: String,
    pub latest: String,
}

/// 引擎拒绝查询(语法错误、无权限等)。
#[derive(Debug, Clone, Serialize)]
pub struct EngineFailure {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub message: String,
    pub query: String,
}

pub const WARNING_KIND_NO_ROWS: &str = "no_rows";
pub const ERROR_KIND_ENGINE_HTTP: &str = "splunk_http_error";

/// Splunk output_mode=json 的结果载荷。results 中非对象条目
/// 不是结果行,由归一化层丢弃。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultsPayload {
    #[serde(default)]
    pub preview: bool,
    #[serde(default)]
    pub messages: Vec<EngineMessage>,
    #[serde(default)]
    pub results: Vec<Value>,
}

/// 引擎随结果附带的诊断消息。
#[derive(Debug, Clone, Deserialize)]
pub struct EngineMessage {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

/// 作业创建响应(exec_mode=blocking)。
#[derive(Debug, Clone, Deserialize)]
pub struct JobCreated {
    pub sid: String,
}

/// /services/auth/login 响应。
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "sessionKey")]
    pub session_key: String,
}

/// /services/data/indexes 目录响应。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexCatalog {
    #[serde(default)]
    pub entry: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexEntry {
    pub name: String,
}
