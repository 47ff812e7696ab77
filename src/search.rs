//! 操作层:按调用组合连接、查询构造、作业提交和结果归一化,
//! 调用之间不保留任何状态。输入校验一律先于任何网络活动;
//! 配置/连接/认证失败对所有操作都直接上抛。

use tracing::{error, info};

use crate::client;
use crate::config::ConnectionConfig;
use crate::error::{Result, SplunkSearchError};
use crate::jobs::{self, SubmitMode};
use crate::model::{
    EngineFailure, Outcome, RawMessage, SearchIndexParams, SearchParams, SearchSplunkParams,
    TimeWindow, ERROR_KIND_ENGINE_HTTP,
};
use crate::query::{CanonicalPipeline, QueryBuilder};
use crate::results::ResultNormalizer;

/// 列出全部索引名。
pub async fn list_indexes(config: &ConnectionConfig) -> Result<Vec<String>> {
    let session = client::connect(config).await?;
    session.index_names().await
}

/// search 操作:自由文本,oneshot 提交。
/// 引擎拒绝查询时降级为结构化 Error 结果而不是抛错。
pub async fn search(config: &ConnectionConfig, params: SearchParams) -> Result<Outcome> {
    let pipeline = QueryBuilder::new().free_form(&params.query)?;
    let window = TimeWindow {
        earliest: params.earliest,
        latest: params.latest,
    };
    run_outcome(config, pipeline, window, params.count, SubmitMode::Oneshot).await
}

/// search_index 操作:索引模式,oneshot 提交,引擎失败同样降级。
pub async fn search_index(
    config: &ConnectionConfig,
    params: SearchIndexParams,
) -> Result<Outcome> {
    let pipeline =
        QueryBuilder::new().indexed(&params.index, &params.filter, params.fields.as_deref())?;
    let window = TimeWindow {
        earliest: params.earliest,
        latest: params.latest,
    };
    run_outcome(config, pipeline, window, params.limit, SubmitMode::Oneshot).await
}

/// search_splunk 操作:自由文本走阻塞作业,只回传 _raw 投影。
/// 本操作的契约是只在成功时返回行,引擎失败原样抛给调用方。
pub async fn search_splunk(
    config: &ConnectionConfig,
    params: SearchSplunkParams,
) -> Result<Vec<RawMessage>> {
    let pipeline = QueryBuilder::new().free_form(&params.search_query)?;
    let window = TimeWindow {
        earliest: params.earliest_time,
        latest: params.latest_time,
    };
    let session = client::connect(config).await?;
    info!(pipeline = %pipeline, "executing search");
    let raw = jobs::submit(
        &session,
        &pipeline,
        &window,
        params.max_results,
        SubmitMode::BlockingJob,
    )
    .await?;
    let messages = ResultNormalizer::new().raw_messages(&raw)?;
    info!(count = messages.len(), "returned raw messages");
    Ok(messages)
}

pub fn greet(name: &str) -> String {
    format!("Hello, {name}!")
}

/// 两个结果型检索操作的公共路径。
/// 只有 EngineHttp 会被捕获成 Outcome::Error,其余错误照常上抛。
async fn run_outcome(
    config: &ConnectionConfig,
    pipeline: CanonicalPipeline,
    window: TimeWindow,
    count: u64,
    mode: SubmitMode,
) -> Result<Outcome> {
    let session = client::connect(config).await?;
    info!(pipeline = %pipeline, "executing search");
    match jobs::submit(&session, &pipeline, &window, count, mode).await {
        Ok(raw) => ResultNormalizer::new().normalize(&raw, &pipeline, &window),
        Err(SplunkSearchError::EngineHttp { status, message }) => {
            error!(status = ?status, reason = %message, "engine rejected pipeline");
            Ok(Outcome::Error(EngineFailure {
                error: ERROR_KIND_ENGINE_HTTP,
                status,
                message,
                query: pipeline.into_string(),
            }))
        }
        Err(other) => Err(other),
    }
}
