use tracing::debug;
use urlencoding::encode;

use crate::client::{engine_error, SplunkSession};
use crate::error::{Result, SplunkSearchError};
use crate::model::{JobCreated, TimeWindow};
use crate::query::CanonicalPipeline;

const JOBS_PATH: &str = "/services/search/jobs";

/// 提交策略。两种形状都对操作层开放,按各自契约选择;
/// submit 只是分发入口,不改变任一形状的可见行为。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// 单次请求阻塞到完成,响应体即结果载荷
    Oneshot,
    /// 显式创建阻塞作业拿 sid,完成后另行取结果
    BlockingJob,
}

pub async fn submit(
    session: &SplunkSession,
    pipeline: &CanonicalPipeline,
    window: &TimeWindow,
    count: u64,
    mode: SubmitMode,
) -> Result<String> {
    match mode {
        SubmitMode::Oneshot => oneshot(session, pipeline, window, count).await,
        SubmitMode::BlockingJob => create_and_fetch(session, pipeline, window, count).await,
    }
}

/// oneshot 模式,对应 splunklib 的 jobs.oneshot。
pub async fn oneshot(
    session: &SplunkSession,
    pipeline: &CanonicalPipeline,
    window: &TimeWindow,
    count: u64,
) -> Result<String> {
    let count = count.to_string();
    let form = [
        ("search", pipeline.as_str()),
        ("exec_mode", "oneshot"),
        ("earliest_time", window.earliest.as_str()),
        ("latest_time", window.latest.as_str()),
        ("output_mode", "json"),
        ("count", count.as_str()),
    ];
    let resp = session.post_form(JOBS_PATH, &form).await?;
    if !resp.status().is_success() {
        return Err(engine_error(resp).await);
    }
    read_body(resp).await
}

/// 作业模式,对应 jobs.create(exec_mode="blocking") + job.results()。
/// 结果上限只在取结果一步生效,创建作业时不限。
pub async fn create_and_fetch(
    session: &SplunkSession,
    pipeline: &CanonicalPipeline,
    window: &TimeWindow,
    count: u64,
) -> Result<String> {
    let form = [
        ("search", pipeline.as_str()),
        ("exec_mode", "blocking"),
        ("preview", "false"),
        ("earliest_time", window.earliest.as_str()),
        ("latest_time", window.latest.as_str()),
        ("output_mode", "json"),
    ];
    let resp = session.post_form(JOBS_PATH, &form).await?;
    if !resp.status().is_success() {
        return Err(engine_error(resp).await);
    }
    let created: JobCreated = serde_json::from_str(&read_body(resp).await?)
        .map_err(|e| SplunkSearchError::ParseError(format!("job sid: {e}")))?;
    debug!(sid = %created.sid, "blocking job finished");
    fetch_results(session, &created.sid, count).await
}

async fn fetch_results(session: &SplunkSession, sid: &str, count: u64) -> Result<String> {
    let path = format!("{JOBS_PATH}/{}/results", encode(sid));
    let count = count.to_string();
    let resp = session
        .get(&path, &[("output_mode", "json"), ("count", count.as_str())])
        .await?;
    if !resp.status().is_success() {
        return Err(engine_error(resp).await);
    }
    read_body(resp).await
}

async fn read_body(resp: reqwest::Response) -> Result<String> {
    let url = resp.url().to_string();
    resp.text()
        .await
        .map_err(|e| SplunkSearchError::ConnectError {
            url,
            reason: e.to_string(),
        })
}
