use serde_json::Value;

use crate::error::{Result, SplunkSearchError};
use crate::model::{
    EngineMessage, EngineWarning, Outcome, RawMessage, ResultRow, ResultsPayload, TimeWindow,
    WARNING_KIND_NO_ROWS,
};
use crate::query::CanonicalPipeline;

/// 事件原文所在的字段名。
const RAW_FIELD: &str = "_raw";

/// 结果归一化器:把引擎的原始 JSON 载荷转成有序结果行;
/// 零行但带诊断消息时给出结构化告警而不是抛错,
/// 让调用方能区分"查了没匹配"和"查了但引擎有话说"。
#[derive(Clone, Default)]
pub struct ResultNormalizer;

impl ResultNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// 行/告警两分支归一化。载荷里非行形状的条目(引擎状态等)直接丢弃。
    pub fn normalize(
        &self,
        raw: &str,
        pipeline: &CanonicalPipeline,
        window: &TimeWindow,
    ) -> Result<Outcome> {
        let payload = parse_payload(raw)?;
        let rows = row_shaped(payload.results);
        if rows.is_empty() && !payload.messages.is_empty() {
            return Ok(Outcome::Warning(EngineWarning {
                warning: WARNING_KIND_NO_ROWS,
                messages: payload.messages.iter().map(render_message).collect(),
                query: pipeline.as_str().to_string(),
                earliest: window.earliest.clone(),
                latest: window.latest.clone(),
            }));
        }
        Ok(Outcome::Rows(rows))
    }

    /// 有损投影:只取每行的 _raw 文本,缺该字段的行丢弃。
    pub fn raw_messages(&self, raw: &str) -> Result<Vec<RawMessage>> {
        let payload = parse_payload(raw)?;
        Ok(row_shaped(payload.results)
            .into_iter()
            .filter_map(|row| {
                row.get(RAW_FIELD).and_then(Value::as_str).map(|text| RawMessage {
                    message: text.to_string(),
                })
            })
            .collect())
    }
}

fn parse_payload(raw: &str) -> Result<ResultsPayload> {
    serde_json::from_str(raw)
        .map_err(|e| SplunkSearchError::ParseError(format!("results payload: {e}")))
}

/// 保留对象形状的条目,顺序不变。
fn row_shaped(entries: Vec<Value>) -> Vec<ResultRow> {
    entries
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

/// 诊断消息文本化,形如 "WARN: xxx";无类型时只留正文。
fn render_message(m: &EngineMessage) -> String {
    if m.kind.is_empty() {
        m.text.clone()
    } else {
        format!("{}: {}", m.kind, m.text)
    }
}
