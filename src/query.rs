use std::fmt;

use crate::error::{Result, SplunkSearchError};

/// SPL 检索动词。
pub const SEARCH_VERB: &str = "search";

/// 已包含确定性排序/聚合的终结变换标记,出现任意一个就不再追加缺省排序。
const TERMINAL_TRANSFORMS: &[&str] = &["| sort", "| stats", "| tstats"];

/// 缺省排序子句:按时间倒序,保证探索式查询先看到最新事件。
const DEFAULT_SORT_CLAUSE: &str = " | sort - _time";

/// 规范化后的检索管道。只能由 [`QueryBuilder`] 构造,
/// 保证以 `search` 动词或 `|` 开头,是提交执行层的唯一合法形状。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPipeline(String);

impl CanonicalPipeline {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 查询构造器:把松散的用户输入组合成合法 SPL 管道。
/// 只做裁剪和前缀探测,从不改写调用方给定的内容。
#[derive(Clone, Default)]
pub struct QueryBuilder;

impl QueryBuilder {
    pub fn new() -> Self {
        Self
    }

    /// 自由文本模式(search / search_splunk):
    /// 裁剪空白;已经以 `|` 或不区分大小写的检索动词开头则原样保留,
    /// 否则补上 `search ` 前缀。空查询报无效请求。
    pub fn free_form(&self, raw: &str) -> Result<CanonicalPipeline> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SplunkSearchError::InvalidInput("query is empty".to_string()));
        }
        if trimmed.starts_with('|') || has_search_prefix(trimmed) {
            return Ok(CanonicalPipeline(trimmed.to_string()));
        }
        Ok(CanonicalPipeline(format!("{SEARCH_VERB} {trimmed}")))
    }

    /// 索引模式(search_index):以 `search index=<name>` 为基底,
    /// 过滤表达式按三条互斥规则合并,字段投影子句排在最后,
    /// 管道中没有终结变换时补缺省时间倒序。
    pub fn indexed(
        &self,
        index: &str,
        filter: &str,
        fields: Option<&[String]>,
    ) -> Result<CanonicalPipeline> {
        let index = index.trim();
        if index.is_empty() {
            return Err(SplunkSearchError::InvalidInput("index is required".to_string()));
        }

        let mut q = format!("{SEARCH_VERB} index={index}");

        let filt = filter.trim();
        if !filt.is_empty() {
            if filt.starts_with('|') {
                // 续接管道
                q.push(' ');
                q.push_str(filt);
            } else if let Some(rest) = filt.strip_prefix("search ") {
                // 冗余的 search 动词,剥掉后并入同一 search 子句
                q.push(' ');
                q.push_str(rest);
            } else {
                // 普通检索词
                q.push(' ');
                q.push_str(filt);
            }
        }

        if let Some(fields) = fields {
            if !fields.is_empty() {
                q.push_str(" | fields ");
                q.push_str(&fields.join(" "));
            }
        }

        if !TERMINAL_TRANSFORMS.iter().any(|t| q.contains(t)) {
            q.push_str(DEFAULT_SORT_CLAUSE);
        }

        Ok(CanonicalPipeline(q))
    }
}

fn has_search_prefix(s: &str) -> bool {
    s.get(..SEARCH_VERB.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(SEARCH_VERB))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qb() -> QueryBuilder {
        QueryBuilder::new()
    }

    #[test]
    fn free_form_prepends_verb_once() {
        let p = qb().free_form("index=main level=ERROR").unwrap();
        assert_eq!(p.as_str(), "search index=main level=ERROR");

        // 对自身输出幂等
        let again = qb().free_form(p.as_str()).unwrap();
        assert_eq!(again, p);
    }

    #[test]
    fn free_form_keeps_pipelines_and_verb_variants() {
        let p = qb().free_form("| tstats count where index=main").unwrap();
        assert_eq!(p.as_str(), "| tstats count where index=main");

        let p = qb().free_form("  Search index=main  ").unwrap();
        assert_eq!(p.as_str(), "Search index=main");

        let p = qb().free_form("SEARCH foo").unwrap();
        assert_eq!(p.as_str(), "SEARCH foo");
    }

    #[test]
    fn free_form_rejects_blank_query() {
        assert!(matches!(
            qb().free_form("   "),
            Err(SplunkSearchError::InvalidInput(_))
        ));
        assert!(matches!(
            qb().free_form(""),
            Err(SplunkSearchError::InvalidInput(_))
        ));
    }

    #[test]
    fn indexed_requires_index_name() {
        assert!(matches!(
            qb().indexed("", "level=ERROR", None),
            Err(SplunkSearchError::InvalidInput(_))
        ));
        assert!(matches!(
            qb().indexed("  ", "", None),
            Err(SplunkSearchError::InvalidInput(_))
        ));
    }

    #[test]
    fn indexed_plain_terms_merge_into_search_clause() {
        let p = qb()
            .indexed("main", "app=payments level=ERROR", None)
            .unwrap();
        assert_eq!(
            p.as_str(),
            "search index=main app=payments level=ERROR | sort - _time"
        );
    }

    #[test]
    fn indexed_pipeline_filter_appends_after_base() {
        let p = qb()
            .indexed("main", "| stats count by sourcetype", None)
            .unwrap();
        assert_eq!(p.as_str(), "search index=main | stats count by sourcetype");
    }

    #[test]
    fn indexed_strips_redundant_search_verb() {
        let p = qb().indexed("main", "search level=WARN", None).unwrap();
        assert_eq!(p.as_str(), "search index=main level=WARN | sort - _time");
    }

    #[test]
    fn indexed_fields_clause_comes_last() {
        let fields = vec!["_time".to_string(), "host".to_string(), "_raw".to_string()];
        let p = qb()
            .indexed("main", "level=ERROR", Some(&fields))
            .unwrap();
        assert_eq!(
            p.as_str(),
            "search index=main level=ERROR | fields _time host _raw | sort - _time"
        );

        // 空字段列表不产生子句
        let p = qb().indexed("main", "", Some(&[])).unwrap();
        assert_eq!(p.as_str(), "search index=main | sort - _time");
    }

    #[test]
    fn default_sort_skipped_when_terminal_transform_present() {
        let p = qb().indexed("main", "| sort - bytes", None).unwrap();
        assert!(!p.as_str().ends_with("| sort - _time"));

        let p = qb().indexed("main", "| tstats count", None).unwrap();
        assert_eq!(p.as_str(), "search index=main | tstats count");

        let p = qb().indexed("main", "", None).unwrap();
        assert_eq!(p.as_str(), "search index=main | sort - _time");
    }

    #[test]
    fn indexed_trims_but_never_rewrites_filter_text() {
        let p = qb().indexed(" main ", "  level=ERROR  ", None).unwrap();
        assert_eq!(p.as_str(), "search index=main level=ERROR | sort - _time");
    }
}
