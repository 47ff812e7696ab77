//! Splunk 检索 MCP 服务核心库
//! 连接、查询拼装、作业提交与结果整形各自成模,传输层在最外侧。

pub mod config;
pub mod error;
pub mod model;
pub mod client;
pub mod jobs;
pub mod query;
pub mod results;
pub mod search;
pub mod http;
pub mod mcp;
