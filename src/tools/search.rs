//! Web 搜索工具（Tavily 兼容 API）
//!
//! POST { api_key, query, max_results } 到搜索端点，结果格式化为 标题/URL/摘要 段落；
//! 未配置 API Key 时返回错误文本（由 Worker 折叠为 Failure，不会中止请求）。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::{CapabilityId, Tool};

/// 默认返回结果数
const DEFAULT_MAX_RESULTS: u64 = 5;

/// search 能力：调用 Tavily 兼容搜索 API
pub struct SearchTool {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    max_results: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl SearchTool {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
        max_results: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            max_results: if max_results == 0 {
                DEFAULT_MAX_RESULTS
            } else {
                max_results
            },
        }
    }

    fn format_results(results: &[SearchResult]) -> String {
        if results.is_empty() {
            return "No results found.".to_string();
        }
        results
            .iter()
            .map(|r| format!("**{}**\n{}\n{}\n", r.title, r.url, r.content))
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn id(&self) -> CapabilityId {
        CapabilityId::Search
    }

    fn description(&self) -> &str {
        "Search the web. Args: {\"query\": \"search terms\", \"max_results\": 5}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query to look up" },
                "max_results": { "type": "integer", "description": "Maximum number of results" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "Missing 'query' argument".to_string())?;
        let max_results = args
            .get("max_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.max_results);

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| "Search API key not configured".to_string())?;
        tracing::info!(query = %query, max_results, "search");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "api_key": api_key,
                "query": query,
                "max_results": max_results,
            }))
            .send()
            .await
            .map_err(|e| format!("Search error: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Search error: HTTP {}", response.status().as_u16()));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| format!("Search error: {}", e))?;
        Ok(Self::format_results(&parsed.results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_api_key_is_error_string() {
        let tool = SearchTool::new("https://api.tavily.com/search", None, 5, 5);
        let err = tool
            .execute(serde_json::json!({"query": "rust"}))
            .await
            .unwrap_err();
        assert!(err.contains("API key not configured"));
    }

    #[test]
    fn test_format_results() {
        let results = vec![
            SearchResult {
                title: "A".to_string(),
                url: "https://a".to_string(),
                content: "alpha".to_string(),
            },
            SearchResult {
                title: "B".to_string(),
                url: "https://b".to_string(),
                content: "beta".to_string(),
            },
        ];
        let out = SearchTool::format_results(&results);
        assert!(out.contains("**A**"));
        assert!(out.contains("\n---\n"));

        assert_eq!(SearchTool::format_results(&[]), "No results found.");
    }
}
