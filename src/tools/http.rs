//! HTTP 请求工具
//!
//! 通用 REST 调用：method / url / headers / body，带超时；
//! 响应渲染为 Status + Headers + Body，Body 超过上限时截断并注明总长。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::tools::{CapabilityId, Tool};

/// Body 渲染上限（字符）
const MAX_BODY_CHARS: usize = 2000;

/// http_request 能力：向外部 API 发起 HTTP 请求
pub struct HttpRequestTool {
    client: Client,
}

impl HttpRequestTool {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn id(&self) -> CapabilityId {
        CapabilityId::HttpRequest
    }

    fn description(&self) -> &str {
        "Make an HTTP request. Args: {\"url\": \"...\", \"method\": \"GET|POST|PUT|DELETE\", \"headers\": {...}, \"body\": \"...\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "URL to request" },
                "method": { "type": "string", "description": "HTTP method, default GET" },
                "headers": { "type": "object", "description": "Optional request headers" },
                "body": { "type": "string", "description": "Optional request body" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "Missing 'url' argument".to_string())?;
        let method = args
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("GET")
            .to_uppercase();
        tracing::info!(method = %method, url = %url, "http_request");

        let method: reqwest::Method = method
            .parse()
            .map_err(|_| format!("Invalid HTTP method: {}", method))?;
        let mut request = self.client.request(method, url);

        if let Some(headers) = args.get("headers").and_then(|v| v.as_object()) {
            for (k, v) in headers {
                if let Some(v) = v.as_str() {
                    request = request.header(k, v);
                }
            }
        }
        if let Some(body) = args.get("body").and_then(|v| v.as_str()) {
            request = request.body(body.to_string());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                format!("Request to {} timed out", url)
            } else {
                format!("HTTP error: {}", e)
            }
        })?;

        let status = response.status();
        let headers = format!("{:?}", response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| format!("HTTP error: {}", e))?;

        let mut result = format!("Status: {}\nHeaders: {}\nBody:\n", status.as_u16(), headers);
        if body.chars().count() > MAX_BODY_CHARS {
            result.push_str(&body.chars().take(MAX_BODY_CHARS).collect::<String>());
            result.push_str(&format!(
                "\n... (truncated, {} total chars)",
                body.chars().count()
            ));
        } else {
            result.push_str(&body);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_url_argument() {
        let tool = HttpRequestTool::new(5);
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(err.contains("Missing 'url'"));
    }

    #[tokio::test]
    async fn test_invalid_method_rejected() {
        let tool = HttpRequestTool::new(5);
        let err = tool
            .execute(serde_json::json!({"url": "http://localhost:1", "method": "NOT A METHOD"}))
            .await
            .unwrap_err();
        assert!(err.contains("Invalid HTTP method"));
    }
}
