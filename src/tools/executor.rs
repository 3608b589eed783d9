//! 工具执行器
//!
//! 持有 CapabilityRegistry 与全局超时，invoke(id, args) 在超时内调用对应工具，
//! 超时或失败时转为 AgentError（ToolTimeout / ToolExecutionFailed）；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::{CapabilityId, CapabilityRegistry};

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError
pub struct ToolExecutor {
    registry: CapabilityRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: CapabilityRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定能力；超时返回 ToolTimeout，工具返回 Err 则转为 ToolExecutionFailed；输出 JSON 审计日志
    pub async fn invoke(
        &self,
        id: CapabilityId,
        args: serde_json::Value,
    ) -> Result<String, AgentError> {
        let tool = self
            .registry
            .get(id)
            .ok_or_else(|| AgentError::ToolExecutionFailed(format!("Tool not registered: {id}")))?;

        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, tool.execute(args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": id.as_str(),
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(AgentError::ToolExecutionFailed(e)),
            Err(_) => Err(AgentError::ToolTimeout(id.as_str().to_string())),
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::Value;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn id(&self) -> CapabilityId {
            CapabilityId::Search
        }

        fn description(&self) -> &str {
            "sleeps past the timeout"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn test_invoke_times_out() {
        let mut registry = CapabilityRegistry::new();
        registry.register(SlowTool);
        let executor = ToolExecutor::new(registry, 1);

        // 暂停虚拟时钟：运行时空转时自动推进，1 秒超时先于 5 秒 sleep 触发
        tokio::time::pause();
        let err = executor
            .invoke(CapabilityId::Search, serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::ToolTimeout(_)));
    }

    #[tokio::test]
    async fn test_invoke_unregistered_tool_fails() {
        let executor = ToolExecutor::new(CapabilityRegistry::new(), 1);
        let err = executor
            .invoke(CapabilityId::ExecuteSql, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolExecutionFailed(_)));
    }
}
