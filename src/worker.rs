//! Worker：单回合推进任务，然后交还 Router
//!
//! 回合协议（单趟，不自我循环）：由 history + 角色指令构造推理请求；输出要么是直接回答，
//! 要么是一组工具调用请求（同回合内互相独立，可并发分发）；所有调用完成后合成一条
//! 汇总消息追加到 history，并向 results 追加一条回合审计记录。Worker 永不设置 routing。

use std::sync::Arc;

use futures_util::future::join_all;

use crate::core::{
    AgentError, InvocationRecord, Message, Outcome, SharedState, StateDelta, ToolCall, TurnRecord,
    WorkerId,
};
use crate::llm::LlmClient;
use crate::router::extract_json_block;
use crate::tools::{invocation_schema_json, worker_capabilities, CapabilityId, ToolExecutor};

/// Worker 推理步骤的输出：直接回答，或一组工具调用请求
#[derive(Debug, Clone)]
pub enum WorkerOutput {
    Answer(String),
    Invocations(Vec<ToolCall>),
}

/// 解析 Worker 的 LLM 输出。接受两种 JSON 形态：
/// `{"invocations": [{"tool": ..., "args": ...}, ...]}` 与单个 `{"tool": ..., "args": ...}`；
/// 无有效 JSON 或 tool 为空时按直接回答处理（Worker 没有重试通道，宁可回答也不中止）。
pub fn parse_worker_output(output: &str) -> WorkerOutput {
    let trimmed = output.trim();
    let Some(json_str) = extract_json_block(trimmed) else {
        return WorkerOutput::Answer(trimmed.to_string());
    };

    #[derive(serde::Deserialize)]
    struct InvocationRequest {
        invocations: Vec<ToolCall>,
    }

    if let Ok(req) = serde_json::from_str::<InvocationRequest>(json_str) {
        if req.invocations.is_empty() {
            return WorkerOutput::Answer(trimmed.to_string());
        }
        return WorkerOutput::Invocations(req.invocations);
    }
    if let Ok(call) = serde_json::from_str::<ToolCall>(json_str) {
        if !call.tool.is_empty() {
            return WorkerOutput::Invocations(vec![call]);
        }
    }
    WorkerOutput::Answer(trimmed.to_string())
}

/// 专职 Worker：静态绑定一组能力，消费共享状态，返回 delta
pub struct Worker {
    id: WorkerId,
    llm: Arc<dyn LlmClient>,
    executor: Arc<ToolExecutor>,
}

impl Worker {
    pub fn new(id: WorkerId, llm: Arc<dyn LlmClient>, executor: Arc<ToolExecutor>) -> Self {
        Self { id, llm, executor }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// 一个 Worker 回合：推理 -> （可选）并发工具调用 -> 汇总消息 + 审计记录
    pub async fn turn(&self, state: &SharedState) -> Result<StateDelta, AgentError> {
        let system = self.build_prompt(state);
        let mut messages = vec![Message::system(system)];
        messages.extend(state.history.iter().cloned());

        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(AgentError::LlmError)?;

        match parse_worker_output(&output) {
            WorkerOutput::Answer(answer) => {
                tracing::info!(worker = %self.id, "worker answered directly");
                Ok(StateDelta {
                    history: vec![Message::assistant(answer)],
                    ..Default::default()
                })
            }
            WorkerOutput::Invocations(calls) => {
                let records = self.dispatch(&calls).await;
                let summary = self.summarize(&records);

                let mut message = Message::assistant(summary);
                message.tool_calls = calls;

                Ok(StateDelta {
                    history: vec![message],
                    results: vec![TurnRecord {
                        worker: self.id,
                        invocations: records,
                    }],
                    ..Default::default()
                })
            }
        }
    }

    /// 并发分发本回合的所有调用；单个失败不影响其它调用（尽力而为）。
    /// 未知工具名与未绑定到本 Worker 的能力都记为 Failure，不中止回合。
    async fn dispatch(&self, calls: &[ToolCall]) -> Vec<InvocationRecord> {
        let bound = worker_capabilities(self.id);

        let futures = calls.iter().map(|call| {
            let executor = Arc::clone(&self.executor);
            let call = call.clone();
            async move {
                let outcome = match CapabilityId::parse(&call.tool) {
                    None => Outcome::Failure(format!("tool not found: {}", call.tool)),
                    Some(id) if !bound.contains(&id) => {
                        Outcome::Failure(format!("tool not found: {}", call.tool))
                    }
                    Some(id) => match executor.invoke(id, call.args.clone()).await {
                        Ok(value) => Outcome::Success(value),
                        // 工具自身的错误文本已经完整，不再套一层前缀
                        Err(AgentError::ToolExecutionFailed(reason)) => Outcome::Failure(reason),
                        Err(e) => Outcome::Failure(e.to_string()),
                    },
                };
                InvocationRecord {
                    capability: call.tool,
                    args: call.args,
                    outcome,
                }
            }
        });

        join_all(futures).await
    }

    /// 汇总消息：每个调用一行，成败分别归属到工具名
    fn summarize(&self, records: &[InvocationRecord]) -> String {
        let mut summary = format!("[{} AGENT RESULTS]\n", self.id.as_str().to_uppercase());
        for record in records {
            match &record.outcome {
                Outcome::Success(value) => {
                    summary.push_str(&format!("Tool {}: {}\n", record.capability, value));
                }
                Outcome::Failure(reason) => {
                    summary.push_str(&format!("Tool {} failed: {}\n", record.capability, reason));
                }
            }
        }
        summary
    }

    /// Worker system prompt：角色说明 + 可用工具 + 调用格式约定 + 任务上下文
    fn build_prompt(&self, state: &SharedState) -> String {
        let mut tools_desc = String::new();
        for (name, desc) in self
            .executor
            .registry()
            .tool_descriptions(worker_capabilities(self.id))
        {
            tools_desc.push_str(&format!("- {}: {}\n", name, desc));
        }

        // Router 的派遣理由即本回合的任务说明
        let mut task_context = String::new();
        if let Some(reason) = &state.context.last_routing_reason {
            task_context.push_str(&format!(
                "Current task context:\n- Routing reason: {}\n\n",
                reason
            ));
        }

        format!(
            "You are a specialized {id} agent.\n\
             Your role: {role}\n\n\
             Available tools:\n{tools_desc}\n\
             To invoke tools, respond with exactly one JSON object matching this schema:\n{schema}\n\
             You may request several independent invocations in one turn.\n\
             To answer directly, respond with plain text and no JSON.\n\n\
             Guidelines:\n\
             - Use your tools to complete the assigned task\n\
             - Be concise and focused on the specific task\n\
             - If you cannot complete the task, explain why\n\n\
             {task_context}Original request: {request}",
            id = self.id,
            role = self.id.role_prompt(),
            tools_desc = tools_desc,
            schema = invocation_schema_json(),
            task_context = task_context,
            request = state.context.original_request,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::{CapabilityRegistry, Tool};
    use async_trait::async_trait;
    use serde_json::Value;

    struct FixedTool {
        id: CapabilityId,
        result: Result<String, String>,
    }

    #[async_trait]
    impl Tool for FixedTool {
        fn id(&self) -> CapabilityId {
            self.id
        }

        fn description(&self) -> &str {
            "fixed result (test)"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            self.result.clone()
        }
    }

    fn files_worker(replies: Vec<&str>) -> Worker {
        let mut registry = CapabilityRegistry::new();
        registry.register(FixedTool {
            id: CapabilityId::ReadFile,
            result: Ok("file body".to_string()),
        });
        registry.register(FixedTool {
            id: CapabilityId::WriteFile,
            result: Err("disk full".to_string()),
        });
        let executor = Arc::new(ToolExecutor::new(registry, 5));
        let llm = Arc::new(ScriptedLlmClient::new(replies));
        Worker::new(WorkerId::Files, llm, executor)
    }

    #[test]
    fn test_parse_single_tool_call() {
        let out = parse_worker_output(r#"{"tool": "read_file", "args": {"path": "a.txt"}}"#);
        match out {
            WorkerOutput::Invocations(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].tool, "read_file");
            }
            other => panic!("expected invocations, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_invocation_list() {
        let out = parse_worker_output(
            r#"{"invocations": [{"tool": "read_file", "args": {}}, {"tool": "write_file", "args": {}}]}"#,
        );
        match out {
            WorkerOutput::Invocations(calls) => assert_eq!(calls.len(), 2),
            other => panic!("expected invocations, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_plain_text_is_answer() {
        let out = parse_worker_output("The capital of France is Paris.");
        assert!(matches!(out, WorkerOutput::Answer(a) if a.contains("Paris")));
    }

    #[tokio::test]
    async fn test_mixed_success_and_failure_turn() {
        let worker = files_worker(vec![
            r#"{"invocations": [
                {"tool": "read_file", "args": {"path": "a.txt"}},
                {"tool": "write_file", "args": {"path": "b.txt", "content": "x"}}
            ]}"#,
        ]);
        let state = SharedState::new("copy a to b");

        let delta = worker.turn(&state).await.unwrap();

        // routing 永不由 Worker 设置
        assert!(delta.routing.is_none());

        // 汇总消息包含两个结果
        assert_eq!(delta.history.len(), 1);
        let summary = &delta.history[0].content;
        assert!(summary.contains("[FILES AGENT RESULTS]"));
        assert!(summary.contains("Tool read_file: file body"));
        assert!(summary.contains("Tool write_file failed:"));
        assert!(summary.contains("disk full"));

        // 审计记录恰好两条，一成一败
        assert_eq!(delta.results.len(), 1);
        let record = &delta.results[0];
        assert_eq!(record.worker, WorkerId::Files);
        assert_eq!(record.invocations.len(), 2);
        assert!(matches!(record.invocations[0].outcome, Outcome::Success(_)));
        assert!(matches!(record.invocations[1].outcome, Outcome::Failure(_)));
    }

    #[tokio::test]
    async fn test_unknown_tool_recorded_not_fatal() {
        let worker = files_worker(vec![
            r#"{"invocations": [
                {"tool": "launch_rockets", "args": {}},
                {"tool": "read_file", "args": {"path": "a.txt"}}
            ]}"#,
        ]);
        let state = SharedState::new("do things");

        let delta = worker.turn(&state).await.unwrap();
        let record = &delta.results[0];
        assert_eq!(record.invocations.len(), 2);
        assert!(
            matches!(&record.invocations[0].outcome, Outcome::Failure(r) if r.contains("tool not found"))
        );
        assert!(matches!(record.invocations[1].outcome, Outcome::Success(_)));
    }

    #[tokio::test]
    async fn test_capability_not_bound_to_worker_fails() {
        // execute_sql 是注册过的能力，但不属于 files worker
        let worker = files_worker(vec![r#"{"tool": "execute_sql", "args": {"query": "SELECT 1"}}"#]);
        let state = SharedState::new("sneaky");

        let delta = worker.turn(&state).await.unwrap();
        assert!(
            matches!(&delta.results[0].invocations[0].outcome, Outcome::Failure(r) if r.contains("tool not found"))
        );
    }

    #[tokio::test]
    async fn test_plain_answer_produces_history_only() {
        let worker = files_worker(vec!["Nothing to do here."]);
        let state = SharedState::new("chat");

        let delta = worker.turn(&state).await.unwrap();
        assert_eq!(delta.history.len(), 1);
        assert!(delta.results.is_empty());
        assert!(delta.routing.is_none());
    }

    #[test]
    fn test_prompt_carries_routing_reason() {
        let worker = files_worker(vec![]);
        let mut state = SharedState::new("read a.txt");
        state.context.last_routing_reason = Some("user asked for a file".to_string());

        let prompt = worker.build_prompt(&state);
        assert!(prompt.contains("Routing reason: user asked for a file"));

        // 首回合尚无路由理由时不渲染该段落
        let fresh = SharedState::new("read a.txt");
        assert!(!worker.build_prompt(&fresh).contains("Routing reason"));
    }
}
