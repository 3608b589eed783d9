//! Router（Supervisor）：决定下一个 Worker 或宣告完成
//!
//! 读取完整共享状态（history / results / context），请求 LLM 输出结构化决策
//! {"next": "code" | ... | "FINISH", "reasoning": "..."}；未知标识或解码失败为 RoutingFailure（致命，不重试）。
//! 决策理由写入 context.last_routing_reason，对下一次路由与外部观察者可见。

use std::sync::Arc;

use serde::Deserialize;

use crate::core::{
    AgentError, ContextUpdate, Message, Route, SharedState, StateDelta, WorkerId,
};
use crate::llm::LlmClient;

/// Router 的路由决策：下一步 + 理由
#[derive(Debug, Clone)]
pub struct RouterDecision {
    pub next: Route,
    pub reasoning: String,
}

/// LLM 原始输出中的决策 JSON（标识在此处仍是字符串，随后在封闭枚举边界校验）
#[derive(Debug, Deserialize)]
struct RawDecision {
    next: String,
    #[serde(default)]
    reasoning: String,
}

/// 从 LLM 输出中提取 JSON 块（```json ... ``` 或首个 { 到末个 }）
pub(crate) fn extract_json_block(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(
            rest.find("```")
                .map(|end| rest[..end].trim())
                .unwrap_or_else(|| rest.trim()),
        );
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        Some(&trimmed[start..=end])
    } else {
        None
    }
}

/// 解析 Router 输出；无有效 JSON、解码失败或未知标识都是 RoutingFailure
pub fn parse_decision(output: &str) -> Result<RouterDecision, AgentError> {
    let json_str = extract_json_block(output).ok_or_else(|| {
        AgentError::RoutingFailure(format!("no decision JSON in output: {}", preview(output)))
    })?;

    let raw: RawDecision = serde_json::from_str(json_str)
        .map_err(|e| AgentError::RoutingFailure(format!("invalid decision JSON: {}", e)))?;

    let next = Route::parse(&raw.next).ok_or_else(|| {
        AgentError::RoutingFailure(format!("unknown worker identifier: {}", raw.next))
    })?;

    Ok(RouterDecision {
        next,
        reasoning: raw.reasoning,
    })
}

fn preview(s: &str) -> String {
    if s.len() > 120 {
        format!("{}...", s.chars().take(120).collect::<String>())
    } else {
        s.to_string()
    }
}

/// Router：持有 LLM，按回合产出路由决策 delta（不写 history / results）
pub struct Router {
    llm: Arc<dyn LlmClient>,
}

impl Router {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 一次路由回合：构造 prompt -> LLM -> 解析决策 -> 返回 delta（routing + 理由）
    pub async fn turn(&self, state: &SharedState) -> Result<(RouterDecision, StateDelta), AgentError> {
        let system = self.build_prompt(state);
        let mut messages = vec![Message::system(system)];
        messages.extend(state.history.iter().cloned());

        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| AgentError::RoutingFailure(format!("reasoning step failed: {}", e)))?;

        let decision = parse_decision(&output)?;
        tracing::info!(next = %decision.next.as_str(), reasoning = %decision.reasoning, "routing decision");

        let delta = StateDelta {
            routing: Some(decision.next),
            context: ContextUpdate {
                last_routing_reason: Some(decision.reasoning.clone()),
            },
            ..Default::default()
        };
        Ok((decision, delta))
    }

    /// 路由 prompt：Worker 能力描述 + 已完成工作摘要（results + 上次路由理由）+ 决策格式约定
    fn build_prompt(&self, state: &SharedState) -> String {
        let mut agent_desc = String::new();
        for id in WorkerId::ALL {
            agent_desc.push_str(&format!("- {}: {}\n", id.as_str(), id.description()));
        }
        agent_desc.push_str("- FINISH: Task is complete, return final response to user\n");

        let mut work_done = String::new();
        if !state.results.is_empty() {
            work_done.push_str("\nWork completed so far:\n");
            for record in &state.results {
                let tools: Vec<&str> = record
                    .invocations
                    .iter()
                    .map(|inv| inv.capability.as_str())
                    .collect();
                work_done.push_str(&format!(
                    "- {} agent used: {}\n",
                    record.worker,
                    tools.join(", ")
                ));
            }
        }
        if let Some(reason) = &state.context.last_routing_reason {
            work_done.push_str(&format!(
                "\nCurrent task context:\n- Last routing reason: {}\n",
                reason
            ));
        }

        format!(
            "You are a supervisor that routes tasks to specialized agents.\n\n\
             Available agents:\n{agent_desc}\n\
             Your job is to:\n\
             1. Analyze the user's request and conversation history\n\
             2. Determine which agent should handle the next step\n\
             3. Route to FINISH when the task is fully complete\n\
             {work_done}\n\
             Guidelines:\n\
             - Only route to agents that can make progress on the task\n\
             - Do not re-route to an agent whose last result already satisfied the remaining goal\n\
             - Route to FINISH only when the user's request is fully addressed\n\n\
             Original request: {request}\n\n\
             Respond with exactly one JSON object: {{\"next\": \"<agent or FINISH>\", \"reasoning\": \"<brief explanation>\"}}",
            agent_desc = agent_desc,
            work_done = work_done,
            request = state.context.original_request,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InvocationRecord, Outcome, TurnRecord, TurnSource};
    use crate::llm::ScriptedLlmClient;

    #[test]
    fn test_parse_plain_json_decision() {
        let decision =
            parse_decision(r#"{"next": "code", "reasoning": "needs a calculation"}"#).unwrap();
        assert_eq!(decision.next, Route::Worker(WorkerId::Code));
        assert_eq!(decision.reasoning, "needs a calculation");
    }

    #[test]
    fn test_parse_fenced_json_decision() {
        let output = "Here is my decision:\n```json\n{\"next\": \"FINISH\", \"reasoning\": \"done\"}\n```";
        let decision = parse_decision(output).unwrap();
        assert_eq!(decision.next, Route::Finish);
    }

    #[test]
    fn test_unknown_identifier_is_routing_failure() {
        let err = parse_decision(r#"{"next": "hacker", "reasoning": ""}"#).unwrap_err();
        assert!(matches!(err, AgentError::RoutingFailure(_)));
        assert!(err.to_string().contains("unknown worker identifier"));
    }

    #[test]
    fn test_non_json_output_is_routing_failure() {
        let err = parse_decision("I think we should finish now.").unwrap_err();
        assert!(matches!(err, AgentError::RoutingFailure(_)));
    }

    #[tokio::test]
    async fn test_turn_writes_reason_into_context() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"next": "files", "reasoning": "user asked for a file"}"#,
        ]));
        let router = Router::new(llm);
        let mut state = SharedState::new("read a.txt");

        let (decision, delta) = router.turn(&state).await.unwrap();
        assert_eq!(decision.next, Route::Worker(WorkerId::Files));
        state.merge(TurnSource::Router, delta).unwrap();

        assert_eq!(state.routing, Some(Route::Worker(WorkerId::Files)));
        assert_eq!(
            state.context.last_routing_reason.as_deref(),
            Some("user asked for a file")
        );
        // Router 不追加 history / results
        assert_eq!(state.history.len(), 1);
        assert!(state.results.is_empty());
    }

    #[tokio::test]
    async fn test_prompt_summarizes_prior_results() {
        let llm = Arc::new(ScriptedLlmClient::new([r#"{"next": "FINISH", "reasoning": "ok"}"#]));
        let router = Router::new(llm);
        let mut state = SharedState::new("compute");
        state
            .merge(
                TurnSource::Worker,
                StateDelta {
                    results: vec![TurnRecord {
                        worker: WorkerId::Code,
                        invocations: vec![InvocationRecord {
                            capability: "execute_python".to_string(),
                            args: serde_json::json!({}),
                            outcome: Outcome::Success("4".to_string()),
                        }],
                    }],
                    ..Default::default()
                },
            )
            .unwrap();

        let prompt = router.build_prompt(&state);
        assert!(prompt.contains("code agent used: execute_python"));
    }

    #[tokio::test]
    async fn test_prompt_carries_last_routing_reason() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"next": "code", "reasoning": "needs a calculation"}"#,
        ]));
        let router = Router::new(llm);
        let mut state = SharedState::new("compute");

        let (_, delta) = router.turn(&state).await.unwrap();
        state.merge(TurnSource::Router, delta).unwrap();

        // 上一次路由理由对下一个路由回合可见
        let prompt = router.build_prompt(&state);
        assert!(prompt.contains("Last routing reason: needs a calculation"));
    }
}
