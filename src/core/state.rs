//! 共享状态：对话历史、路由决策、任务上下文与执行审计
//!
//! 每个用户请求对应一个 SharedState，由 Orchestrator 独占持有；
//! Router / Worker 只读取状态并返回 StateDelta，由 merge 统一合入（history/results 追加，routing/context 覆盖）。

use serde::{Deserialize, Serialize};

use crate::core::AgentError;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// LLM 请求的工具调用（简化 JSON：{"tool": "read_file", "args": {"path": "..."}}）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// 单条消息；tool_calls 为 Worker 推理步骤附带的工具调用请求（通常为空）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// Worker 标识：封闭枚举，未知标识在 LLM 解码边界即被拒绝
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerId {
    Research,
    Code,
    Files,
    Database,
    Api,
}

impl WorkerId {
    pub const ALL: [WorkerId; 5] = [
        WorkerId::Research,
        WorkerId::Code,
        WorkerId::Files,
        WorkerId::Database,
        WorkerId::Api,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerId::Research => "research",
            WorkerId::Code => "code",
            WorkerId::Files => "files",
            WorkerId::Database => "database",
            WorkerId::Api => "api",
        }
    }

    pub fn parse(s: &str) -> Option<WorkerId> {
        match s {
            "research" => Some(WorkerId::Research),
            "code" => Some(WorkerId::Code),
            "files" => Some(WorkerId::Files),
            "database" => Some(WorkerId::Database),
            "api" => Some(WorkerId::Api),
            _ => None,
        }
    }

    /// 供 Router prompt 使用的能力描述
    pub fn description(&self) -> &'static str {
        match self {
            WorkerId::Research => "Web search and information retrieval from the internet",
            WorkerId::Code => "Python code generation and execution",
            WorkerId::Files => "File system operations (read, write, list files)",
            WorkerId::Database => "Database queries and operations (SQL)",
            WorkerId::Api => "External API requests and integrations",
        }
    }

    /// 供 Worker system prompt 使用的角色说明
    pub fn role_prompt(&self) -> &'static str {
        match self {
            WorkerId::Research => {
                "Search the web for information. Find relevant data, articles, and facts to answer questions."
            }
            WorkerId::Code => {
                "Write and execute Python code to solve problems, perform calculations, and process data."
            }
            WorkerId::Files => {
                "Read, write, and manage files on the file system. Handle file operations safely."
            }
            WorkerId::Database => {
                "Execute SQL queries against databases. Create tables, insert data, and run queries."
            }
            WorkerId::Api => {
                "Make HTTP requests to external APIs. Handle REST endpoints, fetch data, and interact with web services."
            }
        }
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 路由值：下一个 Worker 或终止哨兵 FINISH
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Worker(WorkerId),
    Finish,
}

impl Route {
    /// 从 Router 结构化输出中的标识解析；未知标识返回 None（上层转 RoutingFailure）
    pub fn parse(s: &str) -> Option<Route> {
        if s == "FINISH" {
            return Some(Route::Finish);
        }
        WorkerId::parse(s).map(Route::Worker)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Worker(id) => id.as_str(),
            Route::Finish => "FINISH",
        }
    }
}

/// 任务上下文：显式字段而非开放的 string-keyed map，使合并规则可静态检查
#[derive(Clone, Debug, Default)]
pub struct TaskContext {
    /// 用户原始请求文本（创建后不变）
    pub original_request: String,
    /// Router 最近一次的路由理由
    pub last_routing_reason: Option<String>,
}

/// 上下文的字段级更新：Some 覆盖，None 保持
#[derive(Clone, Debug, Default)]
pub struct ContextUpdate {
    pub last_routing_reason: Option<String>,
}

/// 单次工具调用结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success(String),
    Failure(String),
}

/// 一次工具调用的审计记录（追加后不可变）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub capability: String,
    pub args: serde_json::Value,
    pub outcome: Outcome,
}

/// 一个 Worker 回合的审计记录：仅在该回合至少调用一个工具时追加
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnRecord {
    pub worker: WorkerId,
    pub invocations: Vec<InvocationRecord>,
}

/// 回合来源：Worker 的 delta 禁止携带 routing（只有 Router 能设置）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnSource {
    Router,
    Worker,
}

/// 请求级共享状态，由 Orchestrator 创建并独占
#[derive(Clone, Debug, Default)]
pub struct SharedState {
    /// 对话历史：仅追加，从不重排或截断
    pub history: Vec<Message>,
    /// Router 最近一次的路由决策；首次路由前为 None
    pub routing: Option<Route>,
    pub context: TaskContext,
    /// 执行审计：每个调用了工具的 Worker 回合一条，追加后不可变
    pub results: Vec<TurnRecord>,
}

impl SharedState {
    /// 以用户请求初始化：history 含一条 user 消息，context 记录原始请求
    pub fn new(request: impl Into<String>) -> Self {
        let request = request.into();
        Self {
            history: vec![Message::user(request.clone())],
            routing: None,
            context: TaskContext {
                original_request: request,
                last_routing_reason: None,
            },
            results: Vec::new(),
        }
    }

    /// 合并一个回合的 delta：history/results 追加，routing/context 覆盖。
    /// 空 delta 幂等；Worker 的 delta 携带 routing 视为 MergeViolation（致命）。
    pub fn merge(&mut self, source: TurnSource, delta: StateDelta) -> Result<(), AgentError> {
        if source == TurnSource::Worker && delta.routing.is_some() {
            return Err(AgentError::MergeViolation(
                "worker delta must not set routing".to_string(),
            ));
        }
        self.history.extend(delta.history);
        if let Some(route) = delta.routing {
            self.routing = Some(route);
        }
        if let Some(reason) = delta.context.last_routing_reason {
            self.context.last_routing_reason = Some(reason);
        }
        self.results.extend(delta.results);
        Ok(())
    }

    /// 最终答复：history 的最后一条消息内容
    pub fn final_answer(&self) -> String {
        self.history
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

/// 回合产出的部分状态更新，由 Orchestrator 合入 SharedState
#[derive(Clone, Debug, Default)]
pub struct StateDelta {
    pub history: Vec<Message>,
    pub routing: Option<Route>,
    pub context: ContextUpdate,
    pub results: Vec<TurnRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_appends_history() {
        let mut state = SharedState::new("hello");
        let before = state.history.len();

        let delta = StateDelta {
            history: vec![Message::assistant("hi")],
            ..Default::default()
        };
        state.merge(TurnSource::Worker, delta).unwrap();

        assert_eq!(state.history.len(), before + 1);
        assert_eq!(state.history[0].content, "hello");
    }

    #[test]
    fn test_empty_delta_is_idempotent() {
        let mut state = SharedState::new("hello");
        let snapshot = state.history.len();

        state.merge(TurnSource::Router, StateDelta::default()).unwrap();
        state.merge(TurnSource::Worker, StateDelta::default()).unwrap();

        assert_eq!(state.history.len(), snapshot);
        assert!(state.routing.is_none());
        assert!(state.results.is_empty());
    }

    #[test]
    fn test_worker_delta_with_routing_is_violation() {
        let mut state = SharedState::new("hello");
        let delta = StateDelta {
            routing: Some(Route::Finish),
            ..Default::default()
        };

        let err = state.merge(TurnSource::Worker, delta).unwrap_err();
        assert!(matches!(err, AgentError::MergeViolation(_)));
        assert!(state.routing.is_none());
    }

    #[test]
    fn test_router_delta_overrides_routing_and_reason() {
        let mut state = SharedState::new("hello");
        let delta = StateDelta {
            routing: Some(Route::Worker(WorkerId::Code)),
            context: ContextUpdate {
                last_routing_reason: Some("needs computation".to_string()),
            },
            ..Default::default()
        };
        state.merge(TurnSource::Router, delta).unwrap();

        assert_eq!(state.routing, Some(Route::Worker(WorkerId::Code)));
        assert_eq!(
            state.context.last_routing_reason.as_deref(),
            Some("needs computation")
        );
        // original_request 不受后续合并影响
        assert_eq!(state.context.original_request, "hello");
    }

    #[test]
    fn test_results_are_append_only() {
        let mut state = SharedState::new("hello");
        let delta = StateDelta {
            results: vec![TurnRecord {
                worker: WorkerId::Files,
                invocations: vec![InvocationRecord {
                    capability: "read_file".to_string(),
                    args: serde_json::json!({"path": "a.txt"}),
                    outcome: Outcome::Success("ok".to_string()),
                }],
            }],
            ..Default::default()
        };
        state.merge(TurnSource::Worker, delta).unwrap();
        let first_outcome = state.results[0].invocations[0].outcome.clone();

        // 后续回合追加新记录，不触碰旧记录
        let delta2 = StateDelta {
            results: vec![TurnRecord {
                worker: WorkerId::Code,
                invocations: Vec::new(),
            }],
            ..Default::default()
        };
        state.merge(TurnSource::Worker, delta2).unwrap();

        assert_eq!(state.results.len(), 2);
        assert_eq!(state.results[0].invocations[0].outcome, first_outcome);
    }

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse("FINISH"), Some(Route::Finish));
        assert_eq!(Route::parse("code"), Some(Route::Worker(WorkerId::Code)));
        assert_eq!(Route::parse("unknown_agent"), None);
        // 大小写敏感：FINISH 全大写，worker 标识全小写
        assert_eq!(Route::parse("finish"), None);
    }
}
