//! Orchestrator：回合循环状态机
//!
//! ROUTING -> (WORKING -> ROUTING)* -> DONE。每个回合只有 Router 或一个 Worker 在执行，
//! delta 串行合入 SharedState；Router 给出 FINISH 或发生致命错误时退出。
//! 回合预算耗尽时强制收尾（等价于 FINISH），防止 Router 永不终止的死循环。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::{AgentError, Route, SharedState, TurnSource, WorkerId};
use crate::llm::LlmClient;
use crate::router::Router;
use crate::tools::{
    CapabilityRegistry, ExecutePythonTool, ExecuteSqlTool, HttpRequestTool, ListDirectoryTool,
    ReadFileTool, SearchTool, ToolExecutor, WriteFileTool,
};
use crate::worker::Worker;

/// 协调过程中的进度事件（入口据此打印每次路由决策与 Worker 产出）
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    RouteDecision { next: String, reasoning: String },
    WorkerMessage { worker: WorkerId, content: String },
    Finished { answer: String },
}

/// Orchestrator：持有 Router 与按枚举装配的 Worker 映射，驱动回合循环
pub struct Orchestrator {
    router: Router,
    workers: HashMap<WorkerId, Worker>,
    max_turns: usize,
    event_tx: Option<mpsc::UnboundedSender<OrchestratorEvent>>,
}

impl Orchestrator {
    pub fn new(router: Router, workers: HashMap<WorkerId, Worker>, max_turns: usize) -> Self {
        Self {
            router,
            workers,
            max_turns,
            event_tx: None,
        }
    }

    /// 按配置装配全套能力与全部 Worker（启动时一次完成，运行期只读）
    pub fn from_config(
        cfg: &AppConfig,
        router_llm: Arc<dyn LlmClient>,
        worker_llm: Arc<dyn LlmClient>,
    ) -> Self {
        let workspace = cfg
            .tools
            .filesystem_root
            .clone()
            .unwrap_or_else(|| std::path::PathBuf::from("./workspace"));
        std::fs::create_dir_all(&workspace).ok();

        let mut registry = CapabilityRegistry::new();
        registry.register(SearchTool::new(
            cfg.tools.search.endpoint.clone(),
            cfg.search_api_key(),
            cfg.tools.search.timeout_secs,
            cfg.tools.search.max_results,
        ));
        registry.register(ExecutePythonTool::new(
            cfg.tools.code.interpreter.clone(),
            cfg.tools.code.timeout_secs,
        ));
        registry.register(ReadFileTool::new(&workspace));
        registry.register(WriteFileTool::new(&workspace));
        registry.register(ListDirectoryTool::new(&workspace));
        registry.register(ExecuteSqlTool::new(cfg.tools.database.path.clone()));
        registry.register(HttpRequestTool::new(cfg.tools.http.timeout_secs));

        let executor = Arc::new(ToolExecutor::new(registry, cfg.tools.tool_timeout_secs));

        let workers = WorkerId::ALL
            .into_iter()
            .map(|id| {
                (
                    id,
                    Worker::new(id, Arc::clone(&worker_llm), Arc::clone(&executor)),
                )
            })
            .collect();

        Self::new(Router::new(router_llm), workers, cfg.supervisor.max_turns)
    }

    /// 设置进度事件通道
    pub fn with_event_tx(mut self, tx: mpsc::UnboundedSender<OrchestratorEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, ev: OrchestratorEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    /// 处理一个用户请求：创建请求级 SharedState，循环至 FINISH / 预算耗尽 / 致命错误。
    /// 取消令牌生效时中止当前回合并返回 Cancelled（状态是请求级的，丢弃即可）。
    pub async fn run(
        &self,
        request: &str,
        cancel: CancellationToken,
    ) -> Result<String, AgentError> {
        let request_id = uuid::Uuid::new_v4();
        let started = chrono::Utc::now();
        tracing::info!(%request_id, request, "request started");

        let mut state = SharedState::new(request);
        let mut turns = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            if turns >= self.max_turns {
                tracing::warn!(
                    %request_id,
                    max_turns = self.max_turns,
                    "turn budget exhausted, forcing finish"
                );
                break;
            }

            // ROUTING
            let (decision, delta) = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                result = self.router.turn(&state) => result?,
            };
            state.merge(TurnSource::Router, delta)?;
            turns += 1;
            self.send_event(OrchestratorEvent::RouteDecision {
                next: decision.next.as_str().to_string(),
                reasoning: decision.reasoning,
            });

            let worker_id = match state.routing {
                Some(Route::Finish) => break,
                Some(Route::Worker(id)) => id,
                None => {
                    return Err(AgentError::RoutingFailure(
                        "router produced no decision".to_string(),
                    ))
                }
            };

            // 路由回合本身可能耗尽预算（奇数 max_turns），此时不再执行 Worker 回合
            if turns >= self.max_turns {
                tracing::warn!(
                    %request_id,
                    max_turns = self.max_turns,
                    "turn budget exhausted, forcing finish"
                );
                break;
            }

            // WORKING
            let worker = self.workers.get(&worker_id).ok_or_else(|| {
                AgentError::RoutingFailure(format!("no worker registered for '{}'", worker_id))
            })?;
            let delta = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                result = worker.turn(&state) => result?,
            };
            if let Some(message) = delta.history.last() {
                self.send_event(OrchestratorEvent::WorkerMessage {
                    worker: worker_id,
                    content: message.content.clone(),
                });
            }
            state.merge(TurnSource::Worker, delta)?;
            turns += 1;
        }

        // DONE：history 最后一条消息即用户可见结果
        let answer = state.final_answer();
        let elapsed_ms = (chrono::Utc::now() - started).num_milliseconds();
        tracing::info!(%request_id, turns, elapsed_ms, "request finished");
        self.send_event(OrchestratorEvent::Finished {
            answer: answer.clone(),
        });
        Ok(answer)
    }
}
