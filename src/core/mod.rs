//! 核心协调层：错误、共享状态与合并规则、回合循环状态机

pub mod error;
pub mod orchestrator;
pub mod state;

pub use error::AgentError;
pub use orchestrator::{Orchestrator, OrchestratorEvent};
pub use state::{
    ContextUpdate, InvocationRecord, Message, Outcome, Role, Route, SharedState, StateDelta,
    TaskContext, ToolCall, TurnRecord, TurnSource, WorkerId,
};
