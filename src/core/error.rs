//! 错误类型
//!
//! 单次工具调用失败不会成为 AgentError：Worker 将其折叠为 Outcome::Failure 并写回对话；
//! 配置缺失、路由失败、合并违例是请求级致命错误，直接上抛给调用方。

use thiserror::Error;

/// 协调系统运行过程中可能出现的错误（配置、路由、LLM、工具、合并违例等）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 必需配置缺失，请求开始前即中止
    #[error("Config error: {0}")]
    Config(String),

    /// Router 无法给出有效决策或选择了未知标识；致命，不自动重试
    #[error("Routing failure: {0}")]
    RoutingFailure(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    /// delta 违反合并契约（如 Worker 设置 routing）；内部不变量破坏，致命
    #[error("Merge violation: {0}")]
    MergeViolation(String),

    #[error("Cancelled")]
    Cancelled,
}
