//! Hive - Rust 多智能体协调系统
//!
//! 中央 Router（Supervisor）逐回合决定由哪个专职 Worker 行动或宣告完成；
//! Worker 在回合内可调用绑定的外部能力（搜索 / 代码执行 / 文件 / SQL / HTTP），
//! 所有组件通过请求级 SharedState 的 delta 合并交换数据。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误、共享状态与合并规则、Orchestrator 回合循环
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / 脚本化 Mock）
//! - **router**: Supervisor 路由决策
//! - **worker**: Worker 回合协议与并发工具分发
//! - **tools**: 能力注册表、执行器与五类能力实现

pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod router;
pub mod tools;
pub mod worker;

pub use crate::core::{Orchestrator, OrchestratorEvent};
