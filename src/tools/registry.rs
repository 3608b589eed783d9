//! 能力注册表
//!
//! 能力标识是封闭枚举 CapabilityId，启动时一次性建立 id -> 实现 的映射；
//! LLM 输出中的工具名只在 Worker 边界解析为枚举，未知名称按单次调用失败处理，不中止回合。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::WorkerId;

/// 能力标识：封闭枚举，注册与查找都以枚举为键
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CapabilityId {
    Search,
    ExecutePython,
    ReadFile,
    WriteFile,
    ListDirectory,
    ExecuteSql,
    HttpRequest,
}

impl CapabilityId {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityId::Search => "search",
            CapabilityId::ExecutePython => "execute_python",
            CapabilityId::ReadFile => "read_file",
            CapabilityId::WriteFile => "write_file",
            CapabilityId::ListDirectory => "list_directory",
            CapabilityId::ExecuteSql => "execute_sql",
            CapabilityId::HttpRequest => "http_request",
        }
    }

    /// 解析 LLM 输出中的工具名；未知名称返回 None
    pub fn parse(s: &str) -> Option<CapabilityId> {
        match s {
            "search" => Some(CapabilityId::Search),
            "execute_python" => Some(CapabilityId::ExecutePython),
            "read_file" => Some(CapabilityId::ReadFile),
            "write_file" => Some(CapabilityId::WriteFile),
            "list_directory" => Some(CapabilityId::ListDirectory),
            "execute_sql" => Some(CapabilityId::ExecuteSql),
            "http_request" => Some(CapabilityId::HttpRequest),
            _ => None,
        }
    }
}

impl std::fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Worker 与能力的静态绑定：启动时据此装配各 Worker 的工具集
pub fn worker_capabilities(worker: WorkerId) -> &'static [CapabilityId] {
    match worker {
        WorkerId::Research => &[CapabilityId::Search],
        WorkerId::Code => &[CapabilityId::ExecutePython],
        WorkerId::Files => &[
            CapabilityId::ReadFile,
            CapabilityId::WriteFile,
            CapabilityId::ListDirectory,
        ],
        WorkerId::Database => &[CapabilityId::ExecuteSql],
        WorkerId::Api => &[CapabilityId::HttpRequest],
    }
}

/// 工具 trait：标识、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 能力标识（工具名由 id().as_str() 导出）
    fn id(&self) -> CapabilityId;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    /// 默认返回空对象，表示无参数或参数格式不限
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具；参数来自 LLM 输出，实现方自行做输入校验
    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 能力注册表：按枚举存储 Arc<dyn Tool>，启动时装配完成后只读
#[derive(Default)]
pub struct CapabilityRegistry {
    tools: HashMap<CapabilityId, Arc<dyn Tool>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.id(), Arc::new(tool));
    }

    pub fn get(&self, id: CapabilityId) -> Option<Arc<dyn Tool>> {
        self.tools.get(&id).cloned()
    }

    /// 返回 (name, description) 列表，用于生成 prompt 中的 Available tools 段落
    pub fn tool_descriptions(&self, ids: &[CapabilityId]) -> Vec<(String, String)> {
        ids.iter()
            .filter_map(|id| self.tools.get(id))
            .map(|tool| (tool.id().as_str().to_string(), tool.description().to_string()))
            .collect()
    }
}
