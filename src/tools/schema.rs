//! 工具调用 JSON Schema 生成（schemars 自动生成）
//!
//! 用于将「合法 invocation 请求」的 JSON 结构注入 Worker 的 system prompt，减少 LLM 输出格式错误。

use schemars::{schema_for, JsonSchema};
use std::collections::HashMap;

/// 单个工具调用格式：与 Worker 解析的 `{"tool": "...", "args": {...}}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，如 search、execute_python、read_file
    pub tool: String,
    /// 工具参数，依工具不同而不同（query、code、path 等）
    pub args: HashMap<String, String>,
}

/// 一个回合内的工具调用请求：可一次请求多个，互相独立
#[allow(dead_code)]
#[derive(JsonSchema)]
struct InvocationRequestFormat {
    pub invocations: Vec<ToolCallFormat>,
}

/// 返回 invocation 请求的 JSON Schema 字符串，可拼入 system prompt
pub fn invocation_schema_json() -> String {
    let schema = schema_for!(InvocationRequestFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}
