//! 代码执行工具：Python 子进程 + 超时
//!
//! 代码写入临时脚本文件后以独立子进程执行（工作目录为临时目录），带超时与 kill_on_drop，
//! 输出 stdout / stderr / 退出码；超时按失败文本返回，不静默丢弃。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::tools::{CapabilityId, Tool};

/// execute_python 能力：在子进程中执行一段 Python 代码
pub struct ExecutePythonTool {
    interpreter: String,
    timeout_secs: u64,
}

impl ExecutePythonTool {
    pub fn new(interpreter: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout_secs,
        }
    }

    async fn run(&self, code: &str) -> Result<String, String> {
        let script = tempfile::Builder::new()
            .suffix(".py")
            .tempfile()
            .map_err(|e| format!("Temp file error: {}", e))?;
        std::fs::write(script.path(), code).map_err(|e| format!("Temp file error: {}", e))?;

        let child = Command::new(&self.interpreter)
            .arg(script.path())
            .current_dir(std::env::temp_dir())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(Duration::from_secs(self.timeout_secs), child).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(format!("Execution error: {}", e)),
            Err(_) => {
                return Err(format!(
                    "Code execution timed out after {} seconds",
                    self.timeout_secs
                ))
            }
        };

        let mut result = String::new();
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.is_empty() {
            result.push_str(&format!("STDOUT:\n{}\n", stdout));
        }
        if !stderr.is_empty() {
            result.push_str(&format!("STDERR:\n{}\n", stderr));
        }
        if !output.status.success() {
            result.push_str(&format!("Exit code: {}", output.status.code().unwrap_or(-1)));
        }

        let result = result.trim().to_string();
        if result.is_empty() {
            Ok("Code executed successfully (no output)".to_string())
        } else {
            Ok(result)
        }
    }
}

#[async_trait]
impl Tool for ExecutePythonTool {
    fn id(&self) -> CapabilityId {
        CapabilityId::ExecutePython
    }

    fn description(&self) -> &str {
        "Execute Python code in a subprocess. Args: {\"code\": \"print(2+2)\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": { "type": "string", "description": "Python code to execute" }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let code = args
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "Missing 'code' argument".to_string())?;
        tracing::info!(bytes = code.len(), "execute_python");
        self.run(code).await
    }
}
