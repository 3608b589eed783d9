//! 沙箱文件系统工具
//!
//! SafeFs 绑定 root_dir，所有路径必须落在 root 下（禁止 ../ 逃逸与越界绝对路径）；
//! read_file / write_file / list_directory 三个能力全部经由 SafeFs 校验。

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::core::AgentError;
use crate::tools::{CapabilityId, Tool};

/// 沙箱文件系统：绑定根目录，resolve 校验路径在根下，防止路径逃逸
#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    /// 校验路径在沙箱内并返回完整路径；目标文件不必存在（write 场景）
    pub fn resolve(&self, path: &str) -> Result<PathBuf, AgentError> {
        let raw = Path::new(path.trim_start_matches("./"));

        if raw.is_absolute() {
            let canonical = raw.canonicalize().unwrap_or_else(|_| raw.to_path_buf());
            if canonical.starts_with(&self.root_dir) {
                return Ok(canonical);
            }
            return Err(AgentError::ToolExecutionFailed(format!(
                "Path '{}' is outside allowed directory '{}'",
                path,
                self.root_dir.display()
            )));
        }

        // 相对路径：拒绝任何 .. 分量，如 ../../etc/passwd
        if raw.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(AgentError::ToolExecutionFailed(format!(
                "Path '{}' is outside allowed directory '{}'",
                path,
                self.root_dir.display()
            )));
        }

        Ok(self.root_dir.join(raw))
    }

    pub fn read_file(&self, path: &str) -> Result<String, AgentError> {
        let resolved = self.resolve(path)?;
        std::fs::read_to_string(&resolved)
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Read failed: {}", e)))
    }

    pub fn write_file(&self, path: &str, content: &str) -> Result<String, AgentError> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AgentError::ToolExecutionFailed(format!("Write failed: {}", e)))?;
        }
        std::fs::write(&resolved, content)
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Write failed: {}", e)))?;
        Ok(format!(
            "Successfully wrote {} bytes to {}",
            content.len(),
            path
        ))
    }

    pub fn list_dir(&self, path: &str) -> Result<Vec<String>, AgentError> {
        let base = if path.is_empty() || path == "." {
            self.root_dir.clone()
        } else {
            self.resolve(path)?
        };
        let mut entries = Vec::new();
        for e in std::fs::read_dir(&base)
            .map_err(|e| AgentError::ToolExecutionFailed(format!("List failed: {}", e)))?
        {
            let e = e.map_err(|e| AgentError::ToolExecutionFailed(e.to_string()))?;
            let name = e.file_name().to_string_lossy().to_string();
            let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                entries.push(format!("DIR  {}", name));
            } else {
                let size = e.metadata().map(|m| m.len()).unwrap_or(0);
                entries.push(format!("FILE {} ({} bytes)", name, size));
            }
        }
        entries.sort();
        Ok(entries)
    }
}

/// read_file 能力：读取沙箱内文件
pub struct ReadFileTool {
    fs: SafeFs,
}

impl ReadFileTool {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            fs: SafeFs::new(root_dir),
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn id(&self) -> CapabilityId {
        CapabilityId::ReadFile
    }

    fn description(&self) -> &str {
        "Read file contents. Args: {\"path\": \"file path relative to workspace\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path relative to workspace root" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        tracing::info!(path = %path, "read_file execute");
        self.fs.read_file(path).map_err(|e| e.to_string())
    }
}

/// write_file 能力：写入沙箱内文件，父目录自动创建
pub struct WriteFileTool {
    fs: SafeFs,
}

impl WriteFileTool {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            fs: SafeFs::new(root_dir),
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn id(&self) -> CapabilityId {
        CapabilityId::WriteFile
    }

    fn description(&self) -> &str {
        "Write content to a file. Args: {\"path\": \"file path\", \"content\": \"text to write\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path relative to workspace root" },
                "content": { "type": "string", "description": "Content to write" }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let content = args.get("content").and_then(|v| v.as_str()).unwrap_or("");
        tracing::info!(path = %path, bytes = content.len(), "write_file execute");
        self.fs.write_file(path, content).map_err(|e| e.to_string())
    }
}

/// list_directory 能力：列出沙箱内目录
pub struct ListDirectoryTool {
    fs: SafeFs,
}

impl ListDirectoryTool {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            fs: SafeFs::new(root_dir),
        }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn id(&self) -> CapabilityId {
        CapabilityId::ListDirectory
    }

    fn description(&self) -> &str {
        "List directory contents. Args: {\"path\": \"directory path, default '.'\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory path, default '.'" }
            },
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        tracing::info!(path = %path, "list_directory execute");
        let entries = self.fs.list_dir(path).map_err(|e| e.to_string())?;
        if entries.is_empty() {
            Ok("Directory is empty".to_string())
        } else {
            Ok(entries.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_dir_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fs = SafeFs::new(dir.path());

        let err = fs.resolve("../../etc/passwd").unwrap_err();
        assert!(err.to_string().contains("outside allowed directory"));
    }

    #[test]
    fn test_absolute_path_outside_root_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fs = SafeFs::new(dir.path());

        let err = fs.write_file("/tmp/hive_escape.txt", "nope").unwrap_err();
        assert!(err.to_string().contains("outside allowed directory"));
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let fs = SafeFs::new(dir.path());

        let msg = fs.write_file("notes/a.txt", "hello").unwrap();
        assert!(msg.contains("5 bytes"));
        assert_eq!(fs.read_file("notes/a.txt").unwrap(), "hello");

        let listing = fs.list_dir(".").unwrap();
        assert!(listing.iter().any(|e| e.contains("notes")));
    }

    #[tokio::test]
    async fn test_write_tool_reports_escape_as_error_string() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path());

        let err = tool
            .execute(serde_json::json!({"path": "../out.txt", "content": "x"}))
            .await
            .unwrap_err();
        assert!(err.contains("outside allowed directory"));
    }
}
