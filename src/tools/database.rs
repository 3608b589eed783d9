//! SQL 工具：SQLite（rusqlite）
//!
//! rusqlite 是同步库，执行放入 spawn_blocking；SELECT 渲染为列头 + 行的文本表格，
//! 其余语句返回受影响行数。连接按调用建立，数据库路径来自配置。

use std::path::PathBuf;

use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::Value;

use crate::tools::{CapabilityId, Tool};

/// execute_sql 能力：对配置的 SQLite 数据库执行查询
pub struct ExecuteSqlTool {
    database_path: PathBuf,
}

impl ExecuteSqlTool {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }
}

fn run_query(path: &PathBuf, query: &str) -> Result<String, String> {
    let conn = Connection::open(path).map_err(|e| format!("SQL error: {}", e))?;

    if query.trim_start().to_uppercase().starts_with("SELECT") {
        let mut stmt = conn.prepare(query).map_err(|e| format!("SQL error: {}", e))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();

        let mut rows = stmt.query([]).map_err(|e| format!("SQL error: {}", e))?;
        let mut lines = Vec::new();
        while let Some(row) = rows.next().map_err(|e| format!("SQL error: {}", e))? {
            let mut cells = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let cell: rusqlite::types::Value =
                    row.get(i).map_err(|e| format!("SQL error: {}", e))?;
                cells.push(render_value(cell));
            }
            lines.push(cells.join(" | "));
        }

        if lines.is_empty() {
            return Ok("Query returned no results".to_string());
        }
        let mut out = columns.join(" | ");
        out.push('\n');
        out.push_str(&"-".repeat(40));
        out.push('\n');
        out.push_str(&lines.join("\n"));
        Ok(out)
    } else {
        let affected = conn
            .execute(query, [])
            .map_err(|e| format!("SQL error: {}", e))?;
        Ok(format!(
            "Query executed successfully. Rows affected: {}",
            affected
        ))
    }
}

fn render_value(v: rusqlite::types::Value) -> String {
    use rusqlite::types::Value as V;
    match v {
        V::Null => "NULL".to_string(),
        V::Integer(i) => i.to_string(),
        V::Real(f) => f.to_string(),
        V::Text(s) => s,
        V::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

#[async_trait]
impl Tool for ExecuteSqlTool {
    fn id(&self) -> CapabilityId {
        CapabilityId::ExecuteSql
    }

    fn description(&self) -> &str {
        "Execute a SQL query against the SQLite database. Args: {\"query\": \"SELECT ...\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "SQL query to execute" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "Missing 'query' argument".to_string())?
            .to_string();
        tracing::info!(query = %query_preview(&query), "execute_sql");

        let path = self.database_path.clone();
        tokio::task::spawn_blocking(move || run_query(&path, &query))
            .await
            .map_err(|e| format!("SQL task panicked: {}", e))?
    }
}

fn query_preview(q: &str) -> String {
    if q.len() > 120 {
        format!("{}...", q.chars().take(120).collect::<String>())
    } else {
        q.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_insert_select() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ExecuteSqlTool::new(dir.path().join("test.db"));

        tool.execute(serde_json::json!({"query": "CREATE TABLE t (id INTEGER, name TEXT)"}))
            .await
            .unwrap();
        let inserted = tool
            .execute(serde_json::json!({"query": "INSERT INTO t VALUES (1, 'alpha')"}))
            .await
            .unwrap();
        assert!(inserted.contains("Rows affected: 1"));

        let selected = tool
            .execute(serde_json::json!({"query": "SELECT id, name FROM t"}))
            .await
            .unwrap();
        assert!(selected.contains("id | name"));
        assert!(selected.contains("1 | alpha"));
    }

    #[tokio::test]
    async fn test_select_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ExecuteSqlTool::new(dir.path().join("test.db"));

        tool.execute(serde_json::json!({"query": "CREATE TABLE empty_t (id INTEGER)"}))
            .await
            .unwrap();
        let out = tool
            .execute(serde_json::json!({"query": "SELECT * FROM empty_t"}))
            .await
            .unwrap();
        assert_eq!(out, "Query returned no results");
    }

    #[tokio::test]
    async fn test_bad_sql_is_error_string() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ExecuteSqlTool::new(dir.path().join("test.db"));

        let err = tool
            .execute(serde_json::json!({"query": "SELEKT nonsense"}))
            .await
            .unwrap_err();
        assert!(err.contains("SQL error"));
    }
}
