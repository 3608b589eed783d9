//! 工具层：能力注册表、执行器与五类能力实现（search / code / filesystem / database / http）

pub mod code;
pub mod database;
pub mod executor;
pub mod filesystem;
pub mod http;
pub mod registry;
pub mod schema;
pub mod search;

pub use code::ExecutePythonTool;
pub use database::ExecuteSqlTool;
pub use executor::ToolExecutor;
pub use filesystem::{ListDirectoryTool, ReadFileTool, SafeFs, WriteFileTool};
pub use http::HttpRequestTool;
pub use registry::{worker_capabilities, CapabilityId, CapabilityRegistry, Tool};
pub use schema::invocation_schema_json;
pub use search::SearchTool;
