//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__LLM__MODEL=gpt-4o`）。
//! validate() 返回缺失项列表而非抛错，由入口决定如何呈现给调用方。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub supervisor: SupervisorSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

/// [llm] 段：模型、端点与采样
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// API Key；未设置时回退到环境变量 OPENAI_API_KEY
    pub api_key: Option<String>,
    /// Worker 采样温度；Router 固定用 0 保证路由可复现
    #[serde(default)]
    pub temperature: f32,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            api_key: None,
            temperature: 0.0,
        }
    }
}

/// [supervisor] 段：回合预算
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorSection {
    /// Router + Worker 回合总数上限；耗尽时强制收尾，防止 Router 永不 FINISH 的死循环
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

fn default_max_turns() -> usize {
    24
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

/// [tools] 段：沙箱根目录、全局工具超时与各能力子段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 文件能力的沙箱根目录，未设置时用 ./workspace
    pub filesystem_root: Option<PathBuf>,
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default)]
    pub code: CodeSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub http: HttpSection,
}

fn default_tool_timeout_secs() -> u64 {
    60
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            filesystem_root: None,
            tool_timeout_secs: default_tool_timeout_secs(),
            code: CodeSection::default(),
            database: DatabaseSection::default(),
            search: SearchSection::default(),
            http: HttpSection::default(),
        }
    }
}

/// [tools.code] 段：解释器与执行超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodeSection {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_code_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_code_timeout_secs() -> u64 {
    30
}

impl Default for CodeSection {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            timeout_secs: default_code_timeout_secs(),
        }
    }
}

/// [tools.database] 段：SQLite 数据库路径
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./data.db")
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// [tools.search] 段：搜索端点与 API Key
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    /// 未设置时回退到环境变量 TAVILY_API_KEY；缺失时 search 能力按单次失败处理
    pub api_key: Option<String>,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_results")]
    pub max_results: u64,
}

fn default_search_endpoint() -> String {
    "https://api.tavily.com/search".to_string()
}

fn default_search_timeout_secs() -> u64 {
    15
}

fn default_max_results() -> u64 {
    5
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key: None,
            timeout_secs: default_search_timeout_secs(),
            max_results: default_max_results(),
        }
    }
}

/// [tools.http] 段：http_request 能力的超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmSection::default(),
            supervisor: SupervisorSection::default(),
            tools: ToolsSection::default(),
        }
    }
}

impl AppConfig {
    /// LLM API Key：配置优先，回退环境变量
    pub fn llm_api_key(&self) -> Option<String> {
        self.llm
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    /// 搜索 API Key：配置优先，回退环境变量
    pub fn search_api_key(&self) -> Option<String> {
        self.tools
            .search
            .api_key
            .clone()
            .or_else(|| std::env::var("TAVILY_API_KEY").ok())
    }

    /// 校验必需配置，返回缺失项列表（唯一硬性要求是 LLM API Key）
    pub fn validate(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.llm_api_key().is_none() {
            missing.push("llm.api_key (or OPENAI_API_KEY)".to_string());
        }
        missing
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
