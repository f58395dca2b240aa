//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `RAGNAV__*` 覆盖（双下划线表示嵌套，如 `RAGNAV__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub memory: MemorySection,
    pub router: RouterSection,
    pub agents: AgentsSection,
    pub retrieval: RetrievalSection,
}

/// [app] 段：首轮问候语、数据目录（chunk 与索引的固定落盘位置）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub greeting: String,
    pub data_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            greeting: "Hello there!".to_string(),
            data_dir: PathBuf::from("data"),
        }
    }
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// deepseek / openai / mock；实际优先级由 API Key 与 provider 共同决定
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 嵌入端点，未设置时与 base_url 相同
    pub embedding_base_url: Option<String>,
    pub deepseek: ProviderModelSection,
    pub openai: ProviderModelSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            embedding_base_url: None,
            deepseek: ProviderModelSection::default(),
            openai: ProviderModelSection::default(),
        }
    }
}

impl LlmSection {
    pub fn embedding_base_url(&self) -> Option<&str> {
        self.embedding_base_url
            .as_deref()
            .or(self.base_url.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProviderModelSection {
    pub model: Option<String>,
}

/// [memory] 段：对话日志 token 上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub token_limit: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self { token_limit: 8000 }
    }
}

/// [router] 段：是否启用关键词快速匹配（不调用决策服务）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterSection {
    pub fast_match: bool,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self { fast_match: true }
    }
}

/// [agents] 段：单轮内工具调用循环的最大步数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentsSection {
    pub max_steps: usize,
}

impl Default for AgentsSection {
    fn default() -> Self {
        Self { max_steps: 8 }
    }
}

/// [retrieval] 段：返回文档数、离线哈希嵌入维度
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub top_k: usize,
    pub hash_dimensions: usize,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            top_k: 5,
            hash_dimensions: 256,
        }
    }
}

/// 从 config 目录加载配置，环境变量 RAGNAV__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 RAGNAV__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default", "default"] {
        if std::path::Path::new(&format!("{}.toml", name)).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path).required(false));
        } else {
            tracing::warn!("Config file {} not found, ignoring", path.display());
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("RAGNAV")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.greeting, "Hello there!");
        assert_eq!(cfg.memory.token_limit, 8000);
        assert!(cfg.router.fast_match);
        assert_eq!(cfg.agents.max_steps, 8);
        assert_eq!(cfg.retrieval.top_k, 5);
    }

    #[test]
    fn test_load_explicit_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[memory]\ntoken_limit = 1200\n\n[router]\nfast_match = false\n",
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.memory.token_limit, 1200);
        assert!(!cfg.router.fast_match);
        assert_eq!(cfg.app.greeting, "Hello there!");
    }

    #[test]
    fn test_embedding_base_url_falls_back() {
        let mut llm = LlmSection::default();
        assert_eq!(llm.embedding_base_url(), None);
        llm.base_url = Some("http://proxy".into());
        assert_eq!(llm.embedding_base_url(), Some("http://proxy"));
    }
}
