//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MAGPIE__*` 覆盖（双下划线表示嵌套，
//! 如 `MAGPIE__LLM__MODEL=llama3`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub gmail: GmailSection,
}

/// [app] 段：应用名
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：Ollama 地址与模型选择
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 本地 Ollama 服务地址（OpenAI 兼容端点挂在 /v1 下）
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 指定模型名；留空则启动时自动选择第一个已安装的模型
    pub model: Option<String>,
    /// 单次补全请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// [gmail] 段：凭据文件路径与抓取上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GmailSection {
    /// OAuth 客户端凭据（installed app 格式，首次授权时读取）
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// 授权令牌文件（自动刷新并回写）
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    /// fetch_unread_emails 未显式传 max_count 时的默认值
    #[serde(default = "default_max_fetch")]
    pub default_max_fetch: u32,
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_max_fetch() -> u32 {
    20
}

impl Default for GmailSection {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_path: default_token_path(),
            default_max_fetch: default_max_fetch(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            gmail: GmailSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 MAGPIE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MAGPIE__*（双下划线表示嵌套键）
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
        config::Environment::with_prefix("MAGPIE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_any_source() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.base_url, "http://localhost:11434");
        assert!(cfg.llm.model.is_none());
        assert_eq!(cfg.gmail.default_max_fetch, 20);
        assert_eq!(cfg.gmail.token_path, PathBuf::from("token.json"));
    }
}
