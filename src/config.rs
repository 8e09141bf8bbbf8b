use crate::error::{LedgerError, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 默认系统提示词: 要求模型只输出 JSON
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"당신은 영수증을 분석하여 날짜(date), 장소(location), 상품(items), 금액(total_amount)을 추출하는 전문 AI 어시스턴트입니다.

- 응답은 오직 JSON 형식이어야 하며, 그 외의 텍스트는 포함하지 마세요.
- 화폐 단위는 표시하지 않고, 금액은 반드시 정수형 숫자만 적으세요.
- 날짜는 YYYY-MM-DD 형식으로 적으세요.
- 상품은 영수증에 나온 순서대로 적으세요.

출력 형식:
{
    "date": "YYYY-MM-DD",
    "location": "장소",
    "items": [
        {"name": "상품명", "price": 금액}
    ],
    "total_amount": 총금액
}

주의사항:
- 읽을 수 없는 부분은 "읽을 수 없음"이라고 표시하세요.
- 애매한 부분은 "재검토 필요"라고 표시하세요.
- 날짜, 장소, 상품, 금액 네 가지가 완벽하게 나오지 않은 경우 "오류"라고 표시하세요."#;

pub const DEFAULT_USER_PROMPT: &str = "당신에게 주어진 영수증을 해석하세요.";

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub model: ModelConfig,
    pub prompts: PromptConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub grpc_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 未配置时不落库
    pub url: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

// api_key 不进日志
impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub system_prompt: String,
    pub user_prompt: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_prompt: DEFAULT_USER_PROMPT.to_string(),
        }
    }
}

impl PromptConfig {
    /// 从 YAML 文件读取 `prompts.system_prompt` / `prompts.user_prompt`
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let prompts: PromptConfig = Config::builder()
            .add_source(File::new(path, FileFormat::Yaml))
            .build()?
            .get("prompts")?;
        prompts.validate()?;
        Ok(prompts)
    }

    pub fn validate(&self) -> Result<()> {
        if self.system_prompt.trim().is_empty() {
            return Err(LedgerError::Config("system_prompt must not be empty".into()));
        }
        if self.user_prompt.trim().is_empty() {
            return Err(LedgerError::Config("user_prompt must not be empty".into()));
        }
        Ok(())
    }
}

/// 环境变量的扁平视图 (SERVER_HOST -> server_host)
#[derive(Debug, Deserialize)]
struct EnvSettings {
    server_host: String,
    server_port: u16,
    grpc_port: u16,
    database_url: Option<String>,
    openai_api_key: Option<String>,
    openai_model: String,
    openai_base_url: String,
    openai_temperature: f32,
    openai_max_tokens: u32,
    openai_timeout_secs: u64,
    prompt_config_path: Option<String>,
}

impl AppConfig {
    /// 启动时加载一次: .env + 进程环境变量
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_environment(Environment::default().try_parsing(true))
    }

    /// 从给定的键值表加载 (测试用)
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_environment(Environment::default().try_parsing(true).source(Some(vars)))
    }

    fn from_environment(env: Environment) -> Result<Self> {
        let settings: EnvSettings = Config::builder()
            .set_default("server_host", "127.0.0.1")?
            .set_default("server_port", 8000)?
            .set_default("grpc_port", 8085)?
            .set_default("openai_model", "gpt-4o")?
            .set_default("openai_base_url", "https://api.openai.com/v1")?
            .set_default("openai_temperature", 0.1)?
            .set_default("openai_max_tokens", 2048)?
            .set_default("openai_timeout_secs", 120)?
            .add_source(env)
            .build()?
            .try_deserialize()?;

        let api_key = settings
            .openai_api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LedgerError::Config("OPENAI_API_KEY is not set".into()))?;

        let prompts = match settings.prompt_config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => PromptConfig::from_yaml_file(path)?,
            _ => PromptConfig::default(),
        };

        Ok(Self {
            server: ServerConfig {
                host: settings.server_host,
                port: settings.server_port,
                grpc_port: settings.grpc_port,
            },
            database: DatabaseConfig {
                url: settings.database_url.filter(|u| !u.trim().is_empty()),
            },
            model: ModelConfig {
                api_key,
                model: settings.openai_model,
                base_url: settings.openai_base_url,
                temperature: settings.openai_temperature,
                max_tokens: settings.openai_max_tokens,
                timeout_secs: settings.openai_timeout_secs,
            },
            prompts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = AppConfig::from_map(vars(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.grpc_port, 8085);
        assert_eq!(config.model.model, "gpt-4o");
        assert!(config.database.url.is_none());
        assert_eq!(config.prompts.user_prompt, DEFAULT_USER_PROMPT);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = AppConfig::from_map(vars(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("SERVER_PORT", "9000"),
            ("GRPC_PORT", "9001"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("DATABASE_URL", "postgres://localhost/ledger"),
        ]))
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.grpc_port, 9001);
        assert_eq!(config.model.model, "gpt-4o-mini");
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://localhost/ledger")
        );
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let err = AppConfig::from_map(HashMap::new()).unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let config = AppConfig::from_map(vars(&[("OPENAI_API_KEY", "sk-secret")])).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
    }

    #[test]
    fn prompts_load_from_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "prompts:\n  system_prompt: \"JSON only\"\n  user_prompt: \"Read this receipt\""
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = AppConfig::from_map(vars(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("PROMPT_CONFIG_PATH", path.as_str()),
        ]))
        .unwrap();
        assert_eq!(config.prompts.system_prompt, "JSON only");
        assert_eq!(config.prompts.user_prompt, "Read this receipt");
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let prompts = PromptConfig {
            system_prompt: "  ".into(),
            user_prompt: "read".into(),
        };
        assert!(prompts.validate().is_err());
    }
}
