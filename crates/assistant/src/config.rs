use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::db::{DatabaseConfig, DatabaseType};
use crate::llm::{LLMConfig, SUPPORTED_PROVIDERS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Reformulations allowed before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Optional engine-level cap on executed steps per run.
    #[serde(default)]
    pub step_limit: Option<usize>,
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            step_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LLMConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> crate::Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| crate::Error::Config(format!("{} has an invalid value: {}", key, value))),
        Err(_) => Ok(None),
    }
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                addr: std::env::var("SERVER_ADDR").unwrap_or(defaults.server.addr),
            },
            database: DatabaseConfig {
                db_type: match std::env::var("DATABASE_TYPE") {
                    Ok(value) => value
                        .parse::<DatabaseType>()
                        .map_err(crate::Error::Config)?,
                    Err(_) => defaults.database.db_type,
                },
                sqlite_path: std::env::var("SQLITE_PATH")
                    .map(PathBuf::from)
                    .ok()
                    .or(defaults.database.sqlite_path),
                connection_string: std::env::var("DATABASE_URL").ok(),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS")?
                    .unwrap_or(defaults.database.max_connections),
            },
            llm: LLMConfig {
                provider: std::env::var("LLM_PROVIDER")
                    .map(|p| p.to_lowercase())
                    .unwrap_or(defaults.llm.provider),
                model: std::env::var("LLM_MODEL").unwrap_or(defaults.llm.model),
                api_key: std::env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
                temperature: env_parse("LLM_TEMPERATURE")?.or(defaults.llm.temperature),
                timeout_seconds: env_parse("LLM_TIMEOUT_SECONDS")?
                    .or(defaults.llm.timeout_seconds),
            },
            workflow: WorkflowConfig {
                max_attempts: env_parse("MAX_ATTEMPTS")?
                    .unwrap_or(defaults.workflow.max_attempts),
                step_limit: env_parse("WORKFLOW_STEP_LIMIT")?,
            },
        };

        config.validate()?;

        if config.llm.api_key.is_none() && config.llm.provider != "mock" {
            tracing::warn!(
                "LLM_API_KEY is not set. The {} provider will read its own environment variable.",
                config.llm.provider
            );
        }

        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.database.validate().map_err(crate::Error::Config)?;

        let provider = self.llm.provider.to_lowercase();
        if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
            return Err(crate::Error::Config(format!(
                "Unknown LLM_PROVIDER '{}' (expected one of: {})",
                self.llm.provider,
                SUPPORTED_PROVIDERS.join(", ")
            )));
        }

        if self.workflow.max_attempts == 0 {
            return Err(crate::Error::Config(
                "MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8080".to_string(),
            },
            database: DatabaseConfig::default(),
            llm: LLMConfig::default(),
            workflow: WorkflowConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workflow.max_attempts, 3);
        assert_eq!(config.workflow.step_limit, None);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn test_zero_attempts_invalid() {
        let mut config = Config::default();
        config.workflow.max_attempts = 0;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_postgres_requires_url() {
        let mut config = Config::default();
        config.database.db_type = DatabaseType::Postgres;
        config.database.connection_string = None;
        assert!(config.validate().is_err());

        config.database.connection_string = Some("postgres://localhost/app".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_provider_invalid() {
        let mut config = Config::default();
        config.llm.provider = "opnai".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, crate::Error::Config(msg) if msg.contains("opnai")));

        config.llm.provider = "Anthropic".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mysql_requires_url() {
        let mut config = Config::default();
        config.database.db_type = DatabaseType::Mysql;
        config.database.connection_string = None;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));

        config.database.connection_string = Some("mysql://root@localhost/shop".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = Config::default();
        config.llm.api_key = Some("secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
