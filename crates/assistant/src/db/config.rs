use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub db_type: DatabaseType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Sqlite,
    Postgres,
    Mysql,
}

impl FromStr for DatabaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(DatabaseType::Sqlite),
            "postgres" | "postgresql" => Ok(DatabaseType::Postgres),
            "mysql" | "mariadb" => Ok(DatabaseType::Mysql),
            other => Err(format!(
                "Unknown database type '{}' (expected sqlite, postgres or mysql)",
                other
            )),
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseType::Sqlite => write!(f, "sqlite"),
            DatabaseType::Postgres => write!(f, "postgres"),
            DatabaseType::Mysql => write!(f, "mysql"),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: DatabaseType::Sqlite,
            sqlite_path: Some(PathBuf::from("data/askdb.db")),
            connection_string: None,
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// In-memory sqlite, mostly for tests and demos.
    pub fn in_memory() -> Self {
        Self {
            db_type: DatabaseType::Sqlite,
            sqlite_path: Some(PathBuf::from(":memory:")),
            connection_string: None,
            max_connections: 1,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.db_type {
            DatabaseType::Sqlite => {
                if self.sqlite_path.is_none() {
                    return Err("SQLite path is required for SQLite database type".to_string());
                }
            }
            DatabaseType::Postgres | DatabaseType::Mysql => {
                if self.connection_string.is_none() {
                    return Err(format!(
                        "Connection string is required for {} database type",
                        self.db_type
                    ));
                }
            }
        }
        if self.max_connections == 0 {
            return Err("max_connections must be at least 1".to_string());
        }
        Ok(())
    }
}
