use std::sync::Arc;

use crate::db::{
    Database, DatabaseConfig, DatabaseType, MySqlDatabase, PostgresDatabase, SqliteDatabase,
};

pub async fn connect(config: &DatabaseConfig) -> crate::Result<Arc<dyn Database>> {
    config.validate().map_err(crate::Error::Config)?;

    match config.db_type {
        DatabaseType::Sqlite => {
            let path = config
                .sqlite_path
                .as_ref()
                .ok_or_else(|| crate::Error::Config("SQLite path not configured".into()))?
                .to_str()
                .ok_or_else(|| crate::Error::Config("SQLite path is not valid UTF-8".into()))?;
            Ok(Arc::new(SqliteDatabase::new(path, config.max_connections).await?))
        }
        DatabaseType::Postgres => {
            let connection_string = config.connection_string.as_ref().ok_or_else(|| {
                crate::Error::Config("PostgreSQL connection string not configured".into())
            })?;
            Ok(Arc::new(
                PostgresDatabase::new(connection_string, config.max_connections).await?,
            ))
        }
        DatabaseType::Mysql => {
            let connection_string = config.connection_string.as_ref().ok_or_else(|| {
                crate::Error::Config("MySQL connection string not configured".into())
            })?;
            Ok(Arc::new(
                MySqlDatabase::new(connection_string, config.max_connections).await?,
            ))
        }
    }
}
