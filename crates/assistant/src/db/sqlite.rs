use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Column, Pool, Row as _, Sqlite, ValueRef,
};
use tracing::{debug, error, info};

use crate::{
    db::{format_schema, is_read_query, Database, ExecutionOutcome, Row},
    Error, Result,
};

pub struct SqliteDatabase {
    pool: Pool<Sqlite>,
}

impl SqliteDatabase {
    pub async fn new(path: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to SQLite database: {}", path);

        let options = if path == ":memory:" || path == "sqlite::memory:" {
            SqliteConnectOptions::from_str(path)?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        };

        // In-memory databases vanish with their last connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Failed to connect to SQLite: {}", e);
                Error::Sqlx(e)
            })?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn execute(&self, sql: &str) -> Result<ExecutionOutcome> {
        debug!("Executing SQL on SQLite: {}", sql);

        let mut tx = self.pool.begin().await?;

        if is_read_query(sql) {
            let rows = sqlx::query(sql).fetch_all(&mut *tx).await?;
            tx.rollback().await?;
            let rows = rows.iter().map(row_to_json).collect::<Result<Vec<_>>>()?;
            Ok(ExecutionOutcome::Rows(rows))
        } else {
            let done = sqlx::query(sql).execute(&mut *tx).await?;
            tx.commit().await?;
            Ok(ExecutionOutcome::Committed {
                rows_affected: done.rows_affected(),
            })
        }
    }

    async fn describe_schema(&self) -> Result<String> {
        let rows = sqlx::query(
            r#"
            SELECT m.name AS table_name, p.name AS column_name, p.type AS data_type, p.pk AS pk
            FROM sqlite_master m
            JOIN pragma_table_info(m.name) p
            WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%'
            ORDER BY m.name, p.cid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let columns = rows
            .iter()
            .map(|r| {
                (
                    r.get::<String, _>("table_name"),
                    r.get::<String, _>("column_name"),
                    r.get::<String, _>("data_type"),
                    r.get::<i64, _>("pk") > 0,
                )
            })
            .collect::<Vec<_>>();

        Ok(format_schema(
            columns
                .iter()
                .map(|(t, c, d, pk)| (t.as_str(), c.as_str(), d.as_str(), *pk)),
        ))
    }
}

fn row_to_json(row: &SqliteRow) -> Result<Row> {
    let mut map = Row::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let value = if row.try_get_raw(idx)?.is_null() {
            Value::Null
        } else {
            decode_value(row, idx)
        };
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

fn decode_value(row: &SqliteRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return Value::String(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
        return Value::String(String::from_utf8_lossy(&v).into_owned());
    }
    Value::Null
}
