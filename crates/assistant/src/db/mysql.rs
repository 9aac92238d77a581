use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::{
    mysql::{MySqlPoolOptions, MySqlRow},
    types::{
        chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc},
        BigDecimal,
    },
    Column, MySql, Pool, Row as _, TypeInfo, ValueRef,
};
use tracing::{debug, error, info};

use crate::{
    db::{format_schema, is_read_query, Database, ExecutionOutcome, Row},
    Error, Result,
};

// information_schema columns come back as binary strings on some servers.
const SCHEMA_QUERY: &str = r#"
    SELECT CAST(c.TABLE_NAME AS CHAR) AS table_name,
           CAST(c.COLUMN_NAME AS CHAR) AS column_name,
           CAST(c.DATA_TYPE AS CHAR) AS data_type,
           CAST(c.COLUMN_KEY = 'PRI' AS SIGNED) AS is_primary
    FROM information_schema.columns c
    WHERE c.TABLE_SCHEMA = DATABASE()
    ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION
"#;

pub struct MySqlDatabase {
    pool: Pool<MySql>,
}

impl MySqlDatabase {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to MySQL database");

        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .map_err(|e| {
                error!("Failed to connect to MySQL: {}", e);
                Error::Sqlx(e)
            })?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Database for MySqlDatabase {
    async fn execute(&self, sql: &str) -> Result<ExecutionOutcome> {
        debug!("Executing SQL on MySQL: {}", sql);

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
        let rows = sqlx::query(SCHEMA_QUERY).fetch_all(&self.pool).await?;

        let columns = rows
            .iter()
            .map(|r| {
                Ok((
                    r.try_get::<String, _>("table_name")?,
                    r.try_get::<String, _>("column_name")?,
                    r.try_get::<String, _>("data_type")?,
                    r.try_get::<i64, _>("is_primary")? > 0,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(format_schema(
            columns
                .iter()
                .map(|(t, c, d, pk)| (t.as_str(), c.as_str(), d.as_str(), *pk)),
        ))
    }
}

fn row_to_json(row: &MySqlRow) -> Result<Row> {
    let mut map = Row::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let value = if row.try_get_raw(idx)?.is_null() {
            Value::Null
        } else {
            decode_value(row, idx, column.type_info().name())
        };
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

fn float(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

fn decode_value(row: &MySqlRow, idx: usize, type_name: &str) -> Value {
    if let Ok(v) = row.try_get::<bool, _>(idx) {
        return Value::Bool(v);
    }
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<u64, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f32, _>(idx) {
        return float(f64::from(v));
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return float(v);
    }
    if let Ok(v) = row.try_get::<BigDecimal, _>(idx) {
        let text = v.to_string();
        return Number::from_str(&text)
            .map(Value::Number)
            .unwrap_or(Value::String(text));
    }
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return Value::String(v);
    }
    if let Ok(v) = row.try_get::<DateTime<Utc>, _>(idx) {
        return Value::String(v.to_rfc3339());
    }
    if let Ok(v) = row.try_get::<NaiveDateTime, _>(idx) {
        return Value::String(v.to_string());
    }
    if let Ok(v) = row.try_get::<NaiveDate, _>(idx) {
        return Value::String(v.to_string());
    }
    if let Ok(v) = row.try_get::<NaiveTime, _>(idx) {
        return Value::String(v.to_string());
    }
    if let Ok(v) = row.try_get::<Value, _>(idx) {
        return v;
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
        return Value::String(String::from_utf8_lossy(&v).into_owned());
    }
    Value::String(format!("<{}>", type_name))
}

