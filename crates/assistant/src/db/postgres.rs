use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    types::{
        chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc},
        BigDecimal, Uuid,
    },
    Column, Pool, Postgres, Row as _, TypeInfo, ValueRef,
};
use tracing::{debug, error, info};

use crate::{
    db::{format_schema, is_read_query, Database, ExecutionOutcome, Row},
    Error, Result,
};

pub struct PostgresDatabase {
    pool: Pool<Postgres>,
}

impl PostgresDatabase {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to PostgreSQL database");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .map_err(|e| {
                error!("Failed to connect to PostgreSQL: {}", e);
                Error::Sqlx(e)
            })?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn execute(&self, sql: &str) -> Result<ExecutionOutcome> {
        debug!("Executing SQL on PostgreSQL: {}", sql);

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
            SELECT c.table_name::text AS table_name,
                   c.column_name::text AS column_name,
                   c.data_type::text AS data_type,
                   EXISTS (
                       SELECT 1
                       FROM information_schema.table_constraints tc
                       JOIN information_schema.key_column_usage k
                         ON tc.constraint_name = k.constraint_name
                        AND tc.table_schema = k.table_schema
                       WHERE tc.constraint_type = 'PRIMARY KEY'
                         AND k.table_schema = c.table_schema
                         AND k.table_name = c.table_name
                         AND k.column_name = c.column_name
                   ) AS is_primary
            FROM information_schema.columns c
            WHERE c.table_schema = 'public'
            ORDER BY c.table_name, c.ordinal_position
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
                    r.get::<bool, _>("is_primary"),
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

fn row_to_json(row: &PgRow) -> Result<Row> {
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

fn decode_value(row: &PgRow, idx: usize, type_name: &str) -> Value {
    if let Ok(v) = row.try_get::<bool, _>(idx) {
        return Value::Bool(v);
    }
    if let Ok(v) = row.try_get::<i16, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<i32, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<i64, _>(idx) {
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
    if let Ok(v) = row.try_get::<Uuid, _>(idx) {
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
