mod config;
mod factory;
mod mysql;
mod postgres;
mod sqlite;

pub use config::{DatabaseConfig, DatabaseType};
pub use factory::connect;
pub use mysql::MySqlDatabase;
pub use postgres::PostgresDatabase;
pub use sqlite::SqliteDatabase;

use async_trait::async_trait;
use serde_json::{Map, Value};

/// A fetched row, keyed by column name.
pub type Row = Map<String, Value>;

/// Result of running one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// A read query; rows in fetch order.
    Rows(Vec<Row>),
    /// A write or DDL statement whose transaction was committed.
    Committed { rows_affected: u64 },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute `sql` inside its own transaction. Read queries are never
    /// committed; other statements are committed before returning.
    async fn execute(&self, sql: &str) -> crate::Result<ExecutionOutcome>;

    /// Describe tables and columns as plain text for prompts.
    async fn describe_schema(&self) -> crate::Result<String>;
}

/// Whether `sql` lexically starts with a case-insensitive `select`.
pub fn is_read_query(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .map(|head| head.eq_ignore_ascii_case("select"))
        .unwrap_or(false)
}

/// Format introspected `(table, column, type, primary key)` tuples.
pub(crate) fn format_schema<'a, I>(columns: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str, &'a str, bool)>,
{
    let mut schema = String::new();
    let mut current_table: Option<&str> = None;

    for (table, column, data_type, primary_key) in columns {
        if current_table != Some(table) {
            if current_table.is_some() {
                schema.push('\n');
            }
            schema.push_str(&format!("Table: {}\nColumns:\n", table));
            current_table = Some(table);
        }
        let data_type = if data_type.is_empty() { "ANY" } else { data_type };
        if primary_key {
            schema.push_str(&format!("- {} ({}, primary key)\n", column, data_type));
        } else {
            schema.push_str(&format!("- {} ({})\n", column, data_type));
        }
    }

    schema
}
