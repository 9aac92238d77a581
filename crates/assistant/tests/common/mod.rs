#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use askdb_assistant::{
    config::WorkflowConfig,
    db::{Database, SqliteDatabase},
    llm::{ReasoningService, SummaryFraming},
    workflow::{AssistantContext, Relevance},
    Assistant, Error, Result,
};

/// Summaries are echoed back in this form so tests can see what was passed.
pub fn summary_of(framing: SummaryFraming, result: &str) -> String {
    format!("[{}] {}", framing, result)
}

pub const DECLINE_REPLY: &str = "I only know about employees, sorry!";

/// Reasoning service replaying canned replies.
pub struct ScriptedReasoner {
    relevance: Relevance,
    sql: Mutex<VecDeque<String>>,
    fallback_sql: String,
    fail_summary: bool,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedReasoner {
    pub fn relevant(sql: &[&str]) -> Self {
        Self {
            relevance: Relevance::Relevant,
            sql: Mutex::new(sql.iter().map(|s| s.to_string()).collect()),
            fallback_sql: "SELECT broken FROM nowhere".to_string(),
            fail_summary: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn not_relevant() -> Self {
        Self {
            relevance: Relevance::NotRelevant,
            ..Self::relevant(&[])
        }
    }

    pub fn failing_summary(mut self) -> Self {
        self.fail_summary = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoner {
    async fn classify(&self, question: &str, _schema: &str) -> Result<Relevance> {
        self.record(format!("classify:{}", question));
        Ok(self.relevance)
    }

    async fn generate_sql(&self, question: &str, _schema: &str) -> Result<String> {
        self.record(format!("generate_sql:{}", question));
        let next = self.sql.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback_sql.clone()))
    }

    async fn summarize(&self, framing: SummaryFraming, _sql: &str, result: &str) -> Result<String> {
        self.record(format!("summarize:{}", framing));
        if self.fail_summary {
            return Err(Error::Reasoning("provider unavailable".to_string()));
        }
        Ok(summary_of(framing, result))
    }

    async fn decline(&self) -> Result<String> {
        self.record("decline");
        Ok(DECLINE_REPLY.to_string())
    }

    async fn reformulate(&self, question: &str) -> Result<String> {
        self.record("reformulate");
        Ok(format!("{} (rephrased)", question))
    }
}

/// In-memory SQLite database with five employees.
pub async fn seeded_database() -> Arc<SqliteDatabase> {
    let db = SqliteDatabase::new(":memory:", 1)
        .await
        .expect("Failed to open in-memory database");

    sqlx::query(
        "CREATE TABLE employees (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            salary REAL NOT NULL
        )",
    )
    .execute(db.pool())
    .await
    .expect("Failed to create employees table");

    sqlx::query(
        "INSERT INTO employees (name, department, salary) VALUES
            ('Ada', 'Engineering', 120000.0),
            ('Grace', 'Engineering', 115000.0),
            ('Linus', 'Operations', 90000.0),
            ('Barbara', 'Research', 105000.0),
            ('Ken', 'Operations', 88000.0)",
    )
    .execute(db.pool())
    .await
    .expect("Failed to seed employees");

    Arc::new(db)
}

pub async fn assistant_with(
    reasoner: Arc<ScriptedReasoner>,
    database: Arc<SqliteDatabase>,
    max_attempts: u32,
) -> Assistant {
    let database: Arc<dyn Database> = database;
    let context = AssistantContext::from_database(reasoner, database)
        .await
        .expect("Failed to capture schema");
    let config = WorkflowConfig {
        max_attempts,
        step_limit: None,
    };
    Assistant::new(context, &config).expect("Failed to build assistant")
}
