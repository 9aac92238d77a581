use std::fmt;

use serde::{Deserialize, Serialize};

use crate::db::Row;

/// Outcome of the relevance classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    Relevant,
    NotRelevant,
}

impl fmt::Display for Relevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relevance::Relevant => write!(f, "relevant"),
            Relevance::NotRelevant => write!(f, "not_relevant"),
        }
    }
}

impl From<&str> for Relevance {
    /// Lenient parse of a classifier reply. Anything that is not clearly
    /// "relevant" counts as not relevant.
    fn from(s: &str) -> Self {
        let normalized = s
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
            .to_lowercase()
            .replace([' ', '-'], "_");

        if normalized.contains("not_relevant") || normalized.contains("irrelevant") {
            Relevance::NotRelevant
        } else if normalized.contains("relevant") {
            Relevance::Relevant
        } else {
            Relevance::NotRelevant
        }
    }
}

/// Record threaded through every node of the question workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Latest phrasing of the question. Reformulation overwrites it.
    pub question: String,
    /// Most recently generated SQL, empty until generation runs.
    pub sql_query: String,
    /// Human-facing message from whichever step produced one last.
    pub query_result: String,
    /// Rows of the last successful read query.
    pub query_rows: Vec<Row>,
    /// Number of reformulation cycles performed.
    pub attempts: u32,
    pub relevance: Option<Relevance>,
    /// True iff the most recent execution failed.
    pub sql_error: bool,
}

impl WorkflowState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn is_relevant(&self) -> bool {
        self.relevance == Some(Relevance::Relevant)
    }
}
