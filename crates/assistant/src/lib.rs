pub mod assistant;
pub mod config;
pub mod db;
pub mod llm;
pub mod metrics;
#[cfg(feature = "server")]
pub mod server;
pub mod template;
pub mod workflow;

use thiserror::Error;

pub use assistant::{Answer, Assistant, RunOutcome};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Node already registered: {0}")]
    DuplicateNode(String),
    #[error("Unknown node: {0}")]
    UnknownNode(String),
    #[error("Router on node {node} produced unmapped label: {label}")]
    UnknownLabel { node: String, label: String },
    #[error("Workflow exceeded step limit of {0}")]
    StepLimitExceeded(usize),
    #[error("Reasoning service error: {0}")]
    Reasoning(String),
    #[error("Template error: {0}")]
    Template(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_label_names_node_and_label() {
        let err = Error::UnknownLabel {
            node: "execute_sql".to_string(),
            label: "retry".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Router on node execute_sql produced unmapped label: retry"
        );
    }
}
