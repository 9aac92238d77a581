use std::sync::Arc;

use crate::{db::Database, llm::ReasoningService, Result};

/// Read-only collaborators shared by every step of a run.
#[derive(Clone)]
pub struct AssistantContext {
    pub reasoner: Arc<dyn ReasoningService>,
    pub database: Arc<dyn Database>,
    /// Schema description used verbatim inside prompts.
    pub schema: Arc<str>,
}

impl AssistantContext {
    pub fn new(
        reasoner: Arc<dyn ReasoningService>,
        database: Arc<dyn Database>,
        schema: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            reasoner,
            database,
            schema: schema.into(),
        }
    }

    /// Capture the schema from the database once, up front.
    pub async fn from_database(
        reasoner: Arc<dyn ReasoningService>,
        database: Arc<dyn Database>,
    ) -> Result<Self> {
        let schema = database.describe_schema().await?;
        Ok(Self::new(reasoner, database, schema))
    }
}
