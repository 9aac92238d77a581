use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use crate::{
    llm::{prompts, LLMProvider},
    template::PromptTemplates,
    workflow::Relevance,
    Error, Result,
};

lazy_static! {
    static ref SQL_FENCE: Regex =
        Regex::new(r"(?is)```(?:sql)?\s*(.*?)\s*```").expect("valid SQL fence regex");
}

/// How the summary of an execution should be framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryFraming {
    /// The statement failed; explain the problem.
    Error,
    /// A read query returned no rows.
    EmptyResult,
    /// A read query returned rows.
    Rows,
    /// A write statement succeeded.
    Confirmation,
}

impl SummaryFraming {
    fn instruction(&self) -> &'static str {
        match self {
            SummaryFraming::Error => {
                "Formulate a clear and understandable error message in a single sentence."
            }
            SummaryFraming::EmptyResult => {
                "No rows matched. Explain clearly that there is no matching data for the original question."
            }
            SummaryFraming::Rows => {
                "Formulate a clear and understandable answer to the original question in detail."
            }
            SummaryFraming::Confirmation => {
                "Formulate a clear and understandable confirmation message in detail."
            }
        }
    }
}

impl fmt::Display for SummaryFraming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryFraming::Error => write!(f, "error"),
            SummaryFraming::EmptyResult => write!(f, "empty_result"),
            SummaryFraming::Rows => write!(f, "rows"),
            SummaryFraming::Confirmation => write!(f, "confirmation"),
        }
    }
}

/// Reasoning operations the question workflow relies on.
///
/// Every failure is fatal for the current run; steps do not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn classify(&self, question: &str, schema: &str) -> Result<Relevance>;
    async fn generate_sql(&self, question: &str, schema: &str) -> Result<String>;
    /// `result` is the serialized rows, or the error message for
    /// [`SummaryFraming::Error`].
    async fn summarize(&self, framing: SummaryFraming, sql: &str, result: &str) -> Result<String>;
    async fn decline(&self) -> Result<String>;
    async fn reformulate(&self, question: &str) -> Result<String>;
}

/// [`ReasoningService`] backed by an [`LLMProvider`] and Tera prompts.
pub struct LlmReasoner {
    provider: Arc<dyn LLMProvider>,
    templates: PromptTemplates,
}

impl LlmReasoner {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Result<Self> {
        Ok(Self {
            provider,
            templates: PromptTemplates::new(prompts::TEMPLATES)?,
        })
    }

    async fn ask(&self, system: &str, user: &str, context: serde_json::Value) -> Result<String> {
        let system = self.templates.render(system, &context)?;
        let user = self.templates.render(user, &context)?;
        debug!("Prompting LLM: {}", user);

        let reply = self.provider.complete(&system, &user).await.map_err(|e| {
            error!("LLM request failed: {:#}", e);
            Error::Reasoning(e.to_string())
        })?;

        debug!("LLM replied: {}", reply);
        Ok(reply.trim().to_string())
    }
}

#[async_trait]
impl ReasoningService for LlmReasoner {
    async fn classify(&self, question: &str, schema: &str) -> Result<Relevance> {
        let reply = self
            .ask(
                prompts::RELEVANCE_SYSTEM,
                prompts::RELEVANCE_USER,
                json!({ "question": question, "schema": schema }),
            )
            .await?;
        Ok(Relevance::from(reply.as_str()))
    }

    async fn generate_sql(&self, question: &str, schema: &str) -> Result<String> {
        let reply = self
            .ask(
                prompts::SQL_SYSTEM,
                prompts::SQL_USER,
                json!({ "question": question, "schema": schema }),
            )
            .await?;
        Ok(extract_sql(&reply))
    }

    async fn summarize(&self, framing: SummaryFraming, sql: &str, result: &str) -> Result<String> {
        self.ask(
            prompts::SUMMARY_SYSTEM,
            prompts::SUMMARY_USER,
            json!({ "sql": sql, "result": result, "instruction": framing.instruction() }),
        )
        .await
    }

    async fn decline(&self) -> Result<String> {
        self.ask(prompts::DECLINE_SYSTEM, prompts::DECLINE_USER, json!({}))
            .await
    }

    async fn reformulate(&self, question: &str) -> Result<String> {
        self.ask(
            prompts::REFORMULATE_SYSTEM,
            prompts::REFORMULATE_USER,
            json!({ "question": question }),
        )
        .await
    }
}

/// Pull the statement out of a model reply: unwrap a markdown code fence if
/// present and drop trailing semicolons.
pub fn extract_sql(reply: &str) -> String {
    let body = SQL_FENCE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply);

    body.trim().trim_end_matches(';').trim_end().to_string()
}
