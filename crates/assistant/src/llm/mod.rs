//! Reasoning layer: LLM providers, prompt templates and the
//! [`ReasoningService`] seam the workflow steps call into.

pub mod prompts;
pub mod provider;
pub mod reasoner;

pub use provider::{create_provider, LLMConfig, LLMProvider, MockProvider, SUPPORTED_PROVIDERS};
pub use reasoner::{extract_sql, LlmReasoner, ReasoningService, SummaryFraming};

#[cfg(test)]
pub use reasoner::MockReasoningService;
