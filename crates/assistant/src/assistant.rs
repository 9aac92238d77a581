//! Question-answering facade over the workflow graph.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    config::WorkflowConfig,
    metrics,
    workflow::{
        build_question_graph,
        router::{END_MAX_ITERATIONS, GENERATE_ANSWER, GENERATE_FUNNY_RESPONSE},
        AssistantContext, ExecutionTrace, QuestionGraph, WorkflowState,
    },
    Error, Result,
};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The question was answered (or its failure explained) in prose.
    Answered,
    /// The question was judged unrelated to the schema.
    Declined,
    /// Every attempt failed and the retry ceiling was reached.
    GaveUp,
}

impl RunOutcome {
    fn from_terminal(node: &str) -> Option<Self> {
        match node {
            GENERATE_ANSWER => Some(RunOutcome::Answered),
            GENERATE_FUNNY_RESPONSE => Some(RunOutcome::Declined),
            END_MAX_ITERATIONS => Some(RunOutcome::GaveUp),
            _ => None,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Answered => write!(f, "answered"),
            RunOutcome::Declined => write!(f, "declined"),
            RunOutcome::GaveUp => write!(f, "gave_up"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub state: WorkflowState,
    pub outcome: RunOutcome,
    pub trace: ExecutionTrace,
}

pub struct Assistant {
    graph: QuestionGraph,
    context: AssistantContext,
}

impl Assistant {
    pub fn new(context: AssistantContext, config: &WorkflowConfig) -> Result<Self> {
        Ok(Self {
            graph: build_question_graph(config)?,
            context,
        })
    }

    pub fn context(&self) -> &AssistantContext {
        &self.context
    }

    pub fn schema(&self) -> &str {
        &self.context.schema
    }

    /// Answer one question with a fresh state.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::Validation("question must not be empty".to_string()));
        }

        metrics::QUESTIONS_TOTAL.inc();
        info!("Answering question: {}", question);

        let (state, trace) = match self
            .graph
            .run_traced(&self.context, WorkflowState::new(question))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!("Workflow run failed: {}", e);
                metrics::RUN_OUTCOMES_TOTAL.with_label_values(&["failed"]).inc();
                return Err(e);
            }
        };

        let terminal = trace.terminal().unwrap_or_default();
        let outcome = RunOutcome::from_terminal(terminal).ok_or_else(|| {
            Error::Internal(format!("workflow ended on unexpected node {}", terminal))
        })?;

        let label = outcome.to_string();
        metrics::RUN_OUTCOMES_TOTAL
            .with_label_values(&[label.as_str()])
            .inc();
        info!(
            "Question {} after {} attempts ({} steps)",
            outcome,
            state.attempts,
            trace.steps()
        );

        Ok(Answer {
            state,
            outcome,
            trace,
        })
    }
}
