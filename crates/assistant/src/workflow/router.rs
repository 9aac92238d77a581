//! Node names and routing decisions of the question workflow.

use crate::workflow::{engine::RouteLabel, WorkflowState};

pub const CHECK_RELEVANCE: &str = "check_relevance";
pub const CONVERT_TO_SQL: &str = "convert_to_sql";
pub const EXECUTE_SQL: &str = "execute_sql";
pub const GENERATE_ANSWER: &str = "generate_human_readable_answer";
pub const GENERATE_FUNNY_RESPONSE: &str = "generate_funny_response";
pub const REGENERATE_QUERY: &str = "regenerate_query";
pub const END_MAX_ITERATIONS: &str = "end_max_iterations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelevanceRoute {
    ConvertToSql,
    Decline,
}

impl RouteLabel for RelevanceRoute {
    fn variants() -> &'static [Self] {
        &[RelevanceRoute::ConvertToSql, RelevanceRoute::Decline]
    }

    fn as_str(&self) -> &'static str {
        match self {
            RelevanceRoute::ConvertToSql => "convert_to_sql",
            RelevanceRoute::Decline => "decline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionRoute {
    Answer,
    Regenerate,
}

impl RouteLabel for ExecutionRoute {
    fn variants() -> &'static [Self] {
        &[ExecutionRoute::Answer, ExecutionRoute::Regenerate]
    }

    fn as_str(&self) -> &'static str {
        match self {
            ExecutionRoute::Answer => "answer",
            ExecutionRoute::Regenerate => "regenerate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptsRoute {
    Retry,
    GiveUp,
}

impl RouteLabel for AttemptsRoute {
    fn variants() -> &'static [Self] {
        &[AttemptsRoute::Retry, AttemptsRoute::GiveUp]
    }

    fn as_str(&self) -> &'static str {
        match self {
            AttemptsRoute::Retry => "retry",
            AttemptsRoute::GiveUp => "give_up",
        }
    }
}

pub fn relevance_router(state: &WorkflowState) -> RelevanceRoute {
    if state.is_relevant() {
        RelevanceRoute::ConvertToSql
    } else {
        RelevanceRoute::Decline
    }
}

pub fn execute_sql_router(state: &WorkflowState) -> ExecutionRoute {
    if state.sql_error {
        ExecutionRoute::Regenerate
    } else {
        ExecutionRoute::Answer
    }
}

/// Retry while fewer than `max_attempts` reformulations have happened.
pub fn check_attempts_router(max_attempts: u32) -> impl Fn(&WorkflowState) -> AttemptsRoute + Send + Sync + 'static {
    move |state: &WorkflowState| {
        if state.attempts < max_attempts {
            AttemptsRoute::Retry
        } else {
            AttemptsRoute::GiveUp
        }
    }
}
