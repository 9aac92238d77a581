//! Wiring of the question-answering workflow.

use crate::{
    config::WorkflowConfig,
    workflow::{
        router::{
            check_attempts_router, execute_sql_router, relevance_router, AttemptsRoute,
            ExecutionRoute, RelevanceRoute, CHECK_RELEVANCE, CONVERT_TO_SQL, END_MAX_ITERATIONS,
            EXECUTE_SQL, GENERATE_ANSWER, GENERATE_FUNNY_RESPONSE, REGENERATE_QUERY,
        },
        steps::{
            CheckRelevance, ConvertToSql, Decline, EndMaxIterations, ExecuteSql, RegenerateQuery,
            SummarizeAnswer,
        },
        AssistantContext, WorkflowGraph, WorkflowState,
    },
    Error, Result,
};

pub type QuestionGraph = WorkflowGraph<WorkflowState, AssistantContext>;

/// Most steps a run can take with the given retry ceiling: the relevance
/// check, a convert/execute/reformulate cycle per attempt, then the give-up
/// node.
pub fn max_steps(max_attempts: u32) -> usize {
    3 * max_attempts as usize + 2
}

pub fn build_question_graph(config: &WorkflowConfig) -> Result<QuestionGraph> {
    if config.max_attempts == 0 {
        return Err(Error::Config("max_attempts must be at least 1".to_string()));
    }

    let mut graph = match config.step_limit {
        Some(limit) => QuestionGraph::new().with_step_limit(limit),
        None => QuestionGraph::new(),
    };

    graph
        .register_node(CHECK_RELEVANCE, CheckRelevance)?
        .register_node(CONVERT_TO_SQL, ConvertToSql)?
        .register_node(EXECUTE_SQL, ExecuteSql)?
        .register_node(GENERATE_ANSWER, SummarizeAnswer)?
        .register_node(GENERATE_FUNNY_RESPONSE, Decline)?
        .register_node(REGENERATE_QUERY, RegenerateQuery)?
        .register_node(END_MAX_ITERATIONS, EndMaxIterations)?;

    graph
        .add_conditional_edges(
            CHECK_RELEVANCE,
            relevance_router,
            [
                (RelevanceRoute::ConvertToSql, CONVERT_TO_SQL),
                (RelevanceRoute::Decline, GENERATE_FUNNY_RESPONSE),
            ],
        )?
        .add_edge(CONVERT_TO_SQL, EXECUTE_SQL)?
        .add_conditional_edges(
            EXECUTE_SQL,
            execute_sql_router,
            [
                (ExecutionRoute::Answer, GENERATE_ANSWER),
                (ExecutionRoute::Regenerate, REGENERATE_QUERY),
            ],
        )?
        .add_conditional_edges(
            REGENERATE_QUERY,
            check_attempts_router(config.max_attempts),
            [
                (AttemptsRoute::Retry, CONVERT_TO_SQL),
                (AttemptsRoute::GiveUp, END_MAX_ITERATIONS),
            ],
        )?
        .set_entry(CHECK_RELEVANCE)?;

    Ok(graph)
}
