//! Step implementations of the question workflow.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    db::{is_read_query, ExecutionOutcome},
    llm::SummaryFraming,
    metrics,
    workflow::{engine::Step, AssistantContext, WorkflowState},
    Error, Result,
};

pub const NO_RESULTS: &str = "No results found";
pub const ACTION_COMPLETED: &str = "The action has been successfully completed.";
pub const TRY_AGAIN: &str = "Please try again.";

/// Classify the question against the schema.
pub struct CheckRelevance;

#[async_trait]
impl Step<WorkflowState, AssistantContext> for CheckRelevance {
    async fn run(&self, mut state: WorkflowState, ctx: &AssistantContext) -> Result<WorkflowState> {
        let relevance = ctx.reasoner.classify(&state.question, &ctx.schema).await?;
        info!("Question classified as {}", relevance);
        state.relevance = Some(relevance);
        Ok(state)
    }
}

/// Translate the current question into a SQL statement.
pub struct ConvertToSql;

#[async_trait]
impl Step<WorkflowState, AssistantContext> for ConvertToSql {
    async fn run(&self, mut state: WorkflowState, ctx: &AssistantContext) -> Result<WorkflowState> {
        let sql = ctx.reasoner.generate_sql(&state.question, &ctx.schema).await?;
        info!("Generated SQL: {}", sql);
        state.sql_query = sql;
        Ok(state)
    }
}

/// Run the generated statement. Database failures are recorded in the state
/// and never returned as errors.
pub struct ExecuteSql;

#[async_trait]
impl Step<WorkflowState, AssistantContext> for ExecuteSql {
    async fn run(&self, mut state: WorkflowState, ctx: &AssistantContext) -> Result<WorkflowState> {
        let outcome = ctx.database.execute(state.sql_query.trim()).await;

        match outcome {
            Ok(ExecutionOutcome::Rows(rows)) => {
                info!("Query returned {} rows", rows.len());
                state.query_result = if rows.is_empty() {
                    NO_RESULTS.to_string()
                } else {
                    format!("{} rows found.", rows.len())
                };
                state.query_rows = rows;
                state.sql_error = false;
            }
            Ok(ExecutionOutcome::Committed { rows_affected }) => {
                info!("Statement committed, {} rows affected", rows_affected);
                state.query_result = ACTION_COMPLETED.to_string();
                state.sql_error = false;
            }
            Err(e) => {
                let detail = match e {
                    Error::Sqlx(inner) => inner.to_string(),
                    other => other.to_string(),
                };
                warn!("SQL execution failed: {}", detail);
                metrics::SQL_ERRORS_TOTAL.inc();
                state.query_result = format!("Error executing SQL query: {}", detail);
                state.query_rows.clear();
                state.sql_error = true;
            }
        }

        Ok(state)
    }
}

/// Turn the execution outcome into prose. Reads rows only; never re-executes.
pub struct SummarizeAnswer;

impl SummarizeAnswer {
    fn framing(state: &WorkflowState) -> SummaryFraming {
        if state.sql_error {
            SummaryFraming::Error
        } else if !is_read_query(&state.sql_query) {
            SummaryFraming::Confirmation
        } else if state.query_rows.is_empty() {
            SummaryFraming::EmptyResult
        } else {
            SummaryFraming::Rows
        }
    }
}

#[async_trait]
impl Step<WorkflowState, AssistantContext> for SummarizeAnswer {
    async fn run(&self, mut state: WorkflowState, ctx: &AssistantContext) -> Result<WorkflowState> {
        let framing = Self::framing(&state);
        let result = match framing {
            SummaryFraming::Error | SummaryFraming::Confirmation => state.query_result.clone(),
            SummaryFraming::EmptyResult | SummaryFraming::Rows => {
                serde_json::to_string(&state.query_rows)?
            }
        };

        info!("Summarizing result ({})", framing);
        state.query_result = ctx
            .reasoner
            .summarize(framing, &state.sql_query, &result)
            .await?;
        Ok(state)
    }
}

/// Politely decline an irrelevant question.
pub struct Decline;

#[async_trait]
impl Step<WorkflowState, AssistantContext> for Decline {
    async fn run(&self, mut state: WorkflowState, ctx: &AssistantContext) -> Result<WorkflowState> {
        state.query_result = ctx.reasoner.decline().await?;
        Ok(state)
    }
}

/// Rephrase the question after a failed execution and count the attempt.
pub struct RegenerateQuery;

#[async_trait]
impl Step<WorkflowState, AssistantContext> for RegenerateQuery {
    async fn run(&self, mut state: WorkflowState, ctx: &AssistantContext) -> Result<WorkflowState> {
        let rewritten = ctx.reasoner.reformulate(&state.question).await?;
        state.question = rewritten;
        state.attempts += 1;
        metrics::QUERY_REGENERATIONS_TOTAL.inc();
        info!("Question reformulated (attempt {}): {}", state.attempts, state.question);
        Ok(state)
    }
}

/// Give up once the retry ceiling is reached.
pub struct EndMaxIterations;

#[async_trait]
impl Step<WorkflowState, AssistantContext> for EndMaxIterations {
    async fn run(&self, mut state: WorkflowState, _ctx: &AssistantContext) -> Result<WorkflowState> {
        warn!("Giving up after {} attempts", state.attempts);
        state.query_result = TRY_AGAIN.to_string();
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MockDatabase, Row};
    use crate::llm::MockReasoningService;
    use crate::workflow::Relevance;
    use serde_json::json;
    use std::sync::Arc;

    fn context(reasoner: MockReasoningService, database: MockDatabase) -> AssistantContext {
        AssistantContext::new(Arc::new(reasoner), Arc::new(database), "Table: employees")
    }

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn database_returning(outcome: Result<ExecutionOutcome>) -> MockDatabase {
        let mut database = MockDatabase::new();
        let mut outcome = Some(outcome);
        database
            .expect_execute()
            .times(1)
            .returning(move |_| outcome.take().unwrap());
        database
    }

    #[tokio::test]
    async fn test_check_relevance_sets_flag() {
        let mut reasoner = MockReasoningService::new();
        reasoner.expect_classify().times(1).returning(|question, schema| {
            assert_eq!(question, "How many employees are there?");
            assert_eq!(schema, "Table: employees");
            Ok(Relevance::Relevant)
        });
        let ctx = context(reasoner, MockDatabase::new());

        let state = CheckRelevance
            .run(WorkflowState::new("How many employees are there?"), &ctx)
            .await
            .unwrap();
        assert_eq!(state.relevance, Some(Relevance::Relevant));
    }

    #[tokio::test]
    async fn test_check_relevance_propagates_service_failure() {
        let mut reasoner = MockReasoningService::new();
        reasoner
            .expect_classify()
            .returning(|_, _| Err(Error::Reasoning("timeout".to_string())));
        let ctx = context(reasoner, MockDatabase::new());

        let err = CheckRelevance.run(WorkflowState::new("q"), &ctx).await.err().unwrap();
        assert!(matches!(err, Error::Reasoning(_)));
    }

    #[tokio::test]
    async fn test_convert_to_sql_does_not_execute() {
        let mut reasoner = MockReasoningService::new();
        reasoner
            .expect_generate_sql()
            .returning(|_, _| Ok("SELECT COUNT(*) AS count FROM employees".to_string()));
        let mut database = MockDatabase::new();
        database.expect_execute().never();
        let ctx = context(reasoner, database);

        let state = ConvertToSql.run(WorkflowState::new("q"), &ctx).await.unwrap();
        assert_eq!(state.sql_query, "SELECT COUNT(*) AS count FROM employees");
        assert!(state.query_result.is_empty());
    }

    #[tokio::test]
    async fn test_execute_select_with_rows() {
        let database = database_returning(Ok(ExecutionOutcome::Rows(vec![row(json!({"count": 5}))])));
        let ctx = context(MockReasoningService::new(), database);

        let mut state = WorkflowState::new("q");
        state.sql_query = "SELECT COUNT(*) AS count FROM employees".to_string();
        state.sql_error = true;

        let state = ExecuteSql.run(state, &ctx).await.unwrap();
        assert_eq!(state.query_rows, vec![row(json!({"count": 5}))]);
        assert_eq!(state.query_result, "1 rows found.");
        assert!(!state.sql_error);
    }

    #[tokio::test]
    async fn test_execute_select_without_rows() {
        let database = database_returning(Ok(ExecutionOutcome::Rows(vec![])));
        let ctx = context(MockReasoningService::new(), database);

        let mut state = WorkflowState::new("q");
        state.sql_query = "SELECT * FROM employees WHERE 1 = 0".to_string();
        state.query_rows = vec![row(json!({"stale": true}))];

        let state = ExecuteSql.run(state, &ctx).await.unwrap();
        assert!(state.query_rows.is_empty());
        assert_eq!(state.query_result, NO_RESULTS);
        assert!(!state.sql_error);
    }

    #[tokio::test]
    async fn test_execute_write_leaves_rows_untouched() {
        let database = database_returning(Ok(ExecutionOutcome::Committed { rows_affected: 1 }));
        let ctx = context(MockReasoningService::new(), database);

        let mut state = WorkflowState::new("q");
        state.sql_query = "DELETE FROM employees WHERE id = 1".to_string();
        state.query_rows = vec![row(json!({"kept": 1}))];

        let state = ExecuteSql.run(state, &ctx).await.unwrap();
        assert_eq!(state.query_rows, vec![row(json!({"kept": 1}))]);
        assert_eq!(state.query_result, ACTION_COMPLETED);
        assert!(!state.sql_error);
    }

    #[tokio::test]
    async fn test_execute_failure_is_recorded_not_raised() {
        let database = database_returning(Err(Error::Sqlx(sqlx::Error::RowNotFound)));
        let ctx = context(MockReasoningService::new(), database);

        let mut state = WorkflowState::new("q");
        state.sql_query = "SELECT nope".to_string();

        let state = ExecuteSql.run(state, &ctx).await.unwrap();
        assert!(state.sql_error);
        assert!(state.query_result.starts_with("Error executing SQL query: "));
        assert!(!state.query_result.contains("SQLx error"));
    }

    #[tokio::test]
    async fn test_summarize_framing() {
        let mut state = WorkflowState::new("q");
        state.sql_query = "select name from employees".to_string();
        assert_eq!(SummarizeAnswer::framing(&state), SummaryFraming::EmptyResult);

        state.query_rows = vec![row(json!({"name": "Ada"}))];
        assert_eq!(SummarizeAnswer::framing(&state), SummaryFraming::Rows);

        state.sql_error = true;
        assert_eq!(SummarizeAnswer::framing(&state), SummaryFraming::Error);

        state.sql_error = false;
        state.sql_query = "UPDATE employees SET name = 'Ada'".to_string();
        assert_eq!(SummarizeAnswer::framing(&state), SummaryFraming::Confirmation);
    }

    #[tokio::test]
    async fn test_summarize_passes_rows_as_json() {
        let mut reasoner = MockReasoningService::new();
        reasoner
            .expect_summarize()
            .times(1)
            .returning(|framing, sql, result| {
                assert_eq!(framing, SummaryFraming::Rows);
                assert_eq!(sql, "SELECT COUNT(*) AS count FROM employees");
                assert_eq!(result, r#"[{"count":5}]"#);
                Ok("There are 5 employees.".to_string())
            });
        let mut database = MockDatabase::new();
        database.expect_execute().never();
        let ctx = context(reasoner, database);

        let mut state = WorkflowState::new("q");
        state.sql_query = "SELECT COUNT(*) AS count FROM employees".to_string();
        state.query_rows = vec![row(json!({"count": 5}))];

        let state = SummarizeAnswer.run(state, &ctx).await.unwrap();
        assert_eq!(state.query_result, "There are 5 employees.");
    }

    #[tokio::test]
    async fn test_regenerate_overwrites_question_and_counts() {
        let mut reasoner = MockReasoningService::new();
        reasoner
            .expect_reformulate()
            .returning(|question| Ok(format!("{} (precisely)", question)));
        let ctx = context(reasoner, MockDatabase::new());

        let mut state = WorkflowState::new("How many?");
        state.attempts = 1;

        let state = RegenerateQuery.run(state, &ctx).await.unwrap();
        assert_eq!(state.question, "How many? (precisely)");
        assert_eq!(state.attempts, 2);
    }

    #[tokio::test]
    async fn test_decline_and_give_up() {
        let mut reasoner = MockReasoningService::new();
        reasoner
            .expect_decline()
            .returning(|| Ok("Nice try!".to_string()));
        let ctx = context(reasoner, MockDatabase::new());

        let state = Decline.run(WorkflowState::new("q"), &ctx).await.unwrap();
        assert_eq!(state.query_result, "Nice try!");

        let state = EndMaxIterations.run(state, &ctx).await.unwrap();
        assert_eq!(state.query_result, TRY_AGAIN);
    }
}
