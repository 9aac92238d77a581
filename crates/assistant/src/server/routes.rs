use std::sync::Arc;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    db::Row,
    metrics::gather_metrics,
    workflow::Relevance,
    Answer, Assistant, Error, RunOutcome,
};

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    /// Final phrasing of the question, after any reformulation.
    pub question: String,
    pub sql_query: String,
    pub query_result: String,
    pub query_rows: Vec<Row>,
    pub attempts: u32,
    pub relevance: Option<Relevance>,
    pub sql_error: bool,
    pub steps: Vec<String>,
}

impl From<Answer> for AskResponse {
    fn from(answer: Answer) -> Self {
        let Answer {
            state,
            outcome,
            trace,
        } = answer;

        Self {
            run_id: trace.run_id,
            outcome,
            question: state.question,
            sql_query: state.sql_query,
            query_result: state.query_result,
            query_rows: state.query_rows,
            attempts: state.attempts,
            relevance: state.relevance,
            sql_error: state.sql_error,
            steps: trace.visited,
        }
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn schema(State(assistant): State<Arc<Assistant>>) -> String {
    assistant.schema().to_string()
}

pub async fn ask(
    State(assistant): State<Arc<Assistant>>,
    Json(request): Json<AskRequest>,
) -> Response {
    info!("Received question: {}", request.question);

    match assistant.ask(&request.question).await {
        Ok(answer) => (StatusCode::OK, Json(AskResponse::from(answer))).into_response(),
        Err(Error::Validation(message)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
        Err(e) => {
            error!("Failed to answer question: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

pub async fn metrics() -> String {
    gather_metrics()
}
