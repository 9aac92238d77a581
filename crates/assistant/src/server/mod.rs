mod routes;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{Assistant, Result};

pub use routes::{AskRequest, AskResponse};

pub struct Server {
    assistant: Arc<Assistant>,
}

impl Server {
    pub fn new(assistant: Arc<Assistant>) -> Self {
        Self { assistant }
    }

    pub fn build_router(self) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            .route("/schema", get(routes::schema))
            .route("/ask", post(routes::ask))
            .route("/metrics", get(routes::metrics))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(self.assistant)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }
}
