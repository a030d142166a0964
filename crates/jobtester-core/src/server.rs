//! Callback surface queried by the broadcaster.
//!
//! `GET /orchestrators` answers with the orchestrator endpoints the
//! broadcaster may route the current job to. Other methods get 405.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use crate::context::RunContext;
use crate::error::{TesterError, TesterResult};

/// One entry of the `/orchestrators` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorEndpoint {
    pub address: String,
}

pub fn router(context: Arc<RunContext>) -> Router {
    Router::new()
        .route("/orchestrators", get(list_orchestrators))
        .with_state(context)
}

async fn list_orchestrators(State(context): State<Arc<RunContext>>) -> Json<Vec<OrchestratorEndpoint>> {
    let endpoints = context
        .routable_endpoints()
        .into_iter()
        .map(|address| OrchestratorEndpoint { address })
        .collect();
    Json(endpoints)
}

pub async fn bind(addr: &str) -> TesterResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| TesterError::Server {
            message: format!("failed to bind {}: {}", addr, e),
        })
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    context: Arc<RunContext>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> TesterResult<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "callback server listening");
    }
    axum::serve(listener, router(context))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| TesterError::Server {
            message: e.to_string(),
        })?;
    info!("callback server stopped");
    Ok(())
}
