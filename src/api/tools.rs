//! JSON surface over the tool dispatcher.
//!
//! Known tools always answer 200 with `{"result": "..."}`; failures are part
//! of the result text.

use crate::tools::{find_tool, tool_definitions, ToolDefinition, ToolDispatcher};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Shared state for the tool endpoints
#[derive(Clone)]
pub struct ToolAppState {
    pub dispatcher: ToolDispatcher,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
pub struct ToolResult {
    pub result: String,
}

/// Create the tool router
pub fn create_tool_router(state: ToolAppState) -> Router {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/:name", post(call_tool))
        .with_state(Arc::new(state))
}

/// GET /tools
async fn list_tools() -> Json<&'static [ToolDefinition]> {
    Json(tool_definitions())
}

/// POST /tools/:name
async fn call_tool(
    State(state): State<Arc<ToolAppState>>,
    Path(name): Path<String>,
    Json(arguments): Json<Value>,
) -> Response {
    if find_tool(&name).is_none() {
        debug!(tool = %name, "Unknown tool requested");
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Unknown tool '{}'.", name),
            }),
        )
            .into_response();
    }

    let result = state.dispatcher.call(&name, &arguments).await;
    Json(ToolResult { result }).into_response()
}
