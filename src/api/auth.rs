//! Browser-facing authorization endpoints.
//!
//! 1. User opens GET /login (or /) and is redirected to Spotify's consent page
//! 2. Spotify redirects back to GET /callback?code=...
//! 3. The code is exchanged and the session id is shown for the user to copy

use crate::error::SessionError;
use crate::session::{AuthorizationFlow, MintedSession};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shared state for the authorization endpoints
#[derive(Clone)]
pub struct AuthAppState {
    pub flow: Arc<AuthorizationFlow>,
}

/// Callback query parameters
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Failures rendered as an HTML page
enum AppError {
    BadRequest(String),
    BadGateway(String),
    ServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Html(error_page(&message))).into_response()
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::AuthorizationDenied(_) | SessionError::VendorApi(_) => {
                AppError::BadGateway(err.to_string())
            }
            _ => AppError::ServerError(err.to_string()),
        }
    }
}

/// Create the login/callback router
pub fn create_auth_router(state: AuthAppState) -> Router {
    Router::new()
        .route("/", get(login))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .with_state(Arc::new(state))
}

/// GET /login
///
/// Redirects to the consent page. Nothing is stored until the callback.
async fn login(State(state): State<Arc<AuthAppState>>) -> Redirect {
    debug!("Login requested");
    Redirect::temporary(&state.flow.begin())
}

/// GET /callback
async fn callback(
    State(state): State<Arc<AuthAppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Html<String>, AppError> {
    if let Some(error) = params.error {
        let description = params
            .error_description
            .unwrap_or_else(|| "no description".to_string());
        warn!(error = %error, description = %description, "Authorization refused");
        return Err(AppError::BadRequest(format!(
            "Authorization failed: {} ({})",
            error, description
        )));
    }

    let code = params
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing 'code' parameter".to_string()))?;

    let minted = state.flow.complete(&code).await.map_err(|e| {
        error!(error = %e, "Authorization callback failed");
        AppError::from(e)
    })?;

    info!(
        session_id = %minted.session_id,
        reused = minted.reused,
        "Authorization completed"
    );
    Ok(Html(success_page(&minted)))
}

fn success_page(minted: &MintedSession) -> String {
    let name = escape_html(&minted.display_name);
    let id = escape_html(&minted.session_id);
    let intro = if minted.reused {
        "Welcome back"
    } else {
        "Authentication successful"
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Tunebridge</title></head>
<body>
<h1>{intro}, {name}!</h1>
<p>Your session ID is:</p>
<p><code>{id}</code></p>
<input type="text" value="{id}" readonly onclick="this.select()" size="40">
<p>Give this ID to your assistant when it asks for your Spotify session.</p>
</body>
</html>
"#
    )
}

fn error_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Tunebridge</title></head>
<body>
<h1>Authorization failed</h1>
<p>{}</p>
<p><a href="/login">Try again</a></p>
</body>
</html>
"#,
        escape_html(message)
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
