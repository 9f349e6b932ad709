//! Route modules for Margin Server

pub mod analysis;
pub mod analyze;
pub mod files;
pub mod health;
pub mod notes;
pub mod text;
pub mod usage;

use axum::{extract::FromRequestParts, http::request::Parts, Router};

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the caller's identity, set by the authenticating proxy
pub const USER_ID_HEADER: &str = "x-user-id";

/// Build the full application router
pub fn app_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(analyze::router())
        .merge(text::router())
        .merge(usage::router())
        .nest("/api/files", files::router())
        .merge(notes::router())
        .merge(analysis::router())
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| UserId(value.to_string()))
            .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", USER_ID_HEADER)))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::analysis::MockProvider;
    use crate::config::Config;
    use crate::db::test_pool;
    use crate::state::AppState;
    use crate::storage::LocalBlobStore;

    /// Router over an in-memory database and a temporary blob root
    pub async fn test_app(dir: &tempfile::TempDir) -> (Router, AppState) {
        test_app_with(dir, MockProvider::new()).await
    }

    pub async fn test_app_with(dir: &tempfile::TempDir, provider: MockProvider) -> (Router, AppState) {
        let pool = test_pool().await;
        let state = AppState::new(
            Config::default(),
            pool,
            Arc::new(LocalBlobStore::new(dir.path())),
            Arc::new(provider),
        );
        (super::app_router().with_state(state.clone()), state)
    }

    pub fn json_request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(super::USER_ID_HEADER, user);
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    /// Send a request and decode the JSON response body
    pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}
