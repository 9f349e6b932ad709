//! AI usage endpoint

use axum::{extract::State, routing::get, Json, Router};

use super::UserId;
use crate::analysis::AiUsage;
use crate::error::Result;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/usage", get(get_usage))
}

async fn get_usage(State(state): State<AppState>, UserId(user_id): UserId) -> Result<Json<AiUsage>> {
    Ok(Json(state.analysis().usage(&user_id).await?))
}
