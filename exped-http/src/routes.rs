use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use exped_core::PendingForm;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    token: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub ok: bool,
    pub updated: Vec<String>,
}

pub async fn fetch_handler(
    State(state): State<AppState>,
    query: Result<Query<FetchQuery>, QueryRejection>,
) -> Result<Json<PendingForm>, AppError> {
    let Query(query) = query.map_err(|e| AppError::MalformedRequest(e.body_text()))?;
    let token = query.token.unwrap_or_default();

    let form = state.service.fetch_pending(&token, Utc::now()).await?;
    Ok(Json(form))
}

pub async fn submit_handler(
    State(state): State<AppState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::MalformedRequest(e.body_text()))?;
    let token = token_text(req.token.as_ref());

    let outcome = state
        .service
        .submit(&token, req.data.as_ref(), Utc::now())
        .await?;

    Ok(Json(SubmitResponse {
        ok: true,
        updated: outcome.updated,
    }))
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

pub async fn healthz() -> &'static str {
    "ok"
}

// Numeric tokens are accepted as their decimal text; anything else is missing.
fn token_text(token: Option<&Value>) -> String {
    match token {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
