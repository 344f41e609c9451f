//! `POST /v1/update`: the JSON API route, per spec section 4.5.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::record::json::JsonUpdate;

use super::auth;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub zone: String,
    #[serde(default)]
    pub key: Option<String>,
    pub updates: Vec<JsonUpdate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuery {
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum UpdateResponse {
    Ok(Vec<(&'static str, JsonUpdate)>),
    Err { error: String },
}

pub async fn handle_update(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UpdateQuery>,
    headers: HeaderMap,
    Json(body): Json<UpdateRequest>,
) -> (StatusCode, Json<UpdateResponse>) {
    match run_update(&state, &headers, query, body).await {
        Ok(echoed) => (StatusCode::OK, Json(UpdateResponse::Ok(echoed))),
        Err(e) => {
            log::info!(target: "http", "update rejected: {e}");
            let (status, body) = e.to_http();
            (StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), Json(UpdateResponse::Err { error: body.message }))
        }
    }
}

async fn run_update(
    state: &AppState,
    headers: &HeaderMap,
    query: UpdateQuery,
    body: UpdateRequest,
) -> Result<Vec<(&'static str, JsonUpdate)>, Error> {
    let auth_header = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    let presented = auth::resolve_update_key(body.key.as_deref(), query.key.as_deref(), auth_header)
        .ok_or_else(|| Error::unauthenticated("no update key presented"))?;

    let keys = state.backend.get_keys(&body.zone).await?;
    let key = auth::find_key_by_secret(&keys, &presented).ok_or_else(|| Error::unauthorized("key does not match zone"))?;

    log::info!(target: "http", "update for zone {} authenticated as key {}", body.zone, key.name);

    let ops: Result<Vec<_>, Error> = body.updates.iter().cloned().map(JsonUpdate::into_op).collect();
    let ops = ops?;

    state.engine.apply(&body.zone, &ops).await?;

    Ok(ops.iter().map(|op| ("ok", JsonUpdate::from_op(op))).collect())
}
