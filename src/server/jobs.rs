// src/server/jobs.rs

//! `GET /jobs/{token}`: the most recent job admitted under this
//! token, across `waiting`/`running`/`recent`, or 404 if the token is
//! unknown or its job has already aged out of the sweeper's retention
//! window.

use crate::server::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

pub async fn job_status(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    match state.queue.job_status(&token) {
        Some(summary) => Json(summary).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
