use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::security::{ClientId, ClientSnapshot, EdgeGuard, GuardError, GuardStore, SweepStats};

#[derive(Serialize)]
pub struct GuardStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub tracked_windows: usize,
    pub tracked_login_attempts: usize,
    pub policy: PolicySummary,
}

#[derive(Serialize)]
pub struct PolicySummary {
    pub login_path: String,
    pub window_secs: u64,
    pub max_requests: u32,
    pub max_attempts: u32,
    pub lockout_secs: u64,
}

pub async fn get_status<S: GuardStore>(
    State(guard): State<Arc<EdgeGuard<S>>>,
) -> Json<GuardStatus> {
    let (tracked_windows, tracked_login_attempts) = guard.store().tracked();
    let config = guard.config();

    Json(GuardStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        tracked_windows,
        tracked_login_attempts,
        policy: PolicySummary {
            login_path: config.login.path.clone(),
            window_secs: config.rate_limit.window_secs,
            max_requests: config.rate_limit.max_requests,
            max_attempts: config.login.max_attempts,
            lockout_secs: config.login.lockout_secs,
        },
    })
}

pub async fn get_client<S: GuardStore>(
    State(guard): State<Arc<EdgeGuard<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ClientSnapshot>, GuardError> {
    guard
        .snapshot(&ClientId::new(id), Utc::now())
        .map(Json)
        .ok_or(GuardError::NotFound)
}

pub async fn delete_client<S: GuardStore>(
    State(guard): State<Arc<EdgeGuard<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, GuardError> {
    if guard.unlock(&ClientId::new(id)) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(GuardError::NotFound)
    }
}

pub async fn post_sweep<S: GuardStore>(
    State(guard): State<Arc<EdgeGuard<S>>>,
) -> Json<SweepStats> {
    Json(guard.sweep(Utc::now()))
}
