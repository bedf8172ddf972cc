//! Dashboard API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use crate::dashboard::{AccountAddress, ApiContext, DashboardData, LoadState};
use crate::http::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// Wait for a fetch in flight before answering.
    #[serde(default)]
    pub wait: bool,
}

/// JSON view of a [`LoadState`].
#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadStateView<'a> {
    NotLoaded,
    Loading,
    Loaded { data: &'a DashboardData },
    Error { message: &'a str },
}

impl<'a> From<&'a LoadState<DashboardData>> for LoadStateView<'a> {
    fn from(state: &'a LoadState<DashboardData>) -> Self {
        match state {
            LoadState::NotLoaded => LoadStateView::NotLoaded,
            LoadState::Loading => LoadStateView::Loading,
            LoadState::Loaded { data } => LoadStateView::Loaded { data },
            LoadState::Errored { error, .. } => LoadStateView::Error {
                message: error.message(),
            },
        }
    }
}

fn parse_context(address: &str) -> Result<ApiContext, Response> {
    address
        .parse::<AccountAddress>()
        .map(ApiContext::for_address)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()).into_response())
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let ctx = match parse_context(&address) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let load_state = state.dashboard.dashboard_state(&ctx, query.wait).await;
    tracing::debug!(account = %address, state = load_state.kind(), "Dashboard state served");
    Json(LoadStateView::from(&load_state)).into_response()
}

pub async fn reset_dashboard(State(state): State<AppState>, Path(address): Path<String>) -> Response {
    let ctx = match parse_context(&address) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    match state.dashboard.current_state(&ctx) {
        LoadState::Errored { error, reset } => {
            tracing::info!(account = %address, error = %error, "Resetting dashboard");
            reset.reset().await;
            StatusCode::ACCEPTED.into_response()
        }
        other => (StatusCode::CONFLICT, Json(LoadStateView::from(&other))).into_response(),
    }
}

pub async fn health() -> &'static str {
    "ok"
}
