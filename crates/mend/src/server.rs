//! HTTP surface for operators: approval signals and the audit trail.
//!
//! Approvals arrive here and are routed into the [`ApprovalGate`]; the ledger
//! endpoints exist so a human deciding on an approval can see what is pending
//! and what the engine has already done.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::approval::ApprovalGate;
use crate::ledger::ActionLedger;

/// Shared state for the operator API.
pub struct OperatorState {
    pub ledger: ActionLedger,
    pub gate: ApprovalGate,
}

/// Build the operator router.
pub fn build_operator_router(state: Arc<OperatorState>) -> Router {
    Router::new()
        .route("/api/actions", get(actions_handler))
        .route("/api/actions/pending", get(pending_handler))
        .route("/api/approvals/{id}/approve", post(approve_handler))
        .route("/api/approvals/{id}/reject", post(reject_handler))
        .route("/healthz", get(healthz_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Body for an approval signal.
#[derive(Debug, Deserialize)]
struct ApproveRequest {
    approver: String,
}

/// Uniform response for approval signals.
#[derive(Debug, Serialize)]
struct SignalResponse {
    status: &'static str,
    action_id: Uuid,
}

async fn approve_handler(
    State(state): State<Arc<OperatorState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApproveRequest>,
) -> impl IntoResponse {
    if request.approver.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(SignalResponse {
                status: "approver required",
                action_id: id,
            }),
        );
    }

    info!(action_id = %id, approver = %request.approver, "Approval signal received");

    match state.gate.approve(id, request.approver.trim()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(SignalResponse {
                status: "approved",
                action_id: id,
            }),
        ),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(SignalResponse {
                status: "no pending approval",
                action_id: id,
            }),
        ),
    }
}

async fn reject_handler(
    State(state): State<Arc<OperatorState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    info!(action_id = %id, "Rejection signal received");

    match state.gate.reject(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(SignalResponse {
                status: "rejected",
                action_id: id,
            }),
        ),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(SignalResponse {
                status: "no pending approval",
                action_id: id,
            }),
        ),
    }
}

/// Full audit trail, oldest first.
async fn actions_handler(State(state): State<Arc<OperatorState>>) -> impl IntoResponse {
    Json(state.ledger.history().await)
}

/// Actions currently waiting on a human.
async fn pending_handler(State(state): State<Arc<OperatorState>>) -> impl IntoResponse {
    Json(state.ledger.pending_approval().await)
}

async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
