use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use trajekt_domain::booking::ActorRef;
use trajekt_domain::payment::Payment;
use trajekt_payment::GatewayTransaction;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/payments/callback", post(payment_callback))
        .route("/v1/payments/{code}/status", get(payment_status))
        .route("/v1/payments/{code}/refund", post(request_refund))
        .route("/v1/payments/{code}/refund/status", get(refund_status))
        .route("/v1/payments/{code}/refund/cancel", post(cancel_refund))
}

/// Gateway notification webhook. The body is taken raw so the stored
/// `raw_response` is exactly what the gateway sent, signature included.
async fn payment_callback(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<StatusCode, AppError> {
    state.recon.process_callback(payload).await?;
    Ok(StatusCode::OK)
}

/// Poll the gateway and bring the payment (and booking) up to date
async fn payment_status(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Payment>, AppError> {
    let payment = state.recon.check_and_update(&code).await?;
    Ok(Json(payment))
}

#[derive(Debug, Deserialize)]
struct RefundBody {
    /// Defaults to the full refundable remainder
    amount: Option<i64>,
    reason: String,
    admin_id: Option<Uuid>,
}

async fn request_refund(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<RefundBody>,
) -> Result<Json<Payment>, AppError> {
    let actor = match body.admin_id {
        Some(id) => ActorRef::admin(id),
        None => ActorRef::system(),
    };
    let payment = state
        .recon
        .request_refund(&code, body.amount, body.reason, actor)
        .await?;
    Ok(Json(payment))
}

/// Gateway's view of a refund in flight; the local record is untouched
async fn refund_status(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<GatewayTransaction>, AppError> {
    let tx = state.recon.check_refund_status(&code).await?;
    Ok(Json(tx))
}

/// Withdraw a refund still pending at the gateway
async fn cancel_refund(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<GatewayTransaction>, AppError> {
    let tx = state.recon.cancel_refund(&code).await?;
    Ok(Json(tx))
}
