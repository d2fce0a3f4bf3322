use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use trajekt_booking::engine::BookingDetail;
use trajekt_booking::CreateBookingRequest;
use trajekt_domain::booking::{ActorRef, Booking};
use trajekt_domain::payment::{Payment, PaymentChannel};
use trajekt_payment::CustomerDetails;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/{code}", get(get_booking))
        .route("/v1/bookings/{code}/cancel", post(cancel_booking))
}

#[derive(Debug, Deserialize)]
struct CreateBookingBody {
    booking: CreateBookingRequest,
    /// When present, a gateway transaction is opened in the same request
    payment: Option<PaymentIntent>,
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    channel: PaymentChannel,
    customer: CustomerDetails,
}

#[derive(Debug, Serialize)]
struct CreateBookingResponse {
    booking: Booking,
    payment: Option<Payment>,
}

async fn create_booking(
    State(state): State<AppState>,
    Json(body): Json<CreateBookingBody>,
) -> Result<(StatusCode, Json<CreateBookingResponse>), AppError> {
    if let Some(intent) = &body.payment {
        // reject before anything is reserved, so a bad channel choice does
        // not leave an unpayable booking behind
        if !intent.channel.is_chargeable() {
            return Err(AppError::Validation(format!(
                "Channel {} cannot be charged directly",
                intent.channel.gateway_payment_type()
            )));
        }
    }

    let user_id = body.booking.user_id;
    let booking = state
        .engine
        .create_booking(body.booking, ActorRef::user(user_id))
        .await?;

    let payment = match body.payment {
        Some(intent) => Some(
            state
                .recon
                .initiate(&booking.code, intent.channel, &intent.customer)
                .await?,
        ),
        None => None,
    };

    info!(code = %booking.code, with_payment = payment.is_some(), "booking created via API");
    Ok((StatusCode::CREATED, Json(CreateBookingResponse { booking, payment })))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<BookingDetail>, AppError> {
    let detail = state.engine.booking_detail(&code).await?;
    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
struct CancelBody {
    reason: Option<String>,
    /// Caller identity as established by the fronting auth layer
    user_id: Option<Uuid>,
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<CancelBody>,
) -> Result<Json<Booking>, AppError> {
    let reason = body.reason.unwrap_or_else(|| "Cancelled by user".to_string());
    let actor = match body.user_id {
        Some(id) => ActorRef::user(id),
        None => ActorRef::system(),
    };
    let booking = state.engine.cancel_booking(&code, reason, actor).await?;
    Ok(Json(booking))
}
