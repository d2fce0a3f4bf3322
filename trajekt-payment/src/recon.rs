use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha512};
use tracing::{info, warn};

use trajekt_booking::notify::{Notification, NotificationDispatcher};
use trajekt_booking::{BookingEngine, BookingError};
use trajekt_domain::booking::{ActorRef, Booking, BookingStatus};
use trajekt_domain::codes;
use trajekt_domain::payment::{Payment, PaymentChannel, PaymentStatus};
use trajekt_domain::repository::StoreError;

use crate::channels::CustomerDetails;
use crate::gateway::{GatewayError, GatewayTransaction, PaymentGateway};

/// How strictly callback signatures are checked. `AllowUnsigned` tolerates a
/// missing signature for sandbox testing but still rejects a wrong one; it is
/// refused outright in production configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePolicy {
    Enforce,
    AllowUnsigned,
}

#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("Callback signature mismatch for order {order_id}")]
    SignatureMismatch { order_id: String },

    #[error("No payment known for {0}")]
    UnknownOrder(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("Refund not eligible: {0}")]
    RefundNotEligible(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Signature over a gateway notification: hex sha512 of order id, status
/// code, gross amount and the merchant server key, concatenated in order.
pub fn signature_for(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Brings payment records in line with gateway truth. All payment mutations
/// go through here: initiation, signed callbacks, status polls and refunds.
/// Booking effects ride on the lifecycle engine's atomic transitions.
pub struct ReconEngine {
    engine: Arc<BookingEngine>,
    gateway: Arc<PaymentGateway>,
    notifier: Arc<NotificationDispatcher>,
    server_key: String,
    policy: SignaturePolicy,
    payment_expiry_minutes: i64,
}

impl ReconEngine {
    pub fn new(
        engine: Arc<BookingEngine>,
        gateway: Arc<PaymentGateway>,
        notifier: Arc<NotificationDispatcher>,
        server_key: String,
        policy: SignaturePolicy,
        payment_expiry_minutes: i64,
    ) -> Self {
        Self {
            engine,
            gateway,
            notifier,
            server_key,
            policy,
            payment_expiry_minutes,
        }
    }

    /// Open a gateway transaction for a pending booking. Idempotent: an
    /// unexpired pending attempt on the same channel is returned as-is
    /// instead of charging again; switching channels (or retrying after
    /// expiry) creates a replacement attempt with a fresh suffixed order id
    /// so the gateway never sees the same order twice.
    pub async fn initiate(
        &self,
        code: &str,
        channel: PaymentChannel,
        customer: &CustomerDetails,
    ) -> Result<Payment, ReconError> {
        let store = self.engine.store();
        let booking = store
            .booking_by_code(code)
            .await?
            .ok_or_else(|| ReconError::Booking(BookingError::NotFound(code.to_string())))?;
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::Validation(format!(
                "Booking {code} is {} and cannot take a new payment",
                booking.status
            ))
            .into());
        }
        if !channel.is_chargeable() {
            return Err(BookingError::Validation(format!(
                "Channel {} cannot be charged directly",
                channel.gateway_payment_type()
            ))
            .into());
        }

        if let Some(existing) = store.payment_for(booking.id).await? {
            if existing.status == PaymentStatus::Pending
                && !existing.is_expired(Utc::now())
                && existing.channel == channel
            {
                return Ok(existing);
            }
        }

        let order_id = if store.payment_by_order_id(&booking.code).await?.is_some() {
            format!("{}-{}", booking.code, codes::order_suffix())
        } else {
            booking.code.clone()
        };

        let schedule = store
            .schedule(booking.schedule_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("schedule {}", booking.schedule_id)))?;
        let route = store
            .route(schedule.route_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("route {}", schedule.route_id)))?;

        let result = self
            .gateway
            .create_transaction(
                &order_id,
                booking.total_amount,
                &channel,
                &route.label(),
                customer,
                self.payment_expiry_minutes,
            )
            .await;

        let mut payment = Payment::new(booking.id, order_id, channel, booking.total_amount);
        payment.transaction_id = result.transaction_id;
        payment.va_number = result.va_number;
        payment.qr_reference = result.qr_reference;
        payment.is_fallback = result.is_fallback;
        payment.expires_at = Some(result.expires_at);
        payment.raw_response = result.raw;
        store.save_payment(payment.clone()).await?;

        info!(code, order_id = %payment.order_id, fallback = payment.is_fallback, "payment initiated");
        Ok(payment)
    }

    /// Check a callback's signature against the server key
    pub fn verify_callback(&self, tx: &GatewayTransaction) -> Result<(), ReconError> {
        match &tx.signature_key {
            None => match self.policy {
                SignaturePolicy::AllowUnsigned => Ok(()),
                SignaturePolicy::Enforce => Err(ReconError::SignatureMismatch {
                    order_id: tx.order_id.clone(),
                }),
            },
            Some(signature) => {
                let expected = signature_for(
                    &tx.order_id,
                    tx.status_code.as_deref().unwrap_or(""),
                    tx.gross_amount.as_deref().unwrap_or(""),
                    &self.server_key,
                );
                if *signature == expected {
                    Ok(())
                } else {
                    Err(ReconError::SignatureMismatch {
                        order_id: tx.order_id.clone(),
                    })
                }
            }
        }
    }

    /// Handle an inbound gateway notification: verify the signature, find the
    /// payment, apply the reported state. A rejected signature changes nothing.
    pub async fn process_callback(&self, raw: Value) -> Result<Payment, ReconError> {
        let tx: GatewayTransaction = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::Http(format!("Unreadable callback: {e}")))?;
        self.verify_callback(&tx)?;

        let payment = self
            .engine
            .store()
            .payment_by_order_id(&tx.order_id)
            .await?
            .ok_or_else(|| ReconError::UnknownOrder(tx.order_id.clone()))?;

        info!(
            order_id = %tx.order_id,
            state = tx.transaction_status.as_deref().unwrap_or("?"),
            "gateway callback received"
        );
        self.apply_status(payment, &tx, Some(raw)).await
    }

    /// Polling entry point. Terminal payments are returned untouched; when
    /// the gateway cannot be reached but the customer holds a usable VA/QR
    /// reference, the payment is conservatively held as pending.
    pub async fn check_and_update(&self, code: &str) -> Result<Payment, ReconError> {
        let (_, payment) = self.booking_and_payment(code).await?;
        if payment.status.is_terminal() {
            return Ok(payment);
        }

        match self.gateway.get_status(&payment.order_id).await {
            Ok((tx, raw)) => self.apply_status(payment, &tx, Some(raw)).await,
            Err(err) if payment.va_number.is_some() || payment.qr_reference.is_some() => {
                warn!(code, error = %err, "gateway unreachable during poll, holding payment as pending");
                Ok(payment)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Map a gateway transaction state onto the payment and, where the table
    /// says so, onto the booking. Idempotent: a state that is already in
    /// force changes nothing.
    pub async fn apply_status(
        &self,
        mut payment: Payment,
        tx: &GatewayTransaction,
        raw: Option<Value>,
    ) -> Result<Payment, ReconError> {
        let state = tx
            .transaction_status
            .as_deref()
            .ok_or_else(|| GatewayError::Http("Response carries no transaction_status".to_string()))?;

        if let Some(raw) = raw {
            payment.raw_response = Some(raw);
        }

        let store = self.engine.store();
        let booking = store
            .booking(payment.booking_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", payment.booking_id)))?;

        match state {
            "capture" | "settlement" => {
                if payment.status != PaymentStatus::Pending {
                    return Ok(payment);
                }
                payment.mark_success(tx.transaction_id.clone());

                if matches!(booking.status, BookingStatus::Pending | BookingStatus::Confirmed) {
                    self.engine
                        .transition_with_payment(
                            &booking.code,
                            BookingStatus::Confirmed,
                            ActorRef::gateway(),
                            Some(format!("Payment {state} for order {}", payment.order_id)),
                            payment.clone(),
                        )
                        .await?;
                } else {
                    warn!(
                        code = %booking.code,
                        status = %booking.status,
                        "payment settled for a booking past confirmation, recording payment only"
                    );
                    store.save_payment(payment.clone()).await?;
                }

                self.notifier
                    .emit(Notification::PaymentSucceeded {
                        booking_code: booking.code.clone(),
                        order_id: payment.order_id.clone(),
                        amount: payment.amount,
                    })
                    .await;
            }
            "pending" => {
                if payment.status == PaymentStatus::Pending {
                    store.save_payment(payment.clone()).await?;
                }
            }
            "deny" | "cancel" | "expire" => {
                if payment.status != PaymentStatus::Pending {
                    return Ok(payment);
                }
                payment.mark_failed();
                let reason = match state {
                    "deny" => "payment denied",
                    "cancel" => "payment cancelled",
                    _ => "payment expired",
                };

                if booking.status == BookingStatus::Pending {
                    self.engine
                        .transition_with_payment(
                            &booking.code,
                            BookingStatus::Cancelled,
                            ActorRef::gateway(),
                            Some(reason.to_string()),
                            payment.clone(),
                        )
                        .await?;
                } else {
                    store.save_payment(payment.clone()).await?;
                }

                self.notifier
                    .emit(Notification::PaymentFailed {
                        booking_code: booking.code.clone(),
                        order_id: payment.order_id.clone(),
                        reason: reason.to_string(),
                    })
                    .await;
            }
            "refund" | "partial_refund" => {
                // the gateway reports the cumulative refunded total
                let total = match parse_amount(tx.refund_amount.as_deref()) {
                    Some(total) => total,
                    None if state == "refund" => payment.amount,
                    None => {
                        warn!(order_id = %payment.order_id, "partial refund callback without amount, ignoring");
                        return Ok(payment);
                    }
                };
                let delta = total.min(payment.amount) - payment.refund_total();
                if delta > 0 {
                    payment.apply_refund(delta);
                    store.save_payment(payment.clone()).await?;
                    self.notifier
                        .emit(Notification::RefundProcessed {
                            booking_code: booking.code.clone(),
                            order_id: payment.order_id.clone(),
                            amount: delta,
                        })
                        .await;
                }
            }
            other => {
                return Err(ReconError::Gateway(GatewayError::Http(format!(
                    "Unknown transaction_status: {other}"
                ))));
            }
        }

        Ok(payment)
    }

    /// Refund a settled payment within its channel window. A full refund also
    /// moves the booking to Refunded when its current status allows it.
    pub async fn request_refund(
        &self,
        code: &str,
        amount: Option<i64>,
        reason: String,
        actor: ActorRef,
    ) -> Result<Payment, ReconError> {
        let (booking, mut payment) = self.booking_and_payment(code).await?;

        let policy = payment.channel.refund_policy();
        if !policy.refundable {
            return Err(ReconError::RefundNotEligible(format!(
                "{} payments cannot be refunded",
                payment.channel.gateway_payment_type()
            )));
        }
        if !matches!(payment.status, PaymentStatus::Success | PaymentStatus::PartialRefund) {
            return Err(ReconError::RefundNotEligible(format!(
                "payment is {}, only settled payments can be refunded",
                payment.status
            )));
        }
        let paid_at = payment
            .paid_at
            .ok_or_else(|| ReconError::RefundNotEligible("payment has no settlement time".to_string()))?;
        if !policy.within_window(paid_at, Utc::now()) {
            return Err(ReconError::RefundNotEligible(format!(
                "refund window of {} days has lapsed",
                policy.window_days
            )));
        }
        let remaining = payment.remaining_refundable();
        let amount = amount.unwrap_or(remaining);
        if amount <= 0 || amount > remaining {
            return Err(ReconError::RefundNotEligible(format!(
                "amount {amount} outside the refundable remainder {remaining}"
            )));
        }

        let (_tx, raw) = self.gateway.request_refund(&payment.order_id, amount, &reason).await?;
        payment.apply_refund(amount);
        payment.raw_response = Some(raw);

        if payment.status == PaymentStatus::Refunded
            && matches!(booking.status, BookingStatus::Cancelled | BookingStatus::Completed)
        {
            self.engine
                .transition_with_payment(
                    &booking.code,
                    BookingStatus::Refunded,
                    actor,
                    Some(reason),
                    payment.clone(),
                )
                .await?;
        } else {
            self.engine.store().save_payment(payment.clone()).await?;
        }

        self.notifier
            .emit(Notification::RefundProcessed {
                booking_code: booking.code.clone(),
                order_id: payment.order_id.clone(),
                amount,
            })
            .await;
        info!(code, amount, status = %payment.status, "refund processed");
        Ok(payment)
    }

    /// Gateway's view of a refund in flight
    pub async fn check_refund_status(&self, code: &str) -> Result<GatewayTransaction, ReconError> {
        let (_, payment) = self.booking_and_payment(code).await?;
        let (tx, _raw) = self.gateway.refund_status(&payment.order_id).await?;
        Ok(tx)
    }

    /// Withdraw a refund request still pending at the gateway. The local
    /// record is left alone; the outcome arrives through callback or poll.
    pub async fn cancel_refund(&self, code: &str) -> Result<GatewayTransaction, ReconError> {
        let (_, payment) = self.booking_and_payment(code).await?;
        let (tx, _raw) = self.gateway.cancel_refund(&payment.order_id).await?;
        Ok(tx)
    }

    async fn booking_and_payment(&self, code: &str) -> Result<(Booking, Payment), ReconError> {
        let store = self.engine.store();
        let booking = store
            .booking_by_code(code)
            .await?
            .ok_or_else(|| ReconError::Booking(BookingError::NotFound(code.to_string())))?;
        let payment = store
            .payment_for(booking.id)
            .await?
            .ok_or_else(|| ReconError::UnknownOrder(code.to_string()))?;
        Ok((booking, payment))
    }
}

/// Parse the gateway's decimal amount strings ("250000.00") into minor units
fn parse_amount(s: Option<&str>) -> Option<i64> {
    let s = s?;
    let whole = s.split('.').next().unwrap_or(s);
    whole.parse().ok()
}
