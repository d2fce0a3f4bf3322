use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use trajekt_domain::schedule::DepartureStatus;

/// Outbound user-facing events emitted by the booking core
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    BookingConfirmed {
        booking_code: String,
        total_amount: i64,
    },
    BookingCancelled {
        booking_code: String,
        reason: String,
    },
    PaymentSucceeded {
        booking_code: String,
        order_id: String,
        amount: i64,
    },
    PaymentFailed {
        booking_code: String,
        order_id: String,
        reason: String,
    },
    RefundProcessed {
        booking_code: String,
        order_id: String,
        amount: i64,
    },
    DepartureChanged {
        schedule_id: Uuid,
        date: NaiveDate,
        status: DepartureStatus,
        reason: Option<String>,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::BookingConfirmed { .. } => "booking_confirmed",
            Notification::BookingCancelled { .. } => "booking_cancelled",
            Notification::PaymentSucceeded { .. } => "payment_succeeded",
            Notification::PaymentFailed { .. } => "payment_failed",
            Notification::RefundProcessed { .. } => "refund_processed",
            Notification::DepartureChanged { .. } => "departure_changed",
        }
    }

    /// Explicit idempotency key: one event kind per booking (or departure)
    /// within the dedupe window. Gateway callback retries and poll overlaps
    /// collapse onto the same key.
    pub fn dedupe_key(&self) -> String {
        match self {
            Notification::BookingConfirmed { booking_code, .. }
            | Notification::BookingCancelled { booking_code, .. }
            | Notification::PaymentSucceeded { booking_code, .. }
            | Notification::PaymentFailed { booking_code, .. }
            | Notification::RefundProcessed { booking_code, .. } => {
                format!("{}:{}", self.kind(), booking_code)
            }
            Notification::DepartureChanged { schedule_id, date, .. } => {
                format!("{}:{}:{}", self.kind(), schedule_id, date)
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Notification delivery failed: {0}")]
pub struct SinkError(pub String);

/// Delivery backend. Push providers (email, app push) implement this; the
/// core only decides what to send and when.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), SinkError>;
}

/// Default sink: structured log lines
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), SinkError> {
        let payload = serde_json::to_string(notification).unwrap_or_default();
        info!(event = notification.kind(), %payload, "notification");
        Ok(())
    }
}

/// Fans events out to the sink, suppressing repeats of the same dedupe key
/// within the TTL. Delivery failures are logged and swallowed; a notification
/// never fails the state change that triggered it.
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    ttl: Duration,
    recent: Mutex<HashMap<String, Instant>>,
}

impl NotificationDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, ttl: Duration) -> Self {
        Self {
            sink,
            ttl,
            recent: Mutex::new(HashMap::new()),
        }
    }

    pub async fn emit(&self, notification: Notification) {
        if !self.first_within_ttl(&notification) {
            debug!(key = %notification.dedupe_key(), "duplicate notification suppressed");
            return;
        }
        if let Err(err) = self.sink.deliver(&notification).await {
            warn!(event = notification.kind(), error = %err, "notification delivery failed");
        }
    }

    fn first_within_ttl(&self, notification: &Notification) -> bool {
        let key = notification.dedupe_key();
        let now = Instant::now();
        let mut recent = self.recent.lock();
        recent.retain(|_, sent| now.duration_since(*sent) < self.ttl);
        if recent.contains_key(&key) {
            return false;
        }
        recent.insert(key, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSink {
        delivered: Mutex<Vec<Notification>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self { delivered: Mutex::new(Vec::new()) })
        }

        fn count(&self) -> usize {
            self.delivered.lock().len()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, notification: &Notification) -> Result<(), SinkError> {
            self.delivered.lock().push(notification.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn deliver(&self, _notification: &Notification) -> Result<(), SinkError> {
            Err(SinkError("provider down".to_string()))
        }
    }

    fn confirmed(code: &str) -> Notification {
        Notification::BookingConfirmed {
            booking_code: code.to_string(),
            total_amount: 250_000,
        }
    }

    #[tokio::test]
    async fn test_duplicate_within_ttl_suppressed() {
        let sink = RecordingSink::new();
        let dispatcher = NotificationDispatcher::new(sink.clone(), Duration::from_secs(60));

        dispatcher.emit(confirmed("TRJ-AAAA2222")).await;
        dispatcher.emit(confirmed("TRJ-AAAA2222")).await;
        assert_eq!(sink.count(), 1);

        // different booking, same kind: not a duplicate
        dispatcher.emit(confirmed("TRJ-BBBB3333")).await;
        assert_eq!(sink.count(), 2);
    }

    #[tokio::test]
    async fn test_same_booking_different_kind_not_suppressed() {
        let sink = RecordingSink::new();
        let dispatcher = NotificationDispatcher::new(sink.clone(), Duration::from_secs(60));

        dispatcher.emit(confirmed("TRJ-AAAA2222")).await;
        dispatcher
            .emit(Notification::PaymentSucceeded {
                booking_code: "TRJ-AAAA2222".to_string(),
                order_id: "TRJ-AAAA2222".to_string(),
                amount: 250_000,
            })
            .await;
        assert_eq!(sink.count(), 2);
    }

    #[tokio::test]
    async fn test_reemits_after_ttl() {
        let sink = RecordingSink::new();
        let dispatcher = NotificationDispatcher::new(sink.clone(), Duration::from_millis(10));

        dispatcher.emit(confirmed("TRJ-AAAA2222")).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        dispatcher.emit(confirmed("TRJ-AAAA2222")).await;
        assert_eq!(sink.count(), 2);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let dispatcher = NotificationDispatcher::new(Arc::new(FailingSink), Duration::from_secs(60));
        // must not panic or propagate
        dispatcher.emit(confirmed("TRJ-AAAA2222")).await;
    }
}
