use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codes;
use crate::schedule::VehicleClass;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Refunded => "REFUNDED",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "COMPLETED" => Some(BookingStatus::Completed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "REFUNDED" => Some(BookingStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the booking was made
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingSource {
    Web,
    Mobile,
    Counter,
    Agent,
}

impl BookingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingSource::Web => "WEB",
            BookingSource::Mobile => "MOBILE",
            BookingSource::Counter => "COUNTER",
            BookingSource::Agent => "AGENT",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "WEB" => Some(BookingSource::Web),
            "MOBILE" => Some(BookingSource::Mobile),
            "COUNTER" => Some(BookingSource::Counter),
            "AGENT" => Some(BookingSource::Agent),
            _ => None,
        }
    }
}

/// The single source of truth for a customer's crossing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    /// Human-facing reference, doubles as the gateway order id
    pub code: String,
    pub user_id: Uuid,
    pub schedule_id: Uuid,
    pub departure_date: NaiveDate,
    pub passenger_count: i32,
    pub vehicle_count: i32,
    /// Total fare in minor currency units
    pub total_amount: i64,
    pub status: BookingStatus,
    pub cancellation_reason: Option<String>,
    pub source: BookingSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        user_id: Uuid,
        schedule_id: Uuid,
        departure_date: NaiveDate,
        passenger_count: i32,
        vehicle_count: i32,
        total_amount: i64,
        source: BookingSource,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: codes::booking_code(),
            user_id,
            schedule_id,
            departure_date,
            passenger_count,
            vehicle_count,
            total_amount,
            status: BookingStatus::Pending,
            cancellation_reason: None,
            source,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update booking status
    pub fn update_status(&mut self, new_status: BookingStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }
}

/// Per-passenger seat credential status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Active,
    Cancelled,
    Used,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Active => "ACTIVE",
            TicketStatus::Cancelled => "CANCELLED",
            TicketStatus::Used => "USED",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(TicketStatus::Active),
            "CANCELLED" => Some(TicketStatus::Cancelled),
            "USED" => Some(TicketStatus::Used),
            _ => None,
        }
    }
}

/// One passenger seat on a booking, with its boarding credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub code: String,
    /// Opaque token encoded into the boarding QR
    pub qr_token: String,
    pub passenger_name: Option<String>,
    pub status: TicketStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn new(booking_id: Uuid, passenger_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            code: codes::ticket_code(),
            qr_token: codes::qr_token(),
            passenger_name,
            status: TicketStatus::Active,
            checked_in_at: None,
            created_at: Utc::now(),
        }
    }

    /// Mark as boarded (QR scanned at the ramp)
    pub fn check_in(&mut self) {
        self.status = TicketStatus::Used;
        self.checked_in_at = Some(Utc::now());
    }
}

/// One vehicle slot on a booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub class: VehicleClass,
    pub license_plate: String,
    /// Free-form make/model note shown on the loading manifest
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn new(
        booking_id: Uuid,
        class: VehicleClass,
        license_plate: String,
        description: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            class,
            license_plate,
            description,
            created_at: Utc::now(),
        }
    }
}

/// Who performed a status change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorKind {
    User,
    Admin,
    System,
    Gateway,
}

impl ActorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::User => "USER",
            ActorKind::Admin => "ADMIN",
            ActorKind::System => "SYSTEM",
            ActorKind::Gateway => "GATEWAY",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(ActorKind::User),
            "ADMIN" => Some(ActorKind::Admin),
            "SYSTEM" => Some(ActorKind::System),
            "GATEWAY" => Some(ActorKind::Gateway),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActorRef {
    pub kind: ActorKind,
    pub id: Option<Uuid>,
}

impl ActorRef {
    pub fn user(id: Uuid) -> Self {
        Self { kind: ActorKind::User, id: Some(id) }
    }

    pub fn admin(id: Uuid) -> Self {
        Self { kind: ActorKind::Admin, id: Some(id) }
    }

    pub fn system() -> Self {
        Self { kind: ActorKind::System, id: None }
    }

    pub fn gateway() -> Self {
        Self { kind: ActorKind::Gateway, id: None }
    }
}

/// Append-only audit record, written in the same transaction as the change it describes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingLog {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub previous_status: Option<BookingStatus>,
    pub new_status: BookingStatus,
    pub actor: ActorRef,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingLog {
    pub fn record(
        booking_id: Uuid,
        previous_status: Option<BookingStatus>,
        new_status: BookingStatus,
        actor: ActorRef,
        note: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            previous_status,
            new_status,
            actor,
            note,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_booking_starts_pending() {
        let booking = Booking::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            2,
            1,
            250_000,
            BookingSource::Web,
        );
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.code.starts_with("TRJ-"));
        assert!(booking.cancellation_reason.is_none());
    }

    #[test]
    fn test_ticket_check_in() {
        let mut ticket = Ticket::new(Uuid::new_v4(), Some("A. Rahman".to_string()));
        assert_eq!(ticket.status, TicketStatus::Active);
        assert!(ticket.checked_in_at.is_none());

        ticket.check_in();
        assert_eq!(ticket.status, TicketStatus::Used);
        assert!(ticket.checked_in_at.is_some());
    }

    #[test]
    fn test_status_db_round_trip() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
            BookingStatus::Refunded,
        ] {
            assert_eq!(BookingStatus::from_db(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::from_db("ON_HOLD"), None);
    }
}
