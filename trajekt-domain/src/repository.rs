use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::booking::{Booking, BookingLog, BookingStatus, Ticket, TicketStatus, Vehicle};
use crate::payment::Payment;
use crate::schedule::{Route, Schedule, ScheduleDate, Vessel};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// A versioned write raced another writer; the caller should reload and replan
    #[error("Version conflict: {0}")]
    VersionConflict(String),

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A capacity ledger write pinned to the version it was computed against.
/// `expected_version: None` means the entry is being created and no row may
/// exist yet; `Some(v)` means the stored row must still be at version `v`.
#[derive(Debug, Clone)]
pub struct LedgerUpdate {
    pub expected_version: Option<i64>,
    pub entry: ScheduleDate,
}

/// Per-user aggregates, maintained alongside booking creation
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UserStats {
    pub user_id: Uuid,
    pub booking_count: i64,
    pub total_spent: i64,
}

impl UserStats {
    pub fn empty(user_id: Uuid) -> Self {
        Self { user_id, booking_count: 0, total_spent: 0 }
    }
}

/// Everything written when a booking is created. Commits atomically or
/// not at all; in particular the ledger CAS failing aborts the whole unit.
#[derive(Debug, Clone)]
pub struct CreationUnit {
    pub booking: Booking,
    pub tickets: Vec<Ticket>,
    pub vehicles: Vec<Vehicle>,
    pub ledger: LedgerUpdate,
    pub log: BookingLog,
    pub stats_user_id: Uuid,
    pub stats_amount: i64,
}

/// Everything written when a booking changes status. The booking row acts
/// as its own guard: it must still be in `expected_status` at commit time.
#[derive(Debug, Clone)]
pub struct TransitionUnit {
    pub booking_id: Uuid,
    pub expected_status: BookingStatus,
    pub new_status: BookingStatus,
    pub cancellation_reason: Option<String>,
    /// Bulk status for the booking's tickets, when the transition touches them
    pub ticket_status: Option<TicketStatus>,
    /// Capacity release (or other ledger write) applied in the same commit
    pub ledger: Option<LedgerUpdate>,
    pub log: BookingLog,
    /// Payment row updated in the same commit, for gateway-driven transitions
    pub payment: Option<Payment>,
}

/// Persistence interface for the booking core. Implementations must make the
/// unit commits atomic and enforce the version/status guards they carry.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn route(&self, id: Uuid) -> StoreResult<Option<Route>>;
    async fn vessel(&self, id: Uuid) -> StoreResult<Option<Vessel>>;
    async fn schedule(&self, id: Uuid) -> StoreResult<Option<Schedule>>;

    async fn schedule_date(&self, schedule_id: Uuid, date: NaiveDate) -> StoreResult<Option<ScheduleDate>>;
    /// Guarded single-entry ledger write (operator status overrides)
    async fn put_schedule_date(&self, update: LedgerUpdate) -> StoreResult<()>;

    async fn booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;
    async fn booking_by_code(&self, code: &str) -> StoreResult<Option<Booking>>;
    async fn tickets_for(&self, booking_id: Uuid) -> StoreResult<Vec<Ticket>>;
    async fn vehicles_for(&self, booking_id: Uuid) -> StoreResult<Vec<Vehicle>>;
    async fn logs_for(&self, booking_id: Uuid) -> StoreResult<Vec<BookingLog>>;

    /// Newest payment for the booking, i.e. the active one
    async fn payment_for(&self, booking_id: Uuid) -> StoreResult<Option<Payment>>;
    async fn payment_by_order_id(&self, order_id: &str) -> StoreResult<Option<Payment>>;
    /// Insert or replace by payment id
    async fn save_payment(&self, payment: Payment) -> StoreResult<()>;

    async fn user_stats(&self, user_id: Uuid) -> StoreResult<Option<UserStats>>;

    async fn commit_creation(&self, unit: CreationUnit) -> StoreResult<()>;
    async fn commit_transition(&self, unit: TransitionUnit) -> StoreResult<()>;

    // Catalog writes, used by seeding and admin surfaces
    async fn insert_route(&self, route: Route) -> StoreResult<()>;
    async fn insert_vessel(&self, vessel: Vessel) -> StoreResult<()>;
    async fn insert_schedule(&self, schedule: Schedule) -> StoreResult<()>;
}
