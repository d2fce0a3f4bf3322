use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use trajekt_catalog::ledger::{self, CapacityError, VehicleCounts};
use trajekt_catalog::pricing::{self, PricingError};
use trajekt_domain::booking::{
    ActorRef, Booking, BookingLog, BookingSource, BookingStatus, Ticket, TicketStatus, Vehicle,
};
use trajekt_domain::payment::Payment;
use trajekt_domain::repository::{
    BookingStore, CreationUnit, LedgerUpdate, StoreError, TransitionUnit,
};
use trajekt_domain::schedule::{DepartureStatus, ScheduleDate, VehicleClass};

use crate::lifecycle;
use crate::notify::{Notification, NotificationDispatcher};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("Too late to cancel: departure on {date} is inside the cancellation window")]
    TooLateToCancel { date: NaiveDate },

    #[error("Booking not found: {0}")]
    NotFound(String),

    #[error("Concurrent updates kept winning, giving up")]
    Conflict,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bookings may be cancelled until this many days before departure
    pub cancellation_cutoff_days: i64,
    /// Replans before giving up on a contended departure
    pub max_cas_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cancellation_cutoff_days: 1,
            max_cas_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: Uuid,
    pub schedule_id: Uuid,
    pub departure_date: NaiveDate,
    pub passengers: u32,
    /// When given, must contain one name per passenger
    pub passenger_names: Option<Vec<String>>,
    #[serde(default)]
    pub vehicles: Vec<VehicleRequest>,
    #[serde(default = "default_source")]
    pub source: BookingSource,
}

fn default_source() -> BookingSource {
    BookingSource::Web
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleRequest {
    pub class: VehicleClass,
    pub license_plate: String,
    pub description: Option<String>,
}

impl CreateBookingRequest {
    fn validate(&self) -> Result<(), BookingError> {
        if self.passengers == 0 {
            return Err(BookingError::Validation(
                "At least one passenger is required".to_string(),
            ));
        }
        // counts are carried as i32 from here on; a wrapped value would
        // slip past every capacity comparison as a negative delta
        if i32::try_from(self.passengers).is_err() {
            return Err(BookingError::Validation(format!(
                "Passenger count {} is out of range",
                self.passengers
            )));
        }
        if let Some(names) = &self.passenger_names {
            if names.len() != self.passengers as usize {
                return Err(BookingError::Validation(format!(
                    "Expected {} passenger names, got {}",
                    self.passengers,
                    names.len()
                )));
            }
        }
        for vehicle in &self.vehicles {
            if vehicle.license_plate.trim().is_empty() {
                return Err(BookingError::Validation(
                    "Vehicle license plate is required".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Outcome of a status instruction. `AlreadyApplied` means the booking was
/// found in the requested status, so replays (gateway callback retries,
/// crash re-runs) are no-ops instead of errors.
#[derive(Debug)]
pub enum TransitionOutcome {
    Applied(Booking),
    AlreadyApplied(Booking),
}

impl TransitionOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            TransitionOutcome::Applied(b) | TransitionOutcome::AlreadyApplied(b) => b,
        }
    }
}

/// Booking detail as served to clients
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetail {
    pub booking: Booking,
    pub tickets: Vec<Ticket>,
    pub vehicles: Vec<Vehicle>,
    pub payment: Option<Payment>,
    pub logs: Vec<BookingLog>,
}

/// Orchestrates the booking lifecycle on top of the store's atomic units.
///
/// Reservation follows read-plan-commit: capacity is checked against a ledger
/// snapshot, the write carries the snapshot's version, and a version conflict
/// at commit time means another booking got there first, so we reload and
/// plan again. Nothing is ever held for a request that fails.
pub struct BookingEngine {
    store: Arc<dyn BookingStore>,
    notifier: Arc<NotificationDispatcher>,
    config: EngineConfig,
}

impl BookingEngine {
    pub fn new(store: Arc<dyn BookingStore>, notifier: Arc<NotificationDispatcher>) -> Self {
        Self::with_config(store, notifier, EngineConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn BookingStore>,
        notifier: Arc<NotificationDispatcher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        &self.store
    }

    /// Atomically create a booking: seats and vehicle slots reserved, tickets
    /// issued, the audit log opened and the user's aggregates bumped, all in
    /// one unit, or nothing at all.
    pub async fn create_booking(
        &self,
        req: CreateBookingRequest,
        actor: ActorRef,
    ) -> Result<Booking, BookingError> {
        req.validate()?;

        let schedule = self
            .store
            .schedule(req.schedule_id)
            .await?
            .ok_or_else(|| BookingError::Validation(format!("Unknown schedule {}", req.schedule_id)))?;
        if !schedule.active {
            return Err(BookingError::Validation("Schedule is not active".to_string()));
        }
        if !schedule.operates_on(req.departure_date) {
            return Err(BookingError::Validation(format!(
                "Schedule does not operate on {}",
                req.departure_date
            )));
        }
        if req.departure_date < Utc::now().date_naive() {
            return Err(BookingError::Validation("Departure date is in the past".to_string()));
        }

        let route = self
            .store
            .route(schedule.route_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("route {}", schedule.route_id)))?;
        let vessel = self
            .store
            .vessel(schedule.vessel_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("vessel {}", schedule.vessel_id)))?;

        let passengers = req.passengers as i32;
        let mut vehicle_counts = VehicleCounts::default();
        for vehicle in &req.vehicles {
            vehicle_counts.add(vehicle.class, 1);
        }
        let fare = pricing::quote(&route, passengers, vehicle_counts)?;

        let mut attempts = 0;
        loop {
            attempts += 1;

            let existing = self.store.schedule_date(schedule.id, req.departure_date).await?;
            let ledger = ledger::plan_reserve(
                existing.as_ref(),
                &vessel,
                schedule.id,
                req.departure_date,
                passengers,
                vehicle_counts,
                Utc::now(),
            )?;

            let booking = Booking::new(
                req.user_id,
                schedule.id,
                req.departure_date,
                passengers,
                vehicle_counts.total(),
                fare.total,
                req.source,
            );
            let tickets = (0..req.passengers)
                .map(|i| {
                    let name = req
                        .passenger_names
                        .as_ref()
                        .and_then(|names| names.get(i as usize).cloned());
                    Ticket::new(booking.id, name)
                })
                .collect();
            let vehicles = req
                .vehicles
                .iter()
                .map(|v| Vehicle::new(booking.id, v.class, v.license_plate.clone(), v.description.clone()))
                .collect();
            let log = BookingLog::record(
                booking.id,
                None,
                BookingStatus::Pending,
                actor,
                Some("Booking created".to_string()),
            );

            let unit = CreationUnit {
                booking: booking.clone(),
                tickets,
                vehicles,
                ledger,
                log,
                stats_user_id: req.user_id,
                stats_amount: fare.total,
            };

            match self.store.commit_creation(unit).await {
                Ok(()) => {
                    info!(code = %booking.code, total = booking.total_amount, "booking created");
                    return Ok(booking);
                }
                Err(StoreError::VersionConflict(key)) if attempts < self.config.max_cas_attempts => {
                    debug!(%key, attempts, "ledger moved under us, replanning");
                    continue;
                }
                Err(StoreError::VersionConflict(_)) => return Err(BookingError::Conflict),
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// User-initiated cancellation: allowed from PENDING or CONFIRMED, up to
    /// the cutoff before departure. Releases held capacity in the same commit.
    pub async fn cancel_booking(
        &self,
        code: &str,
        reason: String,
        actor: ActorRef,
    ) -> Result<Booking, BookingError> {
        let booking = self.load(code).await?;
        if !lifecycle::permits(booking.status, BookingStatus::Cancelled) {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Cancelled,
            });
        }

        let days_until = (booking.departure_date - Utc::now().date_naive()).num_days();
        if days_until < self.config.cancellation_cutoff_days {
            return Err(BookingError::TooLateToCancel {
                date: booking.departure_date,
            });
        }

        let outcome = self
            .apply_transition(
                booking,
                BookingStatus::Cancelled,
                Some(reason.clone()),
                actor,
                Some(reason),
                None,
            )
            .await?;
        Ok(outcome.booking().clone())
    }

    /// Apply a status instruction (confirmation, completion, refund marking,
    /// system cancellation). Idempotent: a booking already in the requested
    /// status reports `AlreadyApplied`.
    pub async fn transition(
        &self,
        code: &str,
        new_status: BookingStatus,
        actor: ActorRef,
        note: Option<String>,
    ) -> Result<TransitionOutcome, BookingError> {
        let booking = self.load(code).await?;
        let reason = cancellation_reason(new_status, &note);
        self.apply_transition(booking, new_status, reason, actor, note, None).await
    }

    /// Same as `transition`, but lands a payment row in the same commit.
    /// Used by reconciliation so callback effects are all-or-nothing.
    pub async fn transition_with_payment(
        &self,
        code: &str,
        new_status: BookingStatus,
        actor: ActorRef,
        note: Option<String>,
        payment: Payment,
    ) -> Result<TransitionOutcome, BookingError> {
        let booking = self.load(code).await?;
        let reason = cancellation_reason(new_status, &note);
        self.apply_transition(booking, new_status, reason, actor, note, Some(payment)).await
    }

    /// Operator override of a departure's sale status, with optional expiry
    pub async fn set_departure_status(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
        status: DepartureStatus,
        reason: Option<String>,
        expires_at: Option<DateTime<Utc>>,
        actor: ActorRef,
    ) -> Result<ScheduleDate, BookingError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let existing = self.store.schedule_date(schedule_id, date).await?;
            let update = ledger::plan_status_override(
                existing.as_ref(),
                schedule_id,
                date,
                status,
                reason.clone(),
                expires_at,
            );
            let entry = update.entry.clone();

            match self.store.put_schedule_date(update).await {
                Ok(()) => {
                    info!(%schedule_id, %date, %status, actor = actor.kind.as_str(), "departure status set");
                    self.notifier
                        .emit(Notification::DepartureChanged {
                            schedule_id,
                            date,
                            status,
                            reason: reason.clone(),
                        })
                        .await;
                    return Ok(entry);
                }
                Err(StoreError::VersionConflict(_)) if attempts < self.config.max_cas_attempts => continue,
                Err(StoreError::VersionConflict(_)) => return Err(BookingError::Conflict),
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub async fn booking_detail(&self, code: &str) -> Result<BookingDetail, BookingError> {
        let booking = self.load(code).await?;
        let tickets = self.store.tickets_for(booking.id).await?;
        let vehicles = self.store.vehicles_for(booking.id).await?;
        let payment = self.store.payment_for(booking.id).await?;
        let logs = self.store.logs_for(booking.id).await?;
        Ok(BookingDetail {
            booking,
            tickets,
            vehicles,
            payment,
            logs,
        })
    }

    async fn load(&self, code: &str) -> Result<Booking, BookingError> {
        self.store
            .booking_by_code(code)
            .await?
            .ok_or_else(|| BookingError::NotFound(code.to_string()))
    }

    async fn apply_transition(
        &self,
        mut booking: Booking,
        new_status: BookingStatus,
        cancellation_reason: Option<String>,
        actor: ActorRef,
        note: Option<String>,
        payment: Option<Payment>,
    ) -> Result<TransitionOutcome, BookingError> {
        let mut attempts = 0;
        loop {
            attempts += 1;

            if booking.status == new_status {
                // Replayed instruction. The payment side still lands so a
                // retried callback can heal a half-reconciled record.
                if let Some(p) = payment.clone() {
                    self.store.save_payment(p).await?;
                }
                return Ok(TransitionOutcome::AlreadyApplied(booking));
            }
            if !lifecycle::permits(booking.status, new_status) {
                return Err(BookingError::InvalidTransition {
                    from: booking.status,
                    to: new_status,
                });
            }

            let ticket_status = match new_status {
                BookingStatus::Cancelled => Some(TicketStatus::Cancelled),
                BookingStatus::Completed => Some(TicketStatus::Used),
                _ => None,
            };
            let ledger = if new_status == BookingStatus::Cancelled {
                Some(self.plan_release_for(&booking).await?)
            } else {
                None
            };
            let log = BookingLog::record(booking.id, Some(booking.status), new_status, actor, note.clone());

            let unit = TransitionUnit {
                booking_id: booking.id,
                expected_status: booking.status,
                new_status,
                cancellation_reason: cancellation_reason.clone(),
                ticket_status,
                ledger,
                log,
                payment: payment.clone(),
            };

            match self.store.commit_transition(unit).await {
                Ok(()) => {
                    booking.update_status(new_status);
                    if new_status == BookingStatus::Cancelled {
                        booking.cancellation_reason = cancellation_reason.clone();
                    }
                    info!(code = %booking.code, status = %new_status, "booking transitioned");
                    self.emit_for(&booking).await;
                    return Ok(TransitionOutcome::Applied(booking));
                }
                Err(StoreError::VersionConflict(key)) if attempts < self.config.max_cas_attempts => {
                    debug!(%key, attempts, "transition raced another writer, reloading");
                    booking = self.load(&booking.code).await?;
                    continue;
                }
                Err(StoreError::VersionConflict(_)) => return Err(BookingError::Conflict),
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn plan_release_for(&self, booking: &Booking) -> Result<LedgerUpdate, BookingError> {
        let schedule = self
            .store
            .schedule(booking.schedule_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("schedule {}", booking.schedule_id)))?;
        let vessel = self
            .store
            .vessel(schedule.vessel_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("vessel {}", schedule.vessel_id)))?;
        let entry = self
            .store
            .schedule_date(booking.schedule_id, booking.departure_date)
            .await?
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "schedule_date {} {}",
                    booking.schedule_id, booking.departure_date
                ))
            })?;
        let vehicles = self.store.vehicles_for(booking.id).await?;

        Ok(ledger::plan_release(
            &entry,
            &vessel,
            booking.passenger_count,
            VehicleCounts::from_vehicles(&vehicles),
        ))
    }

    async fn emit_for(&self, booking: &Booking) {
        match booking.status {
            BookingStatus::Confirmed => {
                self.notifier
                    .emit(Notification::BookingConfirmed {
                        booking_code: booking.code.clone(),
                        total_amount: booking.total_amount,
                    })
                    .await;
            }
            BookingStatus::Cancelled => {
                self.notifier
                    .emit(Notification::BookingCancelled {
                        booking_code: booking.code.clone(),
                        reason: booking
                            .cancellation_reason
                            .clone()
                            .unwrap_or_else(|| "cancelled".to_string()),
                    })
                    .await;
            }
            _ => {}
        }
    }
}

fn cancellation_reason(new_status: BookingStatus, note: &Option<String>) -> Option<String> {
    if new_status == BookingStatus::Cancelled {
        note.clone().or_else(|| Some("cancelled".to_string()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogSink;
    use chrono::{Duration, NaiveTime};
    use trajekt_domain::schedule::{OperatingDays, Route, Schedule, Vessel};
    use trajekt_store::MemoryStore;

    fn dispatcher() -> Arc<NotificationDispatcher> {
        Arc::new(NotificationDispatcher::new(
            Arc::new(LogSink),
            std::time::Duration::from_secs(60),
        ))
    }

    /// Seeds a daily Merak-Bakauheni schedule and returns an engine over a
    /// fresh in-memory store, plus the ids a request needs.
    async fn seeded_engine(passenger_capacity: i32) -> (Arc<BookingEngine>, Uuid, NaiveDate) {
        let store: Arc<dyn BookingStore> = Arc::new(MemoryStore::default());

        let route = Route::new("Merak".to_string(), "Bakauheni".to_string(), 75_000)
            .with_vehicle_price(VehicleClass::Car, 100_000)
            .with_vehicle_price(VehicleClass::Motorcycle, 25_000);
        let vessel = Vessel {
            id: Uuid::new_v4(),
            name: "KMP Jatra I".to_string(),
            passenger_capacity,
            motorcycle_capacity: 10,
            car_capacity: 5,
            bus_capacity: 2,
            truck_capacity: 2,
        };
        let schedule = Schedule::new(
            route.id,
            vessel.id,
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            OperatingDays::DAILY,
        );
        let schedule_id = schedule.id;

        store.insert_route(route).await.unwrap();
        store.insert_vessel(vessel).await.unwrap();
        store.insert_schedule(schedule).await.unwrap();

        let config = EngineConfig {
            cancellation_cutoff_days: 1,
            max_cas_attempts: 16,
        };
        let engine = Arc::new(BookingEngine::with_config(store, dispatcher(), config));
        let date = Utc::now().date_naive() + Duration::days(7);
        (engine, schedule_id, date)
    }

    fn request(schedule_id: Uuid, date: NaiveDate, passengers: u32) -> CreateBookingRequest {
        CreateBookingRequest {
            user_id: Uuid::new_v4(),
            schedule_id,
            departure_date: date,
            passengers,
            passenger_names: None,
            vehicles: Vec::new(),
            source: BookingSource::Web,
        }
    }

    #[tokio::test]
    async fn test_create_booking_reserves_and_issues_tickets() {
        let (engine, schedule_id, date) = seeded_engine(100).await;
        let user_id = Uuid::new_v4();

        let mut req = request(schedule_id, date, 2);
        req.user_id = user_id;
        req.passenger_names = Some(vec!["Siti Rahayu".to_string(), "Budi Santoso".to_string()]);
        req.vehicles = vec![VehicleRequest {
            class: VehicleClass::Car,
            license_plate: "B 1234 XYZ".to_string(),
            description: Some("Toyota Avanza".to_string()),
        }];

        let booking = engine.create_booking(req, ActorRef::user(user_id)).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_amount, 250_000);
        assert_eq!(booking.passenger_count, 2);
        assert_eq!(booking.vehicle_count, 1);

        let entry = engine
            .store()
            .schedule_date(schedule_id, date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.passenger_count, 2);
        assert_eq!(entry.car_count, 1);

        let detail = engine.booking_detail(&booking.code).await.unwrap();
        assert_eq!(detail.tickets.len(), 2);
        assert_eq!(detail.tickets[0].passenger_name.as_deref(), Some("Siti Rahayu"));
        assert!(detail.tickets.iter().all(|t| t.status == TicketStatus::Active));
        assert_eq!(detail.vehicles.len(), 1);
        assert_eq!(detail.vehicles[0].description.as_deref(), Some("Toyota Avanza"));
        assert_eq!(detail.logs.len(), 1);
        assert!(detail.payment.is_none());

        let stats = engine.store().user_stats(user_id).await.unwrap().unwrap();
        assert_eq!(stats.booking_count, 1);
        assert_eq!(stats.total_spent, 250_000);
    }

    #[tokio::test]
    async fn test_create_rejects_zero_passengers() {
        let (engine, schedule_id, date) = seeded_engine(100).await;
        let err = engine
            .create_booking(request(schedule_id, date, 0), ActorRef::system())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_passenger_count_beyond_i32() {
        let (engine, schedule_id, date) = seeded_engine(100).await;
        let err = engine
            .create_booking(request(schedule_id, date, 4_000_000_000), ActorRef::system())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));

        // nothing was reserved for the rejected request
        let entry = engine.store().schedule_date(schedule_id, date).await.unwrap();
        assert!(entry.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_over_capacity() {
        let (engine, schedule_id, date) = seeded_engine(2).await;
        let err = engine
            .create_booking(request(schedule_id, date, 3), ActorRef::system())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Capacity(CapacityError::Exceeded { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bookings_never_oversell() {
        let (engine, schedule_id, date) = seeded_engine(5).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .create_booking(request(schedule_id, date, 1), ActorRef::system())
                    .await
            }));
        }

        let mut succeeded = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(BookingError::Capacity(_)) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 5);
        assert_eq!(rejected, 3);

        let entry = engine
            .store()
            .schedule_date(schedule_id, date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.passenger_count, 5);
        assert_eq!(entry.status, DepartureStatus::Full);
    }

    #[tokio::test]
    async fn test_cancel_releases_capacity() {
        let (engine, schedule_id, date) = seeded_engine(100).await;
        let user_id = Uuid::new_v4();

        let mut req = request(schedule_id, date, 3);
        req.user_id = user_id;
        req.vehicles = vec![VehicleRequest {
            class: VehicleClass::Motorcycle,
            license_plate: "B 5678 ABC".to_string(),
            description: None,
        }];
        let booking = engine.create_booking(req, ActorRef::user(user_id)).await.unwrap();

        let cancelled = engine
            .cancel_booking(&booking.code, "change of plans".to_string(), ActorRef::user(user_id))
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("change of plans"));

        let entry = engine
            .store()
            .schedule_date(schedule_id, date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.passenger_count, 0);
        assert_eq!(entry.motorcycle_count, 0);

        let detail = engine.booking_detail(&booking.code).await.unwrap();
        assert!(detail.tickets.iter().all(|t| t.status == TicketStatus::Cancelled));
        assert_eq!(detail.logs.len(), 2);
        assert_eq!(detail.logs[1].new_status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_inside_cutoff_rejected() {
        let (engine, schedule_id, _) = seeded_engine(100).await;
        let today = Utc::now().date_naive();

        let booking = engine
            .create_booking(request(schedule_id, today, 1), ActorRef::system())
            .await
            .unwrap();
        let err = engine
            .cancel_booking(&booking.code, "too late".to_string(), ActorRef::system())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::TooLateToCancel { .. }));
    }

    #[tokio::test]
    async fn test_confirm_is_idempotent() {
        let (engine, schedule_id, date) = seeded_engine(100).await;
        let booking = engine
            .create_booking(request(schedule_id, date, 1), ActorRef::system())
            .await
            .unwrap();

        let first = engine
            .transition(&booking.code, BookingStatus::Confirmed, ActorRef::gateway(), None)
            .await
            .unwrap();
        assert!(matches!(first, TransitionOutcome::Applied(_)));
        assert_eq!(first.booking().status, BookingStatus::Confirmed);

        let replay = engine
            .transition(&booking.code, BookingStatus::Confirmed, ActorRef::gateway(), None)
            .await
            .unwrap();
        assert!(matches!(replay, TransitionOutcome::AlreadyApplied(_)));
    }

    #[tokio::test]
    async fn test_pending_cannot_skip_to_completed() {
        let (engine, schedule_id, date) = seeded_engine(100).await;
        let booking = engine
            .create_booking(request(schedule_id, date, 1), ActorRef::system())
            .await
            .unwrap();

        let err = engine
            .transition(&booking.code, BookingStatus::Completed, ActorRef::system(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::InvalidTransition {
                from: BookingStatus::Pending,
                to: BookingStatus::Completed,
            }
        ));
    }

    #[tokio::test]
    async fn test_closed_departure_blocks_booking() {
        let (engine, schedule_id, date) = seeded_engine(100).await;

        engine
            .set_departure_status(
                schedule_id,
                date,
                DepartureStatus::WeatherIssue,
                Some("storm warning".to_string()),
                None,
                ActorRef::admin(Uuid::new_v4()),
            )
            .await
            .unwrap();

        let err = engine
            .create_booking(request(schedule_id, date, 1), ActorRef::system())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::Capacity(CapacityError::NotOpen {
                status: DepartureStatus::WeatherIssue,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_cancel_after_departure_closed_still_releases() {
        let (engine, schedule_id, date) = seeded_engine(100).await;
        let booking = engine
            .create_booking(request(schedule_id, date, 2), ActorRef::system())
            .await
            .unwrap();

        engine
            .set_departure_status(
                schedule_id,
                date,
                DepartureStatus::Cancelled,
                Some("vessel maintenance".to_string()),
                None,
                ActorRef::admin(Uuid::new_v4()),
            )
            .await
            .unwrap();

        // seats come back even though the departure stays closed
        engine
            .cancel_booking(&booking.code, "departure cancelled".to_string(), ActorRef::system())
            .await
            .unwrap();
        let entry = engine
            .store()
            .schedule_date(schedule_id, date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.passenger_count, 0);
        assert_eq!(entry.status, DepartureStatus::Cancelled);
    }
}
