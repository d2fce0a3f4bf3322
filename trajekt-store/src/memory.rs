use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use trajekt_domain::booking::{Booking, BookingLog, Ticket, TicketStatus, Vehicle};
use trajekt_domain::payment::Payment;
use trajekt_domain::repository::{
    BookingStore, CreationUnit, LedgerUpdate, StoreError, StoreResult, TransitionUnit, UserStats,
};
use trajekt_domain::schedule::{Route, Schedule, ScheduleDate, Vessel};

/// In-memory store with the same guard semantics as the Postgres store:
/// unit commits are all-or-nothing, ledger writes are version-checked and
/// booking transitions are status-checked. One lock stands in for the
/// database transaction. Backs tests and local development.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    routes: HashMap<Uuid, Route>,
    vessels: HashMap<Uuid, Vessel>,
    schedules: HashMap<Uuid, Schedule>,
    schedule_dates: HashMap<(Uuid, NaiveDate), ScheduleDate>,
    bookings: HashMap<Uuid, Booking>,
    booking_codes: HashMap<String, Uuid>,
    tickets: HashMap<Uuid, Vec<Ticket>>,
    vehicles: HashMap<Uuid, Vec<Vehicle>>,
    logs: HashMap<Uuid, Vec<BookingLog>>,
    payments: HashMap<Uuid, Payment>,
    user_stats: HashMap<Uuid, UserStats>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ledger_key(update: &LedgerUpdate) -> (Uuid, NaiveDate) {
    (update.entry.schedule_id, update.entry.date)
}

impl Inner {
    fn check_ledger(&self, update: &LedgerUpdate) -> StoreResult<()> {
        let key = ledger_key(update);
        let current = self.schedule_dates.get(&key).map(|e| e.version);
        match (update.expected_version, current) {
            (None, None) => Ok(()),
            (Some(expected), Some(version)) if expected == version => Ok(()),
            _ => Err(StoreError::VersionConflict(format!(
                "schedule_date {}/{}",
                key.0, key.1
            ))),
        }
    }

    fn apply_ledger(&mut self, update: LedgerUpdate) {
        self.schedule_dates.insert(ledger_key(&update), update.entry);
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn route(&self, id: Uuid) -> StoreResult<Option<Route>> {
        Ok(self.inner.lock().routes.get(&id).cloned())
    }

    async fn vessel(&self, id: Uuid) -> StoreResult<Option<Vessel>> {
        Ok(self.inner.lock().vessels.get(&id).cloned())
    }

    async fn schedule(&self, id: Uuid) -> StoreResult<Option<Schedule>> {
        Ok(self.inner.lock().schedules.get(&id).cloned())
    }

    async fn schedule_date(&self, schedule_id: Uuid, date: NaiveDate) -> StoreResult<Option<ScheduleDate>> {
        Ok(self.inner.lock().schedule_dates.get(&(schedule_id, date)).cloned())
    }

    async fn put_schedule_date(&self, update: LedgerUpdate) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.check_ledger(&update)?;
        inner.apply_ledger(update);
        Ok(())
    }

    async fn booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.inner.lock().bookings.get(&id).cloned())
    }

    async fn booking_by_code(&self, code: &str) -> StoreResult<Option<Booking>> {
        let inner = self.inner.lock();
        Ok(inner
            .booking_codes
            .get(code)
            .and_then(|id| inner.bookings.get(id))
            .cloned())
    }

    async fn tickets_for(&self, booking_id: Uuid) -> StoreResult<Vec<Ticket>> {
        Ok(self.inner.lock().tickets.get(&booking_id).cloned().unwrap_or_default())
    }

    async fn vehicles_for(&self, booking_id: Uuid) -> StoreResult<Vec<Vehicle>> {
        Ok(self.inner.lock().vehicles.get(&booking_id).cloned().unwrap_or_default())
    }

    async fn logs_for(&self, booking_id: Uuid) -> StoreResult<Vec<BookingLog>> {
        Ok(self.inner.lock().logs.get(&booking_id).cloned().unwrap_or_default())
    }

    async fn payment_for(&self, booking_id: Uuid) -> StoreResult<Option<Payment>> {
        let inner = self.inner.lock();
        Ok(inner
            .payments
            .values()
            .filter(|p| p.booking_id == booking_id)
            .max_by_key(|p| (p.created_at, p.id))
            .cloned())
    }

    async fn payment_by_order_id(&self, order_id: &str) -> StoreResult<Option<Payment>> {
        let inner = self.inner.lock();
        Ok(inner
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .max_by_key(|p| (p.created_at, p.id))
            .cloned())
    }

    async fn save_payment(&self, payment: Payment) -> StoreResult<()> {
        self.inner.lock().payments.insert(payment.id, payment);
        Ok(())
    }

    async fn user_stats(&self, user_id: Uuid) -> StoreResult<Option<UserStats>> {
        Ok(self.inner.lock().user_stats.get(&user_id).cloned())
    }

    async fn commit_creation(&self, unit: CreationUnit) -> StoreResult<()> {
        let mut inner = self.inner.lock();

        // all guards first, so a failed commit leaves no trace
        inner.check_ledger(&unit.ledger)?;
        if inner.booking_codes.contains_key(&unit.booking.code) {
            return Err(StoreError::Duplicate(format!("booking code {}", unit.booking.code)));
        }

        inner.apply_ledger(unit.ledger);
        let booking_id = unit.booking.id;
        inner.booking_codes.insert(unit.booking.code.clone(), booking_id);
        inner.bookings.insert(booking_id, unit.booking);
        inner.tickets.insert(booking_id, unit.tickets);
        inner.vehicles.insert(booking_id, unit.vehicles);
        inner.logs.entry(booking_id).or_default().push(unit.log);

        let stats = inner
            .user_stats
            .entry(unit.stats_user_id)
            .or_insert_with(|| UserStats::empty(unit.stats_user_id));
        stats.booking_count += 1;
        stats.total_spent += unit.stats_amount;

        Ok(())
    }

    async fn commit_transition(&self, unit: TransitionUnit) -> StoreResult<()> {
        let mut inner = self.inner.lock();

        let current = inner
            .bookings
            .get(&unit.booking_id)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", unit.booking_id)))?;
        if current.status != unit.expected_status {
            return Err(StoreError::VersionConflict(format!("booking {}", current.code)));
        }
        if let Some(ledger) = &unit.ledger {
            inner.check_ledger(ledger)?;
        }

        if let Some(ledger) = unit.ledger {
            inner.apply_ledger(ledger);
        }
        if let Some(booking) = inner.bookings.get_mut(&unit.booking_id) {
            booking.update_status(unit.new_status);
            if unit.cancellation_reason.is_some() {
                booking.cancellation_reason = unit.cancellation_reason.clone();
            }
        }
        if let Some(status) = unit.ticket_status {
            if let Some(tickets) = inner.tickets.get_mut(&unit.booking_id) {
                for ticket in tickets {
                    match status {
                        TicketStatus::Used => ticket.check_in(),
                        other => ticket.status = other,
                    }
                }
            }
        }
        inner.logs.entry(unit.booking_id).or_default().push(unit.log);
        if let Some(payment) = unit.payment {
            inner.payments.insert(payment.id, payment);
        }

        Ok(())
    }

    async fn insert_route(&self, route: Route) -> StoreResult<()> {
        self.inner.lock().routes.insert(route.id, route);
        Ok(())
    }

    async fn insert_vessel(&self, vessel: Vessel) -> StoreResult<()> {
        self.inner.lock().vessels.insert(vessel.id, vessel);
        Ok(())
    }

    async fn insert_schedule(&self, schedule: Schedule) -> StoreResult<()> {
        self.inner.lock().schedules.insert(schedule.id, schedule);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trajekt_domain::booking::{ActorRef, BookingSource, BookingStatus};

    fn sample_entry(schedule_id: Uuid, version: i64) -> ScheduleDate {
        let mut entry = ScheduleDate::open(schedule_id, NaiveDate::from_ymd_opt(2026, 9, 1).unwrap());
        entry.version = version;
        entry
    }

    fn sample_booking() -> Booking {
        Booking::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            2,
            0,
            150_000,
            BookingSource::Web,
        )
    }

    fn creation_unit(booking: Booking, ledger: LedgerUpdate) -> CreationUnit {
        let log = BookingLog::record(
            booking.id,
            None,
            BookingStatus::Pending,
            ActorRef::system(),
            None,
        );
        let user_id = booking.user_id;
        let amount = booking.total_amount;
        CreationUnit {
            tickets: vec![Ticket::new(booking.id, None)],
            vehicles: vec![],
            ledger,
            log,
            stats_user_id: user_id,
            stats_amount: amount,
            booking,
        }
    }

    #[tokio::test]
    async fn test_ledger_cas_rejects_stale_write() {
        let store = MemoryStore::new();
        let schedule_id = Uuid::new_v4();

        store
            .put_schedule_date(LedgerUpdate {
                expected_version: None,
                entry: sample_entry(schedule_id, 0),
            })
            .await
            .unwrap();

        // both writers read version 0; the second must lose
        let first = LedgerUpdate { expected_version: Some(0), entry: sample_entry(schedule_id, 1) };
        let second = LedgerUpdate { expected_version: Some(0), entry: sample_entry(schedule_id, 1) };

        store.put_schedule_date(first).await.unwrap();
        let err = store.put_schedule_date(second).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict(_)));
    }

    #[tokio::test]
    async fn test_insert_collides_with_existing_entry() {
        let store = MemoryStore::new();
        let schedule_id = Uuid::new_v4();
        let insert = |version| LedgerUpdate {
            expected_version: None,
            entry: sample_entry(schedule_id, version),
        };

        store.put_schedule_date(insert(0)).await.unwrap();
        let err = store.put_schedule_date(insert(0)).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict(_)));
    }

    #[tokio::test]
    async fn test_failed_creation_leaves_no_trace() {
        let store = MemoryStore::new();
        let booking = sample_booking();
        let schedule_id = booking.schedule_id;

        store
            .put_schedule_date(LedgerUpdate {
                expected_version: None,
                entry: sample_entry(schedule_id, 0),
            })
            .await
            .unwrap();

        // stale ledger expectation: the whole unit must be rejected
        let stale = LedgerUpdate { expected_version: Some(3), entry: sample_entry(schedule_id, 4) };
        let code = booking.code.clone();
        let user_id = booking.user_id;
        let err = store.commit_creation(creation_unit(booking, stale)).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict(_)));

        assert!(store.booking_by_code(&code).await.unwrap().is_none());
        assert!(store.user_stats(user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_creation_writes_every_piece() {
        let store = MemoryStore::new();
        let booking = sample_booking();
        let code = booking.code.clone();
        let user_id = booking.user_id;
        let booking_id = booking.id;
        let ledger = LedgerUpdate {
            expected_version: None,
            entry: sample_entry(booking.schedule_id, 0),
        };

        store.commit_creation(creation_unit(booking, ledger)).await.unwrap();

        let stored = store.booking_by_code(&code).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
        assert_eq!(store.tickets_for(booking_id).await.unwrap().len(), 1);
        assert_eq!(store.logs_for(booking_id).await.unwrap().len(), 1);
        let stats = store.user_stats(user_id).await.unwrap().unwrap();
        assert_eq!(stats.booking_count, 1);
        assert_eq!(stats.total_spent, 150_000);
    }

    #[tokio::test]
    async fn test_transition_requires_expected_status() {
        let store = MemoryStore::new();
        let booking = sample_booking();
        let booking_id = booking.id;
        let code = booking.code.clone();
        let ledger = LedgerUpdate {
            expected_version: None,
            entry: sample_entry(booking.schedule_id, 0),
        };
        store.commit_creation(creation_unit(booking, ledger)).await.unwrap();

        let unit = TransitionUnit {
            booking_id,
            expected_status: BookingStatus::Confirmed, // actually Pending
            new_status: BookingStatus::Completed,
            cancellation_reason: None,
            ticket_status: None,
            ledger: None,
            log: BookingLog::record(
                booking_id,
                Some(BookingStatus::Confirmed),
                BookingStatus::Completed,
                ActorRef::system(),
                None,
            ),
            payment: None,
        };
        let err = store.commit_transition(unit).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict(_)));

        let stored = store.booking_by_code(&code).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
        assert_eq!(store.logs_for(booking_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_newest_payment_is_active() {
        let store = MemoryStore::new();
        let booking_id = Uuid::new_v4();

        let older = Payment::new(
            booking_id,
            "TRJ-AAAA1111".to_string(),
            trajekt_domain::payment::PaymentChannel::Qris,
            100_000,
        );
        store.save_payment(older.clone()).await.unwrap();

        let newer = Payment::new(
            booking_id,
            "TRJ-AAAA1111-R2".to_string(),
            trajekt_domain::payment::PaymentChannel::Qris,
            100_000,
        );
        store.save_payment(newer.clone()).await.unwrap();

        let active = store.payment_for(booking_id).await.unwrap().unwrap();
        assert_eq!(active.id, newer.id);
        let by_order = store.payment_by_order_id(&older.order_id).await.unwrap().unwrap();
        assert_eq!(by_order.id, older.id);
    }
}
