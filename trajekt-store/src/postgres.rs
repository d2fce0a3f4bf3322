use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use trajekt_domain::booking::{
    ActorKind, ActorRef, Booking, BookingLog, BookingSource, BookingStatus, Ticket, TicketStatus,
    Vehicle,
};
use trajekt_domain::payment::{Payment, PaymentStatus};
use trajekt_domain::repository::{
    BookingStore, CreationUnit, LedgerUpdate, StoreError, StoreResult, TransitionUnit, UserStats,
};
use trajekt_domain::schedule::{
    DepartureStatus, OperatingDays, Route, Schedule, ScheduleDate, VehicleClass, Vessel,
};

/// Postgres-backed store. Each unit commit runs in one transaction; the
/// ledger version and the booking status act as the optimistic guards,
/// surfaced as `StoreError::VersionConflict` when a competing writer won.
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn apply_ledger(tx: &mut Transaction<'_, Postgres>, update: &LedgerUpdate) -> StoreResult<()> {
        let entry = &update.entry;
        match update.expected_version {
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO schedule_dates
                        (schedule_id, date, passenger_count, motorcycle_count, car_count,
                         bus_count, truck_count, status, status_reason, status_expires_at, version)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                    "#,
                )
                .bind(entry.schedule_id)
                .bind(entry.date)
                .bind(entry.passenger_count)
                .bind(entry.motorcycle_count)
                .bind(entry.car_count)
                .bind(entry.bus_count)
                .bind(entry.truck_count)
                .bind(entry.status.as_str())
                .bind(entry.status_reason.clone())
                .bind(entry.status_expires_at)
                .bind(entry.version)
                .execute(&mut **tx)
                .await;

                match result {
                    Ok(_) => Ok(()),
                    // another writer created the entry first
                    Err(err) if unique_violation(&err) => Err(conflict(entry.schedule_id, entry.date)),
                    Err(err) => Err(db_err(err)),
                }
            }
            Some(expected) => {
                let result = sqlx::query(
                    r#"
                    UPDATE schedule_dates
                    SET passenger_count = $1, motorcycle_count = $2, car_count = $3,
                        bus_count = $4, truck_count = $5, status = $6,
                        status_reason = $7, status_expires_at = $8, version = $9
                    WHERE schedule_id = $10 AND date = $11 AND version = $12
                    "#,
                )
                .bind(entry.passenger_count)
                .bind(entry.motorcycle_count)
                .bind(entry.car_count)
                .bind(entry.bus_count)
                .bind(entry.truck_count)
                .bind(entry.status.as_str())
                .bind(entry.status_reason.clone())
                .bind(entry.status_expires_at)
                .bind(entry.version)
                .bind(entry.schedule_id)
                .bind(entry.date)
                .bind(expected)
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;

                if result.rows_affected() == 0 {
                    return Err(conflict(entry.schedule_id, entry.date));
                }
                Ok(())
            }
        }
    }

    async fn insert_log(tx: &mut Transaction<'_, Postgres>, log: &BookingLog) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO booking_logs
                (id, booking_id, previous_status, new_status, actor_kind, actor_id, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(log.id)
        .bind(log.booking_id)
        .bind(log.previous_status.map(|s| s.as_str()))
        .bind(log.new_status.as_str())
        .bind(log.actor.kind.as_str())
        .bind(log.actor.id)
        .bind(log.note.clone())
        .bind(log.created_at)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn upsert_payment(tx: &mut Transaction<'_, Postgres>, payment: &Payment) -> StoreResult<()> {
        let channel = serde_json::to_string(&payment.channel).map_err(encode_err)?;
        let raw_response = match &payment.raw_response {
            Some(value) => Some(serde_json::to_string(value).map_err(encode_err)?),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO payments
                (id, booking_id, order_id, status, channel, amount, transaction_id,
                 va_number, qr_reference, is_fallback, expires_at, paid_at,
                 refund_amount, refunded_at, raw_response, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                transaction_id = EXCLUDED.transaction_id,
                va_number = EXCLUDED.va_number,
                qr_reference = EXCLUDED.qr_reference,
                is_fallback = EXCLUDED.is_fallback,
                expires_at = EXCLUDED.expires_at,
                paid_at = EXCLUDED.paid_at,
                refund_amount = EXCLUDED.refund_amount,
                refunded_at = EXCLUDED.refunded_at,
                raw_response = EXCLUDED.raw_response,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(payment.order_id.clone())
        .bind(payment.status.as_str())
        .bind(channel)
        .bind(payment.amount)
        .bind(payment.transaction_id.clone())
        .bind(payment.va_number.clone())
        .bind(payment.qr_reference.clone())
        .bind(payment.is_fallback)
        .bind(payment.expires_at)
        .bind(payment.paid_at)
        .bind(payment.refund_amount)
        .bind(payment.refunded_at)
        .bind(raw_response)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn encode_err(err: serde_json::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn conflict(schedule_id: Uuid, date: NaiveDate) -> StoreError {
    StoreError::VersionConflict(format!("schedule_date {schedule_id}/{date}"))
}

fn bad_enum(column: &str, value: &str) -> StoreError {
    StoreError::Backend(format!("Unreadable {column} value: {value}"))
}

fn map_route(row: &PgRow) -> StoreResult<Route> {
    let prices: String = row.try_get("vehicle_prices").map_err(db_err)?;
    let vehicle_prices = serde_json::from_str(&prices)
        .map_err(|e| StoreError::Backend(format!("Unreadable vehicle_prices: {e}")))?;
    Ok(Route {
        id: row.try_get("id").map_err(db_err)?,
        origin: row.try_get("origin").map_err(db_err)?,
        destination: row.try_get("destination").map_err(db_err)?,
        base_price: row.try_get("base_price").map_err(db_err)?,
        vehicle_prices,
    })
}

fn map_vessel(row: &PgRow) -> StoreResult<Vessel> {
    Ok(Vessel {
        id: row.try_get("id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        passenger_capacity: row.try_get("passenger_capacity").map_err(db_err)?,
        motorcycle_capacity: row.try_get("motorcycle_capacity").map_err(db_err)?,
        car_capacity: row.try_get("car_capacity").map_err(db_err)?,
        bus_capacity: row.try_get("bus_capacity").map_err(db_err)?,
        truck_capacity: row.try_get("truck_capacity").map_err(db_err)?,
    })
}

fn map_schedule(row: &PgRow) -> StoreResult<Schedule> {
    let days: i16 = row.try_get("days").map_err(db_err)?;
    Ok(Schedule {
        id: row.try_get("id").map_err(db_err)?,
        route_id: row.try_get("route_id").map_err(db_err)?,
        vessel_id: row.try_get("vessel_id").map_err(db_err)?,
        departure_time: row.try_get("departure_time").map_err(db_err)?,
        days: OperatingDays(days as u8),
        active: row.try_get("active").map_err(db_err)?,
    })
}

fn map_schedule_date(row: &PgRow) -> StoreResult<ScheduleDate> {
    let status: String = row.try_get("status").map_err(db_err)?;
    Ok(ScheduleDate {
        schedule_id: row.try_get("schedule_id").map_err(db_err)?,
        date: row.try_get("date").map_err(db_err)?,
        passenger_count: row.try_get("passenger_count").map_err(db_err)?,
        motorcycle_count: row.try_get("motorcycle_count").map_err(db_err)?,
        car_count: row.try_get("car_count").map_err(db_err)?,
        bus_count: row.try_get("bus_count").map_err(db_err)?,
        truck_count: row.try_get("truck_count").map_err(db_err)?,
        status: DepartureStatus::from_db(&status).ok_or_else(|| bad_enum("status", &status))?,
        status_reason: row.try_get("status_reason").map_err(db_err)?,
        status_expires_at: row.try_get("status_expires_at").map_err(db_err)?,
        version: row.try_get("version").map_err(db_err)?,
    })
}

fn map_booking(row: &PgRow) -> StoreResult<Booking> {
    let status: String = row.try_get("status").map_err(db_err)?;
    let source: String = row.try_get("source").map_err(db_err)?;
    Ok(Booking {
        id: row.try_get("id").map_err(db_err)?,
        code: row.try_get("code").map_err(db_err)?,
        user_id: row.try_get("user_id").map_err(db_err)?,
        schedule_id: row.try_get("schedule_id").map_err(db_err)?,
        departure_date: row.try_get("departure_date").map_err(db_err)?,
        passenger_count: row.try_get("passenger_count").map_err(db_err)?,
        vehicle_count: row.try_get("vehicle_count").map_err(db_err)?,
        total_amount: row.try_get("total_amount").map_err(db_err)?,
        status: BookingStatus::from_db(&status).ok_or_else(|| bad_enum("status", &status))?,
        cancellation_reason: row.try_get("cancellation_reason").map_err(db_err)?,
        source: BookingSource::from_db(&source).ok_or_else(|| bad_enum("source", &source))?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn map_ticket(row: &PgRow) -> StoreResult<Ticket> {
    let status: String = row.try_get("status").map_err(db_err)?;
    Ok(Ticket {
        id: row.try_get("id").map_err(db_err)?,
        booking_id: row.try_get("booking_id").map_err(db_err)?,
        code: row.try_get("code").map_err(db_err)?,
        qr_token: row.try_get("qr_token").map_err(db_err)?,
        passenger_name: row.try_get("passenger_name").map_err(db_err)?,
        status: TicketStatus::from_db(&status).ok_or_else(|| bad_enum("status", &status))?,
        checked_in_at: row.try_get("checked_in_at").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn map_vehicle(row: &PgRow) -> StoreResult<Vehicle> {
    let class: String = row.try_get("class").map_err(db_err)?;
    Ok(Vehicle {
        id: row.try_get("id").map_err(db_err)?,
        booking_id: row.try_get("booking_id").map_err(db_err)?,
        class: VehicleClass::from_db(&class).ok_or_else(|| bad_enum("class", &class))?,
        license_plate: row.try_get("license_plate").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn map_log(row: &PgRow) -> StoreResult<BookingLog> {
    let previous: Option<String> = row.try_get("previous_status").map_err(db_err)?;
    let previous_status = match previous {
        Some(s) => Some(BookingStatus::from_db(&s).ok_or_else(|| bad_enum("previous_status", &s))?),
        None => None,
    };
    let new: String = row.try_get("new_status").map_err(db_err)?;
    let actor_kind: String = row.try_get("actor_kind").map_err(db_err)?;
    Ok(BookingLog {
        id: row.try_get("id").map_err(db_err)?,
        booking_id: row.try_get("booking_id").map_err(db_err)?,
        previous_status,
        new_status: BookingStatus::from_db(&new).ok_or_else(|| bad_enum("new_status", &new))?,
        actor: ActorRef {
            kind: ActorKind::from_db(&actor_kind).ok_or_else(|| bad_enum("actor_kind", &actor_kind))?,
            id: row.try_get("actor_id").map_err(db_err)?,
        },
        note: row.try_get("note").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn map_payment(row: &PgRow) -> StoreResult<Payment> {
    let status: String = row.try_get("status").map_err(db_err)?;
    let channel: String = row.try_get("channel").map_err(db_err)?;
    let raw: Option<String> = row.try_get("raw_response").map_err(db_err)?;
    let raw_response = match raw {
        Some(s) => Some(
            serde_json::from_str(&s)
                .map_err(|e| StoreError::Backend(format!("Unreadable raw_response: {e}")))?,
        ),
        None => None,
    };
    Ok(Payment {
        id: row.try_get("id").map_err(db_err)?,
        booking_id: row.try_get("booking_id").map_err(db_err)?,
        order_id: row.try_get("order_id").map_err(db_err)?,
        status: PaymentStatus::from_db(&status).ok_or_else(|| bad_enum("status", &status))?,
        channel: serde_json::from_str(&channel)
            .map_err(|e| StoreError::Backend(format!("Unreadable channel: {e}")))?,
        amount: row.try_get("amount").map_err(db_err)?,
        transaction_id: row.try_get("transaction_id").map_err(db_err)?,
        va_number: row.try_get("va_number").map_err(db_err)?,
        qr_reference: row.try_get("qr_reference").map_err(db_err)?,
        is_fallback: row.try_get("is_fallback").map_err(db_err)?,
        expires_at: row.try_get("expires_at").map_err(db_err)?,
        paid_at: row.try_get("paid_at").map_err(db_err)?,
        refund_amount: row.try_get("refund_amount").map_err(db_err)?,
        refunded_at: row.try_get("refunded_at").map_err(db_err)?,
        raw_response,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

#[async_trait]
impl BookingStore for PgStore {
    async fn route(&self, id: Uuid) -> StoreResult<Option<Route>> {
        let row = sqlx::query("SELECT * FROM routes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_route).transpose()
    }

    async fn vessel(&self, id: Uuid) -> StoreResult<Option<Vessel>> {
        let row = sqlx::query("SELECT * FROM vessels WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_vessel).transpose()
    }

    async fn schedule(&self, id: Uuid) -> StoreResult<Option<Schedule>> {
        let row = sqlx::query("SELECT * FROM schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_schedule).transpose()
    }

    async fn schedule_date(&self, schedule_id: Uuid, date: NaiveDate) -> StoreResult<Option<ScheduleDate>> {
        let row = sqlx::query("SELECT * FROM schedule_dates WHERE schedule_id = $1 AND date = $2")
            .bind(schedule_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_schedule_date).transpose()
    }

    async fn put_schedule_date(&self, update: LedgerUpdate) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        Self::apply_ledger(&mut tx, &update).await?;
        tx.commit().await.map_err(db_err)
    }

    async fn booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let row = sqlx::query("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_booking).transpose()
    }

    async fn booking_by_code(&self, code: &str) -> StoreResult<Option<Booking>> {
        let row = sqlx::query("SELECT * FROM bookings WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_booking).transpose()
    }

    async fn tickets_for(&self, booking_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let rows = sqlx::query("SELECT * FROM tickets WHERE booking_id = $1 ORDER BY created_at")
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(map_ticket).collect()
    }

    async fn vehicles_for(&self, booking_id: Uuid) -> StoreResult<Vec<Vehicle>> {
        let rows = sqlx::query("SELECT * FROM vehicles WHERE booking_id = $1 ORDER BY created_at")
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(map_vehicle).collect()
    }

    async fn logs_for(&self, booking_id: Uuid) -> StoreResult<Vec<BookingLog>> {
        let rows = sqlx::query("SELECT * FROM booking_logs WHERE booking_id = $1 ORDER BY created_at")
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(map_log).collect()
    }

    async fn payment_for(&self, booking_id: Uuid) -> StoreResult<Option<Payment>> {
        let row = sqlx::query(
            "SELECT * FROM payments WHERE booking_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_payment).transpose()
    }

    async fn payment_by_order_id(&self, order_id: &str) -> StoreResult<Option<Payment>> {
        let row = sqlx::query(
            "SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_payment).transpose()
    }

    async fn save_payment(&self, payment: Payment) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        Self::upsert_payment(&mut tx, &payment).await?;
        tx.commit().await.map_err(db_err)
    }

    async fn user_stats(&self, user_id: Uuid) -> StoreResult<Option<UserStats>> {
        let row = sqlx::query("SELECT * FROM user_stats WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(row) => Ok(Some(UserStats {
                user_id: row.try_get("user_id").map_err(db_err)?,
                booking_count: row.try_get("booking_count").map_err(db_err)?,
                total_spent: row.try_get("total_spent").map_err(db_err)?,
            })),
            None => Ok(None),
        }
    }

    async fn commit_creation(&self, unit: CreationUnit) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        Self::apply_ledger(&mut tx, &unit.ledger).await?;

        let b = &unit.booking;
        let result = sqlx::query(
            r#"
            INSERT INTO bookings
                (id, code, user_id, schedule_id, departure_date, passenger_count,
                 vehicle_count, total_amount, status, cancellation_reason, source,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(b.id)
        .bind(b.code.clone())
        .bind(b.user_id)
        .bind(b.schedule_id)
        .bind(b.departure_date)
        .bind(b.passenger_count)
        .bind(b.vehicle_count)
        .bind(b.total_amount)
        .bind(b.status.as_str())
        .bind(b.cancellation_reason.clone())
        .bind(b.source.as_str())
        .bind(b.created_at)
        .bind(b.updated_at)
        .execute(&mut *tx)
        .await;
        match result {
            Ok(_) => {}
            Err(err) if unique_violation(&err) => {
                return Err(StoreError::Duplicate(format!("booking code {}", b.code)));
            }
            Err(err) => return Err(db_err(err)),
        }

        for ticket in &unit.tickets {
            sqlx::query(
                r#"
                INSERT INTO tickets
                    (id, booking_id, code, qr_token, passenger_name, status, checked_in_at, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(ticket.id)
            .bind(ticket.booking_id)
            .bind(ticket.code.clone())
            .bind(ticket.qr_token.clone())
            .bind(ticket.passenger_name.clone())
            .bind(ticket.status.as_str())
            .bind(ticket.checked_in_at)
            .bind(ticket.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        for vehicle in &unit.vehicles {
            sqlx::query(
                r#"
                INSERT INTO vehicles (id, booking_id, class, license_plate, description, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(vehicle.id)
            .bind(vehicle.booking_id)
            .bind(vehicle.class.as_str())
            .bind(vehicle.license_plate.clone())
            .bind(vehicle.description.clone())
            .bind(vehicle.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        Self::insert_log(&mut tx, &unit.log).await?;

        sqlx::query(
            r#"
            INSERT INTO user_stats (user_id, booking_count, total_spent)
            VALUES ($1, 1, $2)
            ON CONFLICT (user_id) DO UPDATE SET
                booking_count = user_stats.booking_count + 1,
                total_spent = user_stats.total_spent + EXCLUDED.total_spent
            "#,
        )
        .bind(unit.stats_user_id)
        .bind(unit.stats_amount)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)
    }

    async fn commit_transition(&self, unit: TransitionUnit) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $1,
                cancellation_reason = COALESCE($2, cancellation_reason),
                updated_at = $3
            WHERE id = $4 AND status = $5
            "#,
        )
        .bind(unit.new_status.as_str())
        .bind(unit.cancellation_reason.clone())
        .bind(Utc::now())
        .bind(unit.booking_id)
        .bind(unit.expected_status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::VersionConflict(format!("booking {}", unit.booking_id)));
        }

        if let Some(status) = unit.ticket_status {
            if status == TicketStatus::Used {
                sqlx::query("UPDATE tickets SET status = $1, checked_in_at = $2 WHERE booking_id = $3")
                    .bind(status.as_str())
                    .bind(Utc::now())
                    .bind(unit.booking_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
            } else {
                sqlx::query("UPDATE tickets SET status = $1 WHERE booking_id = $2")
                    .bind(status.as_str())
                    .bind(unit.booking_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
            }
        }

        if let Some(ledger) = &unit.ledger {
            Self::apply_ledger(&mut tx, ledger).await?;
        }
        Self::insert_log(&mut tx, &unit.log).await?;
        if let Some(payment) = &unit.payment {
            Self::upsert_payment(&mut tx, payment).await?;
        }

        tx.commit().await.map_err(db_err)
    }

    async fn insert_route(&self, route: Route) -> StoreResult<()> {
        let prices = serde_json::to_string(&route.vehicle_prices).map_err(encode_err)?;
        sqlx::query(
            r#"
            INSERT INTO routes (id, origin, destination, base_price, vehicle_prices)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(route.id)
        .bind(route.origin)
        .bind(route.destination)
        .bind(route.base_price)
        .bind(prices)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn insert_vessel(&self, vessel: Vessel) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vessels
                (id, name, passenger_capacity, motorcycle_capacity, car_capacity,
                 bus_capacity, truck_capacity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(vessel.id)
        .bind(vessel.name)
        .bind(vessel.passenger_capacity)
        .bind(vessel.motorcycle_capacity)
        .bind(vessel.car_capacity)
        .bind(vessel.bus_capacity)
        .bind(vessel.truck_capacity)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn insert_schedule(&self, schedule: Schedule) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO schedules (id, route_id, vessel_id, departure_time, days, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(schedule.id)
        .bind(schedule.route_id)
        .bind(schedule.vessel_id)
        .bind(schedule.departure_time)
        .bind(schedule.days.0 as i16)
        .bind(schedule.active)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
