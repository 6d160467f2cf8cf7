use albergue_booking::error::BookingError;
use albergue_booking::lifecycle;
use albergue_booking::models::{Reservation, ReservationStatus, StayRange};
use albergue_booking::payment::{PaymentEvent, PaymentRecord, PaymentStatus};
use albergue_booking::store::BookingStore;
use albergue_catalog::{Bed, BedStatus, OccupancyStats, RoomType};
use albergue_shared::GuestRef;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Postgres-backed store. Every mutating trait method runs one transaction;
/// the bed row is taken `FOR UPDATE` so concurrent writers serialize on the
/// bed, and the availability re-check runs inside that same transaction.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> BookingError {
    BookingError::Store(e.to_string())
}

fn bad_row(what: &str, value: &str) -> BookingError {
    BookingError::Store(format!("unexpected {what} in row: {value}"))
}

// Row structs for type-safe querying
#[derive(sqlx::FromRow)]
struct BedRow {
    id: Uuid,
    room_number: i32,
    bed_number: i32,
    room_name: String,
    room_type: String,
    price_cents: i32,
    currency: String,
    status: String,
    held_until: Option<DateTime<Utc>>,
}

impl BedRow {
    fn into_bed(self) -> Result<Bed, BookingError> {
        Ok(Bed {
            id: self.id,
            room_number: self.room_number,
            bed_number: self.bed_number,
            room_name: self.room_name,
            room_type: RoomType::parse(&self.room_type)
                .ok_or_else(|| bad_row("room_type", &self.room_type))?,
            price_cents: self.price_cents,
            currency: self.currency,
            status: BedStatus::parse(&self.status)
                .ok_or_else(|| bad_row("bed status", &self.status))?,
            held_until: self.held_until,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    guest_ref: String,
    bed_id: Option<Uuid>,
    check_in: NaiveDate,
    check_out: NaiveDate,
    status: String,
    hold_deadline: DateTime<Utc>,
    cleanup_processed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReservationRow {
    fn into_reservation(self) -> Result<Reservation, BookingError> {
        Ok(Reservation {
            id: self.id,
            guest_ref: GuestRef::new(self.guest_ref),
            bed_id: self.bed_id,
            stay: StayRange {
                check_in: self.check_in,
                check_out: self.check_out,
            },
            status: ReservationStatus::parse(&self.status)
                .ok_or_else(|| bad_row("reservation status", &self.status))?,
            hold_deadline: self.hold_deadline,
            cleanup_processed: self.cleanup_processed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    reservation_id: Uuid,
    amount_cents: i32,
    currency: String,
    method: Option<String>,
    status: String,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> Result<PaymentRecord, BookingError> {
        Ok(PaymentRecord {
            reservation_id: self.reservation_id,
            amount_cents: self.amount_cents,
            currency: self.currency,
            method: self.method,
            status: PaymentStatus::parse(&self.status)
                .ok_or_else(|| bad_row("payment status", &self.status))?,
            updated_at: self.updated_at,
        })
    }
}

const BED_COLUMNS: &str =
    "id, room_number, bed_number, room_name, room_type, price_cents, currency, status, held_until";
const RESERVATION_COLUMNS: &str = "id, guest_ref, bed_id, check_in, check_out, status, \
     hold_deadline, cleanup_processed, created_at, updated_at";

async fn bed_for_update(
    tx: &mut Transaction<'_, Postgres>,
    bed_id: Uuid,
) -> Result<Bed, BookingError> {
    let row: Option<BedRow> = sqlx::query_as(&format!(
        "SELECT {BED_COLUMNS} FROM beds WHERE id = $1 FOR UPDATE"
    ))
    .bind(bed_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)?;
    row.ok_or(BookingError::NotFound(bed_id))?.into_bed()
}

async fn reservation_for_update(
    tx: &mut Transaction<'_, Postgres>,
    reservation_id: Uuid,
) -> Result<Reservation, BookingError> {
    let row: Option<ReservationRow> = sqlx::query_as(&format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1 FOR UPDATE"
    ))
    .bind(reservation_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)?;
    row.ok_or(BookingError::NotFound(reservation_id))?
        .into_reservation()
}

async fn write_bed(tx: &mut Transaction<'_, Postgres>, bed: &Bed) -> Result<(), BookingError> {
    sqlx::query("UPDATE beds SET status = $1, held_until = $2 WHERE id = $3")
        .bind(bed.status.as_str())
        .bind(bed.held_until)
        .bind(bed.id)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
    Ok(())
}

async fn write_reservation(
    tx: &mut Transaction<'_, Postgres>,
    reservation: &Reservation,
) -> Result<(), BookingError> {
    sqlx::query(
        "UPDATE reservations SET status = $1, cleanup_processed = $2, updated_at = $3 \
         WHERE id = $4",
    )
    .bind(reservation.status.as_str())
    .bind(reservation.cleanup_processed)
    .bind(reservation.updated_at)
    .bind(reservation.id)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(())
}

#[async_trait]
impl BookingStore for PgStore {
    async fn seed_beds(&self, beds: Vec<Bed>) -> Result<usize, BookingError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let mut inserted = 0;
        for bed in beds {
            let result = sqlx::query(
                "INSERT INTO beds (id, room_number, bed_number, room_name, room_type, \
                 price_cents, currency, status, held_until) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (room_number, bed_number) DO NOTHING",
            )
            .bind(bed.id)
            .bind(bed.room_number)
            .bind(bed.bed_number)
            .bind(&bed.room_name)
            .bind(bed.room_type.as_str())
            .bind(bed.price_cents)
            .bind(&bed.currency)
            .bind(bed.status.as_str())
            .bind(bed.held_until)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(inserted)
    }

    async fn list_beds(&self) -> Result<Vec<Bed>, BookingError> {
        let rows: Vec<BedRow> = sqlx::query_as(&format!(
            "SELECT {BED_COLUMNS} FROM beds ORDER BY room_number, bed_number"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(BedRow::into_bed).collect()
    }

    async fn get_bed(&self, bed_id: Uuid) -> Result<Bed, BookingError> {
        let row: Option<BedRow> =
            sqlx::query_as(&format!("SELECT {BED_COLUMNS} FROM beds WHERE id = $1"))
                .bind(bed_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.ok_or(BookingError::NotFound(bed_id))?.into_bed()
    }

    async fn get_reservation(&self, reservation_id: Uuid) -> Result<Reservation, BookingError> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(reservation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.ok_or(BookingError::NotFound(reservation_id))?
            .into_reservation()
    }

    async fn get_payment(&self, reservation_id: Uuid) -> Result<PaymentRecord, BookingError> {
        let row: Option<PaymentRow> = sqlx::query_as(
            "SELECT reservation_id, amount_cents, currency, method, status, updated_at \
             FROM payments WHERE reservation_id = $1",
        )
        .bind(reservation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.ok_or(BookingError::NotFound(reservation_id))?
            .into_payment()
    }

    async fn active_reservations(
        &self,
        stay: &StayRange,
    ) -> Result<Vec<Reservation>, BookingError> {
        let rows: Vec<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE status IN ('RESERVED', 'CONFIRMED', 'CHECKED_IN') \
             AND check_in < $2 AND check_out > $1",
        ))
        .bind(stay.check_in)
        .bind(stay.check_out)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter()
            .map(ReservationRow::into_reservation)
            .collect()
    }

    async fn create_hold(
        &self,
        bed_id: Uuid,
        guest_ref: GuestRef,
        stay: StayRange,
        hold_deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let bed = bed_for_update(&mut tx, bed_id).await?;

        // Re-check under the row lock: the caller's availability read may be
        // stale by now.
        let claimed: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
               SELECT 1 FROM reservations \
               WHERE bed_id = $1 \
               AND status IN ('RESERVED', 'CONFIRMED', 'CHECKED_IN') \
               AND check_in < $3 AND check_out > $2 \
             )",
        )
        .bind(bed_id)
        .bind(stay.check_in)
        .bind(stay.check_out)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if claimed {
            return Err(BookingError::BedUnavailable);
        }

        let (reservation, updated_bed) =
            lifecycle::place_hold(&bed, guest_ref, stay, hold_deadline, now)?;

        sqlx::query(
            "INSERT INTO reservations (id, guest_ref, bed_id, check_in, check_out, status, \
             hold_deadline, cleanup_processed, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(reservation.id)
        .bind(reservation.guest_ref.inner())
        .bind(reservation.bed_id)
        .bind(reservation.stay.check_in)
        .bind(reservation.stay.check_out)
        .bind(reservation.status.as_str())
        .bind(reservation.hold_deadline)
        .bind(reservation.cleanup_processed)
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO payments (reservation_id, amount_cents, currency, status, updated_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(reservation.id)
        .bind((stay.nights() as i32) * updated_bed.price_cents)
        .bind(&updated_bed.currency)
        .bind(PaymentStatus::Pending.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        write_bed(&mut tx, &updated_bed).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(reservation)
    }

    async fn confirm_and_occupy(
        &self,
        reservation_id: Uuid,
        event: &PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let reservation = reservation_for_update(&mut tx, reservation_id).await?;
        let bed_id = reservation
            .bed_id
            .ok_or_else(|| BookingError::Store("reservation has no bed assigned".into()))?;
        let bed = bed_for_update(&mut tx, bed_id).await?;

        let (reservation, bed) =
            lifecycle::confirm(&reservation, &bed, now).map_err(|e| match e {
                BookingError::InvalidTransition { .. } => {
                    BookingError::SettlementConflict(reservation_id)
                }
                other => other,
            })?;

        write_reservation(&mut tx, &reservation).await?;
        write_bed(&mut tx, &bed).await?;
        sqlx::query(
            "UPDATE payments SET status = $1, method = $2, updated_at = $3 \
             WHERE reservation_id = $4",
        )
        .bind(PaymentStatus::Completed.as_str())
        .bind(&event.method)
        .bind(now)
        .bind(reservation_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(reservation)
    }

    async fn record_payment_failure(
        &self,
        reservation_id: Uuid,
        event: &PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        let result = sqlx::query(
            "UPDATE payments SET status = $1, method = $2, updated_at = $3 \
             WHERE reservation_id = $4",
        )
        .bind(PaymentStatus::Failed.as_str())
        .bind(&event.method)
        .bind(now)
        .bind(reservation_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(BookingError::NotFound(reservation_id));
        }
        Ok(())
    }

    async fn expire_hold(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let reservation = reservation_for_update(&mut tx, reservation_id).await?;
        let bed_id = reservation
            .bed_id
            .ok_or_else(|| BookingError::Store("reservation has no bed assigned".into()))?;
        let bed = bed_for_update(&mut tx, bed_id).await?;

        let (reservation, bed) = lifecycle::expire(&reservation, &bed, now)?;

        write_reservation(&mut tx, &reservation).await?;
        write_bed(&mut tx, &bed).await?;
        sqlx::query(
            "UPDATE payments SET status = $1, updated_at = $2 \
             WHERE reservation_id = $3 AND status = $4",
        )
        .bind(PaymentStatus::Cancelled.as_str())
        .bind(now)
        .bind(reservation_id)
        .bind(PaymentStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(reservation)
    }

    async fn due_expiries(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, BookingError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM reservations \
             WHERE status = 'RESERVED' AND hold_deadline < $1 AND cleanup_processed = FALSE \
             ORDER BY hold_deadline",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(ids)
    }

    async fn cancel_reservation(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let reservation = reservation_for_update(&mut tx, reservation_id).await?;
        let bed_id = reservation
            .bed_id
            .ok_or_else(|| BookingError::Store("reservation has no bed assigned".into()))?;
        let bed = bed_for_update(&mut tx, bed_id).await?;

        let (reservation, bed) = lifecycle::cancel(&reservation, &bed, now)?;

        write_reservation(&mut tx, &reservation).await?;
        write_bed(&mut tx, &bed).await?;
        sqlx::query(
            "UPDATE payments SET status = $1, updated_at = $2 \
             WHERE reservation_id = $3 AND status = $4",
        )
        .bind(PaymentStatus::Cancelled.as_str())
        .bind(now)
        .bind(reservation_id)
        .bind(PaymentStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(reservation)
    }

    async fn check_in(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let reservation = reservation_for_update(&mut tx, reservation_id).await?;
        let bed_id = reservation
            .bed_id
            .ok_or_else(|| BookingError::Store("reservation has no bed assigned".into()))?;
        let bed = bed_for_update(&mut tx, bed_id).await?;

        let (reservation, bed) = lifecycle::check_in(&reservation, &bed, now)?;

        write_reservation(&mut tx, &reservation).await?;
        write_bed(&mut tx, &bed).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(reservation)
    }

    async fn check_out(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let reservation = reservation_for_update(&mut tx, reservation_id).await?;
        let bed_id = reservation
            .bed_id
            .ok_or_else(|| BookingError::Store("reservation has no bed assigned".into()))?;
        let bed = bed_for_update(&mut tx, bed_id).await?;

        let (reservation, bed) = lifecycle::check_out(&reservation, &bed, now)?;

        write_reservation(&mut tx, &reservation).await?;
        write_bed(&mut tx, &bed).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(reservation)
    }

    async fn occupancy_stats(&self) -> Result<OccupancyStats, BookingError> {
        let beds = self.list_beds().await?;
        Ok(OccupancyStats::from_beds(&beds))
    }
}
