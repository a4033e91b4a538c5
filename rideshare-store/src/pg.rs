use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use rideshare_core::repository::{
    CommitOutcome, JoinChange, NotificationStore, RideFilter, RideSnapshot, RideStore, RideWrite,
};
use rideshare_core::{StoreError, StoreResult};
use rideshare_shared::{Join, Masked, Notification, Ride, Vehicle};

const RIDE_COLUMNS: &str = "id, owner_id, owner_name, price, from_address, to_address, ride_date, \
     cancellation_deadline, seats, total_seats, status, tag, driver_notes, vehicle, cancellation_note, \
     created_at, cancelled_at, cancelled_by, completed_at, version";

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, type, title, body, ride_id, from_address, to_address, created_at, read_at";

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct RideRow {
    id: Uuid,
    owner_id: String,
    owner_name: Option<String>,
    price: Decimal,
    from_address: String,
    to_address: String,
    ride_date: DateTime<Utc>,
    cancellation_deadline: Option<DateTime<Utc>>,
    seats: i32,
    total_seats: i32,
    status: String,
    tag: Option<String>,
    driver_notes: Option<String>,
    vehicle: Option<Json<Vehicle>>,
    cancellation_note: Option<String>,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
    cancelled_by: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    version: i64,
}

impl RideRow {
    fn into_parts(self) -> StoreResult<(Ride, u64)> {
        let status = self.status.parse().map_err(StoreError::Corrupt)?;
        let seats_available = u32::try_from(self.seats)
            .map_err(|_| StoreError::Corrupt(format!("ride {} has negative seats", self.id)))?;
        let total_seats = u32::try_from(self.total_seats)
            .map_err(|_| StoreError::Corrupt(format!("ride {} has negative capacity", self.id)))?;
        let version = u64::try_from(self.version)
            .map_err(|_| StoreError::Corrupt(format!("ride {} has negative version", self.id)))?;

        let ride = Ride {
            id: self.id,
            owner_id: self.owner_id,
            owner_name: self.owner_name,
            price: self.price,
            from_address: self.from_address,
            to_address: self.to_address,
            ride_date: self.ride_date,
            cancellation_deadline: self.cancellation_deadline,
            seats_available,
            total_seats,
            status,
            tag: self.tag,
            driver_notes: self.driver_notes,
            vehicle: self.vehicle.map(|v| v.0),
            cancellation_note: self.cancellation_note,
            created_at: self.created_at,
            cancelled_at: self.cancelled_at,
            cancelled_by: self.cancelled_by,
            completed_at: self.completed_at,
        };
        Ok((ride, version))
    }
}

#[derive(sqlx::FromRow)]
struct JoinRow {
    ride_id: Uuid,
    rider_id: String,
    rider_email: Option<String>,
    joined_at: DateTime<Utc>,
    price_paid: Decimal,
}

impl From<JoinRow> for Join {
    fn from(row: JoinRow) -> Self {
        Join {
            ride_id: row.ride_id,
            rider_id: row.rider_id,
            rider_email: row.rider_email.map(Masked),
            joined_at: row.joined_at,
            price_paid: row.price_paid,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: String,
    #[sqlx(rename = "type")]
    kind: String,
    title: String,
    body: String,
    ride_id: Option<Uuid>,
    from_address: Option<String>,
    to_address: Option<String>,
    created_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind.parse().map_err(StoreError::Corrupt)?,
            title: row.title,
            body: row.body,
            ride_id: row.ride_id,
            from_address: row.from_address,
            to_address: row.to_address,
            created_at: row.created_at,
            read_at: row.read_at,
        })
    }
}

fn seats_column(value: u32) -> StoreResult<i32> {
    i32::try_from(value).map_err(|_| StoreError::Backend(format!("seat count {} out of range", value)))
}

/// Postgres ride store; the `version` column carries the optimistic-concurrency check.
pub struct PgRideStore {
    pool: PgPool,
}

impl PgRideStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RideStore for PgRideStore {
    async fn insert_ride(&self, ride: &Ride) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rides (
                id, owner_id, owner_name, price, from_address, to_address, ride_date,
                cancellation_deadline, seats, total_seats, status, tag, driver_notes, vehicle,
                created_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, 0)
            "#,
        )
        .bind(ride.id)
        .bind(&ride.owner_id)
        .bind(&ride.owner_name)
        .bind(ride.price)
        .bind(&ride.from_address)
        .bind(&ride.to_address)
        .bind(ride.ride_date)
        .bind(ride.cancellation_deadline)
        .bind(seats_column(ride.seats_available)?)
        .bind(seats_column(ride.total_seats)?)
        .bind(ride.status.as_str())
        .bind(&ride.tag)
        .bind(&ride.driver_notes)
        .bind(ride.vehicle.clone().map(Json))
        .bind(ride.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn snapshot(&self, ride_id: Uuid) -> StoreResult<Option<RideSnapshot>> {
        // Ride first, joins second: a commit landing in between bumps the version,
        // so the stale pair can never be committed against.
        let row: Option<RideRow> = sqlx::query_as(&format!("SELECT {} FROM rides WHERE id = $1", RIDE_COLUMNS))
            .bind(ride_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let (ride, version) = row.into_parts()?;
        let joins = self.list_joins(ride_id).await?;

        Ok(Some(RideSnapshot { ride, version, joins }))
    }

    async fn commit(&self, write: RideWrite) -> StoreResult<CommitOutcome> {
        let expected = i64::try_from(write.expected_version)
            .map_err(|_| StoreError::Backend("version out of range".into()))?;
        let ride = &write.ride;

        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let bumped: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE rides
            SET seats = $3,
                status = $4,
                cancellation_note = $5,
                cancelled_at = $6,
                cancelled_by = $7,
                completed_at = $8,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(ride.id)
        .bind(expected)
        .bind(seats_column(ride.seats_available)?)
        .bind(ride.status.as_str())
        .bind(&ride.cancellation_note)
        .bind(ride.cancelled_at)
        .bind(&ride.cancelled_by)
        .bind(ride.completed_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        let Some((version,)) = bumped else {
            tx.rollback().await.map_err(StoreError::backend)?;
            return Ok(CommitOutcome::Conflict);
        };

        let applied = match &write.join_change {
            JoinChange::Keep => true,
            JoinChange::Insert(join) => {
                sqlx::query(
                    r#"
                    INSERT INTO ride_joins (ride_id, rider_id, rider_email, joined_at, price_paid)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (ride_id, rider_id) DO NOTHING
                    "#,
                )
                .bind(join.ride_id)
                .bind(&join.rider_id)
                .bind(join.rider_email.as_ref().map(|e| e.expose().clone()))
                .bind(join.joined_at)
                .bind(join.price_paid)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::backend)?
                .rows_affected()
                    == 1
            }
            JoinChange::Remove { rider_id } => {
                sqlx::query("DELETE FROM ride_joins WHERE ride_id = $1 AND rider_id = $2")
                    .bind(ride.id)
                    .bind(rider_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(StoreError::backend)?
                    .rows_affected()
                    == 1
            }
        };

        if !applied {
            tx.rollback().await.map_err(StoreError::backend)?;
            return Ok(CommitOutcome::Conflict);
        }

        tx.commit().await.map_err(StoreError::backend)?;

        Ok(CommitOutcome::Committed {
            version: u64::try_from(version).unwrap_or_default(),
        })
    }

    async fn list_joins(&self, ride_id: Uuid) -> StoreResult<Vec<Join>> {
        let rows: Vec<JoinRow> = sqlx::query_as(
            r#"
            SELECT ride_id, rider_id, rider_email, joined_at, price_paid
            FROM ride_joins
            WHERE ride_id = $1
            ORDER BY joined_at, rider_id
            "#,
        )
        .bind(ride_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(rows.into_iter().map(Join::from).collect())
    }

    async fn delete_joins(&self, ride_id: Uuid) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let removed = sqlx::query("DELETE FROM ride_joins WHERE ride_id = $1")
            .bind(ride_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?
            .rows_affected();

        sqlx::query("UPDATE rides SET version = version + 1 WHERE id = $1")
            .bind(ride_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?;

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(removed as usize)
    }

    async fn list_rides(&self, filter: &RideFilter) -> StoreResult<Vec<Ride>> {
        let rows: Vec<RideRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM rides
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR tag = $2)
              AND ($3::text IS NULL OR owner_id = $3)
            ORDER BY ride_date
            "#,
            RIDE_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(&filter.tag)
        .bind(&filter.owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter()
            .map(|row| row.into_parts().map(|(ride, _)| ride))
            .collect()
    }
}

pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert(&self, notification: &Notification) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, user_id, type, title, body, ride_id, from_address, to_address, created_at, read_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(notification.id)
        .bind(&notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.ride_id)
        .bind(&notification.from_address)
        .bind(&notification.to_address)
        .bind(notification.created_at)
        .bind(notification.read_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn mark_read(
        &self,
        id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Notification>> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, $3)
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(Notification::try_from).transpose()
    }

    async fn delete(&self, id: Uuid, user_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(result.rows_affected() > 0)
    }
}
