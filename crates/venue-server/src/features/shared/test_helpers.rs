//! Builder fixtures for database tests
//!
//! ```rust,ignore
//! #[sqlx::test(migrations = "../../migrations")]
//! async fn test_something(pool: PgPool) -> sqlx::Result<()> {
//!     let user = TestUser::new("Sarah Johnson").insert(&pool).await?;
//!     let space = TestSpace::new("Conference Room").with_capacity(25).insert(&pool).await?;
//!     let reservation = TestReservation::new(&user, &space, at(10), at(12))
//!         .confirmed("ch_1")
//!         .insert(&pool)
//!         .await?;
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// 2030-09-15 at `hour`:00 UTC, far enough ahead to be a valid booking start
pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 9, 15, hour, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: &'static str,
}

impl TestUser {
    pub fn new(full_name: &str) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            full_name: full_name.to_string(),
            email: format!("{}@email.test", id.simple()),
            role: "customer",
        }
    }

    pub fn admin(mut self) -> Self {
        self.role = "admin";
        self
    }

    pub async fn insert(self, pool: &PgPool) -> sqlx::Result<Self> {
        sqlx::query("INSERT INTO users (id, full_name, email, role) VALUES ($1, $2, $3, $4)")
            .bind(self.id)
            .bind(&self.full_name)
            .bind(&self.email)
            .bind(self.role)
            .execute(pool)
            .await?;
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct TestSpace {
    pub id: Uuid,
    pub name: String,
    pub price_per_hour_cents: i64,
    pub capacity: i32,
}

impl TestSpace {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: format!("{} {}", name, &Uuid::new_v4().simple().to_string()[..8]),
            price_per_hour_cents: 7_500,
            capacity: 150,
        }
    }

    pub fn with_price_cents(mut self, cents: i64) -> Self {
        self.price_per_hour_cents = cents;
        self
    }

    pub fn with_capacity(mut self, capacity: i32) -> Self {
        self.capacity = capacity;
        self
    }

    pub async fn insert(self, pool: &PgPool) -> sqlx::Result<Self> {
        sqlx::query(
            "INSERT INTO rental_spaces (id, name, price_per_hour_cents, capacity) VALUES ($1, $2, $3, $4)",
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(self.price_per_hour_cents)
        .bind(self.capacity)
        .execute(pool)
        .await?;
        Ok(self)
    }
}

/// A reservation row written directly, bypassing admission
#[derive(Debug, Clone)]
pub struct TestReservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub space_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attendees: Option<i32>,
    pub total_price_cents: i64,
    pub status: &'static str,
    pub expires_at: Option<DateTime<Utc>>,
    pub payment_ref: Option<String>,
}

impl TestReservation {
    /// A pending hold that expires ten minutes from now
    pub fn new(
        user: &TestUser,
        space: &TestSpace,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let hours = (end_time - start_time).num_minutes() / 60;
        Self {
            id: Uuid::new_v4(),
            user_id: user.id,
            space_id: space.id,
            start_time,
            end_time,
            attendees: None,
            total_price_cents: space.price_per_hour_cents * hours.max(1),
            status: "pending",
            expires_at: Some(Utc::now() + Duration::minutes(10)),
            payment_ref: None,
        }
    }

    pub fn with_attendees(mut self, attendees: i32) -> Self {
        self.attendees = Some(attendees);
        self
    }

    pub fn confirmed(mut self, payment_ref: &str) -> Self {
        self.status = "confirmed";
        self.expires_at = None;
        self.payment_ref = Some(payment_ref.to_string());
        self
    }

    pub fn cancelled(mut self) -> Self {
        self.status = "cancelled";
        self
    }

    /// Keep it pending but with a hold that already ran out
    pub fn expired(mut self) -> Self {
        self.status = "pending";
        self.expires_at = Some(Utc::now() - Duration::minutes(1));
        self
    }

    pub async fn insert(self, pool: &PgPool) -> sqlx::Result<Self> {
        sqlx::query(
            r#"
            INSERT INTO reservations
                (id, user_id, space_id, start_time, end_time, attendees,
                 total_price_cents, status, expires_at, payment_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(self.id)
        .bind(self.user_id)
        .bind(self.space_id)
        .bind(self.start_time)
        .bind(self.end_time)
        .bind(self.attendees)
        .bind(self.total_price_cents)
        .bind(self.status)
        .bind(self.expires_at)
        .bind(&self.payment_ref)
        .execute(pool)
        .await?;
        Ok(self)
    }
}
