//! Common utilities for venue server integration tests using testcontainers
//!
//! Each test starts its own PostgreSQL container with the migrations applied,
//! so tests never share rows and need no manual database setup. Docker must be
//! available; the tests are `#[ignore]`d by default:
//!
//! ```text
//! cargo test -p venue-server --test reservation_flow_tests -- --ignored
//! ```

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};
use uuid::Uuid;

use venue_server::{
    config::BookingConfig,
    features::{
        spaces::{self, CreateSpaceCommand, SpaceItem},
        users::{self, CreateUserCommand, CreateUserResponse, UserRole},
        FeatureState,
    },
    processor::{MockPaymentProcessor, SharedProcessor},
};

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL container with migrations applied
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// A fixed future day so admission never sees a start in the past
pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 9, 15, hour, 0, 0)
        .single()
        .expect("valid test instant")
}

pub fn feature_state(pool: &PgPool, processor: SharedProcessor) -> FeatureState {
    FeatureState {
        db: pool.clone(),
        booking: Arc::new(BookingConfig::default()),
        processor,
    }
}

pub fn mock_state(pool: &PgPool) -> FeatureState {
    feature_state(pool, Arc::new(MockPaymentProcessor::new()))
}

pub async fn create_customer(pool: &PgPool, full_name: &str) -> CreateUserResponse {
    let email = format!(
        "{}.{}@email.com",
        full_name.to_lowercase().replace(' ', "."),
        Uuid::new_v4().simple()
    );
    users::commands::create::handle(
        pool.clone(),
        CreateUserCommand {
            full_name: full_name.to_string(),
            email,
            role: UserRole::Customer,
        },
    )
    .await
    .expect("create customer")
}

pub async fn create_space(
    pool: &PgPool,
    name: &str,
    price_per_hour_cents: i64,
    capacity: i32,
) -> SpaceItem {
    spaces::commands::create::handle(
        pool.clone(),
        CreateSpaceCommand {
            name: name.to_string(),
            description: None,
            price_per_hour_cents,
            capacity,
            photos: vec![],
        },
    )
    .await
    .expect("create space")
}

/// Write a reservation row directly, e.g. one whose window is already over
pub async fn insert_reservation(
    pool: &PgPool,
    user_id: Uuid,
    space_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    status: &str,
    total_price_cents: i64,
) -> Uuid {
    let id = Uuid::new_v4();
    let payment_ref = (status == "confirmed").then(|| format!("ch_{}", id.simple()));
    sqlx::query(
        r#"
        INSERT INTO reservations
            (id, user_id, space_id, start_time, end_time, total_price_cents, status, payment_ref)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(space_id)
    .bind(start)
    .bind(end)
    .bind(total_price_cents)
    .bind(status)
    .bind(payment_ref)
    .execute(pool)
    .await
    .expect("insert reservation");
    id
}
