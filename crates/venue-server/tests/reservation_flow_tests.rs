//! Admission against a real PostgreSQL instance
//!
//! Run with: `cargo test -p venue-server --test reservation_flow_tests -- --ignored`

mod common;

use chrono::{Duration, Utc};
use common::{at, create_customer, create_space, insert_reservation, TestPostgres};
use venue_common::{Rejection, ReservationStatus};
use venue_server::{
    config::BookingConfig,
    features::reservations::{
        commands::{cancel, create, reschedule},
        CancelReservationCommand, CancelReservationError, CreateReservationCommand,
        CreateReservationError, RescheduleReservationCommand,
    },
    processor::MockPaymentProcessor,
    sweeper::HoldSweeper,
};

fn booking(
    user_id: uuid::Uuid,
    space_id: uuid::Uuid,
    start_hour: u32,
    end_hour: u32,
) -> CreateReservationCommand {
    CreateReservationCommand {
        user_id,
        space_id,
        start_time: at(start_hour),
        end_time: at(end_hour),
        attendees: Some(40),
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_hall_booking_day() -> anyhow::Result<()> {
    let db = TestPostgres::start().await?;
    let pool = db.pool_clone();
    let config = BookingConfig::default();

    let sarah = create_customer(&pool, "Sarah Johnson").await;
    let michael = create_customer(&pool, "Michael Davis").await;
    let hall = create_space(&pool, "Main Fellowship Hall", 7500, 60).await;

    let first = create::handle(pool.clone(), &config, booking(sarah.id, hall.id, 10, 12)).await?;
    assert_eq!(first.status, ReservationStatus::Pending);
    assert_eq!(first.total_price_cents, 15_000);
    assert_eq!(first.total_price, "$150.00");
    assert!(first.expires_at.is_some());

    let overlapping = create::handle(pool.clone(), &config, booking(michael.id, hall.id, 11, 13))
        .await
        .unwrap_err();
    match overlapping {
        CreateReservationError::Rejected(Rejection::Conflict { reservation_id, .. }) => {
            assert_eq!(reservation_id, first.id)
        },
        other => panic!("expected conflict, got {other:?}"),
    }

    let adjacent = create::handle(pool.clone(), &config, booking(michael.id, hall.id, 12, 14)).await?;
    assert_eq!(adjacent.status, ReservationStatus::Pending);

    let crowd = CreateReservationCommand {
        attendees: Some(61),
        ..booking(michael.id, hall.id, 15, 16)
    };
    assert!(matches!(
        create::handle(pool.clone(), &config, crowd).await,
        Err(CreateReservationError::Rejected(Rejection::CapacityExceeded { capacity: 60, .. }))
    ));

    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_concurrent_requests_admit_exactly_one() -> anyhow::Result<()> {
    let db = TestPostgres::start().await?;
    let pool = db.pool_clone();
    let config = BookingConfig::default();

    let emily = create_customer(&pool, "Emily Rodriguez").await;
    let david = create_customer(&pool, "David Thompson").await;
    let pavilion = create_space(&pool, "Outdoor Pavilion", 5000, 100).await;

    let (a, b) = tokio::join!(
        create::handle(pool.clone(), &config, booking(emily.id, pavilion.id, 9, 11)),
        create::handle(pool.clone(), &config, booking(david.id, pavilion.id, 10, 12)),
    );

    let admitted = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(admitted, 1, "exactly one of two overlapping requests is admitted");

    let rejected = if a.is_err() { a } else { b };
    assert!(matches!(
        rejected,
        Err(CreateReservationError::Rejected(Rejection::Conflict { .. }))
    ));

    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reservations WHERE space_id = $1 AND status <> 'cancelled'",
    )
    .bind(pavilion.id)
    .fetch_one(db.pool())
    .await?;
    assert_eq!(active, 1);

    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_many_clients_racing_for_one_slot() -> anyhow::Result<()> {
    let db = TestPostgres::start().await?;
    let pool = db.pool_clone();
    let room = create_space(&pool, "Conference Room", 4000, 25).await;

    let mut customers = Vec::new();
    for i in 0..8 {
        customers.push(create_customer(&pool, &format!("Customer {i}")).await);
    }

    let attempts = customers.iter().map(|customer| {
        let pool = pool.clone();
        let command = CreateReservationCommand {
            attendees: Some(10),
            ..booking(customer.id, room.id, 13, 15)
        };
        async move { create::handle(pool, &BookingConfig::default(), command).await }
    });
    let results = futures::future::join_all(attempts).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
        e,
        CreateReservationError::Rejected(Rejection::Conflict { .. })
    )));

    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_expired_hold_frees_the_slot() -> anyhow::Result<()> {
    let db = TestPostgres::start().await?;
    let pool = db.pool_clone();
    let config = BookingConfig::default();

    let lisa = create_customer(&pool, "Lisa Chen").await;
    let michael = create_customer(&pool, "Michael Davis").await;
    let field = create_space(&pool, "Softball Field", 3000, 200).await;

    let stale = create::handle(pool.clone(), &config, booking(lisa.id, field.id, 10, 12)).await?;
    sqlx::query("UPDATE reservations SET expires_at = $2 WHERE id = $1")
        .bind(stale.id)
        .bind(Utc::now() - Duration::minutes(1))
        .execute(db.pool())
        .await?;

    let fresh = create::handle(pool.clone(), &config, booking(michael.id, field.id, 11, 13)).await?;
    assert_eq!(fresh.status, ReservationStatus::Pending);

    let status: String = sqlx::query_scalar("SELECT status FROM reservations WHERE id = $1")
        .bind(stale.id)
        .fetch_one(db.pool())
        .await?;
    assert_eq!(status, "cancelled", "the aged-out hold is expired on the way in");

    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_sweeper_expires_holds_in_the_background() -> anyhow::Result<()> {
    let db = TestPostgres::start().await?;
    let pool = db.pool_clone();

    let emily = create_customer(&pool, "Emily Rodriguez").await;
    let kitchen = create_space(&pool, "Kitchen Facility", 6000, 10).await;
    let hold = insert_reservation(&pool, emily.id, kitchen.id, at(8), at(9), "pending", 6000).await;
    sqlx::query("UPDATE reservations SET expires_at = $2 WHERE id = $1")
        .bind(hold)
        .bind(Utc::now() - Duration::hours(1))
        .execute(db.pool())
        .await?;

    let processor = std::sync::Arc::new(MockPaymentProcessor::new());
    let expired = HoldSweeper::new(pool.clone(), &BookingConfig::default(), processor)
        .sweep_once()
        .await?;
    assert_eq!(expired, 1);

    let reason: Option<String> =
        sqlx::query_scalar("SELECT cancellation_reason FROM reservations WHERE id = $1")
            .bind(hold)
            .fetch_one(db.pool())
            .await?;
    assert_eq!(reason.as_deref(), Some("hold expired"));

    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reschedule_and_cancel() -> anyhow::Result<()> {
    let db = TestPostgres::start().await?;
    let pool = db.pool_clone();
    let config = BookingConfig::default();

    let sarah = create_customer(&pool, "Sarah Johnson").await;
    let david = create_customer(&pool, "David Thompson").await;
    let hall = create_space(&pool, "Main Fellowship Hall", 7500, 150).await;

    let mine = create::handle(pool.clone(), &config, booking(sarah.id, hall.id, 10, 12)).await?;
    let theirs = create::handle(pool.clone(), &config, booking(david.id, hall.id, 14, 16)).await?;

    // Moving onto its own window is never a conflict with itself
    let moved = reschedule::handle(
        pool.clone(),
        &config,
        RescheduleReservationCommand {
            id: mine.id,
            start_time: at(11),
            end_time: at(13),
            attendees: None,
        },
    )
    .await?;
    assert_eq!(moved.start_time, at(11));
    assert_eq!(moved.total_price_cents, 15_000);

    let blocked = reschedule::handle(
        pool.clone(),
        &config,
        RescheduleReservationCommand {
            id: mine.id,
            start_time: at(15),
            end_time: at(17),
            attendees: None,
        },
    )
    .await;
    assert!(blocked.is_err());

    let processor = MockPaymentProcessor::new();
    let cancelled = cancel::handle(
        pool.clone(),
        &config,
        &processor,
        CancelReservationCommand {
            id: theirs.id,
            reason: Some("plans changed".to_string()),
        },
    )
    .await?;
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);

    let again = cancel::handle(
        pool.clone(),
        &config,
        &processor,
        CancelReservationCommand {
            id: theirs.id,
            reason: None,
        },
    )
    .await;
    assert!(matches!(again, Err(CancelReservationError::NotCancellable(_))));

    // The cancelled window is free again
    create::handle(pool.clone(), &config, booking(sarah.id, hall.id, 15, 17)).await?;

    Ok(())
}
