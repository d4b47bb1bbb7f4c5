//! Mediator wiring for every command and query
//!
//! HTTP routes call the slice handlers directly; the mediator is the entry
//! point for in-process callers such as the seed binary.

pub use mediator::DefaultAsyncMediator;

use crate::features::FeatureState;

pub mod middleware;

pub type AppMediator = DefaultAsyncMediator;

pub fn build_mediator(state: &FeatureState) -> AppMediator {
    let pool = state.db.clone();
    let booking = state.booking.clone();
    let processor = state.processor.clone();

    DefaultAsyncMediator::builder()
        // Users
        .add_handler({
            let pool = pool.clone();
            move |cmd| {
                let pool = pool.clone();
                async move { crate::features::users::commands::create::handle(pool, cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::users::queries::get::handle(pool, query).await }
            }
        })
        // Spaces
        .add_handler({
            let pool = pool.clone();
            move |cmd| {
                let pool = pool.clone();
                async move { crate::features::spaces::commands::create::handle(pool, cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |cmd| {
                let pool = pool.clone();
                async move { crate::features::spaces::commands::update::handle(pool, cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |cmd| {
                let pool = pool.clone();
                async move { crate::features::spaces::commands::delete::handle(pool, cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::spaces::queries::get::handle(pool, query).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::spaces::queries::list::handle(pool, query).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            let booking = booking.clone();
            move |query| {
                let pool = pool.clone();
                let booking = booking.clone();
                async move {
                    crate::features::spaces::queries::availability::handle(pool, &booking.policy(), query)
                        .await
                }
            }
        })
        // Reservations
        .add_handler({
            let pool = pool.clone();
            let booking = booking.clone();
            move |cmd| {
                let pool = pool.clone();
                let booking = booking.clone();
                async move { crate::features::reservations::commands::create::handle(pool, &booking, cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            let booking = booking.clone();
            move |cmd| {
                let pool = pool.clone();
                let booking = booking.clone();
                async move { crate::features::reservations::commands::reschedule::handle(pool, &booking, cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            let booking = booking.clone();
            let processor = processor.clone();
            move |cmd| {
                let pool = pool.clone();
                let booking = booking.clone();
                let processor = processor.clone();
                async move { crate::features::reservations::commands::cancel::handle(pool, &booking, processor.as_ref(), cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::reservations::queries::get::handle(pool, query).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::reservations::queries::list::handle(pool, query).await }
            }
        })
        // Payments
        .add_handler({
            let pool = pool.clone();
            let booking = booking.clone();
            let processor = processor.clone();
            move |cmd| {
                let pool = pool.clone();
                let booking = booking.clone();
                let processor = processor.clone();
                async move { crate::features::payments::commands::capture::handle(pool, &booking, processor.as_ref(), cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            let booking = booking.clone();
            let processor = processor.clone();
            move |cmd| {
                let pool = pool.clone();
                let booking = booking.clone();
                let processor = processor.clone();
                async move { crate::features::payments::commands::confirm::handle(pool, &booking, processor.as_ref(), cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            let booking = booking.clone();
            let processor = processor.clone();
            move |cmd| {
                let pool = pool.clone();
                let booking = booking.clone();
                let processor = processor.clone();
                async move { crate::features::payments::commands::refund::handle(pool, &booking, processor.as_ref(), cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::payments::queries::get::handle(pool, query).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::payments::queries::list::handle(pool, query).await }
            }
        })
        // Reviews
        .add_handler({
            let pool = pool.clone();
            move |cmd| {
                let pool = pool.clone();
                async move { crate::features::reviews::commands::create::handle(pool, cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |cmd| {
                let pool = pool.clone();
                async move { crate::features::reviews::commands::update::handle(pool, cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |cmd| {
                let pool = pool.clone();
                async move { crate::features::reviews::commands::delete::handle(pool, cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::reviews::queries::get::handle(pool, query).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::reviews::queries::list::handle(pool, query).await }
            }
        })
        .build()
}
