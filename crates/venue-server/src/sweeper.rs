//! Background expiry of stale reservation holds and stuck captures
//!
//! Admission already cancels expired holds of the space it locks. The sweeper
//! covers spaces nobody is booking, so stale holds do not linger in listings
//! and availability views. Each pass drains due holds in batches, then asks
//! the processor about captures left `processing` longer than the payment
//! timeout, settling them the way `POST /payments/:id/confirm` would.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::BookingConfig;
use crate::db::{self, DbResult};
use crate::features::payments::{
    commands::confirm, ConfirmPaymentCommand, ConfirmPaymentError, PaymentOutcome,
    SettlementError,
};
use crate::processor::SharedProcessor;

pub struct HoldSweeper {
    pool: PgPool,
    booking: BookingConfig,
    processor: SharedProcessor,
    interval: Duration,
    batch_size: i64,
}

impl HoldSweeper {
    pub fn new(pool: PgPool, booking: &BookingConfig, processor: SharedProcessor) -> Self {
        Self {
            pool,
            booking: booking.clone(),
            processor,
            interval: booking.sweep_interval(),
            batch_size: booking.sweep_batch_size,
        }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                interval_secs = self.interval.as_secs(),
                batch_size = self.batch_size,
                processor = self.processor.name(),
                "Hold sweeper started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep_once().await {
                            error!(error = %e, "Hold sweep failed");
                        }
                        if let Err(e) = self.reconcile_once().await {
                            error!(error = %e, "Payment reconciliation failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Hold sweeper stopped");
        })
    }

    /// Expire every hold that is due now. Returns how many were cancelled.
    pub async fn sweep_once(&self) -> DbResult<usize> {
        let now = Utc::now();
        let mut total = 0;

        loop {
            let expired = db::reservations::expire_due_holds(&self.pool, now, self.batch_size).await?;
            total += expired;
            // A short batch means nothing due is left, apart from rows skipped as locked
            if expired < self.batch_size as usize {
                break;
            }
        }

        if total > 0 {
            info!(expired = total, "Swept expired holds");
        } else {
            debug!("No expired holds to sweep");
        }

        Ok(total)
    }

    /// Settle up to one batch of captures stuck in `processing` for longer
    /// than the payment timeout. Returns how many left `processing`.
    pub async fn reconcile_once(&self) -> DbResult<usize> {
        let timeout_secs = i64::try_from(self.booking.payment_timeout_secs).unwrap_or(i64::MAX);
        let cutoff = Utc::now() - chrono::Duration::seconds(timeout_secs);
        let stale =
            db::payments::list_stale_processing(&self.pool, cutoff, self.batch_size).await?;

        let mut settled = 0;
        for payment in stale {
            let command = ConfirmPaymentCommand {
                payment_id: payment.id,
            };
            let result = confirm::handle(
                self.pool.clone(),
                &self.booking,
                self.processor.as_ref(),
                command,
            )
            .await;

            match result {
                Ok(result) if result.outcome == PaymentOutcome::Processing => {
                    debug!(payment_id = %payment.id, "Capture still processing");
                },
                Ok(_) => {
                    info!(payment_id = %payment.id, "Stuck capture confirmed");
                    settled += 1;
                },
                Err(ConfirmPaymentError::Settlement(
                    e @ (SettlementError::Declined { .. }
                    | SettlementError::HoldExpired { .. }
                    | SettlementError::SlotTaken { .. }
                    | SettlementError::ReservationCancelled { .. }),
                )) => {
                    info!(payment_id = %payment.id, outcome = %e, "Stuck capture settled");
                    settled += 1;
                },
                Err(e) => {
                    warn!(payment_id = %payment.id, error = %e, "Could not reconcile capture");
                },
            }
        }

        if settled > 0 {
            info!(settled, "Reconciled stuck captures");
        }

        Ok(settled)
    }
}
