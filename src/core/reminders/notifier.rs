// Background loop that delivers due reminders.

use super::reminder_models::{DeliveryOutcome, Reminder};
use super::reminder_service::{ReminderService, ReminderStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Where due reminders are sent. The Discord layer implements this with a DM.
#[async_trait]
pub trait ReminderSink: Send + Sync {
    async fn deliver(&self, reminder: &Reminder) -> Result<(), String>;
}

/// Counts from one polling cycle, mostly for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub delivered: usize,
    pub retrying: usize,
    pub abandoned: usize,
}

/// Deliver everything due at `now`. Per-reminder failures are logged and
/// never abort the rest of the batch.
pub async fn run_cycle<S, K>(
    service: &ReminderService<S>,
    sink: &K,
    now: DateTime<Utc>,
) -> Result<CycleReport, super::ReminderError>
where
    S: ReminderStore,
    K: ReminderSink + ?Sized,
{
    let mut report = CycleReport::default();

    for reminder in service.due(now).await? {
        let delivered = match sink.deliver(&reminder).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    reminder_id = reminder.id,
                    user_id = reminder.user_id,
                    "Failed to deliver reminder: {}",
                    err
                );
                false
            }
        };

        match service.record_delivery(&reminder, delivered).await {
            Ok(DeliveryOutcome::Delivered) => report.delivered += 1,
            Ok(DeliveryOutcome::Retry { .. }) => report.retrying += 1,
            Ok(DeliveryOutcome::GaveUp { attempts }) => {
                tracing::error!(
                    reminder_id = reminder.id,
                    attempts,
                    "Giving up on reminder after repeated delivery failures"
                );
                report.abandoned += 1;
            }
            Err(err) => {
                tracing::error!(reminder_id = reminder.id, "Failed to update reminder: {}", err);
            }
        }
    }

    Ok(report)
}

/// Poll every `every` until `cancel` fires. The first cycle runs immediately.
pub async fn run_notifier<S, K>(
    service: Arc<ReminderService<S>>,
    sink: Arc<K>,
    every: Duration,
    cancel: CancellationToken,
) where
    S: ReminderStore,
    K: ReminderSink + ?Sized,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tracing::info!(interval_secs = every.as_secs(), "Reminder notifier started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reminder notifier stopped");
                return;
            }
            _ = ticker.tick() => {
                match run_cycle(&service, sink.as_ref(), Utc::now()).await {
                    Ok(report) if report != CycleReport::default() => {
                        tracing::info!(
                            delivered = report.delivered,
                            retrying = report.retrying,
                            abandoned = report.abandoned,
                            "Reminder cycle finished"
                        );
                    }
                    Ok(_) => tracing::debug!("No reminders due"),
                    Err(err) => tracing::warn!("Reminder poll failed: {}", err),
                }
            }
        }
    }
}
