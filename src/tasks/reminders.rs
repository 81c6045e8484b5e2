use crate::config::ReminderConfig;
use crate::session::SessionService;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Send reminders for interviews starting within `lookahead_hours`, every
/// `check_interval_secs`, until `cancel_token` fires.
#[instrument(skip_all, name = "interview.task.reminders")]
pub async fn start_reminders(
    sessions: Arc<SessionService>,
    config: ReminderConfig,
    cancel_token: CancellationToken,
) {
    info!(
        lookahead_hours = config.lookahead_hours,
        check_interval_secs = config.check_interval_secs,
        "Starting interview reminder task"
    );

    let lookahead = chrono::Duration::hours(i64::from(config.lookahead_hours));
    let mut interval = tokio::time::interval(Duration::from_secs(config.check_interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = sessions.send_due_reminders(lookahead).await {
                    error!(error = %e, "Reminder run failed");
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Reminder task received shutdown signal, exiting");
                break;
            }
        }
    }

    info!("Reminder task stopped");
}
