use crate::clock::Clock;
use crate::config::RegistryConfig;
use crate::registry::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Evict registry entries idle for longer than `entry_ttl_secs`, every
/// `sweep_interval_secs`, until `cancel_token` fires.
#[instrument(skip_all, name = "interview.task.registry_sweeper")]
pub async fn start_registry_sweeper(
    registry: Arc<SessionRegistry>,
    clock: Arc<dyn Clock>,
    config: RegistryConfig,
    cancel_token: CancellationToken,
) {
    info!(
        entry_ttl_secs = config.entry_ttl_secs,
        sweep_interval_secs = config.sweep_interval_secs,
        "Starting registry sweeper"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.sweep_interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                sweep_once(&registry, clock.as_ref(), &config).await;
            }
            _ = cancel_token.cancelled() => {
                info!("Registry sweeper received shutdown signal, exiting");
                break;
            }
        }
    }

    info!("Registry sweeper stopped");
}

pub async fn sweep_once(registry: &SessionRegistry, clock: &dyn Clock, config: &RegistryConfig) -> usize {
    let ttl = chrono::Duration::seconds(config.entry_ttl_secs.min(MAX_TTL_SECS) as i64);
    let evicted = registry.evict_idle(clock.now(), ttl).await;

    if evicted > 0 {
        info!(evicted, "Evicted idle registry entries");
    }
    evicted
}
