use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::state::SharedState;

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Watch the durable store and flag the persistence gateway as degraded while
/// it is unreachable. Writes keep being attempted, and failures are logged by
/// the workers.
pub async fn run(state: SharedState) {
    let store = state.persistence().store();

    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.persistence().is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                    state.persistence().update_degraded(false);
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                let mut attempt = 0;
                let mut reconnect_delay = INITIAL_DELAY;
                let mut reconnected = false;

                while attempt < MAX_RECONNECT_ATTEMPTS {
                    match store.try_reconnect().await {
                        Ok(()) => {
                            info!(attempt, "storage reconnection succeeded after health check failure");
                            reconnected = true;
                            break;
                        }
                        Err(reconnect_err) => {
                            if attempt == 0 {
                                warn!(
                                    attempt, error = %reconnect_err,
                                    "storage reconnect first attempt failed; entering degraded mode"
                                );
                                state.persistence().update_degraded(true);
                            } else {
                                warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                            }
                            attempt += 1;
                            sleep(reconnect_delay).await;
                            reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                        }
                    }
                }

                if reconnected {
                    state.persistence().update_degraded(false);
                    sleep(HEALTH_POLL_INTERVAL).await;
                } else {
                    warn!("exhausted storage reconnect attempts; staying in degraded mode");
                    sleep(MAX_DELAY).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::ClaimsConfig, dao::claim_store::memory::MemoryClaimStore, host::StaticHost,
        state::ClaimsState,
    };

    #[tokio::test(start_paused = true)]
    async fn outage_toggles_degraded_mode() {
        let store = MemoryClaimStore::new();
        let state = ClaimsState::new(
            Arc::new(ClaimsConfig::default()),
            Arc::new(StaticHost::new()),
            Arc::new(store.clone()),
        );
        let mut degraded = state.persistence().degraded_watcher();
        store.set_offline(true);

        let supervisor = tokio::spawn(run(state.clone()));
        degraded.changed().await.unwrap();
        assert!(*degraded.borrow_and_update());

        store.set_offline(false);
        degraded.changed().await.unwrap();
        assert!(!*degraded.borrow_and_update());

        supervisor.abort();
    }
}
