//! Periodic disbanding of parties nobody has played in for a while.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::{MissedTickBehavior, interval};
use tracing::info;
use uuid::Uuid;

use crate::{
    services::party_service,
    state::{SharedState, party::Party},
};

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Whether every player of `party` is offline and unseen for `threshold_ms`.
///
/// A player with no recorded sighting keeps the party alive.
fn is_inactive(state: &SharedState, party: &Party, now_ms: i64, threshold_ms: i64) -> bool {
    party.everyone().all(|player| {
        let Some(name) = state.names().get(&player) else {
            return false;
        };
        name.last_seen_ms > 0
            && !state.host().is_online(player)
            && now_ms - name.last_seen_ms >= threshold_ms
    })
}

/// Disband every inactive party as of `now_ms`, returning their ids.
///
/// Does nothing when the inactivity threshold is negative.
pub async fn disband_inactive_parties_at(state: &SharedState, now_ms: i64) -> Vec<Uuid> {
    let Some(threshold_ms) = state.config().inactivity_threshold_ms() else {
        return Vec::new();
    };

    let candidates: Vec<(Uuid, String)> = state
        .parties()
        .iter()
        .filter(|party| is_inactive(state, party, now_ms, threshold_ms))
        .map(|party| (party.id, party.name.clone()))
        .collect();

    let mut disbanded = Vec::with_capacity(candidates.len());
    for (party_id, name) in candidates {
        if party_service::disband_party(state, party_id).await {
            info!(party = %party_id, name = %name, "disbanded inactive party");
            disbanded.push(party_id);
        }
    }
    disbanded
}

/// [`disband_inactive_parties_at`] using the current time.
pub async fn disband_inactive_parties(state: &SharedState) -> Vec<Uuid> {
    disband_inactive_parties_at(state, now_ms()).await
}

/// Sweep every `period` until the task is dropped.
pub async fn run(state: SharedState, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        disband_inactive_parties(&state).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::ClaimsConfig,
        dao::claim_store::memory::MemoryClaimStore,
        host::StaticHost,
        services::names,
    };

    const HOUR_MS: i64 = 3_600_000;

    fn state_with(hours: i32) -> (SharedState, Arc<StaticHost>) {
        let host = Arc::new(StaticHost::new());
        let state = crate::state::ClaimsState::new(
            Arc::new(ClaimsConfig {
                party_inactivity_hours: hours,
                ..ClaimsConfig::default()
            }),
            host.clone(),
            Arc::new(MemoryClaimStore::new()),
        );
        (state, host)
    }

    #[tokio::test]
    async fn negative_threshold_disables_the_sweep() {
        let (state, _) = state_with(-1);
        let owner = Uuid::new_v4();
        party_service::create_party(&state, owner, "Ada");
        names::set_player_name(&state, owner, "Ada", 1);

        assert!(disband_inactive_parties_at(&state, i64::MAX).await.is_empty());
        assert_eq!(state.parties().len(), 1);
    }

    #[tokio::test]
    async fn every_player_must_be_stale() {
        let (state, _) = state_with(1);
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let party = party_service::create_party(&state, owner, "Ada");
        party_service::add_member(&state, party.id, member);

        names::set_player_name(&state, owner, "Ada", 1_000);
        names::set_player_name(&state, member, "Bo", 1_000 + HOUR_MS);
        let now = 1_000 + HOUR_MS + HOUR_MS / 2;
        assert!(disband_inactive_parties_at(&state, now).await.is_empty());

        let later = 1_000 + 2 * HOUR_MS;
        assert_eq!(disband_inactive_parties_at(&state, later).await, vec![party.id]);
        assert!(state.party_of_player(member).is_none());
    }

    #[tokio::test]
    async fn unknown_or_online_players_keep_the_party() {
        let (state, host) = state_with(0);
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let party = party_service::create_party(&state, owner, "Ada");
        party_service::add_member(&state, party.id, member);
        names::set_player_name(&state, owner, "Ada", 5);

        assert!(disband_inactive_parties_at(&state, 100).await.is_empty());

        names::set_player_name(&state, member, "Bo", 5);
        host.set_online(member, true);
        assert!(disband_inactive_parties_at(&state, 100).await.is_empty());

        host.set_online(member, false);
        assert_eq!(disband_inactive_parties_at(&state, 100).await.len(), 1);
    }

    #[tokio::test]
    async fn never_seen_players_keep_the_party() {
        let (state, _) = state_with(0);
        let owner = Uuid::new_v4();
        party_service::create_party(&state, owner, "Ada");
        names::set_player_name(&state, owner, "Ada", 0);
        assert!(disband_inactive_parties_at(&state, 100).await.is_empty());
    }
}
