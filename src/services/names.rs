//! Player name cache, fed by the host on join and by periodic play time updates.

use uuid::Uuid;

use crate::state::{PlayerName, SharedState};

/// Play time changes smaller than this are not worth a write.
const PLAY_TIME_EPSILON: f32 = 0.01;

/// Record the name a player was last seen with, keeping accumulated play time.
pub fn set_player_name(state: &SharedState, player: Uuid, name: &str, last_seen_ms: i64) {
    let record = {
        let mut entry = state.names().entry(player).or_insert_with(|| PlayerName {
            name: String::new(),
            last_seen_ms: 0,
            play_time: 0.0,
        });
        entry.name = name.to_owned();
        entry.last_seen_ms = last_seen_ms;
        entry.clone()
    };
    state.persist_name(player, &record);
}

/// Update a known player's play time. Unknown players are ignored.
pub fn set_player_play_time(state: &SharedState, player: Uuid, play_time: f32) {
    let record = {
        let Some(mut entry) = state.names().get_mut(&player) else {
            return;
        };
        if (entry.play_time - play_time).abs() < PLAY_TIME_EPSILON {
            return;
        }
        entry.play_time = play_time;
        entry.clone()
    };
    state.persist_name(player, &record);
}

/// Last known name of a player.
pub fn player_name(state: &SharedState, player: Uuid) -> Option<String> {
    state.names().get(&player).map(|entry| entry.name.clone())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::ClaimsConfig, dao::claim_store::memory::MemoryClaimStore, host::StaticHost,
        state::ClaimsState,
    };

    #[tokio::test]
    async fn renaming_keeps_play_time() {
        let store = MemoryClaimStore::new();
        let state = ClaimsState::new(
            Arc::new(ClaimsConfig::default()),
            Arc::new(StaticHost::new()),
            Arc::new(store.clone()),
        );
        let player = Uuid::new_v4();

        set_player_play_time(&state, player, 3.0);
        assert!(player_name(&state, player).is_none());

        set_player_name(&state, player, "Ada", 10);
        set_player_play_time(&state, player, 3.0);
        set_player_name(&state, player, "Ada Lovelace", 20);

        let record = state.names().get(&player).unwrap().clone();
        assert_eq!(record.name, "Ada Lovelace");
        assert_eq!(record.last_seen_ms, 20);
        assert_eq!(record.play_time, 3.0);

        state.persistence().drained().await;
        let stored = store.snapshot().names;
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn tiny_play_time_changes_are_ignored() {
        let state = ClaimsState::new(
            Arc::new(ClaimsConfig::default()),
            Arc::new(StaticHost::new()),
            Arc::new(MemoryClaimStore::new()),
        );
        let player = Uuid::new_v4();
        set_player_name(&state, player, "Ada", 10);
        set_player_play_time(&state, player, 1.0);
        let before = state.persistence().pending();
        set_player_play_time(&state, player, 1.005);
        assert!(state.persistence().pending() <= before);
        assert_eq!(state.names().get(&player).unwrap().play_time, 1.0);
    }
}
