//! Interfaces the registry consumes from the hosting game server.

use dashmap::{DashMap, DashSet};
use uuid::Uuid;

use crate::state::chunk::ChunkPos;

/// Player and world facts owned by the host.
pub trait HostDirectory: Send + Sync {
    /// Whether the player is currently connected.
    fn is_online(&self, player: Uuid) -> bool;
    /// Claim quota granted to the player through host permissions.
    fn claim_quota_grant(&self, player: Uuid) -> Option<i32>;
    /// Bonus-chunk ceiling granted to the player through host permissions.
    fn max_bonus_grant(&self, player: Uuid) -> Option<i32>;
    /// Whether the dimension is discarded when unloaded (instances, minigames).
    fn is_transient_dimension(&self, dimension: &str) -> bool;
}

/// Receives coalesced "these chunks changed" signals for client map refreshes.
pub trait MapUpdateSink: Send + Sync {
    fn refresh(&self, dimension: &str, chunks: &[ChunkPos]);
}

/// Host directory backed by in-process tables, for the standalone binary and tests.
#[derive(Default)]
pub struct StaticHost {
    online: DashSet<Uuid>,
    quota_grants: DashMap<Uuid, i32>,
    bonus_grants: DashMap<Uuid, i32>,
    transient: DashSet<String>,
}

impl StaticHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, player: Uuid, online: bool) {
        if online {
            self.online.insert(player);
        } else {
            self.online.remove(&player);
        }
    }

    pub fn grant_claim_quota(&self, player: Uuid, amount: i32) {
        self.quota_grants.insert(player, amount);
    }

    pub fn grant_max_bonus(&self, player: Uuid, amount: i32) {
        self.bonus_grants.insert(player, amount);
    }

    pub fn mark_transient(&self, dimension: &str) {
        self.transient.insert(dimension.to_owned());
    }
}

impl HostDirectory for StaticHost {
    fn is_online(&self, player: Uuid) -> bool {
        self.online.contains(&player)
    }

    fn claim_quota_grant(&self, player: Uuid) -> Option<i32> {
        self.quota_grants.get(&player).map(|amount| *amount)
    }

    fn max_bonus_grant(&self, player: Uuid) -> Option<i32> {
        self.bonus_grants.get(&player).map(|amount| *amount)
    }

    fn is_transient_dimension(&self, dimension: &str) -> bool {
        self.transient.contains(dimension)
    }
}
