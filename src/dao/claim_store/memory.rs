//! Process-local store used when no database is configured and as the test
//! double for the durable backends.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::{DashMap, DashSet};
use futures::future::BoxFuture;
use uuid::Uuid;

use super::{ClaimStore, StoreSnapshot};
use crate::dao::{
    models::{ChunkKey, ClaimedChunkEntity, NameCacheEntity, PartyEntity, ReservedChunkEntity},
    storage::{StorageError, StorageResult},
};

#[derive(Clone, Default)]
pub struct MemoryClaimStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    parties: DashMap<Uuid, PartyEntity>,
    claims: DashMap<ChunkKey, ClaimedChunkEntity>,
    reserved: DashMap<ChunkKey, ReservedChunkEntity>,
    names: DashMap<Uuid, NameCacheEntity>,
    admin_overrides: DashSet<Uuid>,
    offline: AtomicBool,
}

impl MemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with `snapshot`, replacing rows with the same identity.
    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        store.apply_snapshot(snapshot);
        store
    }

    /// Make every subsequent operation fail until toggled back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Copy of everything currently stored.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            parties: collect_values(&self.inner.parties),
            claims: collect_values(&self.inner.claims),
            reserved: collect_values(&self.inner.reserved),
            names: collect_values(&self.inner.names),
            admin_overrides: self.inner.admin_overrides.iter().map(|id| *id).collect(),
        }
    }

    fn apply_snapshot(&self, snapshot: StoreSnapshot) {
        for party in snapshot.parties {
            self.inner.parties.insert(party.id, party);
        }
        for claim in snapshot.claims {
            let key = ChunkKey::new(&claim.dimension, claim.pos());
            self.inner.claims.insert(key, claim);
        }
        for reserved in snapshot.reserved {
            let key = ChunkKey::new(&reserved.dimension, reserved.pos());
            self.inner.reserved.insert(key, reserved);
        }
        for name in snapshot.names {
            self.inner.names.insert(name.player, name);
        }
        for player in snapshot.admin_overrides {
            self.inner.admin_overrides.insert(player);
        }
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Offline { backend: "memory" });
        }
        Ok(())
    }

    /// Run `op` against the store once it is known to be online.
    fn run<T, F>(&self, op: F) -> BoxFuture<'static, StorageResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&MemoryInner) -> T + Send + 'static,
    {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(op(&store.inner))
        })
    }
}

fn collect_values<K, V>(map: &DashMap<K, V>) -> Vec<V>
where
    K: Eq + std::hash::Hash,
    V: Clone,
{
    map.iter().map(|entry| entry.value().clone()).collect()
}

impl ClaimStore for MemoryClaimStore {
    fn save_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner.parties.insert(party.id, party);
        })
    }

    fn delete_party(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner.parties.remove(&id);
        })
    }

    fn save_claim(&self, claim: ClaimedChunkEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            let key = ChunkKey::new(&claim.dimension, claim.pos());
            inner.claims.insert(key, claim);
        })
    }

    fn delete_claim(&self, key: ChunkKey) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner.claims.remove(&key);
        })
    }

    fn save_reserved(
        &self,
        reserved: ReservedChunkEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            let key = ChunkKey::new(&reserved.dimension, reserved.pos());
            inner.reserved.insert(key, reserved);
        })
    }

    fn delete_reserved(&self, key: ChunkKey) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner.reserved.remove(&key);
        })
    }

    fn delete_reserved_by_party(&self, party_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner
                .reserved
                .retain(|_, reserved| reserved.reserved_by != party_id);
        })
    }

    fn save_name(&self, name: NameCacheEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner.names.insert(name.player, name);
        })
    }

    fn save_admin_override(&self, player: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner.admin_overrides.insert(player);
        })
    }

    fn delete_admin_override(&self, player: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner.admin_overrides.remove(&player);
        })
    }

    fn load_parties(&self) -> BoxFuture<'static, StorageResult<Vec<PartyEntity>>> {
        self.run(|inner| collect_values(&inner.parties))
    }

    fn load_claims(&self) -> BoxFuture<'static, StorageResult<Vec<ClaimedChunkEntity>>> {
        self.run(|inner| collect_values(&inner.claims))
    }

    fn load_reserved(&self) -> BoxFuture<'static, StorageResult<Vec<ReservedChunkEntity>>> {
        self.run(|inner| collect_values(&inner.reserved))
    }

    fn load_names(&self) -> BoxFuture<'static, StorageResult<Vec<NameCacheEntity>>> {
        self.run(|inner| collect_values(&inner.names))
    }

    fn load_admin_overrides(&self) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        self.run(|inner| inner.admin_overrides.iter().map(|id| *id).collect())
    }

    fn is_empty(&self) -> BoxFuture<'static, StorageResult<bool>> {
        self.run(|inner| {
            inner.parties.is_empty()
                && inner.claims.is_empty()
                && inner.reserved.is_empty()
                && inner.names.is_empty()
                && inner.admin_overrides.is_empty()
        })
    }

    fn import(&self, snapshot: StoreSnapshot) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            store.apply_snapshot(snapshot);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.run(|_| ())
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.run(|_| ())
    }
}
