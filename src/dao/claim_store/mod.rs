pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::{
    models::{ChunkKey, ClaimedChunkEntity, NameCacheEntity, PartyEntity, ReservedChunkEntity},
    storage::StorageResult,
};

/// Every entity set the registry persists, as loaded at startup or imported
/// from a legacy dump.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// All parties.
    #[serde(default)]
    pub parties: Vec<PartyEntity>,
    /// All claimed chunks across dimensions.
    #[serde(default)]
    pub claims: Vec<ClaimedChunkEntity>,
    /// All reserved perimeter chunks across dimensions.
    #[serde(default)]
    pub reserved: Vec<ReservedChunkEntity>,
    /// Player name cache.
    #[serde(default)]
    pub names: Vec<NameCacheEntity>,
    /// Players bypassing claim protection.
    #[serde(default)]
    pub admin_overrides: Vec<Uuid>,
}

impl StoreSnapshot {
    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
            && self.claims.is_empty()
            && self.reserved.is_empty()
            && self.names.is_empty()
            && self.admin_overrides.is_empty()
    }
}

/// Abstraction over the durable store backing the claim registry.
///
/// Writes are idempotent upserts or deletes keyed by the entity identity, so
/// replaying or reordering them converges on the latest value written.
pub trait ClaimStore: Send + Sync {
    fn save_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_party(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn save_claim(&self, claim: ClaimedChunkEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_claim(&self, key: ChunkKey) -> BoxFuture<'static, StorageResult<()>>;
    fn save_reserved(&self, reserved: ReservedChunkEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    fn delete_reserved(&self, key: ChunkKey) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_reserved_by_party(&self, party_id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn save_name(&self, name: NameCacheEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn save_admin_override(&self, player: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_admin_override(&self, player: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn load_parties(&self) -> BoxFuture<'static, StorageResult<Vec<PartyEntity>>>;
    fn load_claims(&self) -> BoxFuture<'static, StorageResult<Vec<ClaimedChunkEntity>>>;
    fn load_reserved(&self) -> BoxFuture<'static, StorageResult<Vec<ReservedChunkEntity>>>;
    fn load_names(&self) -> BoxFuture<'static, StorageResult<Vec<NameCacheEntity>>>;
    fn load_admin_overrides(&self) -> BoxFuture<'static, StorageResult<Vec<Uuid>>>;
    /// Whether the store holds no data at all, i.e. a legacy import may run.
    fn is_empty(&self) -> BoxFuture<'static, StorageResult<bool>>;
    /// Bulk-write a snapshot, used once when migrating a legacy dump.
    fn import(&self, snapshot: StoreSnapshot) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
