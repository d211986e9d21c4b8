use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::{RetryPolicy, establish_connection},
    error::{MongoDaoError, MongoResult},
    models::{
        ADMIN_COLLECTION, CLAIM_COLLECTION, MongoAdminDocument, MongoClaimDocument,
        MongoNameDocument, MongoPartyDocument, MongoReservedDocument, NAME_COLLECTION,
        PARTY_COLLECTION, RESERVED_COLLECTION, chunk_filter, doc_id,
    },
};
use crate::dao::{
    claim_store::{ClaimStore, StoreSnapshot},
    models::{ChunkKey, ClaimedChunkEntity, NameCacheEntity, PartyEntity, ReservedChunkEntity},
    storage::StorageResult,
};

#[derive(Clone)]
pub struct MongoClaimStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Held so the connection pool lives as long as the store.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(
                &self.config.options,
                &self.config.database_name,
                RetryPolicy::RECONNECT,
            )
            .await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoClaimStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name, RetryPolicy::STARTUP)
                .await?;
        info!(database = %config.database_name, "connected to MongoDB");

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        for collection in [CLAIM_COLLECTION, RESERVED_COLLECTION] {
            let index = IndexModel::builder()
                .keys(doc! {"dimension": 1, "chunk_x": 1, "chunk_z": 1})
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection}_coord_idx")))
                        .unique(Some(true))
                        .build(),
                )
                .build();

            self.collection::<Document>(collection)
                .await
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: "dimension,chunk_x,chunk_z",
                    source,
                })?;
        }

        let index = IndexModel::builder()
            .keys(doc! {"reserved_by": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("reserved_party_idx".to_owned()))
                    .build(),
            )
            .build();
        self.collection::<Document>(RESERVED_COLLECTION)
            .await
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: RESERVED_COLLECTION,
                index: "reserved_by",
                source,
            })?;

        Ok(())
    }

    async fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn upsert<T>(
        &self,
        collection: &'static str,
        entity: &'static str,
        key: String,
        filter: Document,
        document: T,
    ) -> MongoResult<()>
    where
        T: Serialize + Send + Sync,
    {
        self.collection::<T>(collection)
            .await
            .replace_one(filter, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                entity,
                key,
                source,
            })?;
        Ok(())
    }

    async fn delete(
        &self,
        collection: &'static str,
        entity: &'static str,
        key: String,
        filter: Document,
    ) -> MongoResult<()> {
        self.collection::<Document>(collection)
            .await
            .delete_many(filter)
            .await
            .map_err(|source| MongoDaoError::Delete {
                entity,
                key,
                source,
            })?;
        Ok(())
    }

    async fn load_all<T>(&self, collection: &'static str) -> MongoResult<Vec<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        self.collection::<T>(collection)
            .await
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::Load { collection, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Load { collection, source })
    }

    async fn save_party(&self, party: PartyEntity) -> MongoResult<()> {
        let id = party.id;
        let document: MongoPartyDocument = party.into();
        self.upsert(PARTY_COLLECTION, "party", id.to_string(), doc_id(id), document)
            .await
    }

    async fn save_claim(&self, claim: ClaimedChunkEntity) -> MongoResult<()> {
        let key = ChunkKey::new(&claim.dimension, claim.pos());
        let document: MongoClaimDocument = claim.into();
        self.upsert(
            CLAIM_COLLECTION,
            "claim",
            format!("{}@{}", key.pos, key.dimension),
            chunk_filter(&key),
            document,
        )
        .await
    }

    async fn save_reserved(&self, reserved: ReservedChunkEntity) -> MongoResult<()> {
        let key = ChunkKey::new(&reserved.dimension, reserved.pos());
        let document: MongoReservedDocument = reserved.into();
        self.upsert(
            RESERVED_COLLECTION,
            "reserved chunk",
            format!("{}@{}", key.pos, key.dimension),
            chunk_filter(&key),
            document,
        )
        .await
    }

    async fn save_name(&self, name: NameCacheEntity) -> MongoResult<()> {
        let player = name.player;
        let document: MongoNameDocument = name.into();
        self.upsert(
            NAME_COLLECTION,
            "name",
            player.to_string(),
            doc_id(player),
            document,
        )
        .await
    }

    async fn save_admin_override(&self, player: Uuid) -> MongoResult<()> {
        let document = MongoAdminDocument {
            player: player.to_string(),
        };
        self.upsert(
            ADMIN_COLLECTION,
            "admin override",
            player.to_string(),
            doc_id(player),
            document,
        )
        .await
    }

    async fn load_parties(&self) -> MongoResult<Vec<PartyEntity>> {
        self.load_all::<MongoPartyDocument>(PARTY_COLLECTION)
            .await?
            .into_iter()
            .map(TryInto::try_into)
            .collect()
    }

    async fn load_claims(&self) -> MongoResult<Vec<ClaimedChunkEntity>> {
        self.load_all::<MongoClaimDocument>(CLAIM_COLLECTION)
            .await?
            .into_iter()
            .map(TryInto::try_into)
            .collect()
    }

    async fn load_reserved(&self) -> MongoResult<Vec<ReservedChunkEntity>> {
        self.load_all::<MongoReservedDocument>(RESERVED_COLLECTION)
            .await?
            .into_iter()
            .map(TryInto::try_into)
            .collect()
    }

    async fn load_names(&self) -> MongoResult<Vec<NameCacheEntity>> {
        self.load_all::<MongoNameDocument>(NAME_COLLECTION)
            .await?
            .into_iter()
            .map(TryInto::try_into)
            .collect()
    }

    async fn load_admin_overrides(&self) -> MongoResult<Vec<Uuid>> {
        self.load_all::<MongoAdminDocument>(ADMIN_COLLECTION)
            .await?
            .into_iter()
            .map(MongoAdminDocument::into_player)
            .collect()
    }

    async fn is_empty(&self) -> MongoResult<bool> {
        for collection in [
            PARTY_COLLECTION,
            CLAIM_COLLECTION,
            RESERVED_COLLECTION,
            NAME_COLLECTION,
            ADMIN_COLLECTION,
        ] {
            let count = self
                .collection::<Document>(collection)
                .await
                .count_documents(doc! {})
                .await
                .map_err(|source| MongoDaoError::Load { collection, source })?;
            if count > 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn import(&self, snapshot: StoreSnapshot) -> MongoResult<()> {
        for party in snapshot.parties {
            self.save_party(party).await?;
        }
        for claim in snapshot.claims {
            self.save_claim(claim).await?;
        }
        for reserved in snapshot.reserved {
            self.save_reserved(reserved).await?;
        }
        for name in snapshot.names {
            self.save_name(name).await?;
        }
        for player in snapshot.admin_overrides {
            self.save_admin_override(player).await?;
        }
        Ok(())
    }
}

impl ClaimStore for MongoClaimStore {
    fn save_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_party(party).await.map_err(Into::into) })
    }

    fn delete_party(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete(PARTY_COLLECTION, "party", id.to_string(), doc_id(id))
                .await
                .map_err(Into::into)
        })
    }

    fn save_claim(&self, claim: ClaimedChunkEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_claim(claim).await.map_err(Into::into) })
    }

    fn delete_claim(&self, key: ChunkKey) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let label = format!("{}@{}", key.pos, key.dimension);
            store
                .delete(CLAIM_COLLECTION, "claim", label, chunk_filter(&key))
                .await
                .map_err(Into::into)
        })
    }

    fn save_reserved(
        &self,
        reserved: ReservedChunkEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_reserved(reserved).await.map_err(Into::into) })
    }

    fn delete_reserved(&self, key: ChunkKey) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let label = format!("{}@{}", key.pos, key.dimension);
            store
                .delete(
                    RESERVED_COLLECTION,
                    "reserved chunk",
                    label,
                    chunk_filter(&key),
                )
                .await
                .map_err(Into::into)
        })
    }

    fn delete_reserved_by_party(&self, party_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete(
                    RESERVED_COLLECTION,
                    "reserved chunks of party",
                    party_id.to_string(),
                    doc! {"reserved_by": party_id.to_string()},
                )
                .await
                .map_err(Into::into)
        })
    }

    fn save_name(&self, name: NameCacheEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_name(name).await.map_err(Into::into) })
    }

    fn save_admin_override(&self, player: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_admin_override(player).await.map_err(Into::into) })
    }

    fn delete_admin_override(&self, player: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete(
                    ADMIN_COLLECTION,
                    "admin override",
                    player.to_string(),
                    doc_id(player),
                )
                .await
                .map_err(Into::into)
        })
    }

    fn load_parties(&self) -> BoxFuture<'static, StorageResult<Vec<PartyEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_parties().await.map_err(Into::into) })
    }

    fn load_claims(&self) -> BoxFuture<'static, StorageResult<Vec<ClaimedChunkEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_claims().await.map_err(Into::into) })
    }

    fn load_reserved(&self) -> BoxFuture<'static, StorageResult<Vec<ReservedChunkEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_reserved().await.map_err(Into::into) })
    }

    fn load_names(&self) -> BoxFuture<'static, StorageResult<Vec<NameCacheEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_names().await.map_err(Into::into) })
    }

    fn load_admin_overrides(&self) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let store = self.clone();
        Box::pin(async move { store.load_admin_overrides().await.map_err(Into::into) })
    }

    fn is_empty(&self) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.is_empty().await.map_err(Into::into) })
    }

    fn import(&self, snapshot: StoreSnapshot) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.import(snapshot).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
