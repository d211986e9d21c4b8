pub mod chunk;
pub mod party;
pub mod territory;

use std::{path::Path, sync::Arc};

use dashmap::{DashMap, DashSet};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::ClaimsConfig,
    dao::{
        claim_store::ClaimStore,
        legacy,
        models::{NameCacheEntity, PartyEntity},
    },
    error::StartupError,
    host::HostDirectory,
    services::{
        map_updates::MapUpdateQueue,
        migration,
        persistence::{PersistTask, PersistenceGateway},
    },
};

use self::{
    chunk::{ClaimedChunk, ReservedChunk},
    party::{Party, PartyInvite},
    territory::Territory,
};

pub type SharedState = Arc<ClaimsState>;

/// Last known name and activity of a player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerName {
    pub name: String,
    /// Epoch milliseconds, `0` when never seen.
    pub last_seen_ms: i64,
    /// Hours played.
    pub play_time: f32,
}

/// The claim registry: parties, territory and every derived index.
pub struct ClaimsState {
    config: Arc<ClaimsConfig>,
    host: Arc<dyn HostDirectory>,
    parties: DashMap<Uuid, Party>,
    player_to_party: DashMap<Uuid, Uuid>,
    invites: DashMap<Uuid, PartyInvite>,
    territory: Mutex<Territory>,
    names: DashMap<Uuid, PlayerName>,
    admin_overrides: DashSet<Uuid>,
    admin_party_selection: DashMap<Uuid, Uuid>,
    map_updates: MapUpdateQueue,
    persistence: PersistenceGateway,
}

impl ClaimsState {
    /// Construct an empty registry writing behind to `store`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: Arc<ClaimsConfig>,
        host: Arc<dyn HostDirectory>,
        store: Arc<dyn ClaimStore>,
    ) -> SharedState {
        Arc::new(Self {
            config,
            host,
            parties: DashMap::new(),
            player_to_party: DashMap::new(),
            invites: DashMap::new(),
            territory: Mutex::new(Territory::default()),
            names: DashMap::new(),
            admin_overrides: DashSet::new(),
            admin_party_selection: DashMap::new(),
            map_updates: MapUpdateQueue::new(),
            persistence: PersistenceGateway::spawn(store),
        })
    }

    /// Load every persisted set and rebuild the derived indexes.
    ///
    /// When `legacy_dump` points at an existing file and the store is empty,
    /// the dump is imported first. Any load failure aborts startup.
    pub async fn bootstrap(
        config: Arc<ClaimsConfig>,
        host: Arc<dyn HostDirectory>,
        store: Arc<dyn ClaimStore>,
        legacy_dump: Option<&Path>,
    ) -> Result<SharedState, StartupError> {
        if let Some(path) = legacy_dump {
            import_legacy_dump(store.as_ref(), path).await?;
        }

        info!("loading parties");
        let parties = store
            .load_parties()
            .await
            .map_err(|source| StartupError::Load {
                what: "parties",
                source,
            })?;
        info!("loading claims");
        let claims = store
            .load_claims()
            .await
            .map_err(|source| StartupError::Load {
                what: "claims",
                source,
            })?;
        info!("loading name cache");
        let names = store
            .load_names()
            .await
            .map_err(|source| StartupError::Load {
                what: "name cache",
                source,
            })?;
        info!("loading admin overrides");
        let admin_overrides =
            store
                .load_admin_overrides()
                .await
                .map_err(|source| StartupError::Load {
                    what: "admin overrides",
                    source,
                })?;
        info!("loading reserved chunks");
        let reserved = store
            .load_reserved()
            .await
            .map_err(|source| StartupError::Load {
                what: "reserved chunks",
                source,
            })?;

        let state = Self::new(config, host, store);
        state.install_parties(parties);
        {
            let mut territory = state.territory.lock().await;
            for claim in claims {
                let dimension = claim.dimension.clone();
                territory.insert_claim(&dimension, ClaimedChunk::from(claim));
            }
            for entity in reserved {
                let dimension = entity.dimension.clone();
                let reserved = ReservedChunk::from(entity);
                territory.reserve(&dimension, reserved.pos, reserved.reserved_by);
            }
            info!(
                parties = state.parties.len(),
                claims = territory.claims().count(),
                reserved = territory.reservations().count(),
                "registry loaded"
            );
        }
        for entity in names {
            state.names.insert(entity.player, entity.into());
        }
        for player in admin_overrides {
            state.admin_overrides.insert(player);
        }

        if state.config.migrate_legacy_claim_overrides {
            migration::migrate_legacy_overrides(&state);
        }

        Ok(state)
    }

    // Members are indexed before owners so a player owning an admin party
    // still resolves to the party they belong to.
    fn install_parties(&self, parties: Vec<PartyEntity>) {
        let parties: Vec<Party> = parties.into_iter().map(Party::from).collect();
        for party in &parties {
            for member in party.members() {
                self.player_to_party.insert(member, party.id);
            }
        }
        for party in &parties {
            self.player_to_party.entry(party.owner).or_insert(party.id);
        }
        for party in parties {
            self.parties.insert(party.id, party);
        }
    }

    pub fn config(&self) -> &ClaimsConfig {
        &self.config
    }

    pub fn host(&self) -> &dyn HostDirectory {
        self.host.as_ref()
    }

    /// Every party keyed by id.
    pub fn parties(&self) -> &DashMap<Uuid, Party> {
        &self.parties
    }

    /// Player to party index, owners included.
    pub fn player_to_party(&self) -> &DashMap<Uuid, Uuid> {
        &self.player_to_party
    }

    /// Outstanding invites keyed by recipient.
    pub fn invites(&self) -> &DashMap<Uuid, PartyInvite> {
        &self.invites
    }

    /// Claims, reservations and the claim count cache.
    pub fn territory(&self) -> &Mutex<Territory> {
        &self.territory
    }

    pub fn names(&self) -> &DashMap<Uuid, PlayerName> {
        &self.names
    }

    /// Players bypassing every interaction check.
    pub fn admin_overrides(&self) -> &DashSet<Uuid> {
        &self.admin_overrides
    }

    /// Admin player to the party they currently act for.
    pub fn admin_party_selection(&self) -> &DashMap<Uuid, Uuid> {
        &self.admin_party_selection
    }

    pub fn map_updates(&self) -> &MapUpdateQueue {
        &self.map_updates
    }

    pub fn persistence(&self) -> &PersistenceGateway {
        &self.persistence
    }

    /// Snapshot of a party.
    pub fn party(&self, party_id: Uuid) -> Option<Party> {
        self.parties.get(&party_id).map(|party| party.clone())
    }

    /// Snapshot of the party a player belongs to.
    pub fn party_of_player(&self, player: Uuid) -> Option<Party> {
        let party_id = *self.player_to_party.get(&player)?;
        self.party(party_id)
    }

    /// Queue a durable save of `party`.
    pub(crate) fn persist_party(&self, party: &Party) {
        self.persistence
            .enqueue(PersistTask::SaveParty(PartyEntity::from(party.clone())));
    }

    /// Queue a durable save of a name cache entry.
    pub(crate) fn persist_name(&self, player: Uuid, name: &PlayerName) {
        self.persistence
            .enqueue(PersistTask::SaveName(NameCacheEntity::new(player, name)));
    }
}

async fn import_legacy_dump(store: &dyn ClaimStore, path: &Path) -> Result<(), StartupError> {
    let Some(snapshot) = legacy::read_snapshot(path)? else {
        return Ok(());
    };
    let empty = store.is_empty().await.map_err(|source| StartupError::Load {
        what: "store emptiness",
        source,
    })?;
    if !empty {
        info!(path = %path.display(), "store already populated; skipping legacy import");
        return Ok(());
    }

    info!(path = %path.display(), "importing legacy dump");
    store.import(snapshot).await.map_err(StartupError::Import)
}
