use std::{
    collections::{HashMap, HashSet},
    io::Write,
    sync::Arc,
};

use chunk_claims::{
    config::ClaimsConfig,
    dao::claim_store::memory::MemoryClaimStore,
    error::ClaimError,
    host::StaticHost,
    services::{
        claim_service, party_service::{self, LeaveOutcome},
        perimeter::compute_perimeter,
        permissions::is_allowed_to_interact,
    },
    state::{
        ClaimsState, SharedState,
        chunk::ChunkPos,
        party::{Actor, PartyPermission, ProtectionFlag},
    },
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use uuid::Uuid;

const DIM: &str = "overworld";

fn registry(config: ClaimsConfig) -> (SharedState, MemoryClaimStore) {
    let store = MemoryClaimStore::new();
    let state = ClaimsState::new(
        Arc::new(config),
        Arc::new(StaticHost::new()),
        Arc::new(store.clone()),
    );
    (state, store)
}

async fn assert_consistent(state: &SharedState) {
    let territory = state.territory().lock().await;

    let mut counted: HashMap<Uuid, u32> = HashMap::new();
    for (_, chunk) in territory.claims() {
        *counted.entry(chunk.party_id).or_default() += 1;
    }
    let cached: HashMap<Uuid, u32> = territory
        .claim_counts()
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(party, count)| (*party, *count))
        .collect();
    assert_eq!(counted, cached);

    for (dimension, reserved) in territory.reservations() {
        assert!(territory.claim(dimension, reserved.pos).is_none());
    }

    let mut holders: HashSet<(String, Uuid)> = HashSet::new();
    for (dimension, chunk) in territory.claims() {
        holders.insert((dimension.to_owned(), chunk.party_id));
    }
    for (dimension, reserved) in territory.reservations() {
        holders.insert((dimension.to_owned(), reserved.reserved_by));
    }
    for (dimension, party) in holders {
        assert_eq!(
            territory.party_reservations(&dimension, party),
            compute_perimeter(&territory, &dimension, party),
            "ring of {party} in {dimension}"
        );
    }
}

#[tokio::test]
async fn eleventh_claim_exceeds_default_quota() {
    let (state, _) = registry(ClaimsConfig::default());
    let owner = Uuid::new_v4();
    let party = party_service::create_party(&state, owner, "Ada");
    let actor = Actor::new(owner, "Ada");

    for x in 0..10 {
        claim_service::try_claim(&state, DIM, ChunkPos::new(x, 0), party.id, actor)
            .await
            .unwrap();
    }
    assert!(!claim_service::has_enough_claims_left(&state, party.id).await);

    let eleventh = claim_service::try_claim(&state, DIM, ChunkPos::new(10, 0), party.id, actor).await;
    assert_eq!(eleventh, Err(ClaimError::QuotaExhausted));
    assert_eq!(claim_service::claim_count(&state, party.id).await, 10);
}

#[tokio::test]
async fn perimeter_keeps_neighbours_out_and_grows_with_claims() {
    let (state, _) = registry(ClaimsConfig::default());
    let ada = Uuid::new_v4();
    let bo = Uuid::new_v4();
    let a = party_service::create_party(&state, ada, "Ada");
    let b = party_service::create_party(&state, bo, "Bo");

    claim_service::try_claim(&state, DIM, ChunkPos::new(0, 0), a.id, Actor::new(ada, "Ada"))
        .await
        .unwrap();

    let intrusion =
        claim_service::try_claim(&state, DIM, ChunkPos::new(1, 1), b.id, Actor::new(bo, "Bo")).await;
    assert_eq!(intrusion, Err(ClaimError::ReservedByOtherParty));

    claim_service::try_claim(&state, DIM, ChunkPos::new(1, 1), a.id, Actor::new(ada, "Ada"))
        .await
        .unwrap();

    let territory = state.territory().lock().await;
    let ring = territory.party_reservations(DIM, a.id);
    for (x, z) in [(2, 2), (2, 1), (2, 0), (0, 2), (1, 2)] {
        assert!(ring.contains(&ChunkPos::new(x, z)), "({x}, {z}) missing");
    }
    assert!(!ring.contains(&ChunkPos::new(0, 0)));
    assert!(!ring.contains(&ChunkPos::new(1, 1)));
    assert_eq!(ring, compute_perimeter(&territory, DIM, a.id));
}

#[tokio::test]
async fn owner_leaving_disbands_and_frees_member_claims() {
    let (state, store) = registry(ClaimsConfig::default());
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let party = party_service::create_party(&state, owner, "Ada");
    assert!(party_service::add_member(&state, party.id, member));

    claim_service::try_claim(&state, DIM, ChunkPos::new(3, 3), party.id, Actor::new(member, "Bo"))
        .await
        .unwrap();

    assert_eq!(
        party_service::leave_party(&state, owner, party.id).await,
        LeaveOutcome::Disbanded
    );
    assert!(state.party(party.id).is_none());
    assert!(state.party_of_player(member).is_none());
    assert!(
        claim_service::chunk_owner(&state, DIM, ChunkPos::new(3, 3))
            .await
            .is_none()
    );

    state.persistence().drained().await;
    let stored = store.snapshot();
    assert!(stored.parties.is_empty());
    assert!(stored.claims.is_empty());
    assert!(stored.reserved.is_empty());
}

#[tokio::test]
async fn disband_clears_every_dimension() {
    let (state, _) = registry(ClaimsConfig::default());
    let owner = Uuid::new_v4();
    let party = party_service::create_party(&state, owner, "Ada");
    let actor = Actor::new(owner, "Ada");
    for dimension in ["overworld", "nether", "end"] {
        claim_service::try_claim(&state, dimension, ChunkPos::new(-4, 9), party.id, actor)
            .await
            .unwrap();
    }
    assert_eq!(claim_service::claim_count(&state, party.id).await, 3);

    assert!(party_service::disband_party(&state, party.id).await);
    assert!(!party_service::disband_party(&state, party.id).await);

    let territory = state.territory().lock().await;
    assert_eq!(territory.claims().count(), 0);
    assert_eq!(territory.reservations().count(), 0);
    assert_eq!(territory.claim_count(party.id), 0);
}

#[tokio::test]
async fn random_claims_keep_counts_and_rings_consistent() {
    let (state, _) = registry(ClaimsConfig {
        default_party_claims_amount: 40,
        ..ClaimsConfig::default()
    });
    let mut parties = Vec::new();
    for name in ["Ada", "Bo", "Cy"] {
        let owner = Uuid::new_v4();
        parties.push((party_service::create_party(&state, owner, name).id, owner));
    }

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..600 {
        let (party_id, owner) = parties[rng.random_range(0..parties.len())];
        let dimension = if rng.random_bool(0.8) { "overworld" } else { "nether" };
        let pos = ChunkPos::new(rng.random_range(-8..8), rng.random_range(-8..8));

        if rng.random_bool(0.7) {
            let _ = claim_service::try_claim(&state, dimension, pos, party_id, Actor::new(owner, "p")).await;
        } else {
            claim_service::unclaim(&state, dimension, pos).await;
        }
        assert_consistent(&state).await;
    }

    for (party_id, _) in &parties {
        let count = claim_service::claim_count(&state, *party_id).await;
        assert!(count <= 40);
    }
}

#[tokio::test]
async fn registry_restores_from_store_and_legacy_dump() {
    let (state, store) = registry(ClaimsConfig::default());
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let party = party_service::create_party(&state, owner, "Ada");
    party_service::add_member(&state, party.id, member);
    let actor = Actor::new(owner, "Ada");
    claim_service::try_claim(&state, DIM, ChunkPos::new(0, 0), party.id, actor)
        .await
        .unwrap();
    claim_service::try_claim(&state, DIM, ChunkPos::new(0, 1), party.id, actor)
        .await
        .unwrap();
    state.persistence().drained().await;

    let mut snapshot = store.snapshot();
    snapshot.parties[0].overrides.legacy_claim_quota = Some(25);

    let mut dump = tempfile::NamedTempFile::new().unwrap();
    write!(dump, "{}", serde_json::to_string(&snapshot).unwrap()).unwrap();

    let target = MemoryClaimStore::new();
    let restored = ClaimsState::bootstrap(
        Arc::new(ClaimsConfig::default()),
        Arc::new(StaticHost::new()),
        Arc::new(target.clone()),
        Some(dump.path()),
    )
    .await
    .unwrap();

    let reloaded = restored.party(party.id).unwrap();
    assert_eq!(reloaded.overrides.legacy_claim_quota, None);
    assert_eq!(reloaded.overrides.claim_quota_bonus, Some(15));
    assert_eq!(restored.party_of_player(member).unwrap().id, party.id);
    assert_eq!(restored.party_of_player(owner).unwrap().id, party.id);
    assert_eq!(claim_service::claim_count(&restored, party.id).await, 2);
    {
        let territory = restored.territory().lock().await;
        assert_eq!(
            territory.party_reservations(DIM, party.id),
            compute_perimeter(&territory, DIM, party.id)
        );
    }

    restored.persistence().drained().await;
    let persisted = target.snapshot();
    assert_eq!(persisted.parties.len(), 1);
    assert_eq!(persisted.parties[0].overrides.claim_quota_bonus, Some(15));
    assert_eq!(persisted.parties[0].overrides.legacy_claim_quota, None);
}

#[tokio::test]
async fn legacy_dump_is_ignored_when_store_has_data() {
    let (state, store) = registry(ClaimsConfig::default());
    let party = party_service::create_party(&state, Uuid::new_v4(), "Ada");
    state.persistence().drained().await;

    let mut dump = tempfile::NamedTempFile::new().unwrap();
    write!(dump, r#"{{"admin_overrides": ["{}"]}}"#, Uuid::new_v4()).unwrap();

    let restored = ClaimsState::bootstrap(
        Arc::new(ClaimsConfig::default()),
        Arc::new(StaticHost::new()),
        Arc::new(MemoryClaimStore::with_snapshot(store.snapshot())),
        Some(dump.path()),
    )
    .await
    .unwrap();

    assert!(restored.party(party.id).is_some());
    assert!(restored.admin_overrides().is_empty());
}

#[tokio::test]
async fn offline_store_aborts_startup() {
    let store = MemoryClaimStore::new();
    store.set_offline(true);
    let result = ClaimsState::bootstrap(
        Arc::new(ClaimsConfig::default()),
        Arc::new(StaticHost::new()),
        Arc::new(store),
        None,
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn interaction_follows_ownership_alliances_and_flags() {
    let (state, _) = registry(ClaimsConfig {
        full_world_protection: vec!["spawn".into()],
        ..ClaimsConfig::default()
    });
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let ally_owner = Uuid::new_v4();

    let party = party_service::create_party(&state, owner, "Ada");
    party_service::add_member(&state, party.id, member);
    let allied = party_service::create_party(&state, ally_owner, "Cy");
    party_service::add_party_ally(&state, party.id, allied.id);
    party_service::set_permission(
        &state,
        party.id,
        allied.id,
        PartyPermission::InteractDoor,
        true,
    );

    let home = ChunkPos::new(0, 0);
    claim_service::try_claim(&state, DIM, home, party.id, Actor::new(owner, "Ada"))
        .await
        .unwrap();

    let check = |actor: Option<Uuid>, dimension: &'static str, flag, permission| {
        let state = state.clone();
        async move { is_allowed_to_interact(&state, actor, dimension, home, flag, permission).await }
    };

    use PartyPermission as P;
    use ProtectionFlag as F;

    assert!(check(Some(member), DIM, F::BlockBreak, P::BreakBlocks).await);
    assert!(!check(Some(stranger), DIM, F::BlockBreak, P::BreakBlocks).await);
    assert!(check(Some(stranger), DIM, F::ChairInteract, P::InteractChair).await);
    assert!(!check(None, DIM, F::ChairInteract, P::InteractChair).await);

    assert!(check(Some(ally_owner), DIM, F::DoorInteract, P::InteractDoor).await);
    assert!(!check(Some(ally_owner), DIM, F::ChestInteract, P::InteractChest).await);

    party_service::set_protection(
        &state,
        party.id,
        F::BlockBreak,
        true,
        Actor::new(owner, "Ada"),
    );
    assert!(check(Some(stranger), DIM, F::BlockBreak, P::BreakBlocks).await);

    assert!(check(Some(stranger), "wilds", F::BlockBreak, P::BreakBlocks).await);
    assert!(!check(Some(stranger), "spawn", F::BlockBreak, P::BreakBlocks).await);
}
