//! Claiming and releasing chunks.
//!
//! Every mutation runs inside the territory lock: the claim map, the claim
//! count cache and the perimeter are updated together, and the resulting
//! durable writes are queued once the lock is released.

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::{ChunkKey, ClaimedChunkEntity},
    error::ClaimError,
    services::{
        perimeter,
        permissions::effective_quota,
        persistence::PersistTask,
    },
    state::{
        SharedState,
        chunk::{ChunkPos, ClaimedChunk},
        party::{Actor, Party},
        territory::Territory,
    },
};

/// Whether claims are allowed in `dimension` at all.
pub fn can_claim_in_dimension(state: &SharedState, dimension: &str) -> bool {
    if state.host().is_transient_dimension(dimension) {
        return false;
    }
    !state
        .config()
        .world_name_blacklist_for_claiming
        .iter()
        .any(|blocked| blocked == dimension)
}

/// Claim `pos` for `party_id` without any placement rule beyond uniqueness.
///
/// A reservation at `pos` is consumed whoever holds it.
pub async fn claim(
    state: &SharedState,
    dimension: &str,
    pos: ChunkPos,
    party_id: Uuid,
    actor: Actor<'_>,
) -> Result<ClaimedChunk, ClaimError> {
    let mut outbox = Vec::new();
    let claimed = {
        let mut territory = state.territory().lock().await;
        // Disband removes the party under this lock, so the check cannot go stale.
        if !state.parties().contains_key(&party_id) {
            return Err(ClaimError::PartyNotFound);
        }
        if territory.claim(dimension, pos).is_some() {
            return Err(ClaimError::AlreadyClaimed);
        }
        insert_claim(state, &mut territory, dimension, pos, party_id, actor, &mut outbox)
    };

    state.persistence().enqueue_all(outbox);
    state.map_updates().queue(dimension, pos);
    Ok(claimed)
}

/// [`claim`] addressed by block coordinates.
pub async fn claim_at_block(
    state: &SharedState,
    dimension: &str,
    block_x: i32,
    block_z: i32,
    party_id: Uuid,
    actor: Actor<'_>,
) -> Result<ClaimedChunk, ClaimError> {
    claim(state, dimension, ChunkPos::from_block(block_x, block_z), party_id, actor).await
}

/// Claim `pos` after every placement rule: dimension eligibility, other
/// parties' perimeters, adjacency and quota.
///
/// Checks and claim happen under one lock, so two parties racing for the same
/// chunk cannot both pass.
pub async fn try_claim(
    state: &SharedState,
    dimension: &str,
    pos: ChunkPos,
    party_id: Uuid,
    actor: Actor<'_>,
) -> Result<ClaimedChunk, ClaimError> {
    if !can_claim_in_dimension(state, dimension) {
        return Err(ClaimError::DimensionNotClaimable);
    }
    let Some(party) = state.party(party_id) else {
        return Err(ClaimError::PartyNotFound);
    };

    let mut outbox = Vec::new();
    let claimed = {
        let mut territory = state.territory().lock().await;
        check_placement(state, &territory, dimension, pos, &party)?;
        insert_claim(state, &mut territory, dimension, pos, party_id, actor, &mut outbox)
    };

    state.persistence().enqueue_all(outbox);
    state.map_updates().queue(dimension, pos);
    Ok(claimed)
}

fn check_placement(
    state: &SharedState,
    territory: &Territory,
    dimension: &str,
    pos: ChunkPos,
    party: &Party,
) -> Result<(), ClaimError> {
    let config = state.config();
    if !state.parties().contains_key(&party.id) {
        return Err(ClaimError::PartyNotFound);
    }
    if territory.claim(dimension, pos).is_some() {
        return Err(ClaimError::AlreadyClaimed);
    }

    let own_reserved = config.enable_perimeter_reservation
        && perimeter::reserved_by_own(territory, dimension, pos, party.id);

    if config.enable_perimeter_reservation {
        if !own_reserved && perimeter::reserved_by_other(territory, dimension, pos, Some(party.id)) {
            return Err(ClaimError::ReservedByOtherParty);
        }
        // Growing from an own reservation can still push the ring into a neighbour's.
        if perimeter::perimeter_would_overlap(territory, dimension, pos, party.id) {
            return Err(ClaimError::PerimeterOverlap);
        }
    }

    if config.enable_adjacent_chunk_restriction
        && territory.claim_count(party.id) > 0
        && !own_reserved
        && !adjacent_to(territory, dimension, pos, party.id)
    {
        return Err(ClaimError::NotAdjacent);
    }

    let quota = effective_quota(party, config, state.host());
    if i64::from(territory.claim_count(party.id)) >= i64::from(quota) {
        return Err(ClaimError::QuotaExhausted);
    }

    Ok(())
}

fn insert_claim(
    state: &SharedState,
    territory: &mut Territory,
    dimension: &str,
    pos: ChunkPos,
    party_id: Uuid,
    actor: Actor<'_>,
    outbox: &mut Vec<PersistTask>,
) -> ClaimedChunk {
    let chunk = ClaimedChunk::new(pos, party_id, actor.id, actor.name);
    territory.insert_claim(dimension, chunk.clone());

    if let Some(reserved) = territory.unreserve(dimension, pos) {
        if reserved.reserved_by != party_id {
            debug!(
                dimension,
                chunk = %pos,
                holder = %reserved.reserved_by,
                "claim consumed another party's reservation"
            );
        }
        outbox.push(PersistTask::DeleteReserved(ChunkKey::new(dimension, pos)));
    }
    outbox.push(PersistTask::SaveClaim(ClaimedChunkEntity::from_chunk(
        dimension, &chunk,
    )));
    perimeter::reconcile(territory, state.config(), dimension, party_id, outbox);

    info!(
        dimension,
        chunk = %pos,
        party = %party_id,
        actor = %actor.id,
        "chunk claimed"
    );
    chunk
}

/// Release the claim at `pos`, returning it. No-op when unclaimed.
pub async fn unclaim(state: &SharedState, dimension: &str, pos: ChunkPos) -> Option<ClaimedChunk> {
    let mut outbox = Vec::new();
    let removed = {
        let mut territory = state.territory().lock().await;
        let removed = territory.remove_claim(dimension, pos)?;
        outbox.push(PersistTask::DeleteClaim(ChunkKey::new(dimension, pos)));
        perimeter::reconcile(
            &mut territory,
            state.config(),
            dimension,
            removed.party_id,
            &mut outbox,
        );
        removed
    };

    state.persistence().enqueue_all(outbox);
    state.map_updates().queue(dimension, pos);
    info!(dimension, chunk = %pos, party = %removed.party_id, "chunk unclaimed");
    Some(removed)
}

/// [`unclaim`] addressed by block coordinates.
pub async fn unclaim_at_block(
    state: &SharedState,
    dimension: &str,
    block_x: i32,
    block_z: i32,
) -> Option<ClaimedChunk> {
    unclaim(state, dimension, ChunkPos::from_block(block_x, block_z)).await
}

/// Claim currently covering `pos`.
pub async fn chunk_owner(state: &SharedState, dimension: &str, pos: ChunkPos) -> Option<ClaimedChunk> {
    let territory = state.territory().lock().await;
    territory.claim(dimension, pos).cloned()
}

/// [`chunk_owner`] addressed by block coordinates.
pub async fn chunk_owner_at_block(
    state: &SharedState,
    dimension: &str,
    block_x: i32,
    block_z: i32,
) -> Option<ClaimedChunk> {
    chunk_owner(state, dimension, ChunkPos::from_block(block_x, block_z)).await
}

/// Number of chunks the party holds across all dimensions.
pub async fn claim_count(state: &SharedState, party_id: Uuid) -> u32 {
    state.territory().lock().await.claim_count(party_id)
}

/// Whether the party may claim one more chunk. `false` for unknown parties.
pub async fn has_enough_claims_left(state: &SharedState, party_id: Uuid) -> bool {
    let Some(party) = state.party(party_id) else {
        return false;
    };
    let quota = effective_quota(&party, state.config(), state.host());
    let count = claim_count(state, party_id).await;
    i64::from(count) < i64::from(quota)
}

/// Whether one of the four orthogonal neighbours of `pos` belongs to the party.
pub async fn is_adjacent_to_party_claims(
    state: &SharedState,
    dimension: &str,
    pos: ChunkPos,
    party_id: Uuid,
) -> bool {
    let territory = state.territory().lock().await;
    adjacent_to(&territory, dimension, pos, party_id)
}

fn adjacent_to(territory: &Territory, dimension: &str, pos: ChunkPos, party_id: Uuid) -> bool {
    pos.orthogonal()
        .any(|neighbour| territory.is_claimed_by(dimension, neighbour, party_id))
}
