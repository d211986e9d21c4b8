//! Reserved one-chunk ring around each party's territory.
//!
//! The ring of a party in a dimension is every 8-neighbour of its claims that
//! is claimed by nobody. It is recomputed in full after every claim, unclaim
//! or disband touching that party and dimension.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    config::ClaimsConfig,
    dao::models::{ChunkKey, ReservedChunkEntity},
    services::persistence::PersistTask,
    state::{
        SharedState,
        chunk::{ChunkPos, ReservedChunk},
        territory::Territory,
    },
};

/// Target ring for `party_id` in `dimension`.
pub fn compute_perimeter(territory: &Territory, dimension: &str, party_id: Uuid) -> HashSet<ChunkPos> {
    let claimed = territory.party_claims(dimension, party_id);
    claimed
        .iter()
        .flat_map(|pos| pos.ring())
        .filter(|neighbour| !claimed.contains(neighbour))
        .filter(|neighbour| territory.claim(dimension, *neighbour).is_none())
        .collect()
}

/// Bring the party's reservations in `dimension` in line with its claims,
/// pushing the matching writes to `outbox`.
pub(crate) fn reconcile(
    territory: &mut Territory,
    config: &ClaimsConfig,
    dimension: &str,
    party_id: Uuid,
    outbox: &mut Vec<PersistTask>,
) {
    if !config.enable_perimeter_reservation {
        return;
    }

    let current = territory.party_reservations(dimension, party_id);
    let target = compute_perimeter(territory, dimension, party_id);

    for pos in current.difference(&target) {
        territory.unreserve(dimension, *pos);
        outbox.push(PersistTask::DeleteReserved(ChunkKey::new(dimension, *pos)));
    }

    for pos in target.difference(&current) {
        // Anything held by another party here is taken over.
        territory.reserve(dimension, *pos, party_id);
        let reserved = ReservedChunk {
            pos: *pos,
            reserved_by: party_id,
        };
        outbox.push(PersistTask::SaveReserved(ReservedChunkEntity::from_reserved(
            dimension, &reserved,
        )));
    }
}

/// Whether `pos` is reserved by anyone but `party_id`.
pub fn reserved_by_other(
    territory: &Territory,
    dimension: &str,
    pos: ChunkPos,
    party_id: Option<Uuid>,
) -> bool {
    territory
        .reservation(dimension, pos)
        .is_some_and(|reserved| Some(reserved.reserved_by) != party_id)
}

/// Whether `pos` is reserved by `party_id` itself.
pub fn reserved_by_own(territory: &Territory, dimension: &str, pos: ChunkPos, party_id: Uuid) -> bool {
    territory
        .reservation(dimension, pos)
        .is_some_and(|reserved| reserved.reserved_by == party_id)
}

/// Whether claiming `pos` would put a reservation of another party inside
/// the claimant's new ring.
pub fn perimeter_would_overlap(
    territory: &Territory,
    dimension: &str,
    pos: ChunkPos,
    party_id: Uuid,
) -> bool {
    pos.ring()
        .filter(|neighbour| !territory.is_claimed_by(dimension, *neighbour, party_id))
        .any(|neighbour| reserved_by_other(territory, dimension, neighbour, Some(party_id)))
}

/// Whether `pos` is held in another party's perimeter. `party_id` is the
/// requester's party, `None` for players without one.
pub async fn is_reserved_by_other_party(
    state: &SharedState,
    dimension: &str,
    pos: ChunkPos,
    party_id: Option<Uuid>,
) -> bool {
    if !state.config().enable_perimeter_reservation {
        return false;
    }
    let territory = state.territory().lock().await;
    reserved_by_other(&territory, dimension, pos, party_id)
}

/// Whether `pos` is in the requester's own perimeter.
pub async fn is_reserved_by_own_party(
    state: &SharedState,
    dimension: &str,
    pos: ChunkPos,
    party_id: Uuid,
) -> bool {
    if !state.config().enable_perimeter_reservation {
        return false;
    }
    let territory = state.territory().lock().await;
    reserved_by_own(&territory, dimension, pos, party_id)
}

/// Whether claiming `pos` for `party_id` would encroach on another
/// party's perimeter.
pub async fn would_perimeter_overlap_other_reserved(
    state: &SharedState,
    dimension: &str,
    pos: ChunkPos,
    party_id: Uuid,
) -> bool {
    if !state.config().enable_perimeter_reservation {
        return false;
    }
    let territory = state.territory().lock().await;
    perimeter_would_overlap(&territory, dimension, pos, party_id)
}

/// Reservation holder at `pos`, if any.
pub async fn reservation_holder(state: &SharedState, dimension: &str, pos: ChunkPos) -> Option<Uuid> {
    let territory = state.territory().lock().await;
    territory
        .reservation(dimension, pos)
        .map(|reserved| reserved.reserved_by)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::chunk::ClaimedChunk;

    const DIM: &str = "d";

    fn claim(territory: &mut Territory, party: Uuid, x: i32, z: i32, outbox: &mut Vec<PersistTask>) {
        territory.insert_claim(DIM, ClaimedChunk::new(ChunkPos::new(x, z), party, party, "Ada"));
        reconcile(territory, &ClaimsConfig::default(), DIM, party, outbox);
    }

    #[test]
    fn single_claim_reserves_its_ring() {
        let mut territory = Territory::default();
        let party = Uuid::new_v4();
        let mut outbox = Vec::new();
        claim(&mut territory, party, 0, 0, &mut outbox);

        let expected: HashSet<ChunkPos> = ChunkPos::new(0, 0).ring().collect();
        assert_eq!(territory.party_reservations(DIM, party), expected);
        assert_eq!(outbox.len(), 8);
    }

    #[test]
    fn growing_territory_moves_the_ring() {
        let mut territory = Territory::default();
        let party = Uuid::new_v4();
        let mut outbox = Vec::new();
        claim(&mut territory, party, 0, 0, &mut outbox);
        outbox.clear();
        claim(&mut territory, party, 1, 1, &mut outbox);

        let ring = territory.party_reservations(DIM, party);
        assert_eq!(ring.len(), 12);
        assert!(ring.contains(&ChunkPos::new(2, 2)));
        assert!(ring.contains(&ChunkPos::new(-1, -1)));
        assert!(!ring.contains(&ChunkPos::new(0, 0)));
        assert!(!ring.contains(&ChunkPos::new(1, 1)));
    }

    #[test]
    fn losing_every_claim_clears_the_ring() {
        let mut territory = Territory::default();
        let party = Uuid::new_v4();
        let mut outbox = Vec::new();
        claim(&mut territory, party, 5, 5, &mut outbox);
        territory.remove_claim(DIM, ChunkPos::new(5, 5));
        outbox.clear();
        reconcile(&mut territory, &ClaimsConfig::default(), DIM, party, &mut outbox);

        assert!(territory.party_reservations(DIM, party).is_empty());
        assert_eq!(outbox.len(), 8);
        assert!(outbox.iter().all(|task| matches!(task, PersistTask::DeleteReserved(_))));
    }

    #[test]
    fn chunks_claimed_by_others_stay_out_of_the_ring() {
        let mut territory = Territory::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        territory.insert_claim(DIM, ClaimedChunk::new(ChunkPos::new(1, 0), b, b, "Bo"));
        let mut outbox = Vec::new();
        claim(&mut territory, a, 0, 0, &mut outbox);

        assert_eq!(territory.party_reservations(DIM, a).len(), 7);
        assert!(territory.reservation(DIM, ChunkPos::new(1, 0)).is_none());
    }

    #[test]
    fn disabled_engine_does_nothing() {
        let mut territory = Territory::default();
        let party = Uuid::new_v4();
        territory.insert_claim(DIM, ClaimedChunk::new(ChunkPos::new(0, 0), party, party, "Ada"));
        let config = ClaimsConfig {
            enable_perimeter_reservation: false,
            ..ClaimsConfig::default()
        };
        let mut outbox = Vec::new();
        reconcile(&mut territory, &config, DIM, party, &mut outbox);
        assert!(outbox.is_empty());
        assert_eq!(territory.reservations().count(), 0);
    }

    #[test]
    fn overlap_ignores_own_claims_and_own_ring() {
        let mut territory = Territory::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut outbox = Vec::new();
        claim(&mut territory, a, 0, 0, &mut outbox);

        // (2, 2) sits next to A's reserved (1, 1)
        assert!(perimeter_would_overlap(&territory, DIM, ChunkPos::new(2, 2), b));
        assert!(!perimeter_would_overlap(&territory, DIM, ChunkPos::new(2, 2), a));
        assert!(!perimeter_would_overlap(&territory, DIM, ChunkPos::new(3, 3), b));

        assert!(reserved_by_other(&territory, DIM, ChunkPos::new(1, 1), Some(b)));
        assert!(reserved_by_other(&territory, DIM, ChunkPos::new(1, 1), None));
        assert!(reserved_by_own(&territory, DIM, ChunkPos::new(1, 1), a));
    }
}
