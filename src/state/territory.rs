use std::collections::{HashMap, HashSet, hash_map::Entry};

use uuid::Uuid;

use crate::state::chunk::{ChunkPos, ClaimedChunk, ReservedChunk};

/// Claimed and reserved chunks of every dimension, with the per-party claim
/// count cache.
///
/// Lives behind a single lock so a claim, its count update and the perimeter
/// reconciliation that follows are observed atomically.
#[derive(Debug, Default)]
pub struct Territory {
    claims: HashMap<String, HashMap<ChunkPos, ClaimedChunk>>,
    reserved: HashMap<String, HashMap<ChunkPos, ReservedChunk>>,
    claim_counts: HashMap<Uuid, u32>,
}

impl Territory {
    pub fn claim(&self, dimension: &str, pos: ChunkPos) -> Option<&ClaimedChunk> {
        self.claims.get(dimension)?.get(&pos)
    }

    pub fn reservation(&self, dimension: &str, pos: ChunkPos) -> Option<&ReservedChunk> {
        self.reserved.get(dimension)?.get(&pos)
    }

    /// Whether `pos` is claimed by `party_id` in `dimension`.
    pub fn is_claimed_by(&self, dimension: &str, pos: ChunkPos, party_id: Uuid) -> bool {
        self.claim(dimension, pos)
            .is_some_and(|chunk| chunk.party_id == party_id)
    }

    /// Cached number of claims held by the party across all dimensions.
    pub fn claim_count(&self, party_id: Uuid) -> u32 {
        self.claim_counts.get(&party_id).copied().unwrap_or(0)
    }

    /// The count cache, for consistency checks.
    pub fn claim_counts(&self) -> &HashMap<Uuid, u32> {
        &self.claim_counts
    }

    /// Every claim, with its dimension.
    pub fn claims(&self) -> impl Iterator<Item = (&str, &ClaimedChunk)> {
        self.claims.iter().flat_map(|(dimension, chunks)| {
            chunks
                .values()
                .map(move |chunk| (dimension.as_str(), chunk))
        })
    }

    /// Every reservation, with its dimension.
    pub fn reservations(&self) -> impl Iterator<Item = (&str, &ReservedChunk)> {
        self.reserved.iter().flat_map(|(dimension, chunks)| {
            chunks
                .values()
                .map(move |reserved| (dimension.as_str(), reserved))
        })
    }

    /// Positions claimed by the party in one dimension.
    pub fn party_claims(&self, dimension: &str, party_id: Uuid) -> HashSet<ChunkPos> {
        self.claims
            .get(dimension)
            .map(|chunks| {
                chunks
                    .values()
                    .filter(|chunk| chunk.party_id == party_id)
                    .map(|chunk| chunk.pos)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Positions reserved by the party in one dimension.
    pub fn party_reservations(&self, dimension: &str, party_id: Uuid) -> HashSet<ChunkPos> {
        self.reserved
            .get(dimension)
            .map(|chunks| {
                chunks
                    .values()
                    .filter(|reserved| reserved.reserved_by == party_id)
                    .map(|reserved| reserved.pos)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Insert a claim, replacing any previous owner of the position.
    pub(crate) fn insert_claim(&mut self, dimension: &str, chunk: ClaimedChunk) {
        let party_id = chunk.party_id;
        let previous = self
            .claims
            .entry(dimension.to_owned())
            .or_default()
            .insert(chunk.pos, chunk);
        if let Some(previous) = previous {
            self.decrement(previous.party_id);
        }
        *self.claim_counts.entry(party_id).or_insert(0) += 1;
    }

    pub(crate) fn remove_claim(&mut self, dimension: &str, pos: ChunkPos) -> Option<ClaimedChunk> {
        let removed = self.claims.get_mut(dimension)?.remove(&pos)?;
        self.decrement(removed.party_id);
        Some(removed)
    }

    /// Remove every claim of the party, returning what was removed.
    pub(crate) fn remove_party_claims(&mut self, party_id: Uuid) -> Vec<(String, ClaimedChunk)> {
        let mut removed = Vec::new();
        for (dimension, chunks) in &mut self.claims {
            chunks.retain(|_, chunk| {
                if chunk.party_id == party_id {
                    removed.push((dimension.clone(), chunk.clone()));
                    false
                } else {
                    true
                }
            });
        }
        self.claim_counts.remove(&party_id);
        removed
    }

    /// Reserve `pos` for `party_id`, returning the previous holder if any.
    pub(crate) fn reserve(
        &mut self,
        dimension: &str,
        pos: ChunkPos,
        party_id: Uuid,
    ) -> Option<Uuid> {
        let chunks = self.reserved.entry(dimension.to_owned()).or_default();
        match chunks.entry(pos) {
            Entry::Occupied(mut entry) => {
                let previous = entry.get().reserved_by;
                entry.get_mut().reserved_by = party_id;
                Some(previous)
            }
            Entry::Vacant(entry) => {
                entry.insert(ReservedChunk {
                    pos,
                    reserved_by: party_id,
                });
                None
            }
        }
    }

    pub(crate) fn unreserve(&mut self, dimension: &str, pos: ChunkPos) -> Option<ReservedChunk> {
        self.reserved.get_mut(dimension)?.remove(&pos)
    }

    /// Remove every reservation of the party, returning what was removed.
    pub(crate) fn remove_party_reservations(
        &mut self,
        party_id: Uuid,
    ) -> Vec<(String, ReservedChunk)> {
        let mut removed = Vec::new();
        for (dimension, chunks) in &mut self.reserved {
            chunks.retain(|_, reserved| {
                if reserved.reserved_by == party_id {
                    removed.push((dimension.clone(), *reserved));
                    false
                } else {
                    true
                }
            });
        }
        removed
    }

    // A count that would reach zero is dropped instead.
    fn decrement(&mut self, party_id: Uuid) {
        if let Entry::Occupied(mut entry) = self.claim_counts.entry(party_id) {
            if *entry.get() > 1 {
                *entry.get_mut() -= 1;
            } else {
                entry.remove();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(x: i32, z: i32, party: Uuid) -> ClaimedChunk {
        ClaimedChunk::new(ChunkPos::new(x, z), party, Uuid::new_v4(), "Ada")
    }

    #[test]
    fn count_cache_follows_inserts_and_removals() {
        let mut territory = Territory::default();
        let party = Uuid::new_v4();
        territory.insert_claim("d", chunk(0, 0, party));
        territory.insert_claim("d", chunk(0, 1, party));
        territory.insert_claim("e", chunk(0, 0, party));
        assert_eq!(territory.claim_count(party), 3);

        territory.remove_claim("d", ChunkPos::new(0, 0));
        territory.remove_claim("d", ChunkPos::new(0, 1));
        assert_eq!(territory.claim_count(party), 1);

        territory.remove_claim("e", ChunkPos::new(0, 0));
        assert!(!territory.claim_counts().contains_key(&party));
        assert!(territory.remove_claim("e", ChunkPos::new(0, 0)).is_none());
    }

    #[test]
    fn replacing_a_claim_moves_the_count() {
        let mut territory = Territory::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        territory.insert_claim("d", chunk(4, 4, a));
        territory.insert_claim("d", chunk(4, 4, b));
        assert_eq!(territory.claim_count(a), 0);
        assert_eq!(territory.claim_count(b), 1);
    }

    #[test]
    fn reserve_reports_previous_holder() {
        let mut territory = Territory::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let pos = ChunkPos::new(1, 1);
        assert_eq!(territory.reserve("d", pos, a), None);
        assert_eq!(territory.reserve("d", pos, b), Some(a));
        assert_eq!(territory.reservation("d", pos).unwrap().reserved_by, b);
    }

    #[test]
    fn party_removal_spans_dimensions() {
        let mut territory = Territory::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        territory.insert_claim("d", chunk(0, 0, a));
        territory.insert_claim("e", chunk(0, 0, a));
        territory.insert_claim("e", chunk(9, 9, b));
        territory.reserve("d", ChunkPos::new(1, 0), a);
        territory.reserve("e", ChunkPos::new(8, 8), b);

        assert_eq!(territory.remove_party_claims(a).len(), 2);
        assert_eq!(territory.remove_party_reservations(a).len(), 1);
        assert_eq!(territory.claims().count(), 1);
        assert_eq!(territory.reservations().count(), 1);
        assert_eq!(territory.claim_count(a), 0);
        assert_eq!(territory.claim_count(b), 1);
    }
}
