use std::{fmt, time::SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::party::AuditStamp;

/// Number of blocks along one side of a chunk.
pub const CHUNK_SIZE: i32 = 32;

/// Offsets of the 8 chunks surrounding a center chunk (Chebyshev distance 1).
pub const RING_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Offsets of the 4 chunks sharing a side with a center chunk.
pub const ORTHOGONAL_OFFSETS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// Integer chunk coordinate inside a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    /// Chunk column along the X axis.
    pub x: i32,
    /// Chunk row along the Z axis.
    pub z: i32,
}

impl ChunkPos {
    /// Build a position from chunk coordinates.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Convert block coordinates into the chunk containing them.
    pub const fn from_block(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x.div_euclid(CHUNK_SIZE),
            z: block_z.div_euclid(CHUNK_SIZE),
        }
    }

    /// Position shifted by the given chunk offset.
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    /// The 8 surrounding positions.
    pub fn ring(self) -> impl Iterator<Item = ChunkPos> {
        RING_OFFSETS
            .into_iter()
            .map(move |(dx, dz)| self.offset(dx, dz))
    }

    /// The 4 side-sharing positions.
    pub fn orthogonal(self) -> impl Iterator<Item = ChunkPos> {
        ORTHOGONAL_OFFSETS
            .into_iter()
            .map(move |(dx, dz)| self.offset(dx, dz))
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.z)
    }
}

/// A chunk owned by a party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedChunk {
    /// Location of the chunk.
    pub pos: ChunkPos,
    /// Party owning the chunk.
    pub party_id: Uuid,
    /// Who claimed the chunk and when.
    pub created: AuditStamp,
}

impl ClaimedChunk {
    /// Record a fresh claim made by `actor`.
    pub fn new(pos: ChunkPos, party_id: Uuid, actor: Uuid, actor_name: &str) -> Self {
        Self {
            pos,
            party_id,
            created: AuditStamp {
                actor,
                actor_name: actor_name.to_owned(),
                at: SystemTime::now(),
            },
        }
    }
}

/// A perimeter chunk held against claims by other parties.
///
/// Two reservations at the same position are the same reservation; the
/// holder is mutable metadata.
#[derive(Debug, Clone, Copy)]
pub struct ReservedChunk {
    /// Location of the chunk.
    pub pos: ChunkPos,
    /// Party currently holding the reservation.
    pub reserved_by: Uuid,
}

impl PartialEq for ReservedChunk {
    fn eq(&self, other: &Self) -> bool {
        self.pos == other.pos
    }
}

impl Eq for ReservedChunk {}

impl std::hash::Hash for ReservedChunk {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.pos.hash(state);
    }
}
