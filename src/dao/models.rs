use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::state::{
    PlayerName,
    chunk::{ChunkPos, ClaimedChunk, ReservedChunk},
    party::{AuditStamp, Overrides, Party, PartyColor, PartyPermission},
};

/// Representation of a party stored in persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartyEntity {
    /// Stable identifier for the party.
    pub id: Uuid,
    /// Owning player.
    pub owner: Uuid,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Members, owner excluded.
    pub members: Vec<Uuid>,
    /// Territory color.
    pub color: PartyColor,
    /// Sparse override set.
    #[serde(default)]
    pub overrides: Overrides,
    /// Explicit permission grants per player or party.
    #[serde(default)]
    pub permission_grants: Vec<PermissionGrantEntity>,
    /// Allied players.
    #[serde(default)]
    pub player_allies: Vec<Uuid>,
    /// Allied parties.
    #[serde(default)]
    pub party_allies: Vec<Uuid>,
    /// Creation audit stamp.
    pub created: AuditStamp,
    /// Last modification audit stamp.
    pub modified: AuditStamp,
}

/// Grants given to one player or party.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionGrantEntity {
    /// Player or party the grants apply to.
    pub subject: Uuid,
    /// Permission name to allowed flag.
    pub grants: BTreeMap<PartyPermission, bool>,
}

/// A claimed chunk as stored in persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimedChunkEntity {
    /// Dimension the chunk belongs to.
    pub dimension: String,
    /// Chunk X coordinate.
    pub chunk_x: i32,
    /// Chunk Z coordinate.
    pub chunk_z: i32,
    /// Owning party.
    pub party_id: Uuid,
    /// Who claimed it.
    pub created: AuditStamp,
}

/// A reserved perimeter chunk as stored in persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservedChunkEntity {
    /// Dimension the chunk belongs to.
    pub dimension: String,
    /// Chunk X coordinate.
    pub chunk_x: i32,
    /// Chunk Z coordinate.
    pub chunk_z: i32,
    /// Party holding the reservation.
    pub reserved_by: Uuid,
}

/// Last known name and activity of a player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NameCacheEntity {
    /// Player identifier.
    pub player: Uuid,
    /// Last seen display name.
    pub name: String,
    /// Epoch milliseconds of the last sighting, `0` when unknown.
    pub last_seen_ms: i64,
    /// Accumulated play time in hours.
    pub play_time: f32,
}

/// Coordinates of a stored chunk row, used for deletes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    /// Dimension the chunk belongs to.
    pub dimension: String,
    /// Chunk position.
    pub pos: ChunkPos,
}

impl ChunkKey {
    pub fn new(dimension: &str, pos: ChunkPos) -> Self {
        Self {
            dimension: dimension.to_owned(),
            pos,
        }
    }
}

impl From<Party> for PartyEntity {
    fn from(value: Party) -> Self {
        Self {
            id: value.id,
            owner: value.owner,
            name: value.name,
            description: value.description,
            members: value.members.into_iter().collect(),
            color: value.color,
            overrides: value.overrides,
            permission_grants: value
                .permission_grants
                .into_iter()
                .map(|(subject, grants)| PermissionGrantEntity { subject, grants })
                .collect(),
            player_allies: value.player_allies.into_iter().collect(),
            party_allies: value.party_allies.into_iter().collect(),
            created: value.created,
            modified: value.modified,
        }
    }
}

impl From<PartyEntity> for Party {
    fn from(value: PartyEntity) -> Self {
        let owner = value.owner;
        Self {
            id: value.id,
            owner,
            name: value.name,
            description: value.description,
            color: value.color,
            overrides: value.overrides,
            created: value.created,
            modified: value.modified,
            members: value
                .members
                .into_iter()
                .filter(|member| *member != owner)
                .collect(),
            player_allies: value.player_allies.into_iter().collect(),
            party_allies: value.party_allies.into_iter().collect(),
            permission_grants: value
                .permission_grants
                .into_iter()
                .filter(|entry| !entry.grants.is_empty())
                .map(|entry| (entry.subject, entry.grants))
                .collect(),
        }
    }
}

impl ClaimedChunkEntity {
    /// Persisted form of `chunk` in `dimension`.
    pub fn from_chunk(dimension: &str, chunk: &ClaimedChunk) -> Self {
        Self {
            dimension: dimension.to_owned(),
            chunk_x: chunk.pos.x,
            chunk_z: chunk.pos.z,
            party_id: chunk.party_id,
            created: chunk.created.clone(),
        }
    }

    pub fn pos(&self) -> ChunkPos {
        ChunkPos::new(self.chunk_x, self.chunk_z)
    }
}

impl From<ClaimedChunkEntity> for ClaimedChunk {
    fn from(value: ClaimedChunkEntity) -> Self {
        Self {
            pos: value.pos(),
            party_id: value.party_id,
            created: value.created,
        }
    }
}

impl ReservedChunkEntity {
    /// Persisted form of `reserved` in `dimension`.
    pub fn from_reserved(dimension: &str, reserved: &ReservedChunk) -> Self {
        Self {
            dimension: dimension.to_owned(),
            chunk_x: reserved.pos.x,
            chunk_z: reserved.pos.z,
            reserved_by: reserved.reserved_by,
        }
    }

    pub fn pos(&self) -> ChunkPos {
        ChunkPos::new(self.chunk_x, self.chunk_z)
    }
}

impl From<ReservedChunkEntity> for ReservedChunk {
    fn from(value: ReservedChunkEntity) -> Self {
        Self {
            pos: value.pos(),
            reserved_by: value.reserved_by,
        }
    }
}

impl NameCacheEntity {
    pub fn new(player: Uuid, name: &PlayerName) -> Self {
        Self {
            player,
            name: name.name.clone(),
            last_seen_ms: name.last_seen_ms,
            play_time: name.play_time,
        }
    }
}

impl From<NameCacheEntity> for PlayerName {
    fn from(value: NameCacheEntity) -> Self {
        Self {
            name: value.name,
            last_seen_ms: value.last_seen_ms,
            play_time: value.play_time,
        }
    }
}
