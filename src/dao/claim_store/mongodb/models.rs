use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::{
    dao::models::{
        ChunkKey, ClaimedChunkEntity, NameCacheEntity, PartyEntity, PermissionGrantEntity,
        ReservedChunkEntity,
    },
    state::party::{AuditStamp, Overrides, PartyColor, PartyPermission, ProtectionFlag},
};

pub const PARTY_COLLECTION: &str = "parties";
pub const CLAIM_COLLECTION: &str = "claimed_chunks";
pub const RESERVED_COLLECTION: &str = "reserved_chunks";
pub const NAME_COLLECTION: &str = "name_cache";
pub const ADMIN_COLLECTION: &str = "admin_overrides";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAuditDocument {
    actor: String,
    actor_name: String,
    at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoFlagDocument {
    flag: ProtectionFlag,
    value: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGrantDocument {
    subject: String,
    grants: Vec<(PartyPermission, bool)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPartyDocument {
    #[serde(rename = "_id")]
    id: String,
    owner: String,
    name: String,
    description: String,
    members: Vec<String>,
    color: PartyColor,
    claim_quota_base: Option<i32>,
    claim_quota_bonus: Option<i32>,
    legacy_claim_quota: Option<i32>,
    #[serde(default)]
    protection: Vec<MongoFlagDocument>,
    #[serde(default)]
    permission_grants: Vec<MongoGrantDocument>,
    #[serde(default)]
    player_allies: Vec<String>,
    #[serde(default)]
    party_allies: Vec<String>,
    created: MongoAuditDocument,
    modified: MongoAuditDocument,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoClaimDocument {
    dimension: String,
    chunk_x: i32,
    chunk_z: i32,
    party_id: String,
    created: MongoAuditDocument,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoReservedDocument {
    dimension: String,
    chunk_x: i32,
    chunk_z: i32,
    reserved_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoNameDocument {
    #[serde(rename = "_id")]
    player: String,
    name: String,
    last_seen_ms: i64,
    play_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAdminDocument {
    #[serde(rename = "_id")]
    pub player: String,
}

fn parse_uuid(collection: &'static str, raw: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(raw).map_err(|err| MongoDaoError::Malformed {
        collection,
        reason: format!("invalid uuid `{raw}`: {err}"),
    })
}

fn parse_uuids(collection: &'static str, raw: &[String]) -> MongoResult<Vec<Uuid>> {
    raw.iter().map(|id| parse_uuid(collection, id)).collect()
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

pub fn chunk_filter(key: &ChunkKey) -> Document {
    doc! {
        "dimension": key.dimension.as_str(),
        "chunk_x": key.pos.x,
        "chunk_z": key.pos.z,
    }
}

impl From<AuditStamp> for MongoAuditDocument {
    fn from(value: AuditStamp) -> Self {
        Self {
            actor: value.actor.to_string(),
            actor_name: value.actor_name,
            at: DateTime::from_system_time(value.at),
        }
    }
}

impl MongoAuditDocument {
    fn into_stamp(self, collection: &'static str) -> MongoResult<AuditStamp> {
        Ok(AuditStamp {
            actor: parse_uuid(collection, &self.actor)?,
            actor_name: self.actor_name,
            at: self.at.to_system_time(),
        })
    }
}

impl From<PartyEntity> for MongoPartyDocument {
    fn from(value: PartyEntity) -> Self {
        let to_strings = |ids: Vec<Uuid>| ids.iter().map(Uuid::to_string).collect::<Vec<_>>();
        Self {
            id: value.id.to_string(),
            owner: value.owner.to_string(),
            name: value.name,
            description: value.description,
            members: to_strings(value.members),
            color: value.color,
            claim_quota_base: value.overrides.claim_quota_base,
            claim_quota_bonus: value.overrides.claim_quota_bonus,
            legacy_claim_quota: value.overrides.legacy_claim_quota,
            protection: value
                .overrides
                .protection
                .into_iter()
                .map(|(flag, value)| MongoFlagDocument { flag, value })
                .collect(),
            permission_grants: value
                .permission_grants
                .into_iter()
                .map(|entry| MongoGrantDocument {
                    subject: entry.subject.to_string(),
                    grants: entry.grants.into_iter().collect(),
                })
                .collect(),
            player_allies: to_strings(value.player_allies),
            party_allies: to_strings(value.party_allies),
            created: value.created.into(),
            modified: value.modified.into(),
        }
    }
}

impl TryFrom<MongoPartyDocument> for PartyEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPartyDocument) -> MongoResult<Self> {
        const C: &str = PARTY_COLLECTION;
        let permission_grants = value
            .permission_grants
            .into_iter()
            .map(|entry| {
                Ok(PermissionGrantEntity {
                    subject: parse_uuid(C, &entry.subject)?,
                    grants: entry.grants.into_iter().collect(),
                })
            })
            .collect::<MongoResult<Vec<_>>>()?;

        Ok(Self {
            id: parse_uuid(C, &value.id)?,
            owner: parse_uuid(C, &value.owner)?,
            name: value.name,
            description: value.description,
            members: parse_uuids(C, &value.members)?,
            color: value.color,
            overrides: Overrides {
                claim_quota_base: value.claim_quota_base,
                claim_quota_bonus: value.claim_quota_bonus,
                legacy_claim_quota: value.legacy_claim_quota,
                protection: value
                    .protection
                    .into_iter()
                    .map(|entry| (entry.flag, entry.value))
                    .collect(),
            },
            permission_grants,
            player_allies: parse_uuids(C, &value.player_allies)?,
            party_allies: parse_uuids(C, &value.party_allies)?,
            created: value.created.into_stamp(C)?,
            modified: value.modified.into_stamp(C)?,
        })
    }
}

impl From<ClaimedChunkEntity> for MongoClaimDocument {
    fn from(value: ClaimedChunkEntity) -> Self {
        Self {
            dimension: value.dimension,
            chunk_x: value.chunk_x,
            chunk_z: value.chunk_z,
            party_id: value.party_id.to_string(),
            created: value.created.into(),
        }
    }
}

impl TryFrom<MongoClaimDocument> for ClaimedChunkEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoClaimDocument) -> MongoResult<Self> {
        Ok(Self {
            party_id: parse_uuid(CLAIM_COLLECTION, &value.party_id)?,
            created: value.created.into_stamp(CLAIM_COLLECTION)?,
            dimension: value.dimension,
            chunk_x: value.chunk_x,
            chunk_z: value.chunk_z,
        })
    }
}

impl From<ReservedChunkEntity> for MongoReservedDocument {
    fn from(value: ReservedChunkEntity) -> Self {
        Self {
            dimension: value.dimension,
            chunk_x: value.chunk_x,
            chunk_z: value.chunk_z,
            reserved_by: value.reserved_by.to_string(),
        }
    }
}

impl TryFrom<MongoReservedDocument> for ReservedChunkEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoReservedDocument) -> MongoResult<Self> {
        Ok(Self {
            reserved_by: parse_uuid(RESERVED_COLLECTION, &value.reserved_by)?,
            dimension: value.dimension,
            chunk_x: value.chunk_x,
            chunk_z: value.chunk_z,
        })
    }
}

impl From<NameCacheEntity> for MongoNameDocument {
    fn from(value: NameCacheEntity) -> Self {
        Self {
            player: value.player.to_string(),
            name: value.name,
            last_seen_ms: value.last_seen_ms,
            play_time: f64::from(value.play_time),
        }
    }
}

impl TryFrom<MongoNameDocument> for NameCacheEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoNameDocument) -> MongoResult<Self> {
        Ok(Self {
            player: parse_uuid(NAME_COLLECTION, &value.player)?,
            name: value.name,
            last_seen_ms: value.last_seen_ms,
            play_time: value.play_time as f32,
        })
    }
}

impl MongoAdminDocument {
    pub fn into_player(self) -> MongoResult<Uuid> {
        parse_uuid(ADMIN_COLLECTION, &self.player)
    }
}
