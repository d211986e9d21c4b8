use thiserror::Error;

use crate::dao::{legacy::LegacyError, storage::StorageError};

/// Reasons a claim attempt is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// The chunk already belongs to a party.
    #[error("chunk is already claimed")]
    AlreadyClaimed,
    /// The claiming party no longer exists.
    #[error("party not found")]
    PartyNotFound,
    /// Claims are not allowed in this dimension.
    #[error("claiming is disabled in this dimension")]
    DimensionNotClaimable,
    /// The chunk is part of another party's perimeter.
    #[error("chunk is reserved by another party")]
    ReservedByOtherParty,
    /// The new perimeter would cut into another party's perimeter.
    #[error("claim would overlap another party's perimeter")]
    PerimeterOverlap,
    /// New claims must touch existing ones.
    #[error("chunk is not adjacent to the party's territory")]
    NotAdjacent,
    /// The party has used its whole quota.
    #[error("party has no claims left")]
    QuotaExhausted,
}

/// Fatal conditions that stop the registry from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// A set could not be loaded from the durable store.
    #[error("failed to load {what}")]
    Load {
        what: &'static str,
        #[source]
        source: StorageError,
    },
    /// The legacy dump exists but could not be read.
    #[error(transparent)]
    Legacy(#[from] LegacyError),
    /// The legacy dump could not be written to the durable store.
    #[error("failed to import legacy dump")]
    Import(#[source] StorageError),
}
