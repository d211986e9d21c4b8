//! Admin protection bypass and "act on behalf of a party" selection.

use tracing::info;
use uuid::Uuid;

use crate::{
    error::ClaimError,
    services::{claim_service, persistence::PersistTask},
    state::{
        SharedState,
        chunk::{ChunkPos, ClaimedChunk},
        party::Actor,
    },
};

/// Let `player` bypass every interaction check. Returns `false` if already set.
pub fn add_admin_override(state: &SharedState, player: Uuid) -> bool {
    if !state.admin_overrides().insert(player) {
        return false;
    }
    state
        .persistence()
        .enqueue(PersistTask::SaveAdminOverride(player));
    info!(player = %player, "admin override enabled");
    true
}

/// Remove the bypass. Returns `false` if it was not set.
pub fn remove_admin_override(state: &SharedState, player: Uuid) -> bool {
    if state.admin_overrides().remove(&player).is_none() {
        return false;
    }
    state
        .persistence()
        .enqueue(PersistTask::DeleteAdminOverride(player));
    info!(player = %player, "admin override disabled");
    true
}

pub fn has_admin_override(state: &SharedState, player: Uuid) -> bool {
    state.admin_overrides().contains(&player)
}

/// Make `admin` act for `party_id` in later admin commands.
///
/// Returns `false` when the party does not exist.
pub fn select_party(state: &SharedState, admin: Uuid, party_id: Uuid) -> bool {
    if !state.parties().contains_key(&party_id) {
        return false;
    }
    state.admin_party_selection().insert(admin, party_id);
    true
}

pub fn clear_selection(state: &SharedState, admin: Uuid) {
    state.admin_party_selection().remove(&admin);
}

/// Party `admin` currently acts for.
pub fn selected_party(state: &SharedState, admin: Uuid) -> Option<Uuid> {
    state.admin_party_selection().get(&admin).map(|entry| *entry)
}

/// Claim `pos` for the admin's selected party with the usual placement rules.
pub async fn claim_for_selected_party(
    state: &SharedState,
    admin: Actor<'_>,
    dimension: &str,
    pos: ChunkPos,
) -> Result<ClaimedChunk, ClaimError> {
    let Some(party_id) = selected_party(state, admin.id) else {
        return Err(ClaimError::PartyNotFound);
    };
    claim_service::try_claim(state, dimension, pos, party_id, admin).await
}
