//! Party lifecycle: creation, membership, invites, alliances, grants,
//! overrides and metadata.
//!
//! Capacity limits are silent: the mutators report whether anything changed
//! and leave the party untouched otherwise.

use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::ChunkKey,
    services::{
        map_updates, perimeter,
        permissions::{bonus_chunks, max_bonus_limit},
        persistence::PersistTask,
    },
    state::{
        SharedState,
        party::{Actor, Party, PartyColor, PartyInvite, PartyPermission, ProtectionFlag},
    },
};

/// What happened when a player left a party.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The player was a member and has been removed.
    Left,
    /// The player owned the party, which no longer exists.
    Disbanded,
    /// The player did not belong to the party.
    NotMember,
}

/// Create a party owned by `owner` and index the owner to it.
pub fn create_party(state: &SharedState, owner: Uuid, owner_name: &str) -> Party {
    let party = build_party(state, owner, owner_name);
    state.player_to_party().insert(owner, party.id);
    info!(party = %party.id, owner = %owner, "party created");
    party
}

/// Create a party run by an admin on behalf of the server.
///
/// The admin is recorded as owner but stays free to belong to another party.
pub fn create_admin_party(state: &SharedState, admin: Uuid, admin_name: &str) -> Party {
    let party = build_party(state, admin, admin_name);
    info!(party = %party.id, admin = %admin, "admin party created");
    party
}

fn build_party(state: &SharedState, owner: Uuid, owner_name: &str) -> Party {
    let color = next_color(state);
    let party = Party::new(owner, owner_name, color, state.config());
    state.parties().insert(party.id, party.clone());
    state.persist_party(&party);
    party
}

/// First palette color no party uses yet, else a random hue.
fn next_color(state: &SharedState) -> PartyColor {
    let used: Vec<PartyColor> = state
        .parties()
        .iter()
        .map(|party| party.color)
        .collect();
    state
        .config()
        .first_unused_color(&used)
        .unwrap_or_else(|| PartyColor {
            h: rand::rng().random_range(-180.0..180.0),
            s: 1.0,
            v: 1.0,
        })
}

/// Apply `change` to the party and persist it when it reports a change.
fn mutate_party<F>(state: &SharedState, party_id: Uuid, change: F) -> bool
where
    F: FnOnce(&mut Party) -> bool,
{
    let Some(mut party) = state.parties().get_mut(&party_id) else {
        return false;
    };
    let changed = change(&mut party);
    if changed {
        state.persist_party(&party);
    }
    changed
}

/// Add `player` to the party unless it is full.
pub fn add_member(state: &SharedState, party_id: Uuid, player: Uuid) -> bool {
    let config = state.config();
    let added = mutate_party(state, party_id, |party| party.add_member(player, config));
    if added {
        state.player_to_party().insert(player, party_id);
        debug!(party = %party_id, player = %player, "member added");
    }
    added
}

/// Remove `player` from the party; removing the owner disbands it.
pub async fn remove_member(state: &SharedState, party_id: Uuid, player: Uuid) -> LeaveOutcome {
    leave_party(state, player, party_id).await
}

/// `player` leaves the party. An owner leaving disbands the whole party.
pub async fn leave_party(state: &SharedState, player: Uuid, party_id: Uuid) -> LeaveOutcome {
    let is_owner = match state.parties().get(&party_id) {
        Some(party) => party.is_owner(player),
        None => return LeaveOutcome::NotMember,
    };

    if is_owner {
        disband_party(state, party_id).await;
        return LeaveOutcome::Disbanded;
    }

    if !mutate_party(state, party_id, |party| party.remove_member(player)) {
        return LeaveOutcome::NotMember;
    }
    state
        .player_to_party()
        .remove_if(&player, |_, indexed| *indexed == party_id);
    info!(party = %party_id, player = %player, "member left party");
    LeaveOutcome::Left
}

/// Record an invite, replacing any earlier one for the same recipient.
pub fn invite(state: &SharedState, recipient: Uuid, sender: Uuid, party_id: Uuid) {
    state.invites().insert(
        recipient,
        PartyInvite {
            recipient,
            sender,
            party_id,
        },
    );
    debug!(party = %party_id, recipient = %recipient, sender = %sender, "invite sent");
}

/// Outstanding invite for `player`.
pub fn pending_invite(state: &SharedState, player: Uuid) -> Option<PartyInvite> {
    state.invites().get(&player).map(|invite| *invite)
}

/// Accept the outstanding invite of `player`.
///
/// Returns `None` without effect when there is no invite or the party is
/// gone. A full party consumes the invite and returns `None`.
pub fn accept_invite(state: &SharedState, player: Uuid) -> Option<PartyInvite> {
    let invite = pending_invite(state, player)?;
    if !state.parties().contains_key(&invite.party_id) {
        return None;
    }

    state.invites().remove(&player);
    add_member(state, invite.party_id, player).then_some(invite)
}

/// Remove a party with everything it owns, in every dimension.
///
/// Returns `false` when the party does not exist.
pub async fn disband_party(state: &SharedState, party_id: Uuid) -> bool {
    let Some(party) = state.party(party_id) else {
        return false;
    };
    map_updates::queue_party(state, party_id).await;

    let mut outbox = Vec::new();
    let (claims, reservations) = {
        let mut territory = state.territory().lock().await;
        state.parties().remove(&party_id);
        let claims = territory.remove_party_claims(party_id);
        let reservations = territory.remove_party_reservations(party_id);
        for (dimension, chunk) in &claims {
            outbox.push(PersistTask::DeleteClaim(ChunkKey::new(dimension, chunk.pos)));
        }
        (claims.len(), reservations.len())
    };
    outbox.push(PersistTask::DeleteReservedByParty(party_id));

    for player in party.everyone() {
        state
            .player_to_party()
            .remove_if(&player, |_, indexed| *indexed == party_id);
    }
    state.invites().retain(|_, invite| invite.party_id != party_id);
    outbox.push(PersistTask::DeleteParty(party_id));
    state.persistence().enqueue_all(outbox);

    info!(party = %party_id, claims, reservations, "party disbanded");
    true
}

/// Ally a player to the party, subject to the ally cap.
pub fn add_player_ally(state: &SharedState, party_id: Uuid, player: Uuid) -> bool {
    let config = state.config();
    mutate_party(state, party_id, |party| party.add_player_ally(player, config))
}

/// Ally another party, subject to the ally cap.
pub fn add_party_ally(state: &SharedState, party_id: Uuid, ally: Uuid) -> bool {
    let config = state.config();
    mutate_party(state, party_id, |party| party.add_party_ally(ally, config))
}

pub fn remove_player_ally(state: &SharedState, party_id: Uuid, player: Uuid) -> bool {
    mutate_party(state, party_id, |party| party.remove_player_ally(player))
}

pub fn remove_party_ally(state: &SharedState, party_id: Uuid, ally: Uuid) -> bool {
    mutate_party(state, party_id, |party| party.remove_party_ally(ally))
}

/// Explicitly grant or deny `permission` to a player or allied party.
pub fn set_permission(
    state: &SharedState,
    party_id: Uuid,
    subject: Uuid,
    permission: PartyPermission,
    value: bool,
) -> bool {
    mutate_party(state, party_id, |party| {
        if party.grant(subject, permission) == Some(value) {
            return false;
        }
        party.set_grant(subject, permission, value);
        true
    })
}

/// Drop an explicit grant so the relationship default applies again.
pub fn remove_permission(
    state: &SharedState,
    party_id: Uuid,
    subject: Uuid,
    permission: PartyPermission,
) -> bool {
    mutate_party(state, party_id, |party| party.remove_grant(subject, permission))
}

/// Set the per-member base quota; the configured default clears the override.
pub fn set_claim_quota_base(state: &SharedState, party_id: Uuid, value: i32, actor: Actor<'_>) -> bool {
    let default_quota = state.config().default_party_claims_amount;
    mutate_party(state, party_id, |party| {
        let before = party.overrides.claim_quota_base;
        party.overrides.set_claim_quota_base(value, default_quota);
        touch_if_changed(party, before != party.overrides.claim_quota_base, actor)
    })
}

/// Set the bonus chunks; zero clears the override.
pub fn set_claim_quota_bonus(state: &SharedState, party_id: Uuid, value: i32, actor: Actor<'_>) -> bool {
    mutate_party(state, party_id, |party| {
        let before = party.overrides.claim_quota_bonus;
        party.overrides.set_claim_quota_bonus(value);
        touch_if_changed(party, before != party.overrides.claim_quota_bonus, actor)
    })
}

/// Add `amount` bonus chunks unless the total would leave `0..=max_bonus_limit`.
pub fn add_bonus_chunks(state: &SharedState, party_id: Uuid, amount: i32, actor: Actor<'_>) -> bool {
    let Some(party) = state.party(party_id) else {
        return false;
    };
    let limit = max_bonus_limit(&party, state.config(), state.host());
    let Some(total) = bonus_chunks(&party).checked_add(amount) else {
        return false;
    };
    if total < 0 || total > limit {
        debug!(party = %party_id, total, limit, "bonus chunks out of range");
        return false;
    }
    set_claim_quota_bonus(state, party_id, total, actor)
}

/// Override a protection flag for the party.
pub fn set_protection(
    state: &SharedState,
    party_id: Uuid,
    flag: ProtectionFlag,
    value: bool,
    actor: Actor<'_>,
) -> bool {
    mutate_party(state, party_id, |party| {
        let changed = party.overrides.protection.get(&flag) != Some(&value);
        party.overrides.set_protection(flag, value);
        touch_if_changed(party, changed, actor)
    })
}

/// Drop a protection override so the configured default applies.
pub fn clear_protection(
    state: &SharedState,
    party_id: Uuid,
    flag: ProtectionFlag,
    actor: Actor<'_>,
) -> bool {
    mutate_party(state, party_id, |party| {
        let changed = party.overrides.protection.contains_key(&flag);
        party.overrides.clear_protection(flag);
        touch_if_changed(party, changed, actor)
    })
}

pub fn rename(state: &SharedState, party_id: Uuid, name: &str, actor: Actor<'_>) -> bool {
    mutate_party(state, party_id, |party| {
        let changed = party.name != name;
        party.name = name.to_owned();
        touch_if_changed(party, changed, actor)
    })
}

pub fn set_description(state: &SharedState, party_id: Uuid, description: &str, actor: Actor<'_>) -> bool {
    mutate_party(state, party_id, |party| {
        let changed = party.description != description;
        party.description = description.to_owned();
        touch_if_changed(party, changed, actor)
    })
}

pub fn set_color(state: &SharedState, party_id: Uuid, color: PartyColor, actor: Actor<'_>) -> bool {
    mutate_party(state, party_id, |party| {
        let changed = party.color != color;
        party.color = color;
        touch_if_changed(party, changed, actor)
    })
}

fn touch_if_changed(party: &mut Party, changed: bool, actor: Actor<'_>) -> bool {
    if changed {
        party.touch(actor.id, actor.name);
        debug!(
            party = %party.id,
            actor = %actor.id,
            at = %party.modified.formatted_at(),
            "party info updated"
        );
    }
    changed
}

/// Recompute the party's perimeter in every dimension it holds land in.
pub async fn refresh_perimeter(state: &SharedState, party_id: Uuid) {
    let mut outbox = Vec::new();
    {
        let mut territory = state.territory().lock().await;
        let mut dimensions: Vec<String> = territory
            .claims()
            .filter(|(_, chunk)| chunk.party_id == party_id)
            .map(|(dimension, _)| dimension.to_owned())
            .chain(
                territory
                    .reservations()
                    .filter(|(_, reserved)| reserved.reserved_by == party_id)
                    .map(|(dimension, _)| dimension.to_owned()),
            )
            .collect();
        dimensions.sort();
        dimensions.dedup();
        for dimension in dimensions {
            perimeter::reconcile(
                &mut territory,
                state.config(),
                &dimension,
                party_id,
                &mut outbox,
            );
        }
    }
    state.persistence().enqueue_all(outbox);
}
