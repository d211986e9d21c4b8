//! Quota, protection flag and permission resolution.
//!
//! The resolvers are pure functions of a party snapshot, the configuration
//! and the host's permission grants. [`is_allowed_to_interact`] combines them
//! with the registry to answer "may this player touch this chunk".

use uuid::Uuid;

use crate::{
    config::ClaimsConfig,
    host::HostDirectory,
    state::{
        SharedState,
        chunk::ChunkPos,
        party::{Party, PartyPermission, ProtectionFlag},
    },
};

/// Base quota before bonus chunks.
pub fn base_quota(party: &Party, config: &ClaimsConfig, host: &dyn HostDirectory) -> i32 {
    let scaling = config.scale_claim_limit_by_members;

    if let Some(base) = party.overrides.claim_quota_base {
        return if scaling {
            let members = i32::try_from(party.total_member_count()).unwrap_or(i32::MAX);
            base.saturating_mul(members)
        } else {
            base
        };
    }

    // Pre-migration absolute amounts are never scaled.
    if let Some(legacy) = party.overrides.legacy_claim_quota {
        return legacy;
    }

    if scaling {
        party
            .everyone()
            .map(|player| {
                host.claim_quota_grant(player)
                    .unwrap_or(config.default_party_claims_amount)
            })
            .fold(0, i32::saturating_add)
    } else {
        host.claim_quota_grant(party.owner)
            .unwrap_or(config.default_party_claims_amount)
    }
}

/// Bonus chunks granted on top of the base quota.
pub fn bonus_chunks(party: &Party) -> i32 {
    party.overrides.claim_quota_bonus.unwrap_or(0)
}

/// Maximum number of chunks the party may hold at once.
pub fn effective_quota(party: &Party, config: &ClaimsConfig, host: &dyn HostDirectory) -> i32 {
    // Hosts may grant i32::MAX as "unlimited".
    base_quota(party, config, host).saturating_add(bonus_chunks(party))
}

/// Ceiling for the bonus override.
pub fn max_bonus_limit(party: &Party, config: &ClaimsConfig, host: &dyn HostDirectory) -> i32 {
    if !config.scale_claim_limit_by_members {
        return config.max_add_chunk_amount;
    }

    party
        .everyone()
        .map(|player| match host.max_bonus_grant(player) {
            Some(granted) if granted > config.max_add_chunk_amount => granted,
            _ => config.max_add_chunk_amount,
        })
        .fold(0, i32::saturating_add)
}

/// Party override for `flag`, else the global default.
pub fn protection(party: &Party, flag: ProtectionFlag, config: &ClaimsConfig) -> bool {
    party
        .overrides
        .protection
        .get(&flag)
        .copied()
        .unwrap_or_else(|| config.protection_default(flag))
}

/// Whether `player` holds `permission` in `party`.
///
/// Owners always do. Members default to everything but
/// [`PartyPermission::ModifyInfo`]; allies default to nothing.
pub fn has_permission(party: &Party, player: Uuid, permission: PartyPermission) -> bool {
    if party.is_owner(player) {
        return true;
    }

    let member = party.is_member(player);
    let ally = party.is_player_allied(player) || party.is_party_allied(player);
    if member || ally {
        if let Some(granted) = party.grant(player, permission) {
            return granted;
        }
    }

    member && permission != PartyPermission::ModifyInfo
}

/// Grant given to an allied party as a whole, `false` when absent.
pub fn has_party_permission(party: &Party, party_id: Uuid, permission: PartyPermission) -> bool {
    party.grant(party_id, permission).unwrap_or(false)
}

/// Decide whether `actor` may perform an action guarded by `flag` and
/// `permission` inside the chunk at `pos`.
///
/// `actor` is `None` for environmental sources with no known player, which
/// are refused in claimed land.
pub async fn is_allowed_to_interact(
    state: &SharedState,
    actor: Option<Uuid>,
    dimension: &str,
    pos: ChunkPos,
    flag: ProtectionFlag,
    permission: PartyPermission,
) -> bool {
    if actor.is_some_and(|player| state.admin_overrides().contains(&player)) {
        return true;
    }

    let owner = {
        let territory = state.territory().lock().await;
        territory.claim(dimension, pos).map(|chunk| chunk.party_id)
    };
    let Some(owner) = owner else {
        return !state
            .config()
            .full_world_protection
            .iter()
            .any(|protected| protected == dimension);
    };

    let Some(party) = state.party(owner) else {
        return true;
    };
    let Some(player) = actor else {
        return false;
    };

    if party.is_owner_or_member(player) || party.is_player_allied(player) {
        return has_permission(&party, player, permission);
    }

    let actor_party = state.player_to_party().get(&player).map(|entry| *entry);
    if let Some(actor_party) = actor_party.filter(|id| party.is_party_allied(*id)) {
        return has_party_permission(&party, actor_party, permission);
    }

    protection(&party, flag, state.config())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{host::StaticHost, state::party::PartyColor};

    const RED: PartyColor = PartyColor {
        h: 0.0,
        s: 1.0,
        v: 1.0,
    };

    fn party_with(config: &ClaimsConfig, members: usize) -> Party {
        let mut party = Party::new(Uuid::new_v4(), "Ada", RED, config);
        for _ in 0..members {
            party.add_member(Uuid::new_v4(), config);
        }
        party
    }

    #[test]
    fn default_quota_comes_from_config() {
        let config = ClaimsConfig::default();
        let host = StaticHost::new();
        let party = party_with(&config, 2);
        assert_eq!(effective_quota(&party, &config, &host), 10);
    }

    #[test]
    fn owner_grant_wins_without_scaling() {
        let config = ClaimsConfig::default();
        let host = StaticHost::new();
        let party = party_with(&config, 1);
        host.grant_claim_quota(party.owner, 25);
        assert_eq!(base_quota(&party, &config, &host), 25);
    }

    #[test]
    fn scaling_sums_grants_and_defaults() {
        let config = ClaimsConfig {
            scale_claim_limit_by_members: true,
            ..ClaimsConfig::default()
        };
        let host = StaticHost::new();
        let party = party_with(&config, 2);
        host.grant_claim_quota(party.owner, 30);
        assert_eq!(base_quota(&party, &config, &host), 30 + 10 + 10);
    }

    #[test]
    fn unlimited_grants_saturate_instead_of_overflowing() {
        let config = ClaimsConfig {
            scale_claim_limit_by_members: true,
            ..ClaimsConfig::default()
        };
        let host = StaticHost::new();
        let mut party = party_with(&config, 1);
        host.grant_claim_quota(party.owner, i32::MAX);
        host.grant_max_bonus(party.owner, i32::MAX);

        assert_eq!(base_quota(&party, &config, &host), i32::MAX);
        party.overrides.claim_quota_bonus = Some(5);
        assert_eq!(effective_quota(&party, &config, &host), i32::MAX);
        assert_eq!(max_bonus_limit(&party, &config, &host), i32::MAX);

        party.overrides.claim_quota_base = Some(i32::MAX);
        assert_eq!(base_quota(&party, &config, &host), i32::MAX);
    }

    #[test]
    fn base_override_scales_but_legacy_does_not() {
        let config = ClaimsConfig {
            scale_claim_limit_by_members: true,
            ..ClaimsConfig::default()
        };
        let host = StaticHost::new();
        let mut party = party_with(&config, 2);

        party.overrides.legacy_claim_quota = Some(7);
        assert_eq!(base_quota(&party, &config, &host), 7);

        party.overrides.claim_quota_base = Some(4);
        assert_eq!(base_quota(&party, &config, &host), 12);

        party.overrides.claim_quota_bonus = Some(5);
        assert_eq!(effective_quota(&party, &config, &host), 17);
    }

    #[test]
    fn bonus_limit_takes_larger_grant_per_player() {
        let config = ClaimsConfig {
            scale_claim_limit_by_members: true,
            ..ClaimsConfig::default()
        };
        let host = StaticHost::new();
        let party = party_with(&config, 1);
        let member = party.members().next().unwrap();
        host.grant_max_bonus(party.owner, 80);
        host.grant_max_bonus(member, 20);
        assert_eq!(max_bonus_limit(&party, &config, &host), 80 + 50);

        let flat = ClaimsConfig::default();
        assert_eq!(max_bonus_limit(&party, &flat, &host), 50);
    }

    #[test]
    fn permission_defaults_by_relationship() {
        let config = ClaimsConfig::default();
        let mut party = party_with(&config, 1);
        let member = party.members().next().unwrap();
        let ally = Uuid::new_v4();
        party.add_player_ally(ally, &config);

        assert!(has_permission(&party, party.owner, PartyPermission::ModifyInfo));
        assert!(has_permission(&party, member, PartyPermission::BreakBlocks));
        assert!(!has_permission(&party, member, PartyPermission::ModifyInfo));
        assert!(!has_permission(&party, ally, PartyPermission::InteractDoor));
        assert!(!has_permission(&party, Uuid::new_v4(), PartyPermission::Interact));

        party.set_grant(member, PartyPermission::BreakBlocks, false);
        party.set_grant(ally, PartyPermission::InteractDoor, true);
        assert!(!has_permission(&party, member, PartyPermission::BreakBlocks));
        assert!(has_permission(&party, ally, PartyPermission::InteractDoor));
    }

    #[test]
    fn grants_to_strangers_are_ignored() {
        let config = ClaimsConfig::default();
        let mut party = party_with(&config, 0);
        let stranger = Uuid::new_v4();
        party.set_grant(stranger, PartyPermission::Interact, true);
        assert!(!has_permission(&party, stranger, PartyPermission::Interact));
    }

    #[test]
    fn protection_falls_back_to_config() {
        let config = ClaimsConfig {
            default_party_pvp: true,
            ..ClaimsConfig::default()
        };
        let mut party = party_with(&config, 0);
        assert!(protection(&party, ProtectionFlag::Pvp, &config));
        party.overrides.set_protection(ProtectionFlag::Pvp, false);
        assert!(!protection(&party, ProtectionFlag::Pvp, &config));
    }
}
