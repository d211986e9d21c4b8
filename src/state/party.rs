use std::{
    collections::{BTreeMap, HashMap, HashSet},
    time::SystemTime,
};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::config::ClaimsConfig;

/// Player performing a change, as recorded in audit stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor<'a> {
    pub id: Uuid,
    pub name: &'a str,
}

impl<'a> Actor<'a> {
    pub fn new(id: Uuid, name: &'a str) -> Self {
        Self { id, name }
    }
}

/// Who performed a change and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    /// Player responsible for the change.
    pub actor: Uuid,
    /// Display name of the actor at the time of the change.
    pub actor_name: String,
    /// Wall-clock time of the change.
    pub at: SystemTime,
}

impl AuditStamp {
    /// Stamp the current time for `actor`.
    pub fn now(actor: Uuid, actor_name: &str) -> Self {
        Self {
            actor,
            actor_name: actor_name.to_owned(),
            at: SystemTime::now(),
        }
    }

    /// RFC 3339 rendering of [`AuditStamp::at`] for display.
    pub fn formatted_at(&self) -> String {
        OffsetDateTime::from(self.at)
            .format(&Rfc3339)
            .unwrap_or_else(|_| "invalid-timestamp".into())
    }
}

/// HSV color used to paint a party's territory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PartyColor {
    /// Hue in degrees.
    pub h: f32,
    /// Saturation in `[0, 1]`.
    pub s: f32,
    /// Value in `[0, 1]`.
    pub v: f32,
}

impl PartialEq for PartyColor {
    fn eq(&self, other: &Self) -> bool {
        self.h.to_bits() == other.h.to_bits()
            && self.s.to_bits() == other.s.to_bits()
            && self.v.to_bits() == other.v.to_bits()
    }
}

impl Eq for PartyColor {}

/// Boolean protections a party may toggle on its territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionFlag {
    /// Outsiders may place blocks.
    BlockPlace,
    /// Outsiders may break blocks.
    BlockBreak,
    /// Outsiders may interact with blocks.
    Interact,
    /// Players may fight each other.
    Pvp,
    /// Party members may hurt each other.
    FriendlyFire,
    /// Outsiders may enter the territory.
    AllowEntry,
    /// Outsiders may open chests.
    ChestInteract,
    /// Outsiders may use doors.
    DoorInteract,
    /// Outsiders may use crafting benches.
    BenchInteract,
    /// Outsiders may sit on chairs.
    ChairInteract,
    /// Outsiders may use portals.
    PortalInteract,
}

impl ProtectionFlag {
    /// Every flag, in declaration order.
    pub const ALL: [ProtectionFlag; 11] = [
        ProtectionFlag::BlockPlace,
        ProtectionFlag::BlockBreak,
        ProtectionFlag::Interact,
        ProtectionFlag::Pvp,
        ProtectionFlag::FriendlyFire,
        ProtectionFlag::AllowEntry,
        ProtectionFlag::ChestInteract,
        ProtectionFlag::DoorInteract,
        ProtectionFlag::BenchInteract,
        ProtectionFlag::ChairInteract,
        ProtectionFlag::PortalInteract,
    ];

    /// Flags copied from the global defaults into every new party.
    pub const SEEDED: [ProtectionFlag; 5] = [
        ProtectionFlag::BlockPlace,
        ProtectionFlag::BlockBreak,
        ProtectionFlag::Interact,
        ProtectionFlag::AllowEntry,
        ProtectionFlag::PortalInteract,
    ];
}

/// Named permissions a party grants to members and allies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyPermission {
    /// Place blocks in the territory.
    PlaceBlocks,
    /// Break blocks in the territory.
    BreakBlocks,
    /// Generic block interaction.
    Interact,
    /// Open chests.
    InteractChest,
    /// Use doors.
    InteractDoor,
    /// Use crafting benches.
    InteractBench,
    /// Sit on chairs.
    InteractChair,
    /// Use portals.
    InteractPortal,
    /// Claim and unclaim chunks for the party.
    ClaimUnclaim,
    /// Invite new members.
    InviteMembers,
    /// Edit name, description, color and overrides.
    ModifyInfo,
}

/// Per-party values that supersede the global configuration.
///
/// `None` means "use the global default". Quota overrides equal to their
/// default are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrides {
    /// Absolute per-member base quota.
    pub claim_quota_base: Option<i32>,
    /// Extra chunks added on top of the base quota.
    pub claim_quota_bonus: Option<i32>,
    /// Pre-migration absolute quota, never scaled.
    pub legacy_claim_quota: Option<i32>,
    /// Protection flag overrides.
    pub protection: BTreeMap<ProtectionFlag, bool>,
}

impl Overrides {
    /// Set the base quota, eliding it when equal to `default_quota`.
    pub fn set_claim_quota_base(&mut self, value: i32, default_quota: i32) {
        self.claim_quota_base = (value != default_quota).then_some(value);
    }

    /// Set the bonus, eliding it when zero.
    pub fn set_claim_quota_bonus(&mut self, value: i32) {
        self.claim_quota_bonus = (value != 0).then_some(value);
    }

    /// Set the legacy absolute quota, eliding it when equal to `default_quota`.
    pub fn set_legacy_claim_quota(&mut self, value: i32, default_quota: i32) {
        self.legacy_claim_quota = (value != default_quota).then_some(value);
    }

    /// Override a protection flag.
    pub fn set_protection(&mut self, flag: ProtectionFlag, value: bool) {
        self.protection.insert(flag, value);
    }

    /// Drop a protection override so the global default applies again.
    pub fn clear_protection(&mut self, flag: ProtectionFlag) {
        self.protection.remove(&flag);
    }
}

/// Pending invitation for a player to join a party.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartyInvite {
    /// Player being invited.
    pub recipient: Uuid,
    /// Player who sent the invite.
    pub sender: Uuid,
    /// Party the recipient would join.
    pub party_id: Uuid,
}

/// A group of players sharing territory.
#[derive(Debug, Clone, PartialEq)]
pub struct Party {
    /// Stable identifier.
    pub id: Uuid,
    /// The single owner; never part of `members`.
    pub owner: Uuid,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Territory color.
    pub color: PartyColor,
    /// Per-party overrides of global settings.
    pub overrides: Overrides,
    /// Creation audit stamp.
    pub created: AuditStamp,
    /// Last modification audit stamp.
    pub modified: AuditStamp,
    pub(crate) members: HashSet<Uuid>,
    pub(crate) player_allies: HashSet<Uuid>,
    pub(crate) party_allies: HashSet<Uuid>,
    pub(crate) permission_grants: HashMap<Uuid, BTreeMap<PartyPermission, bool>>,
}

impl Party {
    /// Build a party owned by `owner`, seeding protection overrides from `config`.
    pub fn new(owner: Uuid, owner_name: &str, color: PartyColor, config: &ClaimsConfig) -> Self {
        let stamp = AuditStamp::now(owner, owner_name);
        let mut overrides = Overrides::default();
        for flag in ProtectionFlag::SEEDED {
            overrides.set_protection(flag, config.protection_default(flag));
        }

        Self {
            id: Uuid::new_v4(),
            owner,
            name: format!("{owner_name}'s Party"),
            description: format!("{owner_name}'s Party Description"),
            color,
            overrides,
            created: stamp.clone(),
            modified: stamp,
            members: HashSet::new(),
            player_allies: HashSet::new(),
            party_allies: HashSet::new(),
            permission_grants: HashMap::new(),
        }
    }

    /// Members excluding the owner.
    pub fn members(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.members.iter().copied()
    }

    /// Owner followed by every member.
    pub fn everyone(&self) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(self.owner).chain(self.members.iter().copied())
    }

    /// Owner plus members.
    pub fn total_member_count(&self) -> usize {
        1 + self.members.len()
    }

    /// Number of players in the member set.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_owner(&self, player: Uuid) -> bool {
        self.owner == player
    }

    pub fn is_member(&self, player: Uuid) -> bool {
        self.members.contains(&player)
    }

    pub fn is_owner_or_member(&self, player: Uuid) -> bool {
        self.is_owner(player) || self.is_member(player)
    }

    /// Whether the member set already reached `max_party_members`.
    pub fn is_full(&self, config: &ClaimsConfig) -> bool {
        config.max_party_members >= 0 && self.members.len() >= config.max_party_members as usize
    }

    /// Insert a member unless the party is full or `player` is the owner.
    pub(crate) fn add_member(&mut self, player: Uuid, config: &ClaimsConfig) -> bool {
        if self.is_owner(player) || self.is_full(config) {
            return false;
        }
        self.members.insert(player)
    }

    /// Remove a non-owner member.
    pub(crate) fn remove_member(&mut self, player: Uuid) -> bool {
        self.members.remove(&player)
    }

    pub fn player_allies(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.player_allies.iter().copied()
    }

    pub fn party_allies(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.party_allies.iter().copied()
    }

    pub fn is_player_allied(&self, player: Uuid) -> bool {
        self.player_allies.contains(&player)
    }

    pub fn is_party_allied(&self, party_id: Uuid) -> bool {
        self.party_allies.contains(&party_id)
    }

    fn ally_cap_reached(&self, config: &ClaimsConfig) -> bool {
        config.max_party_allies >= 0
            && self.player_allies.len() + self.party_allies.len()
                >= config.max_party_allies as usize
    }

    pub(crate) fn add_player_ally(&mut self, player: Uuid, config: &ClaimsConfig) -> bool {
        if self.ally_cap_reached(config) {
            return false;
        }
        self.player_allies.insert(player)
    }

    pub(crate) fn add_party_ally(&mut self, party_id: Uuid, config: &ClaimsConfig) -> bool {
        if party_id == self.id || self.ally_cap_reached(config) {
            return false;
        }
        self.party_allies.insert(party_id)
    }

    pub(crate) fn remove_player_ally(&mut self, player: Uuid) -> bool {
        self.player_allies.remove(&player)
    }

    pub(crate) fn remove_party_ally(&mut self, party_id: Uuid) -> bool {
        self.party_allies.remove(&party_id)
    }

    /// Explicit grant for `subject` (player or party id), if any.
    pub fn grant(&self, subject: Uuid, permission: PartyPermission) -> Option<bool> {
        self.permission_grants
            .get(&subject)
            .and_then(|grants| grants.get(&permission))
            .copied()
    }

    pub fn permission_grants(&self) -> &HashMap<Uuid, BTreeMap<PartyPermission, bool>> {
        &self.permission_grants
    }

    pub(crate) fn set_grant(&mut self, subject: Uuid, permission: PartyPermission, value: bool) {
        self.permission_grants
            .entry(subject)
            .or_default()
            .insert(permission, value);
    }

    pub(crate) fn remove_grant(&mut self, subject: Uuid, permission: PartyPermission) -> bool {
        let Some(grants) = self.permission_grants.get_mut(&subject) else {
            return false;
        };
        let removed = grants.remove(&permission).is_some();
        if grants.is_empty() {
            self.permission_grants.remove(&subject);
        }
        removed
    }

    pub(crate) fn touch(&mut self, actor: Uuid, actor_name: &str) {
        self.modified = AuditStamp::now(actor, actor_name);
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;

    #[test]
    fn audit_stamps_render_as_rfc3339() {
        let stamp = AuditStamp {
            actor: Uuid::nil(),
            actor_name: "Ada".into(),
            at: UNIX_EPOCH + Duration::from_secs(86_400),
        };
        assert_eq!(stamp.formatted_at(), "1970-01-02T00:00:00Z");
    }

    fn party(config: &ClaimsConfig) -> Party {
        Party::new(
            Uuid::new_v4(),
            "Ada",
            PartyColor {
                h: 0.0,
                s: 1.0,
                v: 1.0,
            },
            config,
        )
    }

    #[test]
    fn new_party_seeds_protection_defaults_and_names() {
        let config = ClaimsConfig {
            default_party_block_break: true,
            ..ClaimsConfig::default()
        };
        let party = party(&config);
        assert_eq!(party.name, "Ada's Party");
        assert_eq!(
            party.overrides.protection.get(&ProtectionFlag::BlockBreak),
            Some(&true)
        );
        assert!(!party.overrides.protection.contains_key(&ProtectionFlag::Pvp));
        assert_eq!(party.member_count(), 0);
        assert_eq!(party.total_member_count(), 1);
    }

    #[test]
    fn owner_is_never_added_as_member() {
        let config = ClaimsConfig::default();
        let mut party = party(&config);
        let owner = party.owner;
        assert!(!party.add_member(owner, &config));
        assert!(!party.is_member(owner));
    }

    #[test]
    fn member_cap_is_a_silent_no_op() {
        let config = ClaimsConfig {
            max_party_members: 1,
            ..ClaimsConfig::default()
        };
        let mut party = party(&config);
        assert!(party.add_member(Uuid::new_v4(), &config));
        assert!(!party.add_member(Uuid::new_v4(), &config));
        assert_eq!(party.member_count(), 1);
    }

    #[test]
    fn ally_cap_counts_both_kinds() {
        let config = ClaimsConfig {
            max_party_allies: 2,
            ..ClaimsConfig::default()
        };
        let mut party = party(&config);
        assert!(party.add_player_ally(Uuid::new_v4(), &config));
        assert!(party.add_party_ally(Uuid::new_v4(), &config));
        assert!(!party.add_player_ally(Uuid::new_v4(), &config));
    }

    #[test]
    fn quota_overrides_equal_to_default_are_elided() {
        let mut overrides = Overrides::default();
        overrides.set_claim_quota_base(10, 10);
        overrides.set_claim_quota_bonus(0);
        overrides.set_legacy_claim_quota(10, 10);
        assert_eq!(overrides, Overrides::default());

        overrides.set_claim_quota_base(4, 10);
        overrides.set_claim_quota_bonus(3);
        assert_eq!(overrides.claim_quota_base, Some(4));
        assert_eq!(overrides.claim_quota_bonus, Some(3));

        overrides.set_claim_quota_bonus(0);
        assert_eq!(overrides.claim_quota_bonus, None);
    }

    #[test]
    fn removing_last_grant_drops_the_subject() {
        let config = ClaimsConfig::default();
        let mut party = party(&config);
        let ally = Uuid::new_v4();
        party.set_grant(ally, PartyPermission::InteractDoor, true);
        assert_eq!(party.grant(ally, PartyPermission::InteractDoor), Some(true));
        assert!(party.remove_grant(ally, PartyPermission::InteractDoor));
        assert!(party.permission_grants().is_empty());
    }
}
