//! Startup rewrite of legacy absolute quota overrides into base and bonus.

use std::cmp::Ordering;

use tracing::info;

use crate::state::{SharedState, party::Party};

/// Split a party's legacy quota override, returning whether it held one.
///
/// An amount above `default_quota` becomes bonus chunks, one below becomes a
/// base override, and an amount equal to it is simply dropped.
pub fn migrate_party(party: &mut Party, default_quota: i32) -> bool {
    let Some(legacy) = party.overrides.legacy_claim_quota.take() else {
        return false;
    };

    match legacy.cmp(&default_quota) {
        Ordering::Greater => {
            let bonus = legacy - default_quota;
            party.overrides.set_claim_quota_bonus(bonus);
            info!(party = %party.id, base = default_quota, bonus, "migrated legacy quota");
        }
        Ordering::Less => {
            party.overrides.set_claim_quota_base(legacy, default_quota);
            info!(party = %party.id, base = legacy, "migrated legacy quota");
        }
        Ordering::Equal => {}
    }
    true
}

/// Migrate every party in the registry, persisting the rewritten ones.
pub fn migrate_legacy_overrides(state: &SharedState) -> usize {
    let default_quota = state.config().default_party_claims_amount;
    let mut migrated = 0;
    for mut party in state.parties().iter_mut() {
        if migrate_party(&mut party, default_quota) {
            state.persist_party(&party);
            migrated += 1;
        }
    }

    if migrated > 0 {
        info!(migrated, "legacy quota overrides migrated");
    } else {
        info!("no legacy quota overrides to migrate");
    }
    migrated
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::ClaimsConfig,
        state::party::{Overrides, PartyColor},
    };

    fn party_with_legacy(amount: i32) -> Party {
        let config = ClaimsConfig::default();
        let color = PartyColor {
            h: 0.0,
            s: 1.0,
            v: 1.0,
        };
        let mut party = Party::new(Uuid::new_v4(), "Ada", color, &config);
        party.overrides.legacy_claim_quota = Some(amount);
        party
    }

    #[test]
    fn excess_becomes_bonus() {
        let mut party = party_with_legacy(25);
        assert!(migrate_party(&mut party, 10));
        assert_eq!(party.overrides.claim_quota_bonus, Some(15));
        assert_eq!(party.overrides.claim_quota_base, None);
        assert_eq!(party.overrides.legacy_claim_quota, None);
    }

    #[test]
    fn shortfall_becomes_base() {
        let mut party = party_with_legacy(4);
        assert!(migrate_party(&mut party, 10));
        assert_eq!(party.overrides.claim_quota_base, Some(4));
        assert_eq!(party.overrides.claim_quota_bonus, None);
    }

    #[test]
    fn default_amount_is_just_dropped() {
        let mut party = party_with_legacy(10);
        let protection = party.overrides.protection.clone();
        assert!(migrate_party(&mut party, 10));
        assert_eq!(
            party.overrides,
            Overrides {
                protection,
                ..Overrides::default()
            }
        );
    }

    #[test]
    fn parties_without_legacy_are_untouched() {
        let mut party = party_with_legacy(3);
        party.overrides.legacy_claim_quota = None;
        assert!(!migrate_party(&mut party, 10));
    }
}
