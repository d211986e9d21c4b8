//! Global claim configuration, loaded once at startup and shared read-only.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::party::{PartyColor, ProtectionFlag};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/claims.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CHUNK_CLAIMS_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the registry.
///
/// Integer limits use `-1` to mean "unlimited" or "disabled".
pub struct ClaimsConfig {
    /// Per-player quota when no permission grants one.
    pub default_party_claims_amount: i32,
    /// Upper bound for bonus chunks a party can be granted.
    pub max_add_chunk_amount: i32,
    /// Scale quotas by the number of players in the party.
    pub scale_claim_limit_by_members: bool,
    /// Default for [`ProtectionFlag::BlockPlace`].
    pub default_party_block_place: bool,
    /// Default for [`ProtectionFlag::BlockBreak`].
    pub default_party_block_break: bool,
    /// Default for [`ProtectionFlag::Interact`].
    pub default_party_block_interact: bool,
    /// Default for [`ProtectionFlag::Pvp`].
    pub default_party_pvp: bool,
    /// Default for [`ProtectionFlag::FriendlyFire`].
    pub default_party_friendly_fire: bool,
    /// Default for [`ProtectionFlag::AllowEntry`].
    pub default_party_allow_entry: bool,
    /// Default for [`ProtectionFlag::ChestInteract`].
    pub default_party_interact_chest: bool,
    /// Default for [`ProtectionFlag::DoorInteract`].
    pub default_party_interact_door: bool,
    /// Default for [`ProtectionFlag::BenchInteract`].
    pub default_party_interact_bench: bool,
    /// Default for [`ProtectionFlag::ChairInteract`].
    pub default_party_interact_chair: bool,
    /// Default for [`ProtectionFlag::PortalInteract`].
    pub default_party_interact_portal: bool,
    /// Keep a reserved one-chunk ring around every party's territory.
    pub enable_perimeter_reservation: bool,
    /// Require new claims to touch existing ones.
    pub enable_adjacent_chunk_restriction: bool,
    /// Cap on the member set, owner excluded.
    pub max_party_members: i32,
    /// Cap on player plus party allies.
    pub max_party_allies: i32,
    /// Hours offline before a party is disbanded.
    pub party_inactivity_hours: i32,
    /// Dimensions where nobody may claim.
    pub world_name_blacklist_for_claiming: Vec<String>,
    /// Dimensions where unclaimed land is protected too.
    pub full_world_protection: Vec<String>,
    /// Rewrite legacy quota overrides at startup.
    pub migrate_legacy_claim_overrides: bool,
    /// Palette new parties draw their color from.
    #[serde(deserialize_with = "deserialize_colors")]
    pub party_colors: Vec<PartyColor>,
}

impl ClaimsConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        colors = config.party_colors.len(),
                        "loaded claims config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Global default for a protection flag.
    pub fn protection_default(&self, flag: ProtectionFlag) -> bool {
        match flag {
            ProtectionFlag::BlockPlace => self.default_party_block_place,
            ProtectionFlag::BlockBreak => self.default_party_block_break,
            ProtectionFlag::Interact => self.default_party_block_interact,
            ProtectionFlag::Pvp => self.default_party_pvp,
            ProtectionFlag::FriendlyFire => self.default_party_friendly_fire,
            ProtectionFlag::AllowEntry => self.default_party_allow_entry,
            ProtectionFlag::ChestInteract => self.default_party_interact_chest,
            ProtectionFlag::DoorInteract => self.default_party_interact_door,
            ProtectionFlag::BenchInteract => self.default_party_interact_bench,
            ProtectionFlag::ChairInteract => self.default_party_interact_chair,
            ProtectionFlag::PortalInteract => self.default_party_interact_portal,
        }
    }

    /// Inactivity threshold in milliseconds, `None` when the sweep is disabled.
    pub fn inactivity_threshold_ms(&self) -> Option<i64> {
        (self.party_inactivity_hours >= 0)
            .then(|| i64::from(self.party_inactivity_hours) * 60 * 60 * 1000)
    }

    /// Return the first palette color that is not already listed in `used`.
    pub fn first_unused_color(&self, used: &[PartyColor]) -> Option<PartyColor> {
        self.party_colors
            .iter()
            .find(|candidate| used.iter().all(|existing| existing != *candidate))
            .copied()
    }
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            default_party_claims_amount: 10,
            max_add_chunk_amount: 50,
            scale_claim_limit_by_members: false,
            default_party_block_place: false,
            default_party_block_break: false,
            default_party_block_interact: false,
            default_party_pvp: false,
            default_party_friendly_fire: false,
            default_party_allow_entry: true,
            default_party_interact_chest: false,
            default_party_interact_door: false,
            default_party_interact_bench: false,
            default_party_interact_chair: true,
            default_party_interact_portal: true,
            enable_perimeter_reservation: true,
            enable_adjacent_chunk_restriction: false,
            max_party_members: -1,
            max_party_allies: -1,
            party_inactivity_hours: -1,
            world_name_blacklist_for_claiming: Vec::new(),
            full_world_protection: Vec::new(),
            migrate_legacy_claim_overrides: true,
            party_colors: default_colors(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single HSV palette entry.
struct RawColor {
    hue: f32,
    saturation: f32,
    value: f32,
}

impl From<RawColor> for PartyColor {
    fn from(value: RawColor) -> Self {
        Self {
            h: value.hue,
            s: value.saturation,
            v: value.value,
        }
    }
}

fn deserialize_colors<'de, D>(deserializer: D) -> Result<Vec<PartyColor>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<RawColor>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(Into::into).collect())
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in palette shipped with the binary.
fn default_colors() -> Vec<PartyColor> {
    [
        (-64.69388, 1.0),
        (119.331474, 1.0),
        (-113.57562, 1.0),
        (34.365788, 1.0),
        (-169.41148, 1.0),
        (-19.08323, 1.0),
        (58.87927, 1.0),
        (-134.34782, 0.6),
        (153.15997, 0.6),
        (-37.933628, 0.6),
        (-90.79761, 0.6),
        (44.579124, 0.6),
    ]
    .into_iter()
    .map(|(h, s)| PartyColor { h, s, v: 1.0 })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let config: ClaimsConfig = serde_json::from_str(
            r#"{
                "default_party_claims_amount": 25,
                "party_colors": [{"hue": 10.0, "saturation": 0.5, "value": 1.0}]
            }"#,
        )
        .unwrap();
        assert_eq!(config.default_party_claims_amount, 25);
        assert_eq!(config.max_party_members, -1);
        assert!(config.enable_perimeter_reservation);
        assert_eq!(
            config.party_colors,
            vec![PartyColor {
                h: 10.0,
                s: 0.5,
                v: 1.0
            }]
        );
    }

    #[test]
    fn negative_inactivity_hours_disable_the_sweep() {
        let config = ClaimsConfig::default();
        assert_eq!(config.inactivity_threshold_ms(), None);

        let config = ClaimsConfig {
            party_inactivity_hours: 2,
            ..ClaimsConfig::default()
        };
        assert_eq!(config.inactivity_threshold_ms(), Some(7_200_000));
    }

    #[test]
    fn first_unused_color_skips_taken_entries() {
        let config = ClaimsConfig::default();
        let first = config.party_colors[0];
        let second = config.party_colors[1];
        assert_eq!(config.first_unused_color(&[]), Some(first));
        assert_eq!(config.first_unused_color(&[first]), Some(second));
        assert_eq!(config.first_unused_color(&config.party_colors), None);
    }

    #[test]
    fn protection_defaults_map_to_fields() {
        let config = ClaimsConfig {
            default_party_pvp: true,
            ..ClaimsConfig::default()
        };
        assert!(config.protection_default(ProtectionFlag::Pvp));
        assert!(!config.protection_default(ProtectionFlag::FriendlyFire));
    }
}
