/// Admin protection bypass and party selection.
pub mod admin;
/// Claim, unclaim and placement rules.
pub mod claim_service;
/// Coalesced map refresh signals.
pub mod map_updates;
/// Legacy quota override rewrite.
pub mod migration;
/// Player name cache.
pub mod names;
/// Party lifecycle, membership, allies and overrides.
pub mod party_service;
/// Perimeter ring computation and reservation queries.
pub mod perimeter;
/// Quotas, protection flags and the interaction predicate.
pub mod permissions;
/// Write-behind queue in front of the durable store.
pub mod persistence;
/// Inactive party sweep.
pub mod reaper;
/// Storage health monitoring toggling degraded mode.
pub mod storage_supervisor;
