/// Durable store abstraction and its backends.
pub mod claim_store;
/// One-shot import of a legacy snapshot file.
pub mod legacy;
/// Persisted entity definitions.
pub mod models;
/// Backend-agnostic storage errors.
pub mod storage;
