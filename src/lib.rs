//! Library crate for chunk-claims, exposing the registry for the binary and integration tests.

pub mod config;
pub mod dao;
pub mod error;
pub mod host;
pub mod services;
pub mod state;
