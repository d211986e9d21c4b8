//! Reader for the JSON dump left behind by the file-based store.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::info;

use crate::dao::claim_store::StoreSnapshot;

/// Environment variable pointing at a legacy dump to import on startup.
pub const LEGACY_PATH_ENV: &str = "CHUNK_CLAIMS_LEGACY_PATH";

/// Failure while reading a legacy dump.
#[derive(Debug, Error)]
pub enum LegacyError {
    #[error("failed to read legacy dump `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse legacy dump `{path}`")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read a legacy dump, returning `None` when the file does not exist.
pub fn read_snapshot(path: &Path) -> Result<Option<StoreSnapshot>, LegacyError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(LegacyError::Read {
                path: path.to_owned(),
                source,
            });
        }
    };

    let snapshot: StoreSnapshot =
        serde_json::from_str(&contents).map_err(|source| LegacyError::Parse {
            path: path.to_owned(),
            source,
        })?;
    info!(
        path = %path.display(),
        parties = snapshot.parties.len(),
        claims = snapshot.claims.len(),
        "found legacy dump"
    );
    Ok(Some(snapshot))
}

/// Legacy dump location from [`LEGACY_PATH_ENV`], if configured.
pub fn configured_path() -> Option<PathBuf> {
    std::env::var_os(LEGACY_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
}
