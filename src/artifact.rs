//! Artifact store
//!
//! Persists fitted objects (feature encoder, model envelope) as pretty JSON.
//! There is no schema versioning: the caller decides what type to load.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{MushroomError, Result, Stage};

/// Serialize `object` to `path`, creating parent directories and overwriting
/// any existing file.
pub fn save<T: Serialize>(path: impl AsRef<Path>, object: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| MushroomError::io(Stage::ArtifactStore, parent, e))?;
    }

    let json = serde_json::to_string_pretty(object).map_err(|e| MushroomError::CorruptArtifact {
        stage: Stage::ArtifactStore,
        path: path.to_path_buf(),
        cause: e.to_string(),
    })?;
    std::fs::write(path, json).map_err(|e| MushroomError::io(Stage::ArtifactStore, path, e))?;

    debug!(path = %path.display(), "Artifact saved");
    Ok(())
}

/// Deserialize the object stored at `path`
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MushroomError::ArtifactMissing {
            stage: Stage::ArtifactStore,
            path: path.to_path_buf(),
        },
        _ => MushroomError::io(Stage::ArtifactStore, path, e),
    })?;

    let object = serde_json::from_str(&json).map_err(|e| MushroomError::CorruptArtifact {
        stage: Stage::ArtifactStore,
        path: path.to_path_buf(),
        cause: e.to_string(),
    })?;

    debug!(path = %path.display(), "Artifact loaded");
    Ok(object)
}

/// Whether an artifact file is present
pub fn exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_file()
}

/// SHA-256 of the object's serialized form, hex encoded
pub fn fingerprint<T: Serialize>(object: &T) -> Result<String> {
    let bytes = serde_json::to_vec(object).map_err(|e| MushroomError::CorruptArtifact {
        stage: Stage::ArtifactStore,
        path: Default::default(),
        cause: e.to_string(),
    })?;
    Ok(compute_sha256(&bytes))
}

fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
