//! Screenshot evidence checks

use image::GenericImageView;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{E2eError, E2eResult};

/// A screenshot a flow wrote, after verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub width: u32,
    pub height: u32,
    /// Hex sha256 of the file contents
    pub sha256: String,
}

/// Check that a screenshot exists, is non-empty, and decodes as an image
pub fn inspect(path: &Path) -> E2eResult<ScreenshotArtifact> {
    if !path.exists() {
        return Err(E2eError::ScreenshotMissing(path.display().to_string()));
    }

    let data = std::fs::read(path)?;
    if data.is_empty() {
        return Err(E2eError::ScreenshotEmpty(path.display().to_string()));
    }

    let (width, height) = image::load_from_memory(&data)?.dimensions();

    let artifact = ScreenshotArtifact {
        path: path.to_path_buf(),
        size_bytes: data.len() as u64,
        width,
        height,
        sha256: hash_bytes(&data),
    };

    debug!(
        "Screenshot {} ({}x{}, {} bytes)",
        artifact.path.display(),
        artifact.width,
        artifact.height,
        artifact.size_bytes
    );

    Ok(artifact)
}

/// Inspect several screenshots, stopping at the first bad one
pub fn inspect_all<P: AsRef<Path>>(paths: &[P]) -> E2eResult<Vec<ScreenshotArtifact>> {
    paths.iter().map(|p| inspect(p.as_ref())).collect()
}

fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
