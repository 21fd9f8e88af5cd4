//! Working-directory assembly: download the resource content into a
//! scoped temp dir and canonicalize recognized manifests.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::MaterializeError;
use crate::traits::ResourceAccess;

/// Scoped working directory for one attempt. The directory and its
/// contents are removed when this guard drops, on every exit path.
pub(crate) struct WorkingDirectory {
    dir: TempDir,
}

impl WorkingDirectory {
    pub(crate) fn create() -> Result<Self, MaterializeError> {
        let dir = tempfile::Builder::new().prefix("sdc-work-").tempdir()?;
        Ok(Self { dir })
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Fill `dir` with the resource content and normalize its manifests.
pub(crate) fn materialize(
    access: &dyn ResourceAccess,
    dir: &Path,
) -> Result<(), MaterializeError> {
    access.download_to(dir).map_err(MaterializeError::Download)?;
    normalize_manifests(dir)
}

/// Re-encode every recognized manifest under `root` as compact JSON,
/// in place. A file is a manifest when it parses as a YAML or JSON
/// mapping carrying both `apiVersion` and `kind`. Anything else,
/// including unparseable files, is left untouched.
fn normalize_manifests(root: &Path) -> Result<(), MaterializeError> {
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Ok(raw) = fs::read_to_string(path) else {
            continue;
        };
        let Ok(value) = serde_yaml::from_str::<serde_json::Value>(&raw) else {
            continue;
        };
        let Some(map) = value.as_object() else {
            continue;
        };
        if !map.contains_key("apiVersion") || !map.contains_key("kind") {
            continue;
        }
        // Round-tripping through serde_json::Value always re-encodes.
        let encoded = value.to_string();
        fs::write(path, encoded).map_err(|source| MaterializeError::Normalize {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "normalized manifest");
    }
    Ok(())
}
