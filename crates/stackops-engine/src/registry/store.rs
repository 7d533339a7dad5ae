//! Stack record persistence
//!
//! One JSON file per stack. Writes go to a sibling temp file that is fsynced
//! and renamed over the target, so a crash mid-write leaves the previous
//! record intact.

use super::types::StackRecord;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory-backed store of stack records
#[derive(Debug, Clone)]
pub struct StackStore {
    dir: PathBuf,
}

impl StackStore {
    /// Open the store in the per-user data directory
    pub fn open_default() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "stackops").context("Failed to get project directories")?;
        Self::at(proj_dirs.data_local_dir())
    }

    /// Open the store rooted at `state_dir`, creating it if needed
    pub fn at(state_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = state_dir.as_ref().join("stacks");
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Root of the state directory (parent of `stacks/`)
    pub fn state_dir(&self) -> &Path {
        self.dir.parent().unwrap_or(&self.dir)
    }

    pub fn path_for(&self, stack: &str) -> PathBuf {
        self.dir.join(format!("{stack}.json"))
    }

    /// Load a stack record, migrating older schemas. `None` if absent.
    pub fn load(&self, stack: &str) -> Result<Option<StackRecord>> {
        let path = self.path_for(stack);
        if !path.exists() {
            return Ok(None);
        }
        read_record(&path).map(Some)
    }

    pub fn save(&self, record: &StackRecord) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(record).context("Failed to serialize stack record")?;
        write_atomic(&self.path_for(&record.stack), &bytes)
    }
}

/// Read and migrate a stack record from any path (state file or backup).
pub fn read_record(path: &Path) -> Result<StackRecord> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut record: StackRecord = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse stack record {}", path.display()))?;

    let from = record.schema_version;
    if record.migrate() {
        warn!(
            path = %path.display(),
            from,
            to = record.schema_version,
            "Old stack record schema detected - migrated in memory"
        );
    }
    Ok(record)
}

/// Write `bytes` to `path` via temp file, fsync and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp = path.with_extension("json.tmp");
    {
        let mut file =
            File::create(&tmp).with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync {}", tmp.display()))?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    debug!(path = %path.display(), bytes = bytes.len(), "Wrote record");
    Ok(())
}
