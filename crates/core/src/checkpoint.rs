//! Persisted resume state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage;
use crate::types::ScanCheckpoint;

/// Durable storage for a single job's checkpoint.
///
/// Only one writer is expected at a time; see [`crate::lock::RunLock`].
pub trait CheckpointStore {
    /// The saved checkpoint, or a fresh one if nothing is saved.
    fn load(&mut self) -> Result<ScanCheckpoint>;

    /// Replace the saved checkpoint.
    fn save(&mut self, checkpoint: &ScanCheckpoint) -> Result<()>;

    /// Forget the saved checkpoint. Idempotent.
    fn clear(&mut self) -> Result<()>;
}

/// On-disk envelope, versioned so old files are never misread.
#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    version: u32,
    checkpoint: ScanCheckpoint,
}

impl CheckpointFile {
    const CURRENT_VERSION: u32 = 1;
}

/// Checkpoint kept as a JSON file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&mut self) -> Result<ScanCheckpoint> {
        match storage::read_json::<CheckpointFile>(&self.path)? {
            None => Ok(ScanCheckpoint::default()),
            Some(file) if file.version == CheckpointFile::CURRENT_VERSION => Ok(file.checkpoint),
            Some(file) => Err(Error::persistence(
                &self.path,
                format!("unsupported checkpoint version {}", file.version),
            )),
        }
    }

    fn save(&mut self, checkpoint: &ScanCheckpoint) -> Result<()> {
        let file = CheckpointFile {
            version: CheckpointFile::CURRENT_VERSION,
            checkpoint: checkpoint.clone(),
        };
        storage::write_json(&self.path, &file)
    }

    fn clear(&mut self) -> Result<()> {
        storage::remove_file(&self.path)
    }
}

/// Checkpoint held in memory, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    saved: Option<ScanCheckpoint>,
    /// Number of `save` calls.
    pub saves: usize,
    /// Number of `clear` calls.
    pub clears: usize,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checkpoint(checkpoint: ScanCheckpoint) -> Self {
        Self {
            saved: Some(checkpoint),
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Option<&ScanCheckpoint> {
        self.saved.as_ref()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&mut self) -> Result<ScanCheckpoint> {
        Ok(self.saved.clone().unwrap_or_default())
    }

    fn save(&mut self, checkpoint: &ScanCheckpoint) -> Result<()> {
        self.saves += 1;
        self.saved = Some(checkpoint.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.clears += 1;
        self.saved = None;
        Ok(())
    }
}
