use crate::checkpoint::{checkpoint, is_valid, CheckpointResult};
use crate::config::CheckpointConfig;
use crate::frontier::Frontier;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes a numbered series of checkpoints under one directory
///
/// Checkpoint directories are named `<prefix><NNNNN>`, numbered upward from the
/// highest one already present.
#[derive(Debug)]
pub struct Checkpointer {
    directory: PathBuf,
    prefix: String,
    next_index: u32,
    config_hash: Option<String>,
}

impl Checkpointer {
    pub fn new(config: &CheckpointConfig) -> CheckpointResult<Self> {
        let mut checkpointer = Self {
            directory: config.directory.clone(),
            prefix: config.prefix.clone(),
            next_index: 1,
            config_hash: None,
        };
        if let Some((index, _)) = checkpointer.list()?.last() {
            checkpointer.next_index = index + 1;
        }
        debug!(
            directory = %checkpointer.directory.display(),
            next = checkpointer.next_index,
            "Checkpointer ready"
        );
        Ok(checkpointer)
    }

    /// Records `hash` in every checkpoint written from now on
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Name the next checkpoint will get
    pub fn next_name(&self) -> String {
        format!("{}{:05}", self.prefix, self.next_index)
    }

    /// Writes the next checkpoint in the series and returns its directory
    pub fn checkpoint(&mut self, frontier: &Frontier) -> CheckpointResult<PathBuf> {
        let dir = self.directory.join(self.next_name());
        checkpoint(frontier, &dir, self.config_hash.as_deref())?;
        self.next_index += 1;
        info!(dir = %dir.display(), "Checkpoint complete");
        Ok(dir)
    }

    /// Existing checkpoint directories in this series, oldest first
    pub fn list(&self) -> CheckpointResult<Vec<(u32, PathBuf)>> {
        if !self.directory.is_dir() {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(index) = name.to_str().and_then(|n| self.parse_index(n)) {
                found.push((index, entry.path()));
            }
        }
        found.sort();
        Ok(found)
    }

    /// Newest checkpoint that finished writing
    pub fn latest_valid(&self) -> CheckpointResult<Option<PathBuf>> {
        Ok(self
            .list()?
            .into_iter()
            .rev()
            .map(|(_, path)| path)
            .find(|path| is_valid(path)))
    }

    fn parse_index(&self, name: &str) -> Option<u32> {
        let digits = name.strip_prefix(self.prefix.as_str())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}
