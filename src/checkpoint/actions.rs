//! Typed fixups replayed before the frontier snapshot is loaded
//!
//! Anything a checkpoint cannot capture as plain data (the fingerprint store's
//! contents and backing file) is described here as an action. Recovery applies
//! the actions in order, then reads `frontier.json`.

use crate::checkpoint::{CheckpointError, CheckpointResult};
use crate::store::{
    read_dump, CacheFingerprintStore, DiskFingerprintStore, FingerprintStore,
    MemoryFingerprintStore, StoreDescriptor,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum RecoverAction {
    /// Ensure a directory exists
    CreateDirectory { path: PathBuf },

    /// Copy `dump` (relative to the checkpoint) over `target`
    RestoreFile { dump: String, target: PathBuf },

    /// Rebuild an in-memory store from a fingerprint dump
    LoadFingerprints {
        dump: String,
        capacity_bits: u32,
        /// Present for the bounded cache store
        max_entries: Option<u64>,
    },

    /// Open the disk store at `path`
    OpenDiskStore { path: PathBuf },

    /// Rewrite paths under `from` to live under `to` in the actions that follow
    RelocatePath { from: PathBuf, to: PathBuf },
}

/// State built up while replaying actions
pub struct RecoveryContext<'a> {
    dir: &'a Path,
    relocations: Vec<(PathBuf, PathBuf)>,
    store: Option<Box<dyn FingerprintStore>>,
}

impl<'a> RecoveryContext<'a> {
    pub fn new(dir: &'a Path) -> Self {
        Self {
            dir,
            relocations: Vec::new(),
            store: None,
        }
    }

    /// Takes the fingerprint store the actions produced
    pub fn into_store(self) -> Option<Box<dyn FingerprintStore>> {
        self.store
    }

    fn relocate(&self, path: &Path) -> PathBuf {
        for (from, to) in &self.relocations {
            if let Ok(rest) = path.strip_prefix(from) {
                return to.join(rest);
            }
        }
        path.to_path_buf()
    }

    fn dump_path(&self, dump: &str) -> CheckpointResult<PathBuf> {
        let relative = Path::new(dump);
        if relative.is_absolute() || dump.contains("..") {
            return Err(CheckpointError::Invalid(format!(
                "dump name must be relative to the checkpoint: {}",
                dump
            )));
        }
        Ok(self.dir.join(relative))
    }
}

impl RecoverAction {
    /// Actions that rebuild the store described by `descriptor`
    pub fn for_store(descriptor: &StoreDescriptor) -> Vec<RecoverAction> {
        match descriptor {
            StoreDescriptor::Memory {
                capacity_bits,
                dump,
            } => vec![RecoverAction::LoadFingerprints {
                dump: dump.clone(),
                capacity_bits: *capacity_bits,
                max_entries: None,
            }],
            StoreDescriptor::Cache {
                capacity_bits,
                max_entries,
                dump,
            } => vec![RecoverAction::LoadFingerprints {
                dump: dump.clone(),
                capacity_bits: *capacity_bits,
                max_entries: Some(*max_entries),
            }],
            StoreDescriptor::Disk { path, dump } => {
                let mut actions = Vec::new();
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    actions.push(RecoverAction::CreateDirectory {
                        path: parent.to_path_buf(),
                    });
                }
                actions.push(RecoverAction::RestoreFile {
                    dump: dump.clone(),
                    target: path.clone(),
                });
                actions.push(RecoverAction::OpenDiskStore { path: path.clone() });
                actions
            }
        }
    }

    pub fn apply(&self, ctx: &mut RecoveryContext<'_>) -> CheckpointResult<()> {
        debug!(action = ?self, "Replaying recover action");
        match self {
            RecoverAction::CreateDirectory { path } => {
                fs::create_dir_all(ctx.relocate(path))?;
            }
            RecoverAction::RestoreFile { dump, target } => {
                let source = ctx.dump_path(dump)?;
                let target = ctx.relocate(target);
                fs::copy(&source, &target)?;
                info!(from = %source.display(), to = %target.display(), "Restored file");
            }
            RecoverAction::LoadFingerprints {
                dump,
                capacity_bits,
                max_entries,
            } => {
                let values = read_dump(&ctx.dump_path(dump)?)?;
                let store: Box<dyn FingerprintStore> = match max_entries {
                    Some(max) => Box::new(CacheFingerprintStore::from_values(
                        *capacity_bits,
                        *max,
                        &values,
                    )?),
                    None => Box::new(MemoryFingerprintStore::from_values(
                        *capacity_bits,
                        &values,
                    )?),
                };
                info!(fingerprints = values.len(), "Loaded fingerprints");
                ctx.store = Some(store);
            }
            RecoverAction::OpenDiskStore { path } => {
                let store = DiskFingerprintStore::open(&ctx.relocate(path))?;
                ctx.store = Some(Box::new(store));
            }
            RecoverAction::RelocatePath { from, to } => {
                ctx.relocations.push((from.clone(), to.clone()));
            }
        }
        Ok(())
    }
}
