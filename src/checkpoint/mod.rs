//! Checkpoint and recovery
//!
//! A checkpoint is a directory holding:
//! - `actions.json`: recover actions that rebuild the fingerprint store
//! - `frontier.json`: the versioned queue snapshot
//! - `valid`: a UTC timestamp written last; directories without it are refused
//!
//! Recovery replays the actions before the snapshot is read.

mod actions;
mod checkpointer;
mod snapshot;

pub use actions::{RecoverAction, RecoveryContext};
pub use checkpointer::Checkpointer;
pub use snapshot::{FrontierSnapshot, QueueSnapshot, SNAPSHOT_VERSION};

use crate::config::Config;
use crate::frontier::{Clock, Frontier, SystemClock};
use crate::store::StoreError;
use chrono::Utc;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub const ACTIONS_FILE: &str = "actions.json";
pub const SNAPSHOT_FILE: &str = "frontier.json";
pub const VALID_STAMP: &str = "valid";

/// Errors that can occur while writing or reading a checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid checkpoint: {0}")]
    Invalid(String),

    #[error("Unsupported checkpoint version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Fingerprint store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Returns true if `dir` holds a completed checkpoint
pub fn is_valid(dir: &Path) -> bool {
    dir.join(VALID_STAMP).is_file()
}

/// Writes a checkpoint of `frontier` into `dir`, creating it if needed
pub fn checkpoint(
    frontier: &Frontier,
    dir: &Path,
    config_hash: Option<&str>,
) -> CheckpointResult<FrontierSnapshot> {
    fs::create_dir_all(dir)?;
    if is_valid(dir) {
        return Err(CheckpointError::Invalid(format!(
            "{} already holds a checkpoint",
            dir.display()
        )));
    }

    let snapshot = frontier.capture(dir, config_hash.map(str::to_string))?;
    let actions = RecoverAction::for_store(&snapshot.store);

    write_json(&dir.join(ACTIONS_FILE), &actions)?;
    write_json(&dir.join(SNAPSHOT_FILE), &snapshot)?;
    fs::write(
        dir.join(VALID_STAMP),
        Utc::now().format("%Y%m%d%H%M%S").to_string(),
    )?;

    info!(
        dir = %dir.display(),
        queues = snapshot.queues.len(),
        uris = snapshot.uri_count(),
        in_flight = snapshot.in_flight.len(),
        "Checkpoint written"
    );
    Ok(snapshot)
}

/// Rebuilds a frontier from the checkpoint in `dir`
///
/// `config_hash` is compared with the hash recorded at checkpoint time; a
/// mismatch is logged, not refused.
pub fn recover(dir: &Path, config: &Config, config_hash: Option<&str>) -> CheckpointResult<Frontier> {
    recover_with_clock(dir, config, config_hash, Arc::new(SystemClock))
}

pub fn recover_with_clock(
    dir: &Path,
    config: &Config,
    config_hash: Option<&str>,
    clock: Arc<dyn Clock>,
) -> CheckpointResult<Frontier> {
    if !is_valid(dir) {
        return Err(CheckpointError::Invalid(format!(
            "{} has no '{}' stamp",
            dir.display(),
            VALID_STAMP
        )));
    }

    let actions: Vec<RecoverAction> = read_json(&dir.join(ACTIONS_FILE))?;
    let mut ctx = RecoveryContext::new(dir);
    for action in &actions {
        action.apply(&mut ctx)?;
    }
    let store = ctx
        .into_store()
        .ok_or_else(|| CheckpointError::Invalid("no action rebuilds the fingerprint store".into()))?;

    let snapshot: FrontierSnapshot = read_json(&dir.join(SNAPSHOT_FILE))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(CheckpointError::VersionMismatch {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    if let (Some(recorded), Some(current)) = (snapshot.config_hash.as_deref(), config_hash) {
        if recorded != current {
            warn!(
                recorded,
                current, "Configuration changed since this checkpoint was written"
            );
        }
    }

    info!(
        dir = %dir.display(),
        created_at = %snapshot.created_at,
        uris = snapshot.uri_count(),
        "Recovering checkpoint"
    );
    let frontier = Frontier::with_clock(config, store, clock);
    frontier.restore(snapshot);
    Ok(frontier)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> CheckpointResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CheckpointResult<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
