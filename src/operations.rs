//! Durable operation state - the per-file checkpoint log behind resumable
//! transfers
//!
//! A transfer writes its state file before any I/O, records one terminal
//! status per file hash, and deletes the file on total success. Failed or
//! interrupted operations leave the file behind for `resume`.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{error, info, warn};

use crate::error::{BlackbirdError, Result};

/// File name prefix shared by all operation state files
pub const STATE_FILE_PREFIX: &str = "operation";

/// The kind of transfer an operation state belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Sync,
    Move,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Sync => write!(f, "sync"),
            OperationType::Move => write!(f, "move"),
        }
    }
}

/// Per-file transfer status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Done,
    Failed(String),
}

impl OperationStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, OperationStatus::Done)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, OperationStatus::Failed(_))
    }

    /// Pending and failed files both need another attempt
    pub fn needs_retry(&self) -> bool {
        !self.is_done()
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "pending"),
            OperationStatus::Done => write!(f, "done"),
            OperationStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

impl std::str::FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OperationStatus::Pending),
            "done" => Ok(OperationStatus::Done),
            other => match other.strip_prefix("failed") {
                Some(rest) => {
                    let reason = rest.trim_start_matches(':').trim_start();
                    Ok(OperationStatus::Failed(reason.to_string()))
                }
                None => Err(format!("unknown operation status: '{}'", other)),
            },
        }
    }
}

impl Serialize for OperationStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for OperationStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// The serialized checkpoint for one sync or move operation.
///
/// Hash keys are strings in the JSON file and `u64` in memory; serde_json
/// performs that conversion for integer-keyed maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationState {
    pub operation_type: OperationType,
    /// Unix timestamp (seconds) the operation started
    pub timestamp: f64,
    /// WebDAV URL for sync, source location name for move
    pub source: String,
    pub target_location: String,
    /// Requested components; only meaningful for sync
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<String>>,
    /// file hash -> status
    pub files: HashMap<u64, OperationStatus>,
}

impl OperationState {
    /// Hashes still pending or failed, i.e. needing another attempt
    pub fn files_needing_retry(&self) -> Vec<u64> {
        let mut hashes: Vec<u64> = self
            .files
            .iter()
            .filter(|(_, status)| status.needs_retry())
            .map(|(hash, _)| *hash)
            .collect();
        hashes.sort_unstable();
        hashes
    }

    pub fn failed_count(&self) -> usize {
        self.files.values().filter(|s| s.is_failed()).count()
    }
}

/// Path of a state file for the given type and timestamp
pub fn state_file_path(blackbird_dir: &Path, operation_type: OperationType, timestamp: f64) -> PathBuf {
    blackbird_dir.join(format!(
        "{}_{}_{:.0}.json",
        STATE_FILE_PREFIX, operation_type, timestamp
    ))
}

/// Load a state file from disk
pub fn load_operation_state(path: &Path) -> Result<OperationState> {
    let data = fs::read_to_string(path).map_err(|e| BlackbirdError::io(path, e))?;
    serde_json::from_str(&data).map_err(|e| {
        BlackbirdError::State(format!(
            "failed to parse operation state {}: {}",
            path.display(),
            e
        ))
    })
}

/// Find the most recent state file for a given operation type
pub fn find_latest_state_file(blackbird_dir: &Path, operation_type: OperationType) -> Option<PathBuf> {
    let prefix = format!("{}_{}_", STATE_FILE_PREFIX, operation_type);
    let entries = fs::read_dir(blackbird_dir).ok()?;

    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            name.starts_with(&prefix) && name.ends_with(".json")
        })
        .max_by_key(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(UNIX_EPOCH)
        })
        .map(|e| e.path())
}

/// A live operation state: in-memory copy plus its on-disk file.
///
/// Updates rewrite the whole file; the mutex serializes rewrites so
/// parallel workers can record outcomes without tearing the JSON.
pub struct StateFile {
    path: PathBuf,
    state: Mutex<OperationState>,
}

impl StateFile {
    /// Create and persist the initial state with every file pending
    pub fn create(
        blackbird_dir: &Path,
        operation_type: OperationType,
        source: &str,
        target_location: &str,
        file_hashes: &[u64],
        components: Option<Vec<String>>,
    ) -> Result<Self> {
        fs::create_dir_all(blackbird_dir).map_err(|e| BlackbirdError::io(blackbird_dir, e))?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        let path = state_file_path(blackbird_dir, operation_type, timestamp);

        let state = OperationState {
            operation_type,
            timestamp,
            source: source.to_string(),
            target_location: target_location.to_string(),
            components,
            files: file_hashes
                .iter()
                .map(|hash| (*hash, OperationStatus::Pending))
                .collect(),
        };

        let file = Self {
            path,
            state: Mutex::new(state),
        };
        file.persist(&file.state.lock())?;
        info!("created operation state file: {}", file.path.display());
        Ok(file)
    }

    /// Wrap an existing state loaded from disk
    pub fn open(path: &Path) -> Result<Self> {
        let state = load_operation_state(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a status for one file hash and rewrite the file.
    ///
    /// Failures to write are logged, not propagated; a lost checkpoint
    /// must not abort the transfer it is tracking.
    pub fn update(&self, file_hash: u64, status: OperationStatus) {
        let mut state = self.state.lock();
        if !state.files.contains_key(&file_hash) {
            warn!(
                "file hash {} not found in state file {}; skipping update",
                file_hash,
                self.path.display()
            );
            return;
        }
        state.files.insert(file_hash, status);

        if let Err(e) = self.persist(&state) {
            error!(
                "failed to update operation state file {}: {}",
                self.path.display(),
                e
            );
        }
    }

    /// Number of files currently recorded as failed
    pub fn failed_count(&self) -> usize {
        self.state.lock().failed_count()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> OperationState {
        self.state.lock().clone()
    }

    /// Delete the state file on success, or keep it when failures remain.
    /// Returns the number of failed files.
    pub fn finish(&self) -> usize {
        let failed = self.failed_count();
        if failed == 0 {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(
                    "failed to delete operation state file {}: {}",
                    self.path.display(),
                    e
                );
            } else {
                info!("deleted operation state file: {}", self.path.display());
            }
        } else {
            warn!(
                "{} file(s) failed; state file kept at: {}",
                failed,
                self.path.display()
            );
        }
        failed
    }

    fn persist(&self, state: &OperationState) -> Result<()> {
        let data = serde_json::to_string_pretty(state)
            .map_err(|e| BlackbirdError::State(format!("error encoding state: {}", e)))?;
        fs::write(&self.path, data).map_err(|e| BlackbirdError::io(&self.path, e))
    }
}
