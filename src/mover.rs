//! Move engine - relocate indexed files between storage locations
//!
//! Candidates come from the index, optionally narrowed by folder prefixes
//! and a byte budget. Every selected file is tracked in a `move` operation
//! state; the caller is expected to rebuild the index after a successful
//! move.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::dataset::Dataset;
use crate::error::{BlackbirdError, Result};
use crate::operations::{load_operation_state, OperationStatus, OperationType, StateFile};
use crate::utils::format_size;

/// Options for `move_data`
#[derive(Debug, Clone, Default)]
pub struct MoveOptions {
    /// Byte budget expressed in GB; accumulation over path-sorted
    /// candidates stops before the first file that would exceed it
    pub size_limit_gb: Option<f64>,
    /// Folder paths relative to the source location root; empty means all
    pub specific_folders: Vec<String>,
    /// Report what would move without touching anything
    pub dry_run: bool,
}

/// Statistics for one move operation
#[derive(Debug, Clone, Default)]
pub struct MoveStats {
    pub moved_files: usize,
    pub failed_files: usize,
    /// Only populated by dry runs
    pub skipped_files: usize,
    pub total_bytes_moved: u64,
}

/// One selected candidate
struct MoveItem {
    hash: u64,
    symbolic: String,
    size: u64,
}

/// Collect and order the files to move
fn select_candidates(
    dataset: &Dataset,
    source: &str,
    opts: &MoveOptions,
) -> Result<Vec<MoveItem>> {
    let prefix = format!("{}/", source);
    let normalized_folders: Vec<String> = opts
        .specific_folders
        .iter()
        .map(|folder| folder.trim_matches('/').to_string())
        .filter(|folder| !folder.is_empty())
        .collect();
    if !normalized_folders.is_empty() {
        info!("filtering by specific folders: {:?}", normalized_folders);
    }

    let mut candidates: Vec<MoveItem> = Vec::new();
    let mut total_source_size = 0u64;

    for (hash, (symbolic, size)) in &dataset.index().file_info_by_hash {
        let Some(relative) = symbolic.strip_prefix(&prefix) else {
            continue;
        };
        total_source_size += size;

        if !normalized_folders.is_empty() {
            let in_folder = normalized_folders.iter().any(|folder| {
                relative == folder || relative.starts_with(&format!("{}/", folder))
            });
            if !in_folder {
                continue;
            }
        }

        candidates.push(MoveItem {
            hash: *hash,
            symbolic: symbolic.clone(),
            size: *size,
        });
    }

    // stable path order groups artists and albums together
    candidates.sort_by(|a, b| a.symbolic.cmp(&b.symbolic));
    info!(
        "found {} candidate files in '{}' (total size: {})",
        candidates.len(),
        source,
        format_size(total_source_size)
    );

    if let Some(limit_gb) = opts.size_limit_gb {
        let limit_bytes = limit_gb * (1024f64 * 1024.0 * 1024.0);
        info!("applying size limit: {:.2} GB", limit_gb);

        let mut selected = Vec::new();
        let mut current = 0u64;
        for item in candidates {
            if (current + item.size) as f64 <= limit_bytes {
                current += item.size;
                selected.push(item);
            } else {
                break;
            }
        }
        info!(
            "selected {} files to meet size limit (actual size: {})",
            selected.len(),
            format_size(current)
        );
        return Ok(selected);
    }

    Ok(candidates)
}

/// Move one file, handling cross-device renames and crash recovery
fn move_one(dataset: &Dataset, source_symbolic: &str, target_symbolic: &str, size: u64) -> std::result::Result<(), String> {
    let abs_source = dataset
        .resolve_path(source_symbolic)
        .map_err(|e| format!("path resolution error: {}", e))?;
    let abs_target = dataset
        .resolve_path(target_symbolic)
        .map_err(|e| format!("path resolution error: {}", e))?;

    if let Some(parent) = abs_target.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
    }

    debug!(
        "moving {} -> {} ({})",
        abs_source.display(),
        abs_target.display(),
        format_size(size)
    );

    if fs::rename(&abs_source, &abs_target).is_ok() {
        return Ok(());
    }

    // source gone but target complete: a previous run moved the file and
    // crashed before recording it
    let target_matches = abs_target
        .metadata()
        .map(|meta| meta.len() == size)
        .unwrap_or(false);
    if !abs_source.exists() && target_matches {
        warn!(
            "source missing, target exists with correct size; marking {} as done",
            source_symbolic
        );
        return Ok(());
    }

    // rename failed (likely across filesystems); fall back to copy+remove
    fs::copy(&abs_source, &abs_target)
        .map_err(|e| format!("{}: {}", abs_source.display(), e))?;
    fs::remove_file(&abs_source)
        .map_err(|e| format!("failed to remove {}: {}", abs_source.display(), e))?;
    Ok(())
}

/// Drive a list of move items, recording outcomes in the state file
fn run_moves(
    dataset: &Dataset,
    items: &[MoveItem],
    target: &str,
    state: &StateFile,
) -> MoveStats {
    let mut stats = MoveStats::default();
    let total = items.len();

    for (position, item) in items.iter().enumerate() {
        let Some((_, relative)) = item.symbolic.split_once('/') else {
            warn!("skipping file with invalid symbolic path: {}", item.symbolic);
            state.update(
                item.hash,
                OperationStatus::Failed("invalid symbolic path".to_string()),
            );
            stats.failed_files += 1;
            continue;
        };
        let target_symbolic = format!("{}/{}", target, relative);

        match move_one(dataset, &item.symbolic, &target_symbolic, item.size) {
            Ok(()) => {
                state.update(item.hash, OperationStatus::Done);
                stats.moved_files += 1;
                stats.total_bytes_moved += item.size;
            }
            Err(reason) => {
                warn!(
                    "({}/{}) failed to move {}: {}",
                    position + 1,
                    total,
                    item.symbolic,
                    reason
                );
                state.update(item.hash, OperationStatus::Failed(reason));
                stats.failed_files += 1;
            }
        }
    }

    stats
}

/// Move data from one location to another under optional folder and byte
/// filters
pub fn move_data(
    dataset: &Dataset,
    source: &str,
    target: &str,
    opts: &MoveOptions,
) -> Result<MoveStats> {
    if source == target {
        return Err(BlackbirdError::User(
            "source and target locations cannot be the same".to_string(),
        ));
    }
    dataset.locations().get(source)?;
    dataset.locations().get(target)?;

    info!("starting move from '{}' to '{}'", source, target);
    if opts.dry_run {
        warn!("performing a dry run; no files will actually be moved");
    }

    let items = select_candidates(dataset, source, opts)?;
    if items.is_empty() {
        warn!("no candidate files found matching the criteria; nothing to move");
        return Ok(MoveStats::default());
    }

    if opts.dry_run {
        let mut stats = MoveStats::default();
        for item in &items {
            let relative = item.symbolic.split_once('/').map(|(_, r)| r).unwrap_or("");
            info!(
                "dry run: would move {} ({}) to {}/{}",
                item.symbolic,
                format_size(item.size),
                target,
                relative
            );
            stats.skipped_files += 1;
        }
        info!("dry run complete");
        return Ok(stats);
    }

    let hashes: Vec<u64> = items.iter().map(|item| item.hash).collect();
    let state = StateFile::create(
        &dataset.blackbird_dir(),
        OperationType::Move,
        source,
        target,
        &hashes,
        None,
    )?;

    let stats = run_moves(dataset, &items, target, &state);
    state.finish();

    info!(
        "move summary: moved={}, failed={}, bytes moved={}",
        stats.moved_files,
        stats.failed_files,
        format_size(stats.total_bytes_moved)
    );
    Ok(stats)
}

/// Resume a move operation from its state file.
///
/// Pending and failed hashes are resolved against the local index; hashes
/// the index no longer knows are recorded as failed.
pub fn resume_move(dataset: &Dataset, state_path: &Path) -> Result<MoveStats> {
    let state = load_operation_state(state_path)?;
    if state.operation_type != OperationType::Move {
        return Err(BlackbirdError::State(format!(
            "state file {} is not a move operation",
            state_path.display()
        )));
    }

    let source = state.source.clone();
    let target = state.target_location.clone();
    dataset.locations().get(&source)?;
    dataset.locations().get(&target)?;

    info!("resuming move operation from {}", state_path.display());
    let state_file = StateFile::open(state_path)?;

    let mut items = Vec::new();
    for hash in state.files_needing_retry() {
        match dataset.index().get_file_info_by_hash(hash) {
            Some((symbolic, size)) => items.push(MoveItem {
                hash,
                symbolic: symbolic.clone(),
                size: *size,
            }),
            None => {
                warn!("hash {} from state file not found in current index", hash);
                state_file.update(hash, OperationStatus::Failed("not in index".to_string()));
            }
        }
    }
    items.sort_by(|a, b| a.symbolic.cmp(&b.symbolic));

    let mut stats = run_moves(dataset, &items, &target, &state_file);
    stats.failed_files = state_file.finish();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locations::BLACKBIRD_DIR;
    use crate::schema::DatasetSchema;
    use crate::utils::hashing::hash_symbolic_path;
    use tempfile::TempDir;

    fn touch(path: &Path, size: usize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![b'x'; size]).unwrap();
    }

    /// Dataset with a `Main` and an `SSD` location
    fn fixture(files: &[(&str, usize)]) -> (TempDir, TempDir, Dataset) {
        let root = TempDir::new().unwrap();
        let ssd = TempDir::new().unwrap();

        for (relative, size) in files {
            touch(&root.path().join(relative), *size);
        }

        let mut schema = DatasetSchema::new();
        schema
            .add_component("instrumental.mp3", "*_instrumental.mp3", false)
            .unwrap();
        schema
            .save(&DatasetSchema::schema_path(root.path()))
            .unwrap();

        let mut dataset = Dataset::open(root.path()).unwrap();
        dataset
            .locations_mut()
            .add("SSD", ssd.path())
            .unwrap();
        dataset.locations_mut().save().unwrap();
        dataset.rebuild_index().unwrap();

        (root, ssd, dataset)
    }

    #[test]
    fn test_move_all_files() {
        let (root, ssd, dataset) = fixture(&[
            ("ArtistA/Album1/01_instrumental.mp3", 10),
            ("ArtistB/Album2/02_instrumental.mp3", 20),
        ]);

        let stats = move_data(&dataset, "Main", "SSD", &MoveOptions::default()).unwrap();
        assert_eq!(stats.moved_files, 2);
        assert_eq!(stats.failed_files, 0);
        assert_eq!(stats.total_bytes_moved, 30);

        assert!(!root.path().join("ArtistA/Album1/01_instrumental.mp3").exists());
        let moved = ssd.path().join("ArtistA/Album1/01_instrumental.mp3");
        assert_eq!(moved.metadata().unwrap().len(), 10);

        // full success removes the state file
        let leftovers: Vec<_> = fs::read_dir(root.path().join(BLACKBIRD_DIR))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("operation_"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_move_by_size_budget_stops_at_limit() {
        // path-sorted order: aa(50), bb(100), cc(8), dd(140)
        let (root, ssd, dataset) = fixture(&[
            ("Artist/Album/aa_instrumental.mp3", 50),
            ("Artist/Album/bb_instrumental.mp3", 100),
            ("Artist/Album/cc_instrumental.mp3", 8),
            ("Artist/Album/dd_instrumental.mp3", 140),
        ]);

        let limit_gb = 150.0 / (1024f64 * 1024.0 * 1024.0);
        let stats = move_data(
            &dataset,
            "Main",
            "SSD",
            &MoveOptions {
                size_limit_gb: Some(limit_gb),
                ..Default::default()
            },
        )
        .unwrap();

        // 50 + 100 = 150; adding cc (8) would exceed, so it stops there
        assert_eq!(stats.moved_files, 2);
        assert_eq!(stats.total_bytes_moved, 150);
        assert!(ssd.path().join("Artist/Album/aa_instrumental.mp3").exists());
        assert!(ssd.path().join("Artist/Album/bb_instrumental.mp3").exists());
        assert!(root.path().join("Artist/Album/cc_instrumental.mp3").exists());
        assert!(root.path().join("Artist/Album/dd_instrumental.mp3").exists());
    }

    #[test]
    fn test_move_specific_folders_only() {
        let (root, ssd, dataset) = fixture(&[
            ("ArtistA/Album1/01_instrumental.mp3", 10),
            ("ArtistB/Album2/02_instrumental.mp3", 20),
        ]);

        let stats = move_data(
            &dataset,
            "Main",
            "SSD",
            &MoveOptions {
                specific_folders: vec!["ArtistA".to_string()],
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(stats.moved_files, 1);
        assert!(ssd.path().join("ArtistA/Album1/01_instrumental.mp3").exists());
        assert!(root.path().join("ArtistB/Album2/02_instrumental.mp3").exists());
    }

    #[test]
    fn test_dry_run_moves_nothing() {
        let (root, ssd, dataset) = fixture(&[("ArtistA/Album1/01_instrumental.mp3", 10)]);

        let stats = move_data(
            &dataset,
            "Main",
            "SSD",
            &MoveOptions {
                dry_run: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(stats.moved_files, 0);
        assert_eq!(stats.skipped_files, 1);
        assert!(root.path().join("ArtistA/Album1/01_instrumental.mp3").exists());
        assert!(!ssd.path().join("ArtistA/Album1/01_instrumental.mp3").exists());

        // dry runs leave no state file behind
        let leftovers: Vec<_> = fs::read_dir(root.path().join(BLACKBIRD_DIR))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("operation_"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_move_rejects_bad_locations() {
        let (_root, _ssd, dataset) = fixture(&[("A/B/01_instrumental.mp3", 1)]);

        assert!(move_data(&dataset, "Main", "Main", &MoveOptions::default()).is_err());
        assert!(move_data(&dataset, "Nope", "SSD", &MoveOptions::default()).is_err());
        assert!(move_data(&dataset, "Main", "Nope", &MoveOptions::default()).is_err());
    }

    #[test]
    fn test_crash_recovery_counts_completed_move_as_done() {
        let (root, ssd, dataset) = fixture(&[("ArtistA/Album1/01_instrumental.mp3", 10)]);

        // simulate a crash after the physical move but before the state
        // update: source is gone, target already has the right bytes
        let source = root.path().join("ArtistA/Album1/01_instrumental.mp3");
        let target = ssd.path().join("ArtistA/Album1/01_instrumental.mp3");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::rename(&source, &target).unwrap();

        let stats = move_data(&dataset, "Main", "SSD", &MoveOptions::default()).unwrap();
        assert_eq!(stats.moved_files, 1);
        assert_eq!(stats.failed_files, 0);
    }

    #[test]
    fn test_resume_move_completes_pending_files() {
        let (root, ssd, dataset) = fixture(&[
            ("ArtistA/Album1/01_instrumental.mp3", 10),
            ("ArtistB/Album2/02_instrumental.mp3", 20),
        ]);

        let sym_a = "Main/ArtistA/Album1/01_instrumental.mp3";
        let sym_b = "Main/ArtistB/Album2/02_instrumental.mp3";
        let state_file = StateFile::create(
            &dataset.blackbird_dir(),
            OperationType::Move,
            "Main",
            "SSD",
            &[hash_symbolic_path(sym_a), hash_symbolic_path(sym_b)],
            None,
        )
        .unwrap();
        // one file was already moved and recorded before the interruption
        let already_moved = root.path().join("ArtistA/Album1/01_instrumental.mp3");
        let target_a = ssd.path().join("ArtistA/Album1/01_instrumental.mp3");
        fs::create_dir_all(target_a.parent().unwrap()).unwrap();
        fs::rename(&already_moved, &target_a).unwrap();
        state_file.update(hash_symbolic_path(sym_a), OperationStatus::Done);
        let state_path = state_file.path().to_path_buf();

        let stats = resume_move(&dataset, &state_path).unwrap();
        assert_eq!(stats.moved_files, 1);
        assert_eq!(stats.failed_files, 0);
        assert!(ssd.path().join("ArtistB/Album2/02_instrumental.mp3").exists());
        assert!(!state_path.exists());
    }

    #[test]
    fn test_resume_move_unknown_hash_is_failed() {
        let (_root, _ssd, dataset) = fixture(&[("A/B/01_instrumental.mp3", 1)]);

        let state_file = StateFile::create(
            &dataset.blackbird_dir(),
            OperationType::Move,
            "Main",
            "SSD",
            &[987654321],
            None,
        )
        .unwrap();
        let state_path = state_file.path().to_path_buf();

        let stats = resume_move(&dataset, &state_path).unwrap();
        assert_eq!(stats.failed_files, 1);
        assert!(state_path.exists());
    }

    #[test]
    fn test_select_candidates_prefix_is_exact() {
        // a location name that is a prefix of another must not leak files
        let (_root, _ssd, dataset) = fixture(&[("A/B/01_instrumental.mp3", 1)]);
        let opts = MoveOptions::default();
        let items = select_candidates(&dataset, "Mai", &opts).unwrap();
        assert!(items.is_empty());
    }
}
