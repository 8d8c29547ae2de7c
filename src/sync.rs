//! Sync engine - parallel filtered download from a WebDAV mirror
//!
//! Computes the wanted file set from the remote index, records every file
//! in an operation state file, then downloads with a fixed worker pool.
//! Failures are isolated per file; the state file survives for `resume`.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use glob::Pattern;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::dataset::Dataset;
use crate::error::{BlackbirdError, Result};
use crate::index::{DatasetIndex, INDEX_FILENAME};
use crate::locations::{BLACKBIRD_DIR, DEFAULT_LOCATION};
use crate::operations::{load_operation_state, OperationStatus, OperationType, StateFile};
use crate::schema::{DatasetSchema, SCHEMA_FILENAME};
use crate::utils::format_size;
use crate::webdav::{WebDavClient, WebDavConfig};

/// Statistics for one sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    pub total_files: usize,
    /// Files that ended up present locally (downloaded or skipped)
    pub synced_files: usize,
    pub failed_files: usize,
    /// Files skipped because they already existed with the right size
    pub skipped_files: usize,
    pub total_size: u64,
    pub synced_size: u64,
    pub downloaded_files: usize,
    pub downloaded_size: u64,
}

impl SyncStats {
    fn merge(&mut self, other: SyncStats) {
        self.synced_files += other.synced_files;
        self.failed_files += other.failed_files;
        self.skipped_files += other.skipped_files;
        self.synced_size += other.synced_size;
        self.downloaded_files += other.downloaded_files;
        self.downloaded_size += other.downloaded_size;
    }
}

/// Options for `sync` and `clone_dataset`
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Component names to sync; empty means every remote component
    pub components: Vec<String>,
    /// Glob patterns matched against artist names
    pub artists: Vec<String>,
    /// Album names (exact, case-insensitive)
    pub albums: Vec<String>,
    /// Only sync tracks that lack this component
    pub missing_component: Option<String>,
    /// Sync only this share of the sorted artist list, in (0, 1]
    pub proportion: Option<f64>,
    /// Starting offset into the sorted artist list for `proportion`
    pub offset: usize,
    /// Skip files that already exist locally with the expected size
    pub resume: bool,
    pub parallel: usize,
    pub target_location: String,
    pub profile: bool,
    pub show_progress: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            components: Vec::new(),
            artists: Vec::new(),
            albums: Vec::new(),
            missing_component: None,
            proportion: None,
            offset: 0,
            resume: true,
            parallel: 1,
            target_location: DEFAULT_LOCATION.to_string(),
            profile: false,
            show_progress: true,
        }
    }
}

/// Wall-clock profile of sync sub-operations, enabled by `--profile`
#[derive(Default)]
pub struct Profiler {
    timings: Mutex<std::collections::BTreeMap<String, (Duration, u64)>>,
}

impl Profiler {
    pub fn record(&self, operation: &str, elapsed: Duration) {
        let mut timings = self.timings.lock();
        let entry = timings
            .entry(operation.to_string())
            .or_insert((Duration::ZERO, 0));
        entry.0 += elapsed;
        entry.1 += 1;
    }

    pub fn log_summary(&self) {
        let timings = self.timings.lock();
        let mut rows: Vec<_> = timings.iter().collect();
        rows.sort_by(|a, b| b.1 .0.cmp(&a.1 .0));

        info!("profiling summary:");
        for (operation, (total, calls)) in rows {
            let total_ms = total.as_secs_f64() * 1000.0;
            let avg_ms = if *calls > 0 {
                total_ms / *calls as f64
            } else {
                0.0
            };
            info!(
                "  - {:<22} total: {:>10.2} ms, avg: {:>8.3} ms, calls: {}",
                operation, total_ms, avg_ms, calls
            );
        }
    }
}

fn timed<T>(profiler: Option<&Profiler>, operation: &str, f: impl FnOnce() -> T) -> T {
    match profiler {
        Some(profiler) => {
            let start = Instant::now();
            let value = f();
            profiler.record(operation, start.elapsed());
            value
        }
        None => f(),
    }
}

/// Resolve the component list, validating names against the remote schema
fn resolve_components(remote_schema: &DatasetSchema, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(remote_schema.components.keys().cloned().collect());
    }
    for name in requested {
        if !remote_schema.components.contains_key(name) {
            let suggestion = remote_schema
                .closest_component(name)
                .map(|close| format!(" Did you mean '{}'?", close))
                .unwrap_or_default();
            return Err(BlackbirdError::User(format!(
                "component '{}' not found in remote schema.{}",
                name, suggestion
            )));
        }
    }
    Ok(requested.to_vec())
}

/// Compute the remote file set after all filters: symbolic path -> size
pub(crate) fn select_remote_files(
    remote_index: &DatasetIndex,
    remote_schema: &DatasetSchema,
    opts: &SyncOptions,
) -> Result<std::collections::BTreeMap<String, u64>> {
    let components = resolve_components(remote_schema, &opts.components)?;
    let wanted: BTreeSet<&String> = components.iter().collect();

    if let Some(missing) = &opts.missing_component {
        if !remote_schema.components.contains_key(missing) {
            return Err(BlackbirdError::User(format!(
                "missing-component filter '{}' not found in remote schema",
                missing
            )));
        }
    }

    // proportion selects a deterministic slice of the sorted artist list
    let artist_slice: Option<BTreeSet<&str>> = match opts.proportion {
        Some(proportion) => {
            if !(proportion > 0.0 && proportion <= 1.0) {
                return Err(BlackbirdError::User(format!(
                    "proportion must be in (0, 1], got {}",
                    proportion
                )));
            }
            let artists: Vec<&str> = remote_index
                .album_by_artist
                .keys()
                .map(String::as_str)
                .collect();
            let take = ((artists.len() as f64) * proportion).ceil() as usize;
            Some(artists.into_iter().skip(opts.offset).take(take).collect())
        }
        None => {
            if opts.offset > 0 {
                warn!("offset has no effect without a proportion");
            }
            None
        }
    };

    let artist_globs: Vec<Pattern> = opts
        .artists
        .iter()
        .map(|raw| {
            Pattern::new(raw)
                .map_err(|e| BlackbirdError::User(format!("invalid artist pattern '{}': {}", raw, e)))
        })
        .collect::<Result<_>>()?;

    let mut files = std::collections::BTreeMap::new();
    for track in remote_index.tracks.values() {
        if let Some(slice) = &artist_slice {
            if !slice.contains(track.artist.as_str()) {
                continue;
            }
        }
        if !artist_globs.is_empty() && !artist_globs.iter().any(|g| g.matches(&track.artist)) {
            continue;
        }
        if !opts.albums.is_empty() {
            let album_name = track
                .album_path
                .rsplit('/')
                .next()
                .unwrap_or(&track.album_path);
            if !opts.albums.iter().any(|a| a.eq_ignore_ascii_case(album_name)) {
                continue;
            }
        }
        if let Some(missing) = &opts.missing_component {
            if track.files.contains_key(missing) {
                continue;
            }
        }

        for (component, symbolic) in &track.files {
            if !wanted.contains(component) {
                continue;
            }
            match track.file_sizes.get(symbolic) {
                Some(size) => {
                    files.insert(symbolic.clone(), *size);
                }
                None => warn!(
                    "file size missing for {} in remote index; skipping",
                    symbolic
                ),
            }
        }
    }

    Ok(files)
}

/// One file unit of work for the download pool
struct WorkItem {
    /// Hash in the operation state; None when the remote index had no
    /// entry for this path
    hash: Option<u64>,
    symbolic: String,
    size: u64,
}

enum FileOutcome {
    Downloaded,
    Skipped,
    Failed(String),
}

/// Download one file into the target location, honoring resume semantics
fn process_file(
    client: &WebDavClient,
    target_root: &Path,
    symbolic: &str,
    expected_size: u64,
    resume: bool,
    profiler: Option<&Profiler>,
) -> FileOutcome {
    // strip the location prefix; the remainder is both the remote path
    // relative to the dataset root and the local path under the target
    let Some((_, relative)) = symbolic.split_once('/') else {
        return FileOutcome::Failed(format!("invalid symbolic path: {}", symbolic));
    };
    let local_path = target_root.join(relative);

    let up_to_date = timed(profiler, "check_local_file", || {
        resume
            && local_path
                .metadata()
                .map(|meta| meta.len() == expected_size)
                .unwrap_or(false)
    });
    if up_to_date {
        return FileOutcome::Skipped;
    }
    if local_path.exists() {
        warn!(
            "local file size mismatch for {}; re-downloading",
            local_path.display()
        );
    }

    let downloaded = timed(profiler, "download_file", || {
        client.download_file(relative, &local_path)
    });
    if !downloaded {
        return FileOutcome::Failed("download failed".to_string());
    }

    match timed(profiler, "verify_size", || local_path.metadata()) {
        Ok(meta) if meta.len() == expected_size => FileOutcome::Downloaded,
        Ok(meta) => {
            error!(
                "downloaded size mismatch for {} (expected {}, got {})",
                local_path.display(),
                expected_size,
                meta.len()
            );
            if let Err(e) = fs::remove_file(&local_path) {
                error!(
                    "failed to remove corrupted file {}: {}",
                    local_path.display(),
                    e
                );
            }
            FileOutcome::Failed("size mismatch".to_string())
        }
        Err(e) => FileOutcome::Failed(e.to_string()),
    }
}

/// Run the worker pool over the work items, recording per-file outcomes
#[allow(clippy::too_many_arguments)]
fn run_transfer_pool(
    client: &WebDavClient,
    target_root: &Path,
    items: &[WorkItem],
    parallel: usize,
    resume: bool,
    state: Option<&StateFile>,
    profiler: Option<&Profiler>,
    show_progress: bool,
) -> SyncStats {
    let parallel = parallel.max(1);
    let batch_size = (items.len() / (parallel * 10)).max(1);
    let batches: Vec<&[WorkItem]> = items.chunks(batch_size).collect();
    let cursor = AtomicUsize::new(0);
    let stats = Mutex::new(SyncStats::default());

    let progress = if show_progress && !items.is_empty() {
        let pb = ProgressBar::new(items.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.green/white} {pos:>7}/{len:7} {msg}")
                .unwrap()
                .progress_chars("##-"),
        );
        Some(pb)
    } else {
        None
    };

    thread::scope(|scope| {
        for _ in 0..parallel {
            scope.spawn(|| loop {
                let batch_index = cursor.fetch_add(1, Ordering::SeqCst);
                let Some(batch) = batches.get(batch_index) else {
                    break;
                };

                for item in *batch {
                    let outcome = process_file(
                        client,
                        target_root,
                        &item.symbolic,
                        item.size,
                        resume,
                        profiler,
                    );

                    let status = match &outcome {
                        FileOutcome::Downloaded | FileOutcome::Skipped => OperationStatus::Done,
                        FileOutcome::Failed(reason) => OperationStatus::Failed(reason.clone()),
                    };
                    if let (Some(state), Some(hash)) = (state, item.hash) {
                        timed(profiler, "update_state_file", || state.update(hash, status));
                    }

                    let mut stats = stats.lock();
                    match outcome {
                        FileOutcome::Downloaded => {
                            stats.synced_files += 1;
                            stats.synced_size += item.size;
                            stats.downloaded_files += 1;
                            stats.downloaded_size += item.size;
                        }
                        FileOutcome::Skipped => {
                            stats.synced_files += 1;
                            stats.synced_size += item.size;
                            stats.skipped_files += 1;
                        }
                        FileOutcome::Failed(reason) => {
                            stats.failed_files += 1;
                            error!("failed to sync {}: {}", item.symbolic, reason);
                        }
                    }
                    drop(stats);

                    if let Some(pb) = &progress {
                        pb.inc(1);
                    }
                }
            });
        }
    });

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    stats.into_inner()
}

/// Synchronize files from a remote mirror into a local location
pub fn sync(dataset: &Dataset, client: &WebDavClient, opts: &SyncOptions) -> Result<SyncStats> {
    let profiler_storage = opts.profile.then(Profiler::default);
    let profiler = profiler_storage.as_ref();

    let target_root = dataset.locations().get(&opts.target_location)?.to_path_buf();
    if !target_root.is_dir() {
        return Err(BlackbirdError::Config(format!(
            "target location path for '{}' is not a directory: {}",
            opts.target_location,
            target_root.display()
        )));
    }

    let remote_schema = timed(profiler, "load_remote_schema", || client.get_schema())?;
    let remote_index = timed(profiler, "load_remote_index", || client.get_index())?;

    let components = resolve_components(&remote_schema, &opts.components)?;
    let files = select_remote_files(&remote_index, &remote_schema, opts)?;

    let mut stats = SyncStats {
        total_files: files.len(),
        total_size: files.values().sum(),
        ..Default::default()
    };

    if files.is_empty() {
        info!("no files match the specified criteria for synchronization");
        return Ok(stats);
    }
    info!(
        "identified {} files ({}) to sync to location '{}'",
        stats.total_files,
        format_size(stats.total_size),
        opts.target_location
    );

    // symbolic path -> hash lookup from the remote index
    let hash_by_path: HashMap<&String, u64> = remote_index
        .file_info_by_hash
        .iter()
        .map(|(hash, (symbolic, _))| (symbolic, *hash))
        .collect();

    let items: Vec<WorkItem> = files
        .iter()
        .map(|(symbolic, size)| {
            let hash = hash_by_path.get(symbolic).copied();
            if hash.is_none() {
                warn!(
                    "no hash for {} in the remote index; file will not be tracked in the state file",
                    symbolic
                );
            }
            WorkItem {
                hash,
                symbolic: symbolic.clone(),
                size: *size,
            }
        })
        .collect();

    let hashes: Vec<u64> = items.iter().filter_map(|item| item.hash).collect();
    let state = StateFile::create(
        &dataset.blackbird_dir(),
        OperationType::Sync,
        client.url(),
        &opts.target_location,
        &hashes,
        Some(components),
    )?;

    let pool_stats = run_transfer_pool(
        client,
        &target_root,
        &items,
        opts.parallel,
        opts.resume,
        Some(&state),
        profiler,
        opts.show_progress,
    );
    stats.merge(pool_stats);

    if stats.failed_files == 0 {
        info!("synchronization completed successfully");
    }
    state.finish();

    if let Some(profiler) = profiler {
        profiler.log_summary();
    }
    Ok(stats)
}

/// Clone a remote dataset: bootstrap `.blackbird/` with the remote schema
/// and index, then sync with the given filters
pub fn clone_dataset(
    source_url: &str,
    destination: &Path,
    opts: &SyncOptions,
    config: &WebDavConfig,
) -> Result<SyncStats> {
    fs::create_dir_all(destination).map_err(|e| BlackbirdError::io(destination, e))?;
    let blackbird_dir = destination.join(BLACKBIRD_DIR);
    fs::create_dir_all(&blackbird_dir).map_err(|e| BlackbirdError::io(&blackbird_dir, e))?;

    let client = WebDavClient::with_config(source_url, config)?;

    let remote_schema = format!("{}/{}", BLACKBIRD_DIR, SCHEMA_FILENAME);
    if !client.download_file(&remote_schema, &blackbird_dir.join(SCHEMA_FILENAME)) {
        return Err(BlackbirdError::Network(format!(
            "failed to download schema from {}",
            source_url
        )));
    }

    let remote_index = format!("{}/{}", BLACKBIRD_DIR, INDEX_FILENAME);
    if !client.download_file(&remote_index, &blackbird_dir.join(INDEX_FILENAME)) {
        return Err(BlackbirdError::Network(format!(
            "failed to download index from {}",
            source_url
        )));
    }

    let dataset = Dataset::open(destination)?;
    sync(&dataset, &client, opts)
}

/// Resume a sync operation from its state file.
///
/// Pending and failed hashes are resolved against the local index; hashes
/// the index no longer knows are recorded as failed.
pub fn resume_sync(
    dataset: &Dataset,
    state_path: &Path,
    parallel: usize,
    show_progress: bool,
) -> Result<SyncStats> {
    let state = load_operation_state(state_path)?;
    if state.operation_type != OperationType::Sync {
        return Err(BlackbirdError::State(format!(
            "state file {} is not a sync operation",
            state_path.display()
        )));
    }

    info!("resuming sync from {}", state_path.display());
    let client = WebDavClient::new(&state.source)?;

    let target_root = dataset.locations().get(&state.target_location)?.to_path_buf();
    if !target_root.is_dir() {
        return Err(BlackbirdError::Config(format!(
            "target location path for '{}' is not a directory: {}",
            state.target_location,
            target_root.display()
        )));
    }

    let state_file = StateFile::open(state_path)?;
    let needing_retry = state.files_needing_retry();
    let done_already = state.files.len() - needing_retry.len();
    info!(
        "{} of {} files need another attempt",
        needing_retry.len(),
        state.files.len()
    );

    let mut items = Vec::new();
    for hash in needing_retry {
        match dataset.index().get_file_info_by_hash(hash) {
            Some((symbolic, size)) => items.push(WorkItem {
                hash: Some(hash),
                symbolic: symbolic.clone(),
                size: *size,
            }),
            None => {
                warn!("hash {} from state file not found in current index", hash);
                state_file.update(hash, OperationStatus::Failed("not in index".to_string()));
            }
        }
    }

    let mut stats = SyncStats {
        total_files: state.files.len(),
        synced_files: done_already,
        total_size: items.iter().map(|item| item.size).sum(),
        ..Default::default()
    };

    let pool_stats = run_transfer_pool(
        &client,
        &target_root,
        &items,
        parallel,
        true,
        Some(&state_file),
        None,
        show_progress,
    );
    stats.merge(pool_stats);

    // the state file is authoritative for failures (it also records
    // hashes missing from the index)
    stats.failed_files = state_file.finish();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Indexer;
    use crate::schema::DatasetSchema;
    use crate::testserver::TestServer;
    use crate::utils::hashing::hash_symbolic_path;
    use std::collections::HashMap as StdHashMap;
    use tempfile::TempDir;

    fn touch(path: &Path, size: usize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![b'x'; size]).unwrap();
    }

    fn remote_schema() -> DatasetSchema {
        let mut schema = DatasetSchema::new();
        schema
            .add_component("instrumental.mp3", "*_instrumental.mp3", false)
            .unwrap();
        schema.add_component("vocals.mp3", "*_vocals.mp3", false).unwrap();
        schema
    }

    /// Build a remote dataset on disk, index it, and serve it
    fn serve_remote(server: &TestServer) -> (TempDir, DatasetIndex) {
        let remote = TempDir::new().unwrap();
        touch(&remote.path().join("ArtistA/Album1/01.T_instrumental.mp3"), 100);
        touch(&remote.path().join("ArtistA/Album1/01.T_vocals.mp3"), 200);
        touch(&remote.path().join("ArtistB/Album2/02.S_instrumental.mp3"), 300);

        let schema = remote_schema();
        let mut locations = StdHashMap::new();
        locations.insert("Main".to_string(), remote.path().to_path_buf());
        let index = Indexer::new(&schema, &locations)
            .with_progress(false)
            .build()
            .unwrap();

        server.put_file(
            ".blackbird/schema.json",
            serde_json::to_string(&schema).unwrap().as_bytes(),
        );
        server.put_file(".blackbird/index.bin", &bincode::serialize(&index).unwrap());

        for track in index.tracks.values() {
            for symbolic in track.files.values() {
                let relative = symbolic.split_once('/').unwrap().1;
                let data = fs::read(remote.path().join(relative)).unwrap();
                server.put_file(relative, &data);
            }
        }

        (remote, index)
    }

    fn quiet_opts() -> SyncOptions {
        SyncOptions {
            show_progress: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_select_remote_files_all_components() {
        let server = TestServer::start();
        let (_remote, index) = serve_remote(&server);
        let files = select_remote_files(&index, &remote_schema(), &quiet_opts()).unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files["Main/ArtistA/Album1/01.T_vocals.mp3"], 200);
    }

    #[test]
    fn test_select_remote_files_component_and_artist_filters() {
        let server = TestServer::start();
        let (_remote, index) = serve_remote(&server);

        let opts = SyncOptions {
            components: vec!["instrumental.mp3".to_string()],
            artists: vec!["Artist?".to_string()],
            ..quiet_opts()
        };
        let files = select_remote_files(&index, &remote_schema(), &opts).unwrap();
        assert_eq!(files.len(), 2);

        let opts = SyncOptions {
            artists: vec!["ArtistB".to_string()],
            ..quiet_opts()
        };
        let files = select_remote_files(&index, &remote_schema(), &opts).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("Main/ArtistB/Album2/02.S_instrumental.mp3"));
    }

    #[test]
    fn test_select_remote_files_album_filter() {
        let server = TestServer::start();
        let (_remote, index) = serve_remote(&server);

        let opts = SyncOptions {
            albums: vec!["album2".to_string()],
            ..quiet_opts()
        };
        let files = select_remote_files(&index, &remote_schema(), &opts).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("Main/ArtistB/Album2/02.S_instrumental.mp3"));
    }

    #[test]
    fn test_select_remote_files_missing_component_filter() {
        let server = TestServer::start();
        let (_remote, index) = serve_remote(&server);

        let opts = SyncOptions {
            components: vec!["instrumental.mp3".to_string()],
            missing_component: Some("vocals.mp3".to_string()),
            ..quiet_opts()
        };
        let files = select_remote_files(&index, &remote_schema(), &opts).unwrap();
        // only ArtistB's track lacks vocals
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("Main/ArtistB/Album2/02.S_instrumental.mp3"));
    }

    #[test]
    fn test_select_remote_files_proportion_slice() {
        let server = TestServer::start();
        let (_remote, index) = serve_remote(&server);

        let opts = SyncOptions {
            proportion: Some(0.5),
            ..quiet_opts()
        };
        let files = select_remote_files(&index, &remote_schema(), &opts).unwrap();
        // ceil(2 * 0.5) = 1 artist -> ArtistA
        assert_eq!(files.len(), 2);

        let opts = SyncOptions {
            proportion: Some(0.5),
            offset: 1,
            ..quiet_opts()
        };
        let files = select_remote_files(&index, &remote_schema(), &opts).unwrap();
        assert!(files.contains_key("Main/ArtistB/Album2/02.S_instrumental.mp3"));

        let opts = SyncOptions {
            proportion: Some(1.5),
            ..quiet_opts()
        };
        assert!(select_remote_files(&index, &remote_schema(), &opts).is_err());
    }

    #[test]
    fn test_unknown_component_suggests_close_match() {
        let server = TestServer::start();
        let (_remote, index) = serve_remote(&server);

        let opts = SyncOptions {
            components: vec!["vocals.mp4".to_string()],
            ..quiet_opts()
        };
        let err = select_remote_files(&index, &remote_schema(), &opts).unwrap_err();
        assert!(err.to_string().contains("vocals.mp3"));
    }

    #[test]
    fn test_clone_downloads_everything() {
        let server = TestServer::start();
        let (_remote, _index) = serve_remote(&server);
        let dest = TempDir::new().unwrap();

        let stats = clone_dataset(
            &server.webdav_url(),
            dest.path(),
            &SyncOptions {
                parallel: 2,
                ..quiet_opts()
            },
            &WebDavConfig::default(),
        )
        .unwrap();

        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.synced_files, 3);
        assert_eq!(stats.downloaded_files, 3);
        assert_eq!(stats.failed_files, 0);
        assert_eq!(stats.total_size, 600);

        let vocals = dest.path().join("ArtistA/Album1/01.T_vocals.mp3");
        assert_eq!(vocals.metadata().unwrap().len(), 200);

        // full success removes the operation state file
        let leftovers: Vec<_> = fs::read_dir(dest.path().join(BLACKBIRD_DIR))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("operation_"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_sync_redownloads_size_mismatch() {
        let server = TestServer::start();
        let (_remote, _index) = serve_remote(&server);
        let dest = TempDir::new().unwrap();

        // local copy exists but is one byte short
        touch(&dest.path().join("ArtistA/Album1/01.T_vocals.mp3"), 199);

        let stats = clone_dataset(
            &server.webdav_url(),
            dest.path(),
            &quiet_opts(),
            &WebDavConfig::default(),
        )
        .unwrap();

        assert_eq!(stats.failed_files, 0);
        // two fresh downloads plus the mismatched file again
        assert_eq!(stats.downloaded_files, 3);
        let vocals = dest.path().join("ArtistA/Album1/01.T_vocals.mp3");
        assert_eq!(vocals.metadata().unwrap().len(), 200);
    }

    #[test]
    fn test_sync_skips_existing_files_on_resume() {
        let server = TestServer::start();
        let (_remote, _index) = serve_remote(&server);
        let dest = TempDir::new().unwrap();

        clone_dataset(
            &server.webdav_url(),
            dest.path(),
            &quiet_opts(),
            &WebDavConfig::default(),
        )
        .unwrap();

        // second run skips everything
        let dataset = Dataset::open(dest.path()).unwrap();
        let client = WebDavClient::new(&server.webdav_url()).unwrap();
        let stats = sync(&dataset, &client, &quiet_opts()).unwrap();
        assert_eq!(stats.skipped_files, 3);
        assert_eq!(stats.downloaded_files, 0);
        assert_eq!(stats.failed_files, 0);
    }

    #[test]
    fn test_sync_records_failures_and_keeps_state() {
        let server = TestServer::start();
        let (_remote, index) = serve_remote(&server);
        let dest = TempDir::new().unwrap();

        // a second server advertises the full index but lacks one file
        let gone = "ArtistB/Album2/02.S_instrumental.mp3";
        let sabotaged = TestServer::start();
        sabotaged.put_file(
            ".blackbird/schema.json",
            serde_json::to_string(&remote_schema()).unwrap().as_bytes(),
        );
        sabotaged.put_file(".blackbird/index.bin", &bincode::serialize(&index).unwrap());
        for track in index.tracks.values() {
            for symbolic in track.files.values() {
                let relative = symbolic.split_once('/').unwrap().1;
                if relative == gone {
                    continue;
                }
                if let Some(data) = server.get_file(relative) {
                    sabotaged.put_file(relative, &data);
                }
            }
        }

        let stats = clone_dataset(
            &sabotaged.webdav_url(),
            dest.path(),
            &quiet_opts(),
            &WebDavConfig::default(),
        )
        .unwrap();

        assert_eq!(stats.failed_files, 1);
        assert_eq!(stats.synced_files, 2);

        // the state file survives and records the failure
        let state_path =
            crate::operations::find_latest_state_file(&dest.path().join(BLACKBIRD_DIR), OperationType::Sync)
                .unwrap();
        let state = load_operation_state(&state_path).unwrap();
        let failed_hash = hash_symbolic_path("Main/ArtistB/Album2/02.S_instrumental.mp3");
        assert!(state.files[&failed_hash].is_failed());
    }

    #[test]
    fn test_resume_sync_completes_failed_files() {
        let server = TestServer::start();
        let (_remote, index) = serve_remote(&server);
        let dest = TempDir::new().unwrap();

        clone_dataset(
            &server.webdav_url(),
            dest.path(),
            &quiet_opts(),
            &WebDavConfig::default(),
        )
        .unwrap();

        // fabricate an interrupted state: one file pending, one failed,
        // rest done; delete the pending file locally so it re-downloads
        let dataset = Dataset::open(dest.path()).unwrap();
        let pending_sym = "Main/ArtistA/Album1/01.T_vocals.mp3".to_string();
        let failed_sym = "Main/ArtistB/Album2/02.S_instrumental.mp3".to_string();
        let done_sym = "Main/ArtistA/Album1/01.T_instrumental.mp3".to_string();

        fs::remove_file(dest.path().join("ArtistA/Album1/01.T_vocals.mp3")).unwrap();

        let hashes: Vec<u64> = [&pending_sym, &failed_sym, &done_sym]
            .iter()
            .map(|s| hash_symbolic_path(s))
            .collect();
        let state_file = StateFile::create(
            &dest.path().join(BLACKBIRD_DIR),
            OperationType::Sync,
            &server.webdav_url(),
            "Main",
            &hashes,
            None,
        )
        .unwrap();
        state_file.update(
            hash_symbolic_path(&failed_sym),
            OperationStatus::Failed("connection reset".to_string()),
        );
        state_file.update(hash_symbolic_path(&done_sym), OperationStatus::Done);
        let state_path = state_file.path().to_path_buf();

        let stats = resume_sync(&dataset, &state_path, 2, false).unwrap();
        assert_eq!(stats.failed_files, 0);
        // pending was re-downloaded, failed was found intact and skipped
        assert_eq!(stats.downloaded_files, 1);
        assert_eq!(stats.skipped_files, 1);
        assert!(dest
            .path()
            .join("ArtistA/Album1/01.T_vocals.mp3")
            .exists());
        // success deletes the state file
        assert!(!state_path.exists());
    }

    #[test]
    fn test_resume_sync_unknown_hash_is_failed() {
        let server = TestServer::start();
        let (_remote, _index) = serve_remote(&server);
        let dest = TempDir::new().unwrap();

        clone_dataset(
            &server.webdav_url(),
            dest.path(),
            &quiet_opts(),
            &WebDavConfig::default(),
        )
        .unwrap();
        let dataset = Dataset::open(dest.path()).unwrap();

        let state_file = StateFile::create(
            &dest.path().join(BLACKBIRD_DIR),
            OperationType::Sync,
            &server.webdav_url(),
            "Main",
            &[123456789],
            None,
        )
        .unwrap();
        let state_path = state_file.path().to_path_buf();

        let stats = resume_sync(&dataset, &state_path, 1, false).unwrap();
        assert_eq!(stats.failed_files, 1);
        assert!(state_path.exists());

        let state = load_operation_state(&state_path).unwrap();
        assert_eq!(
            state.files[&123456789],
            OperationStatus::Failed("not in index".to_string())
        );
    }

    #[test]
    fn test_clone_fails_without_remote_index() {
        let server = TestServer::start();
        server.put_file(
            ".blackbird/schema.json",
            serde_json::to_string(&remote_schema()).unwrap().as_bytes(),
        );
        let dest = TempDir::new().unwrap();

        let result = clone_dataset(
            &server.webdav_url(),
            dest.path(),
            &quiet_opts(),
            &WebDavConfig::default(),
        );
        assert!(matches!(result, Err(BlackbirdError::Network(_))));
    }
}
