//! Streaming pipeline - download, hand to the caller, upload, clean up
//!
//! Prefetch workers pull file names off a shared cursor and download into
//! the work directory, feeding a bounded queue (backpressure). The caller
//! takes items, processes them, and submits results; upload workers drain
//! an unbounded queue, push results back to the server and delete local
//! files. Progress is checkpointed to `.pipeline_state.json` for resume.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{
    channel, sync_channel, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError,
};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{BlackbirdError, Result};
use crate::index::DatasetIndex;
use crate::schema::DatasetSchema;
use crate::webdav::WebDavClient;

/// File name of the pipeline checkpoint inside the work directory
pub const PIPELINE_STATE_FILENAME: &str = ".pipeline_state.json";

/// Attempts per download/upload
const MAX_RETRIES: u32 = 3;

/// Seconds; the delay doubles per attempt
const RETRY_BACKOFF_BASE: f64 = 2.0;

/// How long queue operations wait before re-checking shutdown flags
const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Configuration for a streaming pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// webdav:// URL, or http(s):// with credentials passed separately
    pub url: String,
    /// Component names to stream; empty means every remote component
    pub components: Vec<String>,
    /// Artist names (exact, case-insensitive)
    pub artists: Vec<String>,
    /// Album names (exact, case-insensitive)
    pub albums: Vec<String>,
    /// Bound of the download queue
    pub queue_size: usize,
    pub prefetch_workers: usize,
    pub upload_workers: usize,
    pub work_dir: PathBuf,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl PipelineConfig {
    pub fn new(url: &str, work_dir: &Path) -> Self {
        Self {
            url: url.to_string(),
            components: Vec::new(),
            artists: Vec::new(),
            albums: Vec::new(),
            queue_size: 10,
            prefetch_workers: 4,
            upload_workers: 2,
            work_dir: work_dir.to_path_buf(),
            username: None,
            password: None,
        }
    }
}

/// Build a webdav:// URL, merging in credentials when provided
fn build_webdav_url(url: &str, username: Option<&str>, password: Option<&str>) -> String {
    if url.starts_with("webdav://") {
        return url.to_string();
    }
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url);

    match (username, password) {
        (Some(user), Some(pass)) if !rest.contains('@') => {
            format!("webdav://{}:{}@{}", user, pass, rest)
        }
        _ => format!("webdav://{}", rest),
    }
}

/// Track metadata carried with each pipeline item
#[derive(Debug, Clone)]
pub struct ItemMetadata {
    pub artist: String,
    pub album: String,
    pub track: String,
    pub component: String,
}

/// One downloaded file ready for user processing
#[derive(Debug)]
pub struct PipelineItem {
    pub local_path: PathBuf,
    /// Path on the server relative to the dataset root
    pub remote_path: String,
    pub expected_size: u64,
    pub metadata: ItemMetadata,
}

/// A result queued for upload
struct UploadTask {
    result_path: PathBuf,
    remote_result: String,
    /// Source file to delete and remote path to mark processed once the
    /// upload lands; absent for uploads resumed from a previous run
    cleanup: Option<(PathBuf, String)>,
}

struct FileEntry {
    remote_path: String,
    size: u64,
    metadata: ItemMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingUpload {
    local: String,
    remote: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PipelineState {
    url: String,
    #[serde(default)]
    processed: Vec<String>,
    #[serde(default)]
    pending_uploads: Vec<PendingUpload>,
}

/// Checkpoint state persisted on every mutation
struct SharedState {
    path: PathBuf,
    state: Mutex<PipelineState>,
}

impl SharedState {
    fn load_or_create(path: PathBuf, url: &str) -> Self {
        if path.exists() {
            match fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|data| serde_json::from_str::<PipelineState>(&data).map_err(|e| e.to_string()))
            {
                Ok(state) => {
                    info!(
                        "resumed state: {} processed, {} pending uploads",
                        state.processed.len(),
                        state.pending_uploads.len()
                    );
                    return Self {
                        path,
                        state: Mutex::new(state),
                    };
                }
                Err(e) => warn!("failed to load pipeline state, starting fresh: {}", e),
            }
        }

        let shared = Self {
            path,
            state: Mutex::new(PipelineState {
                url: url.to_string(),
                processed: Vec::new(),
                pending_uploads: Vec::new(),
            }),
        };
        shared.save(&shared.state.lock());
        shared
    }

    fn save(&self, state: &PipelineState) {
        match serde_json::to_string_pretty(state) {
            Ok(data) => {
                if let Err(e) = fs::write(&self.path, data) {
                    error!("failed to save pipeline state {}: {}", self.path.display(), e);
                }
            }
            Err(e) => error!("failed to encode pipeline state: {}", e),
        }
    }

    fn processed(&self) -> Vec<String> {
        self.state.lock().processed.clone()
    }

    fn pending_uploads(&self) -> Vec<PendingUpload> {
        self.state.lock().pending_uploads.clone()
    }

    fn set_pending_uploads(&self, pending: Vec<PendingUpload>) {
        let mut state = self.state.lock();
        state.pending_uploads = pending;
        self.save(&state);
    }

    fn mark_processed(&self, remote_path: &str) {
        let mut state = self.state.lock();
        if !state.processed.iter().any(|p| p == remote_path) {
            state.processed.push(remote_path.to_string());
            self.save(&state);
        }
    }

    fn push_pending(&self, local: &Path, remote: &str) {
        let mut state = self.state.lock();
        state.pending_uploads.push(PendingUpload {
            local: local.display().to_string(),
            remote: remote.to_string(),
        });
        self.save(&state);
    }

    fn remove_pending(&self, remote: &str) {
        let mut state = self.state.lock();
        state.pending_uploads.retain(|p| p.remote != remote);
        self.save(&state);
    }

    fn persist(&self) {
        self.save(&self.state.lock());
    }

    fn delete_file(&self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("failed to remove pipeline state {}: {}", self.path.display(), e);
            }
        }
    }
}

#[derive(Default)]
struct Counters {
    downloaded: AtomicUsize,
    uploaded: AtomicUsize,
    skipped: AtomicUsize,
    failed_downloads: AtomicUsize,
    failed_uploads: AtomicUsize,
    uploads_in_flight: AtomicUsize,
}

/// Final tallies after the pipeline stops
#[derive(Debug, Clone, Default)]
pub struct PipelineSummary {
    pub downloaded: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub failed_downloads: usize,
    pub failed_uploads: usize,
}

impl PipelineSummary {
    pub fn is_clean(&self) -> bool {
        self.failed_downloads == 0 && self.failed_uploads == 0
    }
}

/// Streaming pipeline: download -> process -> upload -> cleanup
pub struct StreamingPipeline {
    download_rx: Mutex<Receiver<Option<PipelineItem>>>,
    upload_tx: Sender<Option<UploadTask>>,
    state: Arc<SharedState>,
    counters: Arc<Counters>,
    shutdown: Arc<AtomicBool>,
    upload_shutdown: Arc<AtomicBool>,
    drained: AtomicBool,
    upload_worker_count: usize,
    download_handles: Vec<JoinHandle<()>>,
    upload_handles: Vec<JoinHandle<()>>,
    stopped: bool,
}

impl StreamingPipeline {
    /// Connect, fetch the remote index and schema, build the file list and
    /// spawn the worker pools
    pub fn start(config: PipelineConfig) -> Result<Self> {
        fs::create_dir_all(&config.work_dir)
            .map_err(|e| BlackbirdError::io(&config.work_dir, e))?;

        let url = build_webdav_url(
            &config.url,
            config.username.as_deref(),
            config.password.as_deref(),
        );
        info!("connecting to {} ...", config.url);
        let client = Arc::new(WebDavClient::new(&url)?);

        info!("downloading remote index ...");
        let index = client.get_index()?;
        let schema = client.get_schema()?;

        let state = Arc::new(SharedState::load_or_create(
            config.work_dir.join(PIPELINE_STATE_FILENAME),
            &config.url,
        ));
        let counters = Arc::new(Counters::default());

        let entries = Arc::new(build_file_list(&index, &schema, &config, &state, &counters));
        info!("files to process: {}", entries.len());

        let (download_tx, download_rx) = sync_channel::<Option<PipelineItem>>(config.queue_size.max(1));
        let (upload_tx, upload_rx) = channel::<Option<UploadTask>>();
        let upload_rx = Arc::new(Mutex::new(upload_rx));

        let shutdown = Arc::new(AtomicBool::new(false));
        let upload_shutdown = Arc::new(AtomicBool::new(false));

        let mut pipeline = Self {
            download_rx: Mutex::new(download_rx),
            upload_tx,
            state: Arc::clone(&state),
            counters: Arc::clone(&counters),
            shutdown: Arc::clone(&shutdown),
            upload_shutdown: Arc::clone(&upload_shutdown),
            drained: AtomicBool::new(false),
            upload_worker_count: config.upload_workers.max(1),
            download_handles: Vec::new(),
            upload_handles: Vec::new(),
            stopped: false,
        };

        pipeline.resume_pending_uploads();

        let prefetch_workers = config.prefetch_workers.max(1);
        let cursor = Arc::new(AtomicUsize::new(0));
        let finished_workers = Arc::new(AtomicUsize::new(0));

        for worker in 0..prefetch_workers {
            let client = Arc::clone(&client);
            let entries = Arc::clone(&entries);
            let cursor = Arc::clone(&cursor);
            let finished = Arc::clone(&finished_workers);
            let counters = Arc::clone(&counters);
            let shutdown = Arc::clone(&shutdown);
            let tx = download_tx.clone();
            let work_dir = config.work_dir.clone();

            pipeline.download_handles.push(
                thread::Builder::new()
                    .name(format!("bb-dl-{}", worker))
                    .spawn(move || {
                        download_worker(
                            &client,
                            &entries,
                            &cursor,
                            &finished,
                            prefetch_workers,
                            &counters,
                            &shutdown,
                            &tx,
                            &work_dir,
                        )
                    })
                    .expect("failed to spawn download worker"),
            );
        }
        drop(download_tx);

        for worker in 0..pipeline.upload_worker_count {
            let client = Arc::clone(&client);
            let rx = Arc::clone(&upload_rx);
            let state = Arc::clone(&state);
            let counters = Arc::clone(&counters);
            let upload_shutdown = Arc::clone(&upload_shutdown);

            pipeline.upload_handles.push(
                thread::Builder::new()
                    .name(format!("bb-ul-{}", worker))
                    .spawn(move || {
                        upload_worker(&client, &rx, &state, &counters, &upload_shutdown)
                    })
                    .expect("failed to spawn upload worker"),
            );
        }

        info!(
            "pipeline started: {} download workers, {} upload workers",
            prefetch_workers, pipeline.upload_worker_count
        );
        Ok(pipeline)
    }

    /// Take up to `count` downloaded items from the queue.
    ///
    /// Blocks until items are available; returns fewer than `count` only
    /// when downloads are finished and the queue is drained, or shutdown
    /// has been requested. An empty result means there is nothing left.
    pub fn take(&self, count: usize) -> Vec<PipelineItem> {
        let mut items = Vec::new();
        if self.drained.load(Ordering::Acquire) {
            return items;
        }

        while items.len() < count {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            let received = self.download_rx.lock().recv_timeout(POLL_INTERVAL);
            match received {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {
                    // sentinel: no more items will ever arrive
                    self.drained.store(true, Ordering::Release);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    self.drained.store(true, Ordering::Release);
                    break;
                }
            }
        }
        items
    }

    /// Queue a processing result for background upload.
    ///
    /// After a successful upload both the downloaded source and the result
    /// file are deleted from disk.
    pub fn submit_result(&self, item: PipelineItem, result_path: &Path, remote_name: &str) {
        if !result_path.exists() {
            error!("result file not found: {}", result_path.display());
            return;
        }

        let remote_dir = match item.remote_path.rsplit_once('/') {
            Some((dir, _)) => dir,
            None => "",
        };
        let remote_result = if remote_dir.is_empty() {
            remote_name.to_string()
        } else {
            format!("{}/{}", remote_dir, remote_name)
        };

        self.state.push_pending(result_path, &remote_result);
        self.counters.uploads_in_flight.fetch_add(1, Ordering::SeqCst);

        let task = UploadTask {
            result_path: result_path.to_path_buf(),
            remote_result,
            cleanup: Some((item.local_path, item.remote_path)),
        };
        if self.upload_tx.send(Some(task)).is_err() {
            self.counters.uploads_in_flight.fetch_sub(1, Ordering::SeqCst);
            error!("upload queue is closed; result not submitted");
        }
    }

    /// Skip an item: delete the downloaded source and mark it processed
    /// without uploading anything
    pub fn skip(&self, item: PipelineItem) {
        safe_delete(&item.local_path);
        self.state.mark_processed(&item.remote_path);
    }

    /// Clean shutdown: stop downloads, drain pending uploads, stop upload
    /// workers, then delete the state file if everything succeeded
    pub fn close(mut self) -> PipelineSummary {
        self.stop(false)
    }

    /// Interrupted shutdown: stop everything without draining uploads;
    /// the state file is kept for resume
    pub fn abort(mut self) -> PipelineSummary {
        self.stop(true)
    }

    fn stop(&mut self, interrupted: bool) -> PipelineSummary {
        if self.stopped {
            return self.summary();
        }
        self.stopped = true;
        info!("shutting down pipeline ...");

        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.download_handles.drain(..) {
            let _ = handle.join();
        }

        if !interrupted {
            info!("waiting for pending uploads to finish ...");
            while self.counters.uploads_in_flight.load(Ordering::SeqCst) > 0 {
                thread::sleep(Duration::from_millis(50));
            }
        }

        self.upload_shutdown.store(true, Ordering::SeqCst);
        for _ in 0..self.upload_worker_count {
            let _ = self.upload_tx.send(None);
        }
        for handle in self.upload_handles.drain(..) {
            let _ = handle.join();
        }

        self.state.persist();
        let summary = self.summary();
        if !interrupted && summary.is_clean() {
            self.state.delete_file();
            info!("all items processed successfully; state file removed");
        }

        info!(
            "pipeline stopped. downloaded: {}, uploaded: {}, skipped: {}, \
             failed downloads: {}, failed uploads: {}",
            summary.downloaded,
            summary.uploaded,
            summary.skipped,
            summary.failed_downloads,
            summary.failed_uploads
        );
        summary
    }

    fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            downloaded: self.counters.downloaded.load(Ordering::SeqCst),
            uploaded: self.counters.uploaded.load(Ordering::SeqCst),
            skipped: self.counters.skipped.load(Ordering::SeqCst),
            failed_downloads: self.counters.failed_downloads.load(Ordering::SeqCst),
            failed_uploads: self.counters.failed_uploads.load(Ordering::SeqCst),
        }
    }

    /// Re-enqueue pending uploads from a previous run whose result file
    /// still exists on disk
    fn resume_pending_uploads(&self) {
        let pending = self.state.pending_uploads();
        if pending.is_empty() {
            return;
        }

        info!("resuming {} pending uploads ...", pending.len());
        let mut remaining = Vec::new();
        for entry in pending {
            let local = PathBuf::from(&entry.local);
            if !local.exists() {
                warn!("pending upload file missing, skipping: {}", entry.local);
                continue;
            }

            self.counters.uploads_in_flight.fetch_add(1, Ordering::SeqCst);
            let task = UploadTask {
                result_path: local,
                remote_result: entry.remote.clone(),
                cleanup: None,
            };
            if self.upload_tx.send(Some(task)).is_err() {
                self.counters.uploads_in_flight.fetch_sub(1, Ordering::SeqCst);
            }
            remaining.push(entry);
        }
        self.state.set_pending_uploads(remaining);
    }
}

impl Drop for StreamingPipeline {
    fn drop(&mut self) {
        if !self.stopped {
            self.stop(true);
        }
    }
}

/// Build the filtered file list, excluding entries already processed
fn build_file_list(
    index: &DatasetIndex,
    schema: &DatasetSchema,
    config: &PipelineConfig,
    state: &SharedState,
    counters: &Counters,
) -> Vec<FileEntry> {
    let available: BTreeSet<&String> = schema.components.keys().collect();
    let target: BTreeSet<String> = if config.components.is_empty() {
        available.iter().map(|c| c.to_string()).collect()
    } else {
        let requested: BTreeSet<String> = config.components.iter().cloned().collect();
        let unknown: Vec<&String> = requested
            .iter()
            .filter(|c| !available.contains(c))
            .collect();
        if !unknown.is_empty() {
            warn!("unknown components (ignored): {:?}", unknown);
        }
        requested
            .into_iter()
            .filter(|c| available.contains(c))
            .collect()
    };

    let processed: BTreeSet<String> = state.processed().into_iter().collect();
    let mut entries = Vec::new();

    for track in index.tracks.values() {
        if !config.artists.is_empty()
            && !config
                .artists
                .iter()
                .any(|a| a.eq_ignore_ascii_case(&track.artist))
        {
            continue;
        }

        let album_name = track
            .album_path
            .rsplit('/')
            .next()
            .unwrap_or(&track.album_path);
        if !config.albums.is_empty()
            && !config.albums.iter().any(|a| a.eq_ignore_ascii_case(album_name))
        {
            continue;
        }

        for (component, symbolic) in &track.files {
            if !target.contains(component) {
                continue;
            }

            // strip the location prefix; remote paths are relative to the
            // dataset root
            let remote_path = match symbolic.split_once('/') {
                Some((_, relative)) => relative.to_string(),
                None => symbolic.clone(),
            };

            if processed.contains(&remote_path) {
                counters.skipped.fetch_add(1, Ordering::SeqCst);
                continue;
            }

            let Some(size) = track.file_sizes.get(symbolic) else {
                warn!("file size missing for {}; skipping", symbolic);
                continue;
            };

            entries.push(FileEntry {
                remote_path,
                size: *size,
                metadata: ItemMetadata {
                    artist: track.artist.clone(),
                    album: album_name.to_string(),
                    track: track.base_name.clone(),
                    component: component.clone(),
                },
            });
        }
    }

    entries
}

#[allow(clippy::too_many_arguments)]
fn download_worker(
    client: &WebDavClient,
    entries: &[FileEntry],
    cursor: &AtomicUsize,
    finished: &AtomicUsize,
    worker_count: usize,
    counters: &Counters,
    shutdown: &AtomicBool,
    tx: &SyncSender<Option<PipelineItem>>,
    work_dir: &Path,
) {
    while !shutdown.load(Ordering::Acquire) {
        let position = cursor.fetch_add(1, Ordering::SeqCst);
        let Some(entry) = entries.get(position) else {
            // the last worker to run out of files enqueues one sentinel
            let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
            if done == worker_count {
                send_with_backpressure(tx, None, shutdown);
            }
            return;
        };

        let local_path = work_dir.join("downloads").join(&entry.remote_path);
        if download_with_retry(client, &entry.remote_path, entry.size, &local_path, shutdown) {
            let item = PipelineItem {
                local_path,
                remote_path: entry.remote_path.clone(),
                expected_size: entry.size,
                metadata: entry.metadata.clone(),
            };
            if send_with_backpressure(tx, Some(item), shutdown) {
                counters.downloaded.fetch_add(1, Ordering::SeqCst);
            }
        } else {
            counters.failed_downloads.fetch_add(1, Ordering::SeqCst);
            error!("failed to download after retries: {}", entry.remote_path);
        }
    }
}

/// Block until there is room in the bounded queue, observing shutdown
fn send_with_backpressure(
    tx: &SyncSender<Option<PipelineItem>>,
    item: Option<PipelineItem>,
    shutdown: &AtomicBool,
) -> bool {
    let mut pending = item;
    loop {
        match tx.try_send(pending) {
            Ok(()) => return true,
            Err(TrySendError::Full(back)) => {
                if shutdown.load(Ordering::Acquire) {
                    return false;
                }
                pending = back;
                thread::sleep(Duration::from_millis(100));
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}

fn download_with_retry(
    client: &WebDavClient,
    remote_path: &str,
    expected_size: u64,
    local_path: &Path,
    shutdown: &AtomicBool,
) -> bool {
    for attempt in 0..MAX_RETRIES {
        if shutdown.load(Ordering::Acquire) {
            return false;
        }
        if attempt > 0 {
            thread::sleep(Duration::from_secs_f64(
                RETRY_BACKOFF_BASE.powi(attempt as i32 - 1),
            ));
        }

        if client.download_file(remote_path, local_path) {
            let actual = local_path.metadata().map(|m| m.len()).unwrap_or(0);
            if actual == expected_size {
                return true;
            }
            warn!(
                "download attempt {}/{} size mismatch for {} (expected {}, got {})",
                attempt + 1,
                MAX_RETRIES,
                remote_path,
                expected_size,
                actual
            );
            let _ = fs::remove_file(local_path);
        } else {
            warn!(
                "download attempt {}/{} failed for {}",
                attempt + 1,
                MAX_RETRIES,
                remote_path
            );
        }
    }
    false
}

fn upload_worker(
    client: &WebDavClient,
    rx: &Mutex<Receiver<Option<UploadTask>>>,
    state: &SharedState,
    counters: &Counters,
    upload_shutdown: &AtomicBool,
) {
    loop {
        let received = rx.lock().recv_timeout(POLL_INTERVAL);
        match received {
            Ok(Some(task)) => {
                process_upload_task(client, state, counters, upload_shutdown, task);
                counters.uploads_in_flight.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(None) => return,
            Err(RecvTimeoutError::Timeout) => {
                if upload_shutdown.load(Ordering::Acquire) {
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn process_upload_task(
    client: &WebDavClient,
    state: &SharedState,
    counters: &Counters,
    upload_shutdown: &AtomicBool,
    task: UploadTask,
) {
    if upload_with_retry(client, &task.result_path, &task.remote_result, upload_shutdown) {
        counters.uploaded.fetch_add(1, Ordering::SeqCst);

        safe_delete(&task.result_path);
        if let Some((source_local, source_remote)) = &task.cleanup {
            safe_delete(source_local);
            state.mark_processed(source_remote);
        }
        state.remove_pending(&task.remote_result);
    } else {
        counters.failed_uploads.fetch_add(1, Ordering::SeqCst);
        error!("failed to upload after retries: {}", task.remote_result);
    }
}

fn upload_with_retry(
    client: &WebDavClient,
    local_path: &Path,
    remote_path: &str,
    upload_shutdown: &AtomicBool,
) -> bool {
    for attempt in 0..MAX_RETRIES {
        if upload_shutdown.load(Ordering::Acquire) {
            return false;
        }
        if attempt > 0 {
            thread::sleep(Duration::from_secs_f64(
                RETRY_BACKOFF_BASE.powi(attempt as i32 - 1),
            ));
        }
        if client.upload_file(local_path, remote_path) {
            return true;
        }
        warn!(
            "upload attempt {}/{} failed for {}",
            attempt + 1,
            MAX_RETRIES,
            remote_path
        );
    }
    false
}

fn safe_delete(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("failed to delete {}: {}", path.display(), e);
        }
    }
}
