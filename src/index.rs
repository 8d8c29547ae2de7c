//! Dataset index - groups files into tracks across all storage locations
//!
//! The index is a compact, path-symbolic snapshot of every track: file
//! names are matched against the schema's component patterns, grouped by
//! base name inside their album directory, and recorded with their sizes.
//! It is persisted as a versioned binary snapshot under `.blackbird/`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{BlackbirdError, Result};
use crate::locations::BLACKBIRD_DIR;
use crate::schema::{cd_dir_regex, pattern_suffix, pattern_to_regex, DatasetSchema};
use crate::utils::hashing::hash_symbolic_path;

/// File name of the persisted index snapshot
pub const INDEX_FILENAME: &str = "index.bin";

/// Index format version
pub const INDEX_VERSION: &str = "1.0";

/// One track: a base-name-keyed cluster of component files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Full symbolic path identifying the track instance
    /// (`Location/Artist/Album[/CDn]/base`)
    pub track_path: String,
    pub artist: String,
    /// Symbolic album path (`Location/Artist/Album`)
    pub album_path: String,
    pub cd_number: Option<String>,
    /// Track name without component suffixes
    pub base_name: String,
    /// component name -> symbolic file path
    pub files: BTreeMap<String, String>,
    /// symbolic file path -> size in bytes
    pub file_sizes: BTreeMap<String, u64>,
}

/// Aggregate counters for one storage location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationStats {
    pub file_count: u64,
    pub total_size: u64,
    pub track_count: u64,
    pub album_count: u64,
    pub artist_count: u64,
}

/// The persisted dataset index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetIndex {
    pub last_updated: DateTime<Utc>,
    pub version: String,
    /// track_path -> TrackInfo
    pub tracks: BTreeMap<String, TrackInfo>,
    /// album_path -> track_paths
    pub track_by_album: BTreeMap<String, BTreeSet<String>>,
    /// artist -> album_paths
    pub album_by_artist: BTreeMap<String, BTreeSet<String>>,
    /// deterministic hash of the symbolic path -> (symbolic path, size)
    pub file_info_by_hash: HashMap<u64, (String, u64)>,
    pub stats_by_location: BTreeMap<String, LocationStats>,
    pub total_size: u64,
}

impl DatasetIndex {
    /// Create a new empty index
    pub fn create() -> Self {
        Self {
            last_updated: Utc::now(),
            version: INDEX_VERSION.to_string(),
            tracks: BTreeMap::new(),
            track_by_album: BTreeMap::new(),
            album_by_artist: BTreeMap::new(),
            file_info_by_hash: HashMap::new(),
            stats_by_location: BTreeMap::new(),
            total_size: 0,
        }
    }

    /// Path of the index snapshot inside a dataset root
    pub fn index_path(dataset_root: &Path) -> PathBuf {
        dataset_root.join(BLACKBIRD_DIR).join(INDEX_FILENAME)
    }

    /// Persist the index, rotating any existing snapshot to `.bak` first
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BlackbirdError::io(parent, e))?;
        }

        if path.exists() {
            let backup = path.with_extension("bak");
            fs::rename(path, &backup).map_err(|e| BlackbirdError::io(path, e))?;
        }

        let data = bincode::serialize(self)
            .map_err(|e| BlackbirdError::State(format!("error encoding index: {}", e)))?;
        fs::write(path, data).map_err(|e| BlackbirdError::io(path, e))
    }

    /// Load an index snapshot, falling back to the `.bak` when the primary
    /// is missing
    pub fn load(path: &Path) -> Result<Self> {
        let read_path = if path.exists() {
            path.to_path_buf()
        } else {
            let backup = path.with_extension("bak");
            if backup.exists() {
                warn!(
                    "index {} missing; loading backup {}",
                    path.display(),
                    backup.display()
                );
                backup
            } else {
                path.to_path_buf()
            }
        };

        let data = fs::read(&read_path).map_err(|e| BlackbirdError::io(&read_path, e))?;
        bincode::deserialize(&data).map_err(|e| {
            BlackbirdError::State(format!(
                "error decoding index {}: {}",
                read_path.display(),
                e
            ))
        })
    }

    /// Search artists by substring, optionally falling back to fuzzy
    /// matching when nothing matches exactly
    pub fn search_by_artist(
        &self,
        query: &str,
        case_sensitive: bool,
        fuzzy: bool,
    ) -> Vec<String> {
        let matches: Vec<String> = self
            .album_by_artist
            .keys()
            .filter(|artist| {
                if case_sensitive {
                    artist.contains(query)
                } else {
                    artist.to_lowercase().contains(&query.to_lowercase())
                }
            })
            .cloned()
            .collect();

        if !matches.is_empty() || !fuzzy {
            return matches;
        }

        // fuzzy fallback: up to 5 approximate matches above the cutoff
        let mut scored: Vec<(f64, &String)> = self
            .album_by_artist
            .keys()
            .map(|artist| {
                let score = if case_sensitive {
                    strsim::normalized_levenshtein(query, artist)
                } else {
                    strsim::normalized_levenshtein(
                        &query.to_lowercase(),
                        &artist.to_lowercase(),
                    )
                };
                (score, artist)
            })
            .filter(|(score, _)| *score >= 0.6)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(5).map(|(_, a)| a.clone()).collect()
    }

    /// Search albums by name substring, optionally within one artist
    pub fn search_by_album(&self, query: &str, artist: Option<&str>) -> Vec<String> {
        let query_lower = query.to_lowercase();
        let mut matches: Vec<String> = Vec::new();

        let albums: Vec<&String> = match artist {
            Some(artist) => self
                .album_by_artist
                .get(artist)
                .map(|albums| albums.iter().collect())
                .unwrap_or_default(),
            None => self.album_by_artist.values().flatten().collect(),
        };

        for album_path in albums {
            let album_name = album_path.rsplit('/').next().unwrap_or(album_path);
            if album_name.to_lowercase().contains(&query_lower) {
                matches.push(album_path.clone());
            }
        }

        matches.sort();
        matches
    }

    /// Search tracks whose base name contains the query, with optional
    /// artist and symbolic-album filters
    pub fn search_by_track(
        &self,
        query: &str,
        artist: Option<&str>,
        album: Option<&str>,
        case_sensitive: bool,
    ) -> Vec<&TrackInfo> {
        let query_lower = query.to_lowercase();

        self.tracks
            .values()
            .filter(|track| artist.map_or(true, |a| track.artist == a))
            .filter(|track| album.map_or(true, |a| track.album_path == a))
            .filter(|track| {
                if case_sensitive {
                    track.base_name.contains(query)
                } else {
                    track.base_name.to_lowercase().contains(&query_lower)
                }
            })
            .collect()
    }

    /// All component files of a track
    pub fn get_track_files(&self, track_path: &str) -> Option<&BTreeMap<String, String>> {
        self.tracks.get(track_path).map(|t| &t.files)
    }

    /// Look up a file by its symbolic-path hash
    pub fn get_file_info_by_hash(&self, hash: u64) -> Option<&(String, u64)> {
        self.file_info_by_hash.get(&hash)
    }
}

/// One matched file during a scan
struct MatchedFile {
    location: String,
    rel_path: String,
    component: String,
    base_name: String,
    size: u64,
}

/// Builds an index by scanning every configured location
pub struct Indexer<'a> {
    schema: &'a DatasetSchema,
    locations: &'a HashMap<String, PathBuf>,
    show_progress: bool,
}

impl<'a> Indexer<'a> {
    pub fn new(schema: &'a DatasetSchema, locations: &'a HashMap<String, PathBuf>) -> Self {
        Self {
            schema,
            locations,
            show_progress: true,
        }
    }

    /// Set whether to show a progress bar
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Scan all locations and build a fresh index
    pub fn build(&self) -> Result<DatasetIndex> {
        let mut index = DatasetIndex::create();

        // Compile patterns, longest suffix first so the most specific
        // component wins when several could match one file name.
        let mut compiled: Vec<(String, Regex, usize)> = Vec::new();
        for (name, def) in &self.schema.components {
            let suffix_len = pattern_suffix(&def.pattern).len();
            compiled.push((name.clone(), pattern_to_regex(&def.pattern)?, suffix_len));
        }
        compiled.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));

        // Suffix-stripping regexes for base-name extraction, longest first
        let mut strippers: Vec<(usize, Regex)> = Vec::new();
        for (_, def) in &self.schema.components {
            let suffix = pattern_suffix(&def.pattern);
            if suffix.is_empty() {
                continue;
            }
            let escaped: Vec<String> = suffix.split('*').map(regex::escape).collect();
            let source = format!("^(.*?)({})$", escaped.join(".*"));
            let regex = Regex::new(&source).map_err(|e| {
                BlackbirdError::Config(format!("invalid pattern suffix '{}': {}", suffix, e))
            })?;
            strippers.push((suffix.len(), regex));
        }
        strippers.sort_by(|a, b| b.0.cmp(&a.0));

        // Scan locations in name order so logs and stats are stable
        let mut location_names: Vec<&String> = self.locations.keys().collect();
        location_names.sort();

        let mut files: Vec<(String, PathBuf, String)> = Vec::new(); // (location, abs, rel)
        for name in &location_names {
            let root = &self.locations[*name];
            if !root.is_dir() {
                warn!(
                    "location '{}' path '{}' does not exist or is not a directory; skipping",
                    name,
                    root.display()
                );
                continue;
            }
            self.scan_location(name, root, &mut files);
        }

        info!("found {} files across {} locations", files.len(), location_names.len());

        let progress = if self.show_progress {
            let pb = ProgressBar::new(files.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
                    .unwrap()
                    .progress_chars("##-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut matched: Vec<MatchedFile> = Vec::new();
        let mut unmatched: Vec<String> = Vec::new();

        for (location, abs_path, rel_path) in &files {
            if let Some(pb) = &progress {
                pb.inc(1);
            }

            let file_name = match abs_path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };

            let component = compiled
                .iter()
                .find(|(_, regex, _)| regex.is_match(file_name))
                .map(|(name, _, _)| name.clone());

            let Some(component) = component else {
                unmatched.push(format!("{}/{}", location, rel_path));
                continue;
            };

            let Some(base_name) = extract_base_name(file_name, &strippers) else {
                warn!(
                    "could not determine base name for file: {} in {}; skipping",
                    file_name, location
                );
                continue;
            };

            let size = match abs_path.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    warn!("failed to stat {}: {}; skipping", abs_path.display(), e);
                    continue;
                }
            };

            matched.push(MatchedFile {
                location: location.clone(),
                rel_path: rel_path.clone(),
                component,
                base_name,
                size,
            });
        }

        if let Some(pb) = &progress {
            pb.finish_with_message(format!("matched {} files", matched.len()));
        }

        info!(
            "files matched to components: {}, unmatched: {}",
            matched.len(),
            unmatched.len()
        );
        if !unmatched.is_empty() {
            unmatched.sort();
            for path in unmatched.iter().take(10) {
                debug!("unmatched file: {}", path);
            }
        }

        self.group_into_tracks(&mut index, matched);
        self.finalize_stats(&mut index);

        index.last_updated = Utc::now();
        info!(
            "index build complete: {} tracks, {} artists, total size {}",
            index.tracks.len(),
            index.album_by_artist.len(),
            crate::utils::format_size(index.total_size)
        );
        Ok(index)
    }

    /// Walk one location root, collecting candidate files
    fn scan_location(
        &self,
        location: &str,
        root: &Path,
        files: &mut Vec<(String, PathBuf, String)>,
    ) {
        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !(e.depth() == 1 && e.file_name() == BLACKBIRD_DIR));

        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') || name.ends_with(".tmp") || name.ends_with(".bak") {
                continue;
            }

            let rel = match entry.path().strip_prefix(root) {
                Ok(rel) => rel.to_string_lossy().to_string(),
                Err(_) => continue,
            };
            files.push((location.to_string(), entry.path().to_path_buf(), rel));
        }
    }

    /// Group matched files by `(location, artist, album, cd, base)` and
    /// build the track entries
    fn group_into_tracks(&self, index: &mut DatasetIndex, matched: Vec<MatchedFile>) {
        let cd_regex = cd_dir_regex();

        type TrackKey = (String, String, String, Option<String>, String);
        let mut grouped: BTreeMap<TrackKey, Vec<MatchedFile>> = BTreeMap::new();

        for file in matched {
            let parent_parts: Vec<&str> = match file.rel_path.rsplit_once('/') {
                Some((parent, _)) => parent.split('/').collect(),
                None => {
                    warn!(
                        "skipping file in location root (needs Artist/Album structure): {}/{}",
                        file.location, file.rel_path
                    );
                    continue;
                }
            };

            if parent_parts.len() < 2 {
                warn!(
                    "skipping file (needs Artist/Album structure): {}/{}",
                    file.location, file.rel_path
                );
                continue;
            }

            let artist = parent_parts[0].to_string();
            let album = parent_parts[1].to_string();
            let cd_number = if parent_parts.len() >= 3 && cd_regex.is_match(parent_parts[2]) {
                Some(parent_parts[2].to_string())
            } else {
                None
            };

            let expected_depth = if cd_number.is_some() { 3 } else { 2 };
            if parent_parts.len() != expected_depth {
                warn!(
                    "skipping file with unexpected directory structure: {}/{}",
                    file.location, file.rel_path
                );
                continue;
            }

            let key = (
                file.location.clone(),
                artist,
                album,
                cd_number,
                file.base_name.clone(),
            );
            grouped.entry(key).or_default().push(file);
        }

        info!("grouped matched files into {} track instances", grouped.len());

        for ((location, artist, album, cd_number, base_name), components) in grouped {
            let album_path = format!("{}/{}/{}", location, artist, album);
            let mut track_path = album_path.clone();
            if let Some(cd) = &cd_number {
                track_path.push('/');
                track_path.push_str(cd);
            }
            track_path.push('/');
            track_path.push_str(&base_name);

            let mut track = TrackInfo {
                track_path: track_path.clone(),
                artist: artist.clone(),
                album_path: album_path.clone(),
                cd_number,
                base_name,
                files: BTreeMap::new(),
                file_sizes: BTreeMap::new(),
            };

            for file in components {
                let symbolic = format!("{}/{}", file.location, file.rel_path);
                track.files.insert(file.component, symbolic.clone());
                track.file_sizes.insert(symbolic, file.size);
            }

            if track.files.is_empty() {
                continue;
            }
            if index.tracks.contains_key(&track_path) {
                warn!(
                    "duplicate track path detected: {}; overwriting earlier entry",
                    track_path
                );
            }

            index
                .track_by_album
                .entry(album_path)
                .or_default()
                .insert(track_path.clone());
            index
                .album_by_artist
                .entry(artist)
                .or_default()
                .insert(track.album_path.clone());
            index.tracks.insert(track_path, track);
        }
    }

    /// Compute hashes, per-location stats and totals from the finished
    /// track map so the index invariants hold by construction
    fn finalize_stats(&self, index: &mut DatasetIndex) {
        for name in self.locations.keys() {
            index
                .stats_by_location
                .insert(name.clone(), LocationStats::default());
        }

        let mut albums_per_location: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
        let mut artists_per_location: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
        let mut total_size = 0u64;

        for track in index.tracks.values() {
            let location = track
                .track_path
                .split('/')
                .next()
                .unwrap_or_default()
                .to_string();

            let stats = index.stats_by_location.entry(location.clone()).or_default();
            stats.track_count += 1;
            for (symbolic, size) in &track.file_sizes {
                stats.file_count += 1;
                stats.total_size += size;
                total_size += size;
                index
                    .file_info_by_hash
                    .insert(hash_symbolic_path(symbolic), (symbolic.clone(), *size));
            }

            albums_per_location
                .entry(location.clone())
                .or_default()
                .insert(&track.album_path);
            artists_per_location
                .entry(location)
                .or_default()
                .insert(&track.artist);
        }

        for (location, albums) in albums_per_location {
            if let Some(stats) = index.stats_by_location.get_mut(&location) {
                stats.album_count = albums.len() as u64;
            }
        }
        for (location, artists) in artists_per_location {
            if let Some(stats) = index.stats_by_location.get_mut(&location) {
                stats.artist_count = artists.len() as u64;
            }
        }

        index.total_size = total_size;
    }
}

/// Strip the longest matching component suffix from a file name.
///
/// Candidates that leave an empty or lone-`_` prefix are rejected in favor
/// of the next-longest suffix. A component suffix already carries the file
/// extension, so the extension is only trimmed when no suffix matched.
fn extract_base_name(file_name: &str, strippers: &[(usize, Regex)]) -> Option<String> {
    let mut stripped: Option<&str> = None;
    for (_, regex) in strippers {
        if let Some(caps) = regex.captures(file_name) {
            let candidate = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if !candidate.is_empty() && candidate != "_" {
                stripped = Some(candidate);
                break;
            }
        }
    }

    let cleaned = match stripped {
        Some(base) => base.trim_end_matches('_').to_string(),
        None => {
            let trimmed = file_name.trim_end_matches('_');
            Path::new(trimmed)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(trimmed)
                .to_string()
        }
    };

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch_with_size(path: &Path, size: usize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![0u8; size]).unwrap();
    }

    fn schema_with(components: &[(&str, &str, bool)]) -> DatasetSchema {
        let mut schema = DatasetSchema::new();
        for (name, pattern, multiple) in components {
            schema.add_component(name, pattern, *multiple).unwrap();
        }
        schema
    }

    fn single_location(root: &Path) -> HashMap<String, PathBuf> {
        let mut locations = HashMap::new();
        locations.insert("Main".to_string(), root.to_path_buf());
        locations
    }

    #[test]
    fn test_build_single_location() {
        let root = TempDir::new().unwrap();
        touch_with_size(
            &root.path().join("ArtistX/AlbumY/01.T_instrumental.mp3"),
            128,
        );
        touch_with_size(&root.path().join("ArtistX/AlbumY/01.T.mir.json"), 32);

        let schema = schema_with(&[
            ("instrumental.mp3", "*_instrumental.mp3", false),
            ("mir.json", "*.mir.json", false),
        ]);
        let locations = single_location(root.path());
        let index = Indexer::new(&schema, &locations)
            .with_progress(false)
            .build()
            .unwrap();

        assert_eq!(index.tracks.len(), 1);
        let track = &index.tracks["Main/ArtistX/AlbumY/01.T"];
        assert_eq!(track.artist, "ArtistX");
        assert_eq!(track.album_path, "Main/ArtistX/AlbumY");
        assert_eq!(track.base_name, "01.T");
        assert_eq!(track.cd_number, None);
        assert_eq!(track.files.len(), 2);
        assert_eq!(
            track.files["instrumental.mp3"],
            "Main/ArtistX/AlbumY/01.T_instrumental.mp3"
        );
        assert_eq!(
            track.file_sizes["Main/ArtistX/AlbumY/01.T_instrumental.mp3"],
            128
        );
        assert_eq!(index.total_size, 160);
    }

    #[test]
    fn test_cd_indexing() {
        let root = TempDir::new().unwrap();
        touch_with_size(
            &root.path().join("ArtistX/AlbumY/CD1/01.T_instrumental.mp3"),
            64,
        );

        let schema = schema_with(&[("instrumental.mp3", "*_instrumental.mp3", false)]);
        let locations = single_location(root.path());
        let index = Indexer::new(&schema, &locations)
            .with_progress(false)
            .build()
            .unwrap();

        let track = &index.tracks["Main/ArtistX/AlbumY/CD1/01.T"];
        assert_eq!(track.cd_number.as_deref(), Some("CD1"));
        assert_eq!(track.album_path, "Main/ArtistX/AlbumY");
        assert!(index.track_by_album["Main/ArtistX/AlbumY"]
            .contains("Main/ArtistX/AlbumY/CD1/01.T"));
    }

    #[test]
    fn test_multi_location_totals() {
        let main = TempDir::new().unwrap();
        let loc2 = TempDir::new().unwrap();
        touch_with_size(&main.path().join("A/B/01_instrumental.wav"), 1000);
        touch_with_size(&loc2.path().join("C/D/02_instrumental.wav"), 1500);

        let schema = schema_with(&[("instrumental.wav", "*_instrumental.wav", false)]);
        let mut locations = HashMap::new();
        locations.insert("Main".to_string(), main.path().to_path_buf());
        locations.insert("Loc2".to_string(), loc2.path().to_path_buf());

        let index = Indexer::new(&schema, &locations)
            .with_progress(false)
            .build()
            .unwrap();

        assert_eq!(index.tracks.len(), 2);
        assert_eq!(index.total_size, 2500);
        assert_eq!(index.stats_by_location["Main"].total_size, 1000);
        assert_eq!(index.stats_by_location["Main"].file_count, 1);
        assert_eq!(index.stats_by_location["Loc2"].total_size, 1500);
        assert_eq!(index.stats_by_location["Loc2"].track_count, 1);
    }

    #[test]
    fn test_unexpected_depth_files_are_skipped() {
        let root = TempDir::new().unwrap();
        touch_with_size(&root.path().join("stray_instrumental.mp3"), 10);
        touch_with_size(&root.path().join("Artist/stray_instrumental.mp3"), 10);
        touch_with_size(
            &root.path().join("Artist/Album/Extra/Deep/01_instrumental.mp3"),
            10,
        );
        touch_with_size(&root.path().join("Artist/Album/01_instrumental.mp3"), 10);

        let schema = schema_with(&[("instrumental.mp3", "*_instrumental.mp3", false)]);
        let locations = single_location(root.path());
        let index = Indexer::new(&schema, &locations)
            .with_progress(false)
            .build()
            .unwrap();

        assert_eq!(index.tracks.len(), 1);
        assert!(index.tracks.contains_key("Main/Artist/Album/01"));
    }

    #[test]
    fn test_numbered_sections_share_one_track() {
        let root = TempDir::new().unwrap();
        let album = root.path().join("Artist/Album");
        touch_with_size(&album.join("01.A_vocals_stretched_120bpm_section1.mp3"), 5);
        touch_with_size(&album.join("01.A_vocals_stretched_120bpm_section2.mp3"), 7);
        touch_with_size(&album.join("01.A_instrumental.mp3"), 11);

        let schema = schema_with(&[
            ("instrumental.mp3", "*_instrumental.mp3", false),
            (
                "vocals_stretched_120bpm_section*.mp3",
                "*_vocals_stretched_120bpm_section*.mp3",
                true,
            ),
        ]);
        let locations = single_location(root.path());
        let index = Indexer::new(&schema, &locations)
            .with_progress(false)
            .build()
            .unwrap();

        // the multi component keeps one entry in `files` but both sizes
        let track = &index.tracks["Main/Artist/Album/01.A"];
        assert_eq!(track.file_sizes.len(), 3);
        assert_eq!(index.total_size, 23);
    }

    #[test]
    fn test_longest_suffix_pattern_wins() {
        let root = TempDir::new().unwrap();
        touch_with_size(&root.path().join("Artist/Album/01.A.mir.json"), 9);

        let schema = schema_with(&[
            ("json", "*.json", false),
            ("mir.json", "*.mir.json", false),
        ]);
        let locations = single_location(root.path());
        let index = Indexer::new(&schema, &locations)
            .with_progress(false)
            .build()
            .unwrap();

        let track = &index.tracks["Main/Artist/Album/01.A"];
        assert!(track.files.contains_key("mir.json"));
        assert!(!track.files.contains_key("json"));
    }

    #[test]
    fn test_file_info_by_hash_is_deterministic() {
        let root = TempDir::new().unwrap();
        touch_with_size(&root.path().join("Artist/Album/01_instrumental.mp3"), 44);

        let schema = schema_with(&[("instrumental.mp3", "*_instrumental.mp3", false)]);
        let locations = single_location(root.path());
        let build = || {
            Indexer::new(&schema, &locations)
                .with_progress(false)
                .build()
                .unwrap()
        };

        let first = build();
        let second = build();
        assert_eq!(first.file_info_by_hash, second.file_info_by_hash);

        let symbolic = "Main/Artist/Album/01_instrumental.mp3";
        let info = first
            .get_file_info_by_hash(hash_symbolic_path(symbolic))
            .unwrap();
        assert_eq!(info.0, symbolic);
        assert_eq!(info.1, 44);
    }

    #[test]
    fn test_save_load_round_trip() {
        let root = TempDir::new().unwrap();
        touch_with_size(&root.path().join("Artist/Album/01_instrumental.mp3"), 17);
        touch_with_size(&root.path().join("Artist/Album/02_instrumental.mp3"), 19);

        let schema = schema_with(&[("instrumental.mp3", "*_instrumental.mp3", false)]);
        let locations = single_location(root.path());
        let index = Indexer::new(&schema, &locations)
            .with_progress(false)
            .build()
            .unwrap();

        let path = DatasetIndex::index_path(root.path());
        index.save(&path).unwrap();
        let loaded = DatasetIndex::load(&path).unwrap();

        assert_eq!(index.tracks, loaded.tracks);
        assert_eq!(index.file_info_by_hash, loaded.file_info_by_hash);
        assert_eq!(index.total_size, loaded.total_size);
        assert_eq!(index.version, loaded.version);

        // saving again rotates the previous snapshot to .bak
        index.save(&path).unwrap();
        assert!(path.with_extension("bak").exists());

        // readers fall back to the .bak when the primary is missing
        fs::remove_file(&path).unwrap();
        let from_backup = DatasetIndex::load(&path).unwrap();
        assert_eq!(from_backup.total_size, index.total_size);
    }

    #[test]
    fn test_search_by_artist_fuzzy() {
        let mut index = DatasetIndex::create();
        index
            .album_by_artist
            .insert("Radiohead".to_string(), BTreeSet::new());
        index
            .album_by_artist
            .insert("Portishead".to_string(), BTreeSet::new());

        assert_eq!(index.search_by_artist("radio", false, false), ["Radiohead"]);
        assert!(index.search_by_artist("radio", true, false).is_empty());
        assert!(index.search_by_artist("Radiohed", false, false).is_empty());
        assert_eq!(
            index.search_by_artist("Radiohed", false, true),
            ["Radiohead"]
        );
    }

    #[test]
    fn test_search_by_album_and_track() {
        let root = TempDir::new().unwrap();
        touch_with_size(&root.path().join("ArtistX/AlbumY/01.Song_instrumental.mp3"), 3);
        touch_with_size(&root.path().join("ArtistZ/Other/02.Tune_instrumental.mp3"), 3);

        let schema = schema_with(&[("instrumental.mp3", "*_instrumental.mp3", false)]);
        let locations = single_location(root.path());
        let index = Indexer::new(&schema, &locations)
            .with_progress(false)
            .build()
            .unwrap();

        assert_eq!(
            index.search_by_album("albumy", None),
            ["Main/ArtistX/AlbumY"]
        );
        assert!(index.search_by_album("albumy", Some("ArtistZ")).is_empty());

        let hits = index.search_by_track("tune", None, None, false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].base_name, "02.Tune");
        assert!(index
            .search_by_track("Tune", Some("ArtistX"), None, false)
            .is_empty());
        assert!(index.search_by_track("tune", None, None, true).is_empty());
    }

    #[test]
    fn test_file_sizes_match_disk() {
        let root = TempDir::new().unwrap();
        touch_with_size(&root.path().join("Artist/Album/01_instrumental.mp3"), 321);

        let schema = schema_with(&[("instrumental.mp3", "*_instrumental.mp3", false)]);
        let locations = single_location(root.path());
        let index = Indexer::new(&schema, &locations)
            .with_progress(false)
            .build()
            .unwrap();

        for track in index.tracks.values() {
            for symbolic in track.files.values() {
                let size = track.file_sizes[symbolic];
                let resolved =
                    crate::locations::resolve_symbolic_path(symbolic, &locations).unwrap();
                assert_eq!(resolved.metadata().unwrap().len(), size);
            }
        }
    }
}
