//! Dataset facade - composes locations, schema and index
//!
//! The `Dataset` owns exactly one locations manager, one schema and one
//! index, and exposes the query/analyze/rebuild operations the CLI and the
//! transfer engines are built on.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::{BlackbirdError, Result};
use crate::index::{DatasetIndex, Indexer};
use crate::locations::{resolve_symbolic_path, LocationsManager};
use crate::schema::DatasetSchema;

/// Filters for `find_tracks`
#[derive(Debug, Clone, Default)]
pub struct TrackFilter {
    /// Components every matching track must have
    pub has: Vec<String>,
    /// Components every matching track must lack
    pub missing: Vec<String>,
    pub artist: Option<String>,
    /// Symbolic album path (`Location/Artist/Album`)
    pub album: Option<String>,
}

/// Per-component usage numbers from `analyze`
#[derive(Debug, Clone, Default)]
pub struct ComponentUsage {
    pub count: u64,
    pub size: u64,
}

/// Aggregated dataset statistics
#[derive(Debug, Clone, Default)]
pub struct DatasetAnalysis {
    pub total_size: u64,
    pub total_tracks: usize,
    /// Tracks owning every component the schema defines
    pub complete_tracks: usize,
    pub components: BTreeMap<String, ComponentUsage>,
    pub tracks_by_artist: BTreeMap<String, u64>,
}

/// Main interface for dataset operations
pub struct Dataset {
    path: PathBuf,
    locations: LocationsManager,
    schema: DatasetSchema,
    index: DatasetIndex,
}

impl Dataset {
    /// Open a dataset: load locations and schema, then load the persisted
    /// index or build a fresh one
    pub fn open(path: &Path) -> Result<Self> {
        let mut locations = LocationsManager::new(path)?;
        locations.load()?;

        let schema = DatasetSchema::load_or_default(locations.dataset_root());

        let index_path = DatasetIndex::index_path(locations.dataset_root());
        let index = if index_path.exists() {
            match DatasetIndex::load(&index_path) {
                Ok(index) => index,
                Err(e) => {
                    warn!(
                        "failed to load existing index at {}: {}; rebuilding",
                        index_path.display(),
                        e
                    );
                    Self::build_and_save(&schema, &locations)?
                }
            }
        } else {
            Self::build_and_save(&schema, &locations)?
        };

        Ok(Self {
            path: locations.dataset_root().to_path_buf(),
            locations,
            schema,
            index,
        })
    }

    fn build_and_save(schema: &DatasetSchema, locations: &LocationsManager) -> Result<DatasetIndex> {
        if schema.components.is_empty() {
            warn!("no components defined in schema; index will likely be incomplete");
        }
        let all = locations.all();
        let index = Indexer::new(schema, &all).with_progress(false).build()?;
        index.save(&DatasetIndex::index_path(locations.dataset_root()))?;
        Ok(index)
    }

    /// Force a rebuild of the index across all locations
    pub fn rebuild_index(&mut self) -> Result<()> {
        info!("rebuilding dataset index across all locations...");
        let all = self.locations.all();
        let index = Indexer::new(&self.schema, &all).build()?;
        index.save(&DatasetIndex::index_path(&self.path))?;
        info!(
            "index rebuilt: {} tracks, {} artists",
            index.tracks.len(),
            index.album_by_artist.len()
        );
        self.index = index;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn blackbird_dir(&self) -> PathBuf {
        self.locations.blackbird_dir()
    }

    pub fn locations(&self) -> &LocationsManager {
        &self.locations
    }

    pub fn locations_mut(&mut self) -> &mut LocationsManager {
        &mut self.locations
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    pub fn index(&self) -> &DatasetIndex {
        &self.index
    }

    /// Resolve a symbolic path through the configured locations
    pub fn resolve_path(&self, symbolic: &str) -> Result<PathBuf> {
        resolve_symbolic_path(symbolic, &self.locations.all())
    }

    fn check_known_components(&self, requested: &[String]) -> Result<()> {
        for name in requested {
            if !self.schema.components.contains_key(name) {
                let suggestion = self
                    .schema
                    .closest_component(name)
                    .map(|close| format!(" Did you mean '{}'?", close))
                    .unwrap_or_default();
                return Err(BlackbirdError::User(format!(
                    "unknown component '{}'.{}",
                    name, suggestion
                )));
            }
        }
        Ok(())
    }

    /// Find tracks by component presence and metadata.
    ///
    /// Returns symbolic track paths mapped to resolved absolute file
    /// paths. Unresolvable paths are logged and skipped; a track with no
    /// resolvable file is dropped.
    pub fn find_tracks(&self, filter: &TrackFilter) -> Result<BTreeMap<String, Vec<PathBuf>>> {
        self.check_known_components(&filter.has)?;
        self.check_known_components(&filter.missing)?;

        let locations = self.locations.all();
        let mut matching = BTreeMap::new();

        let candidates = self.index.search_by_track(
            "",
            filter.artist.as_deref(),
            filter.album.as_deref(),
            false,
        );

        for track in candidates {
            let has_all = filter.has.iter().all(|c| track.files.contains_key(c));
            let missing_all = filter.missing.iter().all(|c| !track.files.contains_key(c));
            if !has_all || !missing_all {
                continue;
            }

            let mut resolved = Vec::new();
            for symbolic in track.files.values() {
                match resolve_symbolic_path(symbolic, &locations) {
                    Ok(path) => resolved.push(path),
                    Err(e) => error!(
                        "error resolving path '{}' for track '{}': {}",
                        symbolic, track.track_path, e
                    ),
                }
            }

            if resolved.is_empty() {
                warn!(
                    "skipping track '{}': no file paths could be resolved",
                    track.track_path
                );
                continue;
            }
            matching.insert(track.track_path.clone(), resolved);
        }

        Ok(matching)
    }

    /// Aggregate component, artist and completeness statistics from the
    /// index
    pub fn analyze(&self) -> DatasetAnalysis {
        let mut analysis = DatasetAnalysis {
            total_size: self.index.total_size,
            total_tracks: self.index.tracks.len(),
            ..Default::default()
        };

        let all_components: std::collections::BTreeSet<&String> =
            self.schema.components.keys().collect();

        for track in self.index.tracks.values() {
            for (component, symbolic) in &track.files {
                let usage = analysis.components.entry(component.clone()).or_default();
                usage.count += 1;
                match track.file_sizes.get(symbolic) {
                    Some(size) => usage.size += size,
                    None => warn!(
                        "size missing for symbolic path '{}' in track '{}'",
                        symbolic, track.track_path
                    ),
                }
            }

            *analysis
                .tracks_by_artist
                .entry(track.artist.clone())
                .or_default() += 1;

            let track_components: std::collections::BTreeSet<&String> =
                track.files.keys().collect();
            if !all_components.is_empty() && track_components == all_components {
                analysis.complete_tracks += 1;
            }
        }

        analysis
    }
}
