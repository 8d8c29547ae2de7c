//! Storage locations - the `name -> absolute directory` map behind symbolic paths
//!
//! A dataset can be spread over several storage roots ("locations"). Every
//! indexed file is addressed by a symbolic path `LocationName/rel/path`,
//! which stays valid when a location is remounted somewhere else.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{BlackbirdError, Result};

/// Name of the location every dataset starts with
pub const DEFAULT_LOCATION: &str = "Main";

/// Directory holding all dataset metadata
pub const BLACKBIRD_DIR: &str = ".blackbird";

/// File name of the persisted locations map
pub const LOCATIONS_FILENAME: &str = "locations.json";

/// Manages the locations defined in `.blackbird/locations.json`
#[derive(Debug, Clone)]
pub struct LocationsManager {
    dataset_root: PathBuf,
    locations: HashMap<String, PathBuf>,
}

impl LocationsManager {
    /// Create a manager rooted at an existing dataset directory
    pub fn new(dataset_root: &Path) -> Result<Self> {
        if !dataset_root.is_dir() {
            return Err(BlackbirdError::Config(format!(
                "dataset root '{}' is not a directory",
                dataset_root.display()
            )));
        }
        let dataset_root = fs::canonicalize(dataset_root)
            .map_err(|e| BlackbirdError::io(dataset_root, e))?;

        Ok(Self {
            dataset_root,
            locations: HashMap::new(),
        })
    }

    /// Absolute path of the locations configuration file
    pub fn locations_file_path(&self) -> PathBuf {
        self.dataset_root.join(BLACKBIRD_DIR).join(LOCATIONS_FILENAME)
    }

    /// Absolute path of the `.blackbird` metadata directory
    pub fn blackbird_dir(&self) -> PathBuf {
        self.dataset_root.join(BLACKBIRD_DIR)
    }

    /// The canonicalized dataset root
    pub fn dataset_root(&self) -> &Path {
        &self.dataset_root
    }

    /// Load locations from disk.
    ///
    /// A missing or empty file yields `{Main: dataset_root}` in memory
    /// without writing anything. A file that exists but does not contain a
    /// JSON object of non-empty string keys to string values is an error.
    pub fn load(&mut self) -> Result<&HashMap<String, PathBuf>> {
        let file_path = self.locations_file_path();
        let mut loaded: Vec<(String, String)> = Vec::new();

        if file_path.exists() {
            let data = fs::read_to_string(&file_path)
                .map_err(|e| BlackbirdError::io(&file_path, e))?;
            let value: serde_json::Value = serde_json::from_str(&data).map_err(|e| {
                BlackbirdError::Config(format!(
                    "error decoding JSON from {}: {}",
                    file_path.display(),
                    e
                ))
            })?;
            let object = value.as_object().ok_or_else(|| {
                BlackbirdError::Config(format!(
                    "invalid format in {}: expected a JSON object",
                    file_path.display()
                ))
            })?;

            for (name, path) in object {
                if name.is_empty() {
                    return Err(BlackbirdError::Config(format!(
                        "invalid location name in {}: names must be non-empty",
                        file_path.display()
                    )));
                }
                let path_str = path.as_str().ok_or_else(|| {
                    BlackbirdError::Config(format!(
                        "invalid path value for location '{}' in {}: paths must be strings",
                        name,
                        file_path.display()
                    ))
                })?;
                loaded.push((name.clone(), path_str.to_string()));
            }
        }

        if loaded.is_empty() {
            info!(
                "locations file not found or empty at {}; using default '{}' -> {}",
                file_path.display(),
                DEFAULT_LOCATION,
                self.dataset_root.display()
            );
            loaded.push((
                DEFAULT_LOCATION.to_string(),
                self.dataset_root.display().to_string(),
            ));
        }

        // Canonicalize where possible; nonexistent paths load permissively
        // and are validated when they are actually used.
        let mut validated = HashMap::new();
        for (name, path_str) in loaded {
            let path = PathBuf::from(&path_str);
            let resolved = fs::canonicalize(&path).unwrap_or(path);
            validated.insert(name, resolved);
        }

        self.locations = validated;
        Ok(&self.locations)
    }

    /// Persist the current map, creating `.blackbird/` if needed
    pub fn save(&self) -> Result<()> {
        if self.locations.is_empty() {
            return Err(BlackbirdError::Config(
                "cannot save empty locations; load or add locations first".to_string(),
            ));
        }

        let file_path = self.locations_file_path();
        let dir = self.blackbird_dir();
        fs::create_dir_all(&dir).map_err(|e| BlackbirdError::io(&dir, e))?;

        // BTreeMap keeps the file stable across saves
        let to_save: std::collections::BTreeMap<&str, String> = self
            .locations
            .iter()
            .map(|(name, path)| (name.as_str(), path.display().to_string()))
            .collect();
        let data = serde_json::to_string_pretty(&to_save)
            .map_err(|e| BlackbirdError::Config(format!("error encoding locations: {}", e)))?;
        fs::write(&file_path, data).map_err(|e| BlackbirdError::io(&file_path, e))?;

        Ok(())
    }

    /// Add a new location in memory. Does not save automatically.
    pub fn add(&mut self, name: &str, path: &Path) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BlackbirdError::Config(
                "location name cannot be empty".to_string(),
            ));
        }
        if self.locations.contains_key(name) {
            return Err(BlackbirdError::Config(format!(
                "location name '{}' already exists",
                name
            )));
        }

        let resolved = fs::canonicalize(path).map_err(|e| BlackbirdError::io(path, e))?;
        if !resolved.is_dir() {
            return Err(BlackbirdError::Config(format!(
                "path '{}' is not a directory",
                resolved.display()
            )));
        }

        info!("location '{}' added with path '{}'", name, resolved.display());
        self.locations.insert(name.to_string(), resolved);
        Ok(())
    }

    /// Remove a location in memory. Does not save automatically.
    ///
    /// The default location cannot be removed while it is the only one.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        if !self.locations.contains_key(name) {
            return Err(BlackbirdError::UnknownLocation(name.to_string()));
        }
        if name == DEFAULT_LOCATION && self.locations.len() == 1 {
            return Err(BlackbirdError::Config(format!(
                "cannot remove the default location '{}' when it is the only location",
                DEFAULT_LOCATION
            )));
        }

        self.locations.remove(name);
        info!("location '{}' removed", name);
        Ok(())
    }

    /// Absolute path of a named location
    pub fn get(&self, name: &str) -> Result<&Path> {
        self.locations
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| BlackbirdError::UnknownLocation(name.to_string()))
    }

    /// Copy of the full map
    pub fn all(&self) -> HashMap<String, PathBuf> {
        self.locations.clone()
    }

    /// Whether a location is configured
    pub fn contains(&self, name: &str) -> bool {
        self.locations.contains_key(name)
    }
}

/// Resolve a symbolic path `Location/rel/path` to an absolute path.
///
/// The result is a lexical join of the location root and the relative
/// part; it is not required to exist.
pub fn resolve_symbolic_path(
    symbolic: &str,
    locations: &HashMap<String, PathBuf>,
) -> Result<PathBuf> {
    if symbolic.is_empty() {
        return Err(BlackbirdError::SymbolicPath {
            path: symbolic.to_string(),
            reason: "path is empty".to_string(),
        });
    }

    let (name, relative) = symbolic.split_once('/').ok_or_else(|| {
        BlackbirdError::SymbolicPath {
            path: symbolic.to_string(),
            reason: "expected 'LocationName/rest/of/path'".to_string(),
        }
    })?;

    if name.is_empty() {
        return Err(BlackbirdError::SymbolicPath {
            path: symbolic.to_string(),
            reason: "empty location name".to_string(),
        });
    }
    if relative.is_empty() || relative.starts_with('/') || relative.ends_with('/') {
        return Err(BlackbirdError::SymbolicPath {
            path: symbolic.to_string(),
            reason: format!("invalid or directory-like relative part: '{}'", relative),
        });
    }

    let base = locations
        .get(name)
        .ok_or_else(|| BlackbirdError::UnknownLocation(name.to_string()))?;

    Ok(base.join(relative))
}
