//! Component schema - file-name patterns that classify files into components
//!
//! A component is a class of per-track companion files sharing a file-name
//! pattern (`*_instrumental.mp3`, `*.mir.json`, ...). The schema is
//! discovered from observed files and persisted as `.blackbird/schema.json`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{BlackbirdError, Result};
use crate::locations::BLACKBIRD_DIR;

/// File name of the persisted schema
pub const SCHEMA_FILENAME: &str = "schema.json";

/// Schema format version
pub const SCHEMA_VERSION: &str = "1.0";

/// A single component definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// File-name glob with a leading `*` (the track base) and an optional
    /// embedded `*` for numbered variants
    pub pattern: String,
    /// Whether one track may own several files of this component
    pub multiple: bool,
    #[serde(default)]
    pub description: String,
}

/// The component schema for a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub version: String,
    /// Ordered so discovery output and the saved file are deterministic
    pub components: BTreeMap<String, ComponentDefinition>,
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            components: BTreeMap::new(),
        }
    }

    /// Path of the schema file inside a dataset root
    pub fn schema_path(dataset_root: &Path) -> PathBuf {
        dataset_root.join(BLACKBIRD_DIR).join(SCHEMA_FILENAME)
    }

    /// Load a schema from a file
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| BlackbirdError::io(path, e))?;
        serde_json::from_str(&data).map_err(|e| {
            BlackbirdError::Config(format!("error decoding schema {}: {}", path.display(), e))
        })
    }

    /// Load the dataset schema, or an empty one if the file is missing
    pub fn load_or_default(dataset_root: &Path) -> Self {
        let path = Self::schema_path(dataset_root);
        if path.exists() {
            match Self::load(&path) {
                Ok(schema) => return schema,
                Err(e) => warn!("failed to load schema {}: {}", path.display(), e),
            }
        }
        Self::new()
    }

    /// Save the schema, creating `.blackbird/` if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BlackbirdError::io(parent, e))?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| BlackbirdError::Config(format!("error encoding schema: {}", e)))?;
        fs::write(path, data).map_err(|e| BlackbirdError::io(path, e))
    }

    /// Add a component. Re-adding the same name with the same pattern
    /// updates the `multiple` flag; the same pattern under another name is
    /// a collision.
    pub fn add_component(&mut self, name: &str, pattern: &str, multiple: bool) -> Result<()> {
        if pattern.is_empty() {
            return Err(BlackbirdError::Config("pattern cannot be empty".to_string()));
        }

        for (existing_name, existing) in &self.components {
            if existing.pattern == pattern && existing_name != name {
                return Err(BlackbirdError::Config(format!(
                    "pattern collision with existing component '{}': {}",
                    existing_name, pattern
                )));
            }
        }

        self.components.insert(
            name.to_string(),
            ComponentDefinition {
                pattern: pattern.to_string(),
                multiple,
                description: String::new(),
            },
        );
        Ok(())
    }

    /// Remove a component by name
    pub fn remove_component(&mut self, name: &str) -> Result<()> {
        if self.components.remove(name).is_none() {
            return Err(BlackbirdError::User(format!(
                "component '{}' not found in schema",
                name
            )));
        }
        Ok(())
    }

    /// Check the schema for pattern collisions
    pub fn validate(&self) -> Result<()> {
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        for (name, def) in &self.components {
            if let Some(other) = seen.insert(def.pattern.as_str(), name.as_str()) {
                return Err(BlackbirdError::Config(format!(
                    "pattern collision between components '{}' and '{}': {}",
                    name, other, def.pattern
                )));
            }
        }
        Ok(())
    }

    /// Suggest the closest component name for a typo, if any is similar
    pub fn closest_component(&self, name: &str) -> Option<&str> {
        self.components
            .keys()
            .map(|c| (c.as_str(), strsim::normalized_levenshtein(name, c)))
            .filter(|(_, score)| *score >= 0.6)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(c, _)| c)
    }
}

/// Compile a component glob into a regex matching the end of a file name.
///
/// `*` becomes `.*` and everything else is escaped literally.
pub(crate) fn pattern_to_regex(pattern: &str) -> Result<Regex> {
    let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
    let source = format!("{}$", escaped.join(".*"));
    Regex::new(&source)
        .map_err(|e| BlackbirdError::Config(format!("invalid pattern '{}': {}", pattern, e)))
}

/// The distinguishing suffix of a pattern: everything after its first `*`
pub(crate) fn pattern_suffix(pattern: &str) -> &str {
    match pattern.split_once('*') {
        Some((_, suffix)) => suffix,
        None => pattern,
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Per-component statistics gathered during discovery
#[derive(Debug, Clone, Default)]
pub struct ComponentStats {
    pub pattern: String,
    pub file_count: usize,
    pub unique_tracks: usize,
    /// tracks with this component / distinct base names seen
    pub track_coverage: f64,
    pub multiple: bool,
}

/// Aggregate statistics for a discovery run
#[derive(Debug, Clone, Default)]
pub struct DiscoveryStats {
    pub total_files: usize,
    pub base_names: usize,
    pub unmatched_files: usize,
    pub components: BTreeMap<String, ComponentStats>,
}

/// Derive the base name of a file heuristically.
///
/// `.mir.json` is a compound extension; otherwise the base is the part
/// before the first `_`, or before the last `.` when there is no
/// underscore. Returns `None` when nothing usable is left.
fn find_base_name(file_name: &str) -> Option<&str> {
    let base = if let Some(stripped) = file_name.strip_suffix(".mir.json") {
        stripped
    } else if let Some((head, _)) = file_name.split_once('_') {
        head
    } else {
        match file_name.rsplit_once('.') {
            Some((head, _)) => head,
            None => file_name,
        }
    };

    if base.is_empty() {
        None
    } else {
        Some(base)
    }
}

/// Postfix groups: canonical postfix -> base name -> relative file paths
type PostfixGroups = BTreeMap<String, BTreeMap<String, BTreeSet<String>>>;

/// Scan one directory tree, grouping files by base name and postfix
fn analyze_directory(
    dir: &Path,
    groups: &mut PostfixGroups,
    base_names: &mut BTreeSet<String>,
    unmatched: &mut BTreeSet<String>,
) -> Result<()> {
    if !dir.is_dir() {
        warn!("discovery folder does not exist: {}", dir.display());
        return Ok(());
    }

    // numbered sections: trailing digits right before the extension
    let numbered = Regex::new(r"(_.+?)(\d+)(\.[^.]+)$").expect("static regex");

    let walker = WalkDir::new(dir).into_iter().filter_entry(|e| {
        let name = e.file_name().to_string_lossy();
        !(name == BLACKBIRD_DIR || (e.depth() > 0 && name.starts_with('.')))
    });

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        let rel_path = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_string();

        let base = match find_base_name(&file_name) {
            Some(base) => base.to_string(),
            None => {
                unmatched.insert(rel_path);
                continue;
            }
        };

        let postfix = file_name[base.len()..].to_string();
        base_names.insert(base.clone());

        // Numbered variants collapse to one canonical postfix with the
        // trailing digits replaced by `*`.
        let canonical = match numbered.captures(&postfix) {
            Some(caps) => format!("{}*{}", &caps[1], &caps[3]),
            None => postfix,
        };

        groups
            .entry(canonical)
            .or_default()
            .entry(base)
            .or_default()
            .insert(rel_path);
    }

    Ok(())
}

/// Derive a component `(name, pattern)` from a canonical postfix
fn component_from_postfix(postfix: &str) -> Option<(String, String)> {
    if postfix.is_empty() {
        return None;
    }

    if let Some(rest) = postfix.strip_prefix('_') {
        let (base_part, ext) = match rest.split_once('.') {
            Some((base_part, ext)) => (base_part, Some(ext)),
            None => (rest, None),
        };

        // A raw postfix whose pre-extension tail still ends in digits is a
        // numbered family that was not collapsed yet.
        let trimmed = base_part.trim_end_matches(|c: char| c.is_ascii_digit());
        let (stem, star) = if trimmed.len() < base_part.len() {
            (trimmed, "*")
        } else {
            (base_part, "")
        };

        let (name, pattern) = match ext {
            Some(ext) => (
                format!("{}{}.{}", stem, star, ext),
                format!("*_{}{}.{}", stem, star, ext),
            ),
            None => (format!("{}{}", stem, star), format!("*_{}{}", stem, star)),
        };
        Some((name, pattern))
    } else {
        // leading-dot postfixes like `.mir.json`
        let name = postfix.trim_start_matches('.');
        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), format!("*{}", postfix)))
    }
}

/// Discover a schema by analyzing files under the given folders.
///
/// `folders` are paths relative to `root`; an empty slice analyzes the
/// whole tree. Running discovery twice over the same files yields the same
/// schema.
pub fn discover_schema(root: &Path, folders: &[String]) -> Result<(DatasetSchema, DiscoveryStats)> {
    let mut groups = PostfixGroups::new();
    let mut base_names = BTreeSet::new();
    let mut unmatched = BTreeSet::new();

    if folders.is_empty() {
        analyze_directory(root, &mut groups, &mut base_names, &mut unmatched)?;
    } else {
        for folder in folders {
            analyze_directory(&root.join(folder), &mut groups, &mut base_names, &mut unmatched)?;
        }
    }

    let mut schema = DatasetSchema::new();
    let mut stats = DiscoveryStats {
        total_files: groups
            .values()
            .map(|tracks| tracks.values().map(BTreeSet::len).sum::<usize>())
            .sum(),
        base_names: base_names.len(),
        unmatched_files: unmatched.len(),
        components: BTreeMap::new(),
    };

    for (postfix, tracks) in &groups {
        let Some((name, pattern)) = component_from_postfix(postfix) else {
            continue;
        };
        let multiple = pattern.matches('*').count() > 1;
        schema.add_component(&name, &pattern, multiple)?;

        let file_count = tracks.values().map(BTreeSet::len).sum();
        let unique_tracks = tracks.len();
        let track_coverage = if base_names.is_empty() {
            0.0
        } else {
            unique_tracks as f64 / base_names.len() as f64
        };

        stats.components.insert(
            name,
            ComponentStats {
                pattern,
                file_count,
                unique_tracks,
                track_coverage,
                multiple,
            },
        );
    }

    Ok((schema, stats))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Outcome of validating a schema against on-disk data
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

/// Regex for CD directory names
pub(crate) fn cd_dir_regex() -> Regex {
    Regex::new(r"^CD\d+$").expect("static regex")
}

/// Validate the `Artist/Album[/CDn]` directory structure under a root
pub fn validate_structure(root: &Path) -> ValidationResult {
    let mut result = ValidationResult::default();
    let cd_regex = cd_dir_regex();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != BLACKBIRD_DIR);

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_dir() || entry.depth() == 0 {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        match entry.depth() {
            1 | 2 => {}
            3 => {
                let name = entry.file_name().to_string_lossy();
                if !cd_regex.is_match(&name) {
                    result.add_error(format!(
                        "invalid CD directory format: {} (must be CD followed by digits)",
                        name
                    ));
                }
            }
            _ => result.add_error(format!("path too deep: {}", rel.display())),
        }
    }

    result
}

/// Validate a schema against on-disk data: pattern collisions, unmatched
/// files, and the single-file constraint for `multiple = false` components.
pub fn validate_against_data(schema: &DatasetSchema, root: &Path) -> ValidationResult {
    let mut result = validate_structure(root);

    if let Err(e) = schema.validate() {
        result.add_error(e.to_string());
        return result;
    }

    let compiled: Vec<(&str, &ComponentDefinition, Regex)> = schema
        .components
        .iter()
        .filter_map(|(name, def)| {
            pattern_to_regex(&def.pattern)
                .map(|re| (name.as_str(), def, re))
                .ok()
        })
        .collect();

    // base name -> component -> matched files
    let mut track_components: BTreeMap<String, BTreeMap<&str, Vec<String>>> = BTreeMap::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
        let name = e.file_name().to_string_lossy();
        !(name == BLACKBIRD_DIR || (e.depth() > 0 && name.starts_with('.')))
    });

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        let base = find_base_name(&file_name).unwrap_or(&file_name).to_string();

        let mut matched = false;
        for (name, _, regex) in &compiled {
            if regex.is_match(&file_name) {
                track_components
                    .entry(base.clone())
                    .or_default()
                    .entry(*name)
                    .or_default()
                    .push(file_name.clone());
                matched = true;
                break;
            }
        }

        if !matched {
            result.add_warning(format!("unmatched file: {}", entry.path().display()));
        }
    }

    for (base, components) in &track_components {
        for (name, def, _) in &compiled {
            if let Some(files) = components.get(name) {
                if !def.multiple && files.len() > 1 {
                    result.add_error(format!(
                        "component '{}' has multiple files for track '{}' \
                         but multiple files are not allowed: {}",
                        name,
                        base,
                        files.join(", ")
                    ));
                }
            }
        }
    }

    result
}
