//! Blackbird CLI - dataset management from the command line

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::info;

use blackbird::dataset::{Dataset, TrackFilter};
use blackbird::index::DatasetIndex;
use blackbird::locations::{LocationsManager, BLACKBIRD_DIR};
use blackbird::mover::{move_data, resume_move, MoveOptions};
use blackbird::operations::{load_operation_state, OperationType};
use blackbird::schema::{discover_schema, DatasetSchema};
use blackbird::sync::{clone_dataset, resume_sync, sync, SyncOptions, SyncStats};
use blackbird::utils::format_size;
use blackbird::webdav::{WebDavClient, WebDavConfig};

/// Blackbird - dataset manager for multi-component media datasets
#[derive(Parser, Debug)]
#[command(name = "blackbird")]
#[command(version = "2.0.0")]
#[command(about = "Manage large multi-component media datasets across locations and WebDAV mirrors")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clone a remote dataset into a fresh directory
    Clone {
        /// Remote URL (webdav://[user:pass@]host[:port][/root])
        source: String,
        /// Local destination directory
        destination: PathBuf,
        /// Comma-separated component names (default: all)
        #[arg(long, value_delimiter = ',')]
        components: Vec<String>,
        /// Comma-separated artist globs
        #[arg(long, value_delimiter = ',')]
        artists: Vec<String>,
        /// Only download tracks missing this component
        #[arg(long)]
        missing: Option<String>,
        /// Share of the sorted artist list to clone, in (0, 1]
        #[arg(long)]
        proportion: Option<f64>,
        /// Offset into the sorted artist list for --proportion
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Number of parallel download workers
        #[arg(long, default_value_t = 1)]
        parallel: usize,
        /// Location to download into
        #[arg(long, default_value = "Main")]
        target_location: String,
        /// Use HTTP/2 with prior knowledge
        #[arg(long)]
        http2: bool,
        /// Connection pool size
        #[arg(long, default_value_t = 10)]
        connection_pool: usize,
        /// Log a timing profile at the end
        #[arg(long)]
        profile: bool,
    },

    /// Sync a remote dataset into an existing local dataset
    Sync {
        source: String,
        destination: PathBuf,
        #[arg(long, value_delimiter = ',')]
        components: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        artists: Vec<String>,
        #[arg(long)]
        missing: Option<String>,
        #[arg(long)]
        proportion: Option<f64>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 1)]
        parallel: usize,
        #[arg(long, default_value = "Main")]
        target_location: String,
        #[arg(long)]
        http2: bool,
        #[arg(long, default_value_t = 10)]
        connection_pool: usize,
        #[arg(long)]
        profile: bool,
        /// Rebuild the local index after a successful sync
        #[arg(long)]
        force_reindex: bool,
    },

    /// Resume an interrupted sync or move from its state file
    Resume {
        state_file: PathBuf,
        #[arg(long, default_value = ".")]
        dataset_path: PathBuf,
        #[arg(long, default_value_t = 1)]
        parallel: usize,
    },

    /// Show statistics for a local dataset path or a remote URL
    Stats {
        /// Dataset path or webdav:// URL
        #[arg(default_value = ".")]
        target: String,
        /// Report tracks missing this component
        #[arg(long)]
        missing: Option<String>,
    },

    /// Find tracks by component presence and metadata
    FindTracks {
        path: PathBuf,
        /// Components every track must have
        #[arg(long, value_delimiter = ',')]
        has: Vec<String>,
        /// Components every track must lack
        #[arg(long, value_delimiter = ',')]
        missing: Vec<String>,
        #[arg(long)]
        artist: Option<String>,
        /// Symbolic album path (Location/Artist/Album)
        #[arg(long)]
        album: Option<String>,
    },

    /// Component schema operations
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },

    /// Rebuild the dataset index across all locations
    Reindex { path: PathBuf },

    /// Manage storage locations
    Location {
        #[command(subcommand)]
        command: LocationCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SchemaCommand {
    /// Derive component patterns from the files on disk
    Discover {
        path: PathBuf,
        /// Restrict analysis to these folders (relative to the root)
        #[arg(long, value_delimiter = ',')]
        folders: Vec<String>,
        /// Only analyze the first N artist directories
        #[arg(long)]
        num_artists: Option<usize>,
        /// Print the discovery result without saving the schema
        #[arg(long)]
        test_run: bool,
    },
    /// Print the schema of a local dataset or remote URL
    Show { target: String },
    /// Add a component pattern to the schema
    Add {
        path: PathBuf,
        name: String,
        pattern: String,
        /// Allow several files of this component per track
        #[arg(long)]
        multiple: bool,
    },
}

#[derive(Subcommand, Debug)]
enum LocationCommand {
    /// List configured locations
    List {
        #[arg(long, default_value = ".")]
        dataset_path: PathBuf,
    },
    /// Add a named location
    Add {
        name: String,
        path: PathBuf,
        #[arg(long, default_value = ".")]
        dataset_path: PathBuf,
    },
    /// Remove a location
    Remove {
        name: String,
        #[arg(long, default_value = ".")]
        dataset_path: PathBuf,
    },
    /// Move data between locations under a byte budget
    Balance {
        source: String,
        target: String,
        /// Gigabytes to move
        #[arg(long)]
        size: f64,
        #[arg(long)]
        dry_run: bool,
        #[arg(long, default_value = ".")]
        dataset_path: PathBuf,
    },
    /// Move specific folders between locations
    MoveFolders {
        #[arg(long)]
        source_location: String,
        target: String,
        /// Folder paths relative to the source location root
        #[arg(required = true)]
        folders: Vec<String>,
        #[arg(long)]
        dry_run: bool,
        #[arg(long, default_value = ".")]
        dataset_path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::new(format!("{},reqwest=warn,hyper=warn", log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    match cli.command {
        None => status_summary(),
        Some(Command::Clone {
            source,
            destination,
            components,
            artists,
            missing,
            proportion,
            offset,
            parallel,
            target_location,
            http2,
            connection_pool,
            profile,
        }) => {
            let opts = SyncOptions {
                components,
                artists,
                albums: Vec::new(),
                missing_component: missing,
                proportion,
                offset,
                resume: true,
                parallel,
                target_location,
                profile,
                show_progress: true,
            };
            let config = WebDavConfig {
                use_http2: http2,
                connection_pool_size: connection_pool,
            };
            let stats = clone_dataset(&source, &destination, &opts, &config)?;
            report_sync(&stats)
        }
        Some(Command::Sync {
            source,
            destination,
            components,
            artists,
            missing,
            proportion,
            offset,
            parallel,
            target_location,
            http2,
            connection_pool,
            profile,
            force_reindex,
        }) => {
            let mut dataset = Dataset::open(&destination)
                .with_context(|| format!("failed to open dataset at {}", destination.display()))?;
            let config = WebDavConfig {
                use_http2: http2,
                connection_pool_size: connection_pool,
            };
            let client = WebDavClient::with_config(&source, &config)?;
            let opts = SyncOptions {
                components,
                artists,
                albums: Vec::new(),
                missing_component: missing,
                proportion,
                offset,
                resume: true,
                parallel,
                target_location,
                profile,
                show_progress: true,
            };
            let stats = sync(&dataset, &client, &opts)?;
            if force_reindex && stats.failed_files == 0 {
                dataset.rebuild_index()?;
            }
            report_sync(&stats)
        }
        Some(Command::Resume {
            state_file,
            dataset_path,
            parallel,
        }) => {
            let state = load_operation_state(&state_file)?;
            let mut dataset = Dataset::open(&dataset_path)?;
            match state.operation_type {
                OperationType::Sync => {
                    let stats = resume_sync(&dataset, &state_file, parallel, true)?;
                    report_sync(&stats)
                }
                OperationType::Move => {
                    let stats = resume_move(&dataset, &state_file)?;
                    finish_move(
                        &mut dataset,
                        stats.moved_files,
                        stats.failed_files,
                        stats.total_bytes_moved,
                        false,
                    )
                }
            }
        }
        Some(Command::Stats { target, missing }) => stats_command(&target, missing.as_deref()),
        Some(Command::FindTracks {
            path,
            has,
            missing,
            artist,
            album,
        }) => {
            let dataset = Dataset::open(&path)?;
            let found = dataset.find_tracks(&TrackFilter {
                has,
                missing,
                artist,
                album,
            })?;
            for (track_path, files) in &found {
                println!("{} ({} files)", track_path, files.len());
                for file in files {
                    println!("  {}", file.display());
                }
            }
            println!("Found {} matching tracks", found.len());
            Ok(())
        }
        Some(Command::Schema { command }) => schema_command(command),
        Some(Command::Reindex { path }) => {
            let mut dataset = Dataset::open(&path)?;
            dataset.rebuild_index()?;
            let index = dataset.index();
            println!(
                "Indexed {} tracks, {} artists, {} total",
                index.tracks.len(),
                index.album_by_artist.len(),
                format_size(index.total_size)
            );
            Ok(())
        }
        Some(Command::Location { command }) => location_command(command),
    }
}

/// Print the per-file summary every transfer command ends with; exits
/// non-zero when anything failed
fn report_sync(stats: &SyncStats) -> Result<()> {
    println!(
        "Total: {} files ({}), downloaded: {} ({}), skipped: {}, failed: {}",
        stats.total_files,
        format_size(stats.total_size),
        stats.downloaded_files,
        format_size(stats.downloaded_size),
        stats.skipped_files,
        stats.failed_files
    );
    if stats.failed_files > 0 {
        bail!("{} file(s) failed; use 'resume' to retry", stats.failed_files);
    }
    Ok(())
}

/// Bare invocation inside a dataset directory prints the status summary
fn status_summary() -> Result<()> {
    let cwd = std::env::current_dir()?;
    if !cwd.join(BLACKBIRD_DIR).is_dir() {
        Cli::command().print_help()?;
        return Ok(());
    }

    println!("Blackbird dataset status ({}):", cwd.display());

    let mut locations = LocationsManager::new(&cwd)?;
    locations.load()?;
    println!("\nLocations:");
    let all = locations.all();
    let mut names: Vec<&String> = all.keys().collect();
    names.sort();
    for name in names {
        println!("  - {}: {}", name, all[name].display());
    }

    println!("\nIndex:");
    let index_path = DatasetIndex::index_path(&cwd);
    if !index_path.exists() {
        println!("  Index file not found. Run 'blackbird reindex .'");
        return Ok(());
    }
    let index = DatasetIndex::load(&index_path)?;
    println!("  Last updated: {}", index.last_updated);
    println!("  Statistics by location:");
    for (name, stats) in &index.stats_by_location {
        println!("    {}:", name);
        println!("      Files: {}", stats.file_count);
        println!("      Size: {}", format_size(stats.total_size));
        println!("      Tracks: {}", stats.track_count);
        println!("      Albums: {}", stats.album_count);
        println!("      Artists: {}", stats.artist_count);
    }
    Ok(())
}

/// Load the index either from a remote URL or a local dataset path
fn load_index_for(target: &str) -> Result<(DatasetIndex, Option<DatasetSchema>)> {
    if target.starts_with("webdav://") {
        let client = WebDavClient::new(target)?;
        let index = client.get_index()?;
        let schema = client.get_schema().ok();
        Ok((index, schema))
    } else {
        let path = Path::new(target);
        let index = DatasetIndex::load(&DatasetIndex::index_path(path))
            .with_context(|| format!("no index found at {}; run 'blackbird reindex'", target))?;
        let schema_path = DatasetSchema::schema_path(path);
        let schema = schema_path
            .exists()
            .then(|| DatasetSchema::load(&schema_path))
            .transpose()?;
        Ok((index, schema))
    }
}

fn stats_command(target: &str, missing: Option<&str>) -> Result<()> {
    let (index, schema) = load_index_for(target)?;

    println!("Tracks: {}", index.tracks.len());
    println!("Artists: {}", index.album_by_artist.len());
    let album_count: usize = index.album_by_artist.values().map(|a| a.len()).sum();
    println!("Albums: {}", album_count);
    println!("Total size: {}", format_size(index.total_size));

    if let Some(schema) = &schema {
        println!("\nComponents:");
        for (name, def) in &schema.components {
            let count = index
                .tracks
                .values()
                .filter(|t| t.files.contains_key(name))
                .count();
            println!(
                "  {} ({}): {} tracks{}",
                name,
                def.pattern,
                count,
                if def.multiple { ", multiple" } else { "" }
            );
        }
    }

    if let Some(component) = missing {
        let lacking: Vec<&String> = index
            .tracks
            .values()
            .filter(|t| !t.files.contains_key(component))
            .map(|t| &t.track_path)
            .collect();
        println!(
            "\nTracks missing component '{}': {}",
            component,
            lacking.len()
        );
        for track_path in lacking.iter().take(10) {
            println!("  {}", track_path);
        }
        if lacking.len() > 10 {
            println!("  ... and {} more", lacking.len() - 10);
        }
    }

    Ok(())
}

fn schema_command(command: SchemaCommand) -> Result<()> {
    match command {
        SchemaCommand::Discover {
            path,
            mut folders,
            num_artists,
            test_run,
        } => {
            if folders.is_empty() {
                if let Some(limit) = num_artists {
                    folders = first_artist_dirs(&path, limit)?;
                    info!("analyzing {} artist directories", folders.len());
                }
            }

            let (schema, stats) = discover_schema(&path, &folders)?;

            println!(
                "Analyzed {} files across {} base names ({} unmatched)",
                stats.total_files, stats.base_names, stats.unmatched_files
            );
            println!("\nDiscovered components:");
            for (name, component) in &stats.components {
                println!(
                    "  {}: pattern {}, {} files, {} tracks, coverage {:.0}%{}",
                    name,
                    component.pattern,
                    component.file_count,
                    component.unique_tracks,
                    component.track_coverage * 100.0,
                    if component.multiple { ", multiple" } else { "" }
                );
            }

            if test_run {
                println!("\nTest run; schema not saved.");
            } else {
                let schema_path = DatasetSchema::schema_path(&path);
                schema.save(&schema_path)?;
                println!("\nSchema saved to {}", schema_path.display());
            }
            Ok(())
        }
        SchemaCommand::Show { target } => {
            let schema = if target.starts_with("webdav://") {
                WebDavClient::new(&target)?.get_schema()?
            } else {
                DatasetSchema::load(&DatasetSchema::schema_path(Path::new(&target)))?
            };
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        SchemaCommand::Add {
            path,
            name,
            pattern,
            multiple,
        } => {
            let mut schema = DatasetSchema::load_or_default(&path);
            schema.add_component(&name, &pattern, multiple)?;
            schema.validate()?;
            schema.save(&DatasetSchema::schema_path(&path))?;
            println!("Component '{}' added with pattern '{}'", name, pattern);
            Ok(())
        }
    }
}

/// The first `limit` artist directories under the root, sorted by name
fn first_artist_dirs(root: &Path, limit: usize) -> Result<Vec<String>> {
    let mut dirs: Vec<String> = std::fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| !name.starts_with('.'))
        .collect();
    dirs.sort();
    dirs.truncate(limit);
    Ok(dirs)
}

fn location_command(command: LocationCommand) -> Result<()> {
    match command {
        LocationCommand::List { dataset_path } => {
            let mut locations = LocationsManager::new(&dataset_path)?;
            locations.load()?;
            let all = locations.all();
            let mut names: Vec<&String> = all.keys().collect();
            names.sort();
            for name in names {
                println!("{}: {}", name, all[name].display());
            }
            Ok(())
        }
        LocationCommand::Add {
            name,
            path,
            dataset_path,
        } => {
            let mut locations = LocationsManager::new(&dataset_path)?;
            locations.load()?;
            locations.add(&name, &path)?;
            locations.save()?;
            println!("Location '{}' added", name);
            Ok(())
        }
        LocationCommand::Remove { name, dataset_path } => {
            let mut locations = LocationsManager::new(&dataset_path)?;
            locations.load()?;
            locations.remove(&name)?;
            locations.save()?;
            println!("Location '{}' removed", name);
            Ok(())
        }
        LocationCommand::Balance {
            source,
            target,
            size,
            dry_run,
            dataset_path,
        } => {
            let mut dataset = Dataset::open(&dataset_path)?;
            let stats = move_data(
                &dataset,
                &source,
                &target,
                &MoveOptions {
                    size_limit_gb: Some(size),
                    specific_folders: Vec::new(),
                    dry_run,
                },
            )?;
            finish_move(&mut dataset, stats.moved_files, stats.failed_files, stats.total_bytes_moved, dry_run)
        }
        LocationCommand::MoveFolders {
            source_location,
            target,
            folders,
            dry_run,
            dataset_path,
        } => {
            let mut dataset = Dataset::open(&dataset_path)?;
            let stats = move_data(
                &dataset,
                &source_location,
                &target,
                &MoveOptions {
                    size_limit_gb: None,
                    specific_folders: folders,
                    dry_run,
                },
            )?;
            finish_move(&mut dataset, stats.moved_files, stats.failed_files, stats.total_bytes_moved, dry_run)
        }
    }
}

/// Report a move and rebuild the index when files actually moved
fn finish_move(
    dataset: &mut Dataset,
    moved: usize,
    failed: usize,
    bytes: u64,
    dry_run: bool,
) -> Result<()> {
    println!(
        "Moved: {} files ({}), failed: {}",
        moved,
        format_size(bytes),
        failed
    );
    if !dry_run && moved > 0 {
        dataset.rebuild_index()?;
    }
    if failed > 0 {
        bail!("{} file(s) failed to move; use 'resume' to retry", failed);
    }
    Ok(())
}
