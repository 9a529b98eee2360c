use rawpick::cli::{Args, Command};
use rawpick::config::UserConfig;
use rawpick::domain::{AssetKind, GroupFilter, PhotoLibrary, Selection};
use rawpick::fileops::{ExportRequest, SystemFileOps};
use rawpick::raw::{DecodeCache, DecodeMode, RawDecodeEngine};
use rawpick::scan::{scan_files, scan_folder_with_options, ScanOptions};
use rawpick::{FileDescriptor, PhotoGroup, Result};

use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args = Args::parse_args();

    // Load user configuration
    let config = UserConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load user config: {}", e);
        UserConfig::default()
    });

    let fallback = args
        .verbosity_filter()
        .map(str::to_string)
        .unwrap_or_else(|| config.log_filter.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .init();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(args.command, &config).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command, config: &UserConfig) -> Result<()> {
    match command {
        Command::Scan {
            paths,
            filter,
            exif,
            show_hidden,
        } => scan(&paths, filter, exif, show_hidden),
        Command::Decode { files, mode, output } => decode(files, mode, &output, config).await,
        Command::CleanOrphans {
            directory,
            kind,
            dry_run,
        } => clean_orphans(&directory, kind.into(), dry_run),
        Command::Export {
            directory,
            destination,
            mode,
            op,
            picks,
        } => {
            let request = ExportRequest {
                mode: mode.unwrap_or(config.default_export_mode),
                op,
                destination,
            };
            export(&directory, &request, &picks)
        }
    }
}

fn load_library(directory: &Path, show_hidden: bool) -> Result<PhotoLibrary> {
    let files: Vec<FileDescriptor> = scan_folder_with_options(directory, &ScanOptions { show_hidden })?;
    let mut library = PhotoLibrary::new();
    library.import_files(&files);
    Ok(library)
}

/// Imports each folder as its own batch, then loose files as one more batch,
/// the way repeated imports accumulate in a session.
fn scan(paths: &[PathBuf], filter: GroupFilter, exif: bool, show_hidden: bool) -> Result<()> {
    let options = ScanOptions { show_hidden };
    let (folders, files): (Vec<&PathBuf>, Vec<&PathBuf>) = paths.iter().partition(|p| p.is_dir());

    let mut library = PhotoLibrary::new();
    let mut batches = Vec::new();
    for folder in folders {
        batches.push(scan_folder_with_options(folder, &options)?);
    }
    if !files.is_empty() {
        batches.push(scan_files(&files));
    }
    for batch in batches {
        let outcome = library.import_files(&batch);
        if outcome.duplicates + outcome.partial_duplicates > 0 {
            println!(
                "Skipped {} already imported groups",
                outcome.duplicates + outcome.partial_duplicates
            );
        }
    }
    library.set_filter(filter);

    for group in library.filtered() {
        println!("{:<24} {:<9} {}", group.id(), group.status().to_string(), describe_assets(group));
        if exif {
            if let Some(data) = group.exif() {
                let fields = [
                    &data.model,
                    &data.lens,
                    &data.focal_length,
                    &data.aperture,
                    &data.shutter_speed,
                    &data.iso,
                    &data.date_time,
                ];
                let line: Vec<&str> = fields.iter().filter_map(|f| f.as_deref()).collect();
                println!("    {}", line.join("  "));
            }
        }
    }

    let stats = library.statistics();
    println!(
        "\n{} groups: {} complete, {} orphans ({} RAW only, {} JPEG only)",
        stats.total,
        stats.total - stats.orphans,
        stats.orphans,
        stats.orphan_raw,
        stats.orphan_jpg
    );
    Ok(())
}

fn describe_assets(group: &PhotoGroup) -> String {
    group
        .assets()
        .map(|a| format!("{} ({})", a.name(), format_size(a.size())))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn decode(files: Vec<PathBuf>, mode: DecodeMode, output: &Path, config: &UserConfig) -> Result<()> {
    let cache = DecodeCache::new(RawDecodeEngine::with_rawloader(config.engine_settings()));

    // Same-path duplicates on the command line share one decode
    let lookups: Vec<_> = files
        .iter()
        .map(|path| (path.clone(), cache.get(path, mode)))
        .collect();

    let mut failures = 0;
    for (path, lookup) in lookups {
        match lookup.resolve().await {
            Ok(image) => {
                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("preview");
                let suffix = match mode {
                    DecodeMode::Thumbnail => "thumb",
                    DecodeMode::Full => "full",
                };
                let target = output.join(format!("{}.{}.jpg", stem, suffix));
                tokio::fs::write(&target, &image.jpeg).await?;
                println!(
                    "{} -> {} ({}x{}, {})",
                    path.display(),
                    target.display(),
                    image.width,
                    image.height,
                    format_size(image.byte_len() as u64)
                );
            }
            Err(e) => {
                failures += 1;
                warn!(path = %path.display(), error = %e, "decode failed");
                eprintln!("{}: {}", path.display(), e);
            }
        }
    }

    if failures > 0 {
        return Err(rawpick::RawPickError::FileOperation(format!(
            "{} of {} files failed to decode",
            failures,
            files.len()
        )));
    }
    Ok(())
}

fn clean_orphans(directory: &Path, kind: AssetKind, dry_run: bool) -> Result<()> {
    let mut library = load_library(directory, false)?;

    if dry_run {
        let orphans: Vec<&PhotoGroup> = library
            .groups()
            .iter()
            .filter(|g| g.is_orphan() && g.asset(kind).is_some())
            .collect();
        println!("[DRY RUN] No files will be moved to trash");
        for group in &orphans {
            println!("   would trash {}", describe_assets(group));
        }
        println!("   {} files", orphans.len());
        return Ok(());
    }

    let trashed = library.delete_orphans(kind, &SystemFileOps)?;
    println!("Moved {} files to trash", trashed);
    Ok(())
}

fn export(directory: &Path, request: &ExportRequest, picks: &[String]) -> Result<()> {
    let mut library = load_library(directory, false)?;

    let ids: Vec<String> = if picks.is_empty() {
        library.groups().iter().map(|g| g.id().to_string()).collect()
    } else {
        picks.to_vec()
    };
    for id in &ids {
        library.set_selection(id, Selection::Picked)?;
    }

    let exported = library.export_picked(request, &SystemFileOps)?;
    println!("Exported {} files to {}", exported, request.destination.display());
    Ok(())
}

/// Formats a byte count for display
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
