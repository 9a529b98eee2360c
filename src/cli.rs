// CLI module for argument parsing

use crate::domain::{AssetKind, GroupFilter};
use crate::fileops::{ExportMode, TransferOp};
use crate::raw::DecodeMode;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// RawPick - pair, preview and cull RAW+JPEG shoots
///
/// Groups camera files by base name, renders RAW previews and runs the bulk
/// clean-up and export steps of a culling session.
#[derive(Parser, Debug, Clone)]
#[command(name = "rawpick")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Group the photos of folders and files and print what was found
    Scan {
        /// Folders and individual files to import
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Only list groups matching this filter
        #[arg(short = 'f', long = "filter", value_enum, default_value = "all")]
        filter: GroupFilter,

        /// Print EXIF for each group
        #[arg(long = "exif", action = ArgAction::SetTrue)]
        exif: bool,

        /// Include hidden files (files starting with .)
        #[arg(long = "hidden", action = ArgAction::SetTrue)]
        show_hidden: bool,
    },

    /// Render RAW files to JPEG previews
    Decode {
        /// RAW files to decode
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Preview quality tier
        #[arg(short = 'm', long = "mode", value_enum, default_value = "full")]
        mode: DecodeMode,

        /// Folder the previews are written to
        #[arg(short = 'o', long = "output", default_value = ".")]
        output: PathBuf,
    },

    /// Move orphaned RAW or JPEG files of a folder to the trash
    CleanOrphans {
        /// Folder to clean
        directory: PathBuf,

        /// Which orphans to remove
        #[arg(short = 'k', long = "kind", value_enum)]
        kind: OrphanKind,

        /// Only report what would be removed
        #[arg(short = 'n', long = "dry-run", action = ArgAction::SetTrue)]
        dry_run: bool,
    },

    /// Export groups of a folder into another folder
    Export {
        /// Folder to export from
        directory: PathBuf,

        /// Existing destination folder
        destination: PathBuf,

        /// Which halves to export (defaults to the configured mode)
        #[arg(short = 'm', long = "mode", value_enum)]
        mode: Option<ExportMode>,

        /// Copy or move
        #[arg(long = "op", value_enum, default_value = "copy")]
        op: TransferOp,

        /// Group ids to export; every group when omitted
        #[arg(short = 'p', long = "pick")]
        picks: Vec<String>,
    },
}

/// Orphan kinds accepted by `clean-orphans`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrphanKind {
    /// RAW files without a JPEG
    Raw,
    /// JPEG files without a RAW
    Jpg,
}

impl From<OrphanKind> for AssetKind {
    fn from(kind: OrphanKind) -> Self {
        match kind {
            OrphanKind::Raw => AssetKind::Raw,
            OrphanKind::Jpg => AssetKind::Jpeg,
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Log filter implied by `-v`, if any
    pub fn verbosity_filter(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("rawpick=debug"),
            _ => Some("rawpick=trace"),
        }
    }

    /// Validate the arguments and return any errors
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Scan { paths, .. } => match paths.iter().find(|p| !p.exists()) {
                Some(missing) => Err(format!("Path does not exist: {}", missing.display())),
                None => Ok(()),
            },
            Command::CleanOrphans { directory, .. } => require_dir(directory, "Directory"),
            Command::Decode { files, output, .. } => {
                if let Some(missing) = files.iter().find(|f| !f.is_file()) {
                    return Err(format!("File does not exist: {}", missing.display()));
                }
                require_dir(output, "Output directory")
            }
            Command::Export {
                directory,
                destination,
                ..
            } => {
                require_dir(directory, "Directory")?;
                require_dir(destination, "Destination")?;
                if directory == destination {
                    return Err("Destination must differ from the source directory".to_string());
                }
                Ok(())
            }
        }
    }
}

fn require_dir(path: &Path, label: &str) -> Result<(), String> {
    if !path.exists() {
        return Err(format!("{} does not exist: {}", label, path.display()));
    }
    if !path.is_dir() {
        return Err(format!("{} is not a directory: {}", label, path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("rawpick").chain(args.iter().copied())).unwrap()
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_scan_defaults() {
            let args = parse(&["scan"]);
            assert_eq!(
                args.command,
                Command::Scan {
                    paths: vec![PathBuf::from(".")],
                    filter: GroupFilter::All,
                    exif: false,
                    show_hidden: false,
                }
            );
            assert_eq!(args.verbosity_filter(), None);
        }

        #[test]
        fn test_scan_with_filter_and_verbosity() {
            let args = parse(&["-vv", "scan", "/shoot", "--filter", "orphans", "--exif"]);
            assert!(matches!(
                args.command,
                Command::Scan {
                    filter: GroupFilter::Orphans,
                    exif: true,
                    ..
                }
            ));
            assert_eq!(args.verbosity_filter(), Some("rawpick=trace"));
        }

        #[test]
        fn test_decode_mode() {
            let args = parse(&["decode", "a.ARW", "b.NEF", "--mode", "thumbnail", "-o", "/out"]);
            match args.command {
                Command::Decode { files, mode, output } => {
                    assert_eq!(files.len(), 2);
                    assert_eq!(mode, DecodeMode::Thumbnail);
                    assert_eq!(output, PathBuf::from("/out"));
                }
                other => panic!("unexpected command {other:?}"),
            }
        }

        #[test]
        fn test_decode_requires_files() {
            assert!(Args::try_parse_from(["rawpick", "decode"]).is_err());
        }

        #[test]
        fn test_clean_orphans_requires_kind() {
            assert!(Args::try_parse_from(["rawpick", "clean-orphans", "/shoot"]).is_err());
            let args = parse(&["clean-orphans", "/shoot", "--kind", "jpg", "-n"]);
            assert!(matches!(
                args.command,
                Command::CleanOrphans {
                    kind: OrphanKind::Jpg,
                    dry_run: true,
                    ..
                }
            ));
        }

        #[test]
        fn test_export_options() {
            let args = parse(&[
                "export", "/shoot", "/out", "--mode", "raw", "--op", "move", "-p", "IMG_0001", "-p",
                "IMG_0002",
            ]);
            match args.command {
                Command::Export { mode, op, picks, .. } => {
                    assert_eq!(mode, Some(ExportMode::Raw));
                    assert_eq!(op, TransferOp::Move);
                    assert_eq!(picks, vec!["IMG_0001", "IMG_0002"]);
                }
                other => panic!("unexpected command {other:?}"),
            }
        }

        #[test]
        fn test_orphan_kind_conversion() {
            assert_eq!(AssetKind::from(OrphanKind::Raw), AssetKind::Raw);
            assert_eq!(AssetKind::from(OrphanKind::Jpg), AssetKind::Jpeg);
        }
    }

    mod validate_tests {
        use super::*;

        #[test]
        fn test_validate_nonexistent_directory() {
            let args = parse(&["scan", "/nonexistent/path/12345"]);
            let result = args.validate();
            assert!(result.unwrap_err().contains("does not exist"));
        }

        #[test]
        fn test_validate_decode_missing_file() {
            let temp_dir = TempDir::new().unwrap();
            let missing = temp_dir.path().join("gone.ARW");
            let args = parse(&["decode", missing.to_str().unwrap()]);
            assert!(args.validate().unwrap_err().contains("gone.ARW"));
        }

        #[test]
        fn test_validate_export_same_folder() {
            let temp_dir = TempDir::new().unwrap();
            let dir = temp_dir.path().to_str().unwrap();
            let args = parse(&["export", dir, dir]);
            assert!(args.validate().unwrap_err().contains("must differ"));
        }

        #[test]
        fn test_validate_success() {
            let source = TempDir::new().unwrap();
            let destination = TempDir::new().unwrap();
            let args = parse(&[
                "export",
                source.path().to_str().unwrap(),
                destination.path().to_str().unwrap(),
            ]);
            assert!(args.validate().is_ok());
        }
    }
}
