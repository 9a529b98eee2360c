//! Import enumeration: folders and explicit file lists to [`FileDescriptor`]s

use crate::domain::{AssetKind, FileDescriptor};
use crate::error::{RawPickError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Options for folder scanning
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Include dot-files (camera cards often carry `._IMG_0001.JPG` sidecars)
    pub show_hidden: bool,
}

/// Lists the supported photo files directly inside `dir`, sorted by name.
pub fn scan_folder(dir: &Path) -> Result<Vec<FileDescriptor>> {
    scan_folder_with_options(dir, &ScanOptions::default())
}

pub fn scan_folder_with_options(dir: &Path, options: &ScanOptions) -> Result<Vec<FileDescriptor>> {
    if !dir.is_dir() {
        return Err(RawPickError::ScanError(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry_result in fs::read_dir(dir)? {
        // Skip entries that cannot be read (permission errors, etc.)
        let Ok(entry) = entry_result else {
            continue;
        };
        let path = entry.path();

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !options.show_hidden && file_name.starts_with('.') {
            continue;
        }

        if let Some(descriptor) = describe(&path) {
            files.push(descriptor);
        }
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(dir = %dir.display(), count = files.len(), "scanned folder");
    Ok(files)
}

/// Describes an explicit selection of files, keeping their order. Paths that
/// are not regular files or not a supported photo format are skipped.
pub fn scan_files<P: AsRef<Path>>(paths: &[P]) -> Vec<FileDescriptor> {
    paths.iter().filter_map(|p| describe(p.as_ref())).collect()
}

fn describe(path: &Path) -> Option<FileDescriptor> {
    let metadata = fs::metadata(path).ok()?;
    if !metadata.is_file() {
        trace!(path = %path.display(), "skipping non-file");
        return None;
    }

    let descriptor = FileDescriptor::new(PathBuf::from(path), metadata.len());
    if AssetKind::from_extension(&descriptor.extension).is_none() {
        trace!(path = %path.display(), "skipping unsupported file");
        return None;
    }
    Some(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str, bytes: usize) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, vec![0u8; bytes]).unwrap();
        path
    }

    mod folder_tests {
        use super::*;

        #[test]
        fn test_scan_keeps_photos_sorted_by_name() {
            let temp_dir = TempDir::new().unwrap();
            touch(&temp_dir, "IMG_0002.ARW", 30);
            touch(&temp_dir, "IMG_0001.JPG", 10);
            touch(&temp_dir, "IMG_0001.ARW", 20);
            touch(&temp_dir, "notes.txt", 5);

            let files = scan_folder(temp_dir.path()).unwrap();
            let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();

            assert_eq!(names, vec!["IMG_0001.ARW", "IMG_0001.JPG", "IMG_0002.ARW"]);
            assert_eq!(files[1].size, 10);
            assert_eq!(files[1].extension, "JPG");
        }

        #[test]
        fn test_scan_skips_subdirectories() {
            let temp_dir = TempDir::new().unwrap();
            fs::create_dir(temp_dir.path().join("nested.JPG")).unwrap();
            touch(&temp_dir, "A.NEF", 1);

            let files = scan_folder(temp_dir.path()).unwrap();
            assert_eq!(files.len(), 1);
            assert_eq!(files[0].name, "A.NEF");
        }

        #[test]
        fn test_scan_hidden_files() {
            let temp_dir = TempDir::new().unwrap();
            touch(&temp_dir, "._A.JPG", 1);
            touch(&temp_dir, "A.JPG", 1);

            assert_eq!(scan_folder(temp_dir.path()).unwrap().len(), 1);

            let options = ScanOptions { show_hidden: true };
            assert_eq!(scan_folder_with_options(temp_dir.path(), &options).unwrap().len(), 2);
        }

        #[test]
        fn test_scan_lowercase_extensions() {
            let temp_dir = TempDir::new().unwrap();
            touch(&temp_dir, "a.jpeg", 1);
            touch(&temp_dir, "a.dng", 1);

            assert_eq!(scan_folder(temp_dir.path()).unwrap().len(), 2);
        }

        #[test]
        fn test_scan_empty_folder() {
            let temp_dir = TempDir::new().unwrap();
            assert!(scan_folder(temp_dir.path()).unwrap().is_empty());
        }

        #[test]
        fn test_scan_rejects_non_directory() {
            let temp_dir = TempDir::new().unwrap();
            let file = touch(&temp_dir, "A.JPG", 1);

            assert!(matches!(scan_folder(&file), Err(RawPickError::ScanError(_))));
            assert!(matches!(
                scan_folder(&temp_dir.path().join("missing")),
                Err(RawPickError::ScanError(_))
            ));
        }
    }

    mod file_list_tests {
        use super::*;

        #[test]
        fn test_scan_files_keeps_order_and_skips_invalid() {
            let temp_dir = TempDir::new().unwrap();
            let b = touch(&temp_dir, "B.JPG", 2);
            let a = touch(&temp_dir, "A.CR2", 3);
            let txt = touch(&temp_dir, "C.txt", 1);
            let missing = temp_dir.path().join("D.JPG");

            let files = scan_files(&[b, txt, missing, a, temp_dir.path().to_path_buf()]);
            let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();

            assert_eq!(names, vec!["B.JPG", "A.CR2"]);
            assert_eq!(files[1].size, 3);
        }
    }
}
