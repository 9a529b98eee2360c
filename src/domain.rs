use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub mod grouper;
pub mod library;
pub mod merge;

pub use grouper::group_assets;
pub use library::{GroupFilter, ImportOutcome, LibraryStatistics, PhotoLibrary};
pub use merge::{merge_import, MergeOutcome};

/// RAW container extensions recognised at import time (upper case).
pub const RAW_EXTENSIONS: [&str; 7] = ["ARW", "CR2", "NEF", "DNG", "ORF", "RAF", "SRW"];

/// JPEG extensions recognised at import time (upper case).
pub const JPEG_EXTENSIONS: [&str; 2] = ["JPG", "JPEG"];

/// Which slot of a [`PhotoGroup`] a file belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Jpeg,
    Raw,
}

impl AssetKind {
    /// Classifies an extension (case-insensitive). Returns `None` for anything
    /// outside the JPEG and RAW allow-lists.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_uppercase();
        if JPEG_EXTENSIONS.contains(&ext.as_str()) {
            Some(AssetKind::Jpeg)
        } else if RAW_EXTENSIONS.contains(&ext.as_str()) {
            Some(AssetKind::Raw)
        } else {
            None
        }
    }
}

/// A file as reported by the scanner, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    /// Extension without the leading dot, empty when the file has none
    pub extension: String,
    pub path: PathBuf,
    pub size: u64,
}

impl FileDescriptor {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();

        Self {
            name,
            extension,
            path,
            size,
        }
    }

    pub fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self::new(path, metadata.len()))
    }

    /// File name with the extension stripped; this is the grouping key.
    pub fn base_name(&self) -> Option<&str> {
        self.path.file_stem().and_then(|s| s.to_str())
    }
}

/// One half of a shoot. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFile {
    name: String,
    extension: String,
    path: PathBuf,
    size: u64,
    preview: Option<PathBuf>,
}

impl AssetFile {
    pub fn new(name: impl Into<String>, extension: &str, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            name: name.into(),
            extension: extension.to_uppercase(),
            path: path.into(),
            size,
            preview: None,
        }
    }

    /// Attaches an already-decoded preview image; the asset then no longer
    /// needs a RAW decode to be displayed.
    pub fn with_preview(mut self, preview: impl Into<PathBuf>) -> Self {
        self.preview = Some(preview.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn preview(&self) -> Option<&Path> {
        self.preview.as_deref()
    }
}

impl From<&FileDescriptor> for AssetFile {
    fn from(desc: &FileDescriptor) -> Self {
        AssetFile::new(desc.name.clone(), &desc.extension, desc.path.clone(), desc.size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupStatus {
    Complete,
    JpgOnly,
    RawOnly,
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GroupStatus::Complete => "COMPLETE",
            GroupStatus::JpgOnly => "JPG_ONLY",
            GroupStatus::RawOnly => "RAW_ONLY",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selection {
    #[default]
    Unmarked,
    Picked,
    Rejected,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Selection::Unmarked => "UNMARKED",
            Selection::Picked => "PICKED",
            Selection::Rejected => "REJECTED",
        };
        f.write_str(label)
    }
}

/// Camera metadata shown next to a group. Every field is optional because
/// cameras disagree about what they write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExifData {
    pub shutter_speed: Option<String>,
    pub aperture: Option<String>,
    pub iso: Option<String>,
    pub focal_length: Option<String>,
    pub date_time: Option<String>,
    pub model: Option<String>,
    pub lens: Option<String>,
}

/// A RAW and/or JPEG pair sharing a base filename.
///
/// The status is derived from which slots are filled, so it can never drift
/// out of sync, and the constructor refuses to build a group with no assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoGroup {
    id: String,
    jpg: Option<AssetFile>,
    raw: Option<AssetFile>,
    selection: Selection,
    exif: Option<ExifData>,
}

impl PhotoGroup {
    /// Builds an unmarked group. Returns `None` when both slots are empty.
    pub fn new(id: impl Into<String>, jpg: Option<AssetFile>, raw: Option<AssetFile>) -> Option<Self> {
        if jpg.is_none() && raw.is_none() {
            return None;
        }
        Some(Self {
            id: id.into(),
            jpg,
            raw,
            selection: Selection::Unmarked,
            exif: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn jpg(&self) -> Option<&AssetFile> {
        self.jpg.as_ref()
    }

    pub fn raw(&self) -> Option<&AssetFile> {
        self.raw.as_ref()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn exif(&self) -> Option<&ExifData> {
        self.exif.as_ref()
    }

    pub fn status(&self) -> GroupStatus {
        match (&self.jpg, &self.raw) {
            (Some(_), None) => GroupStatus::JpgOnly,
            (None, Some(_)) => GroupStatus::RawOnly,
            _ => GroupStatus::Complete,
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.status() != GroupStatus::Complete
    }

    /// Every asset the group carries, JPEG first.
    pub fn assets(&self) -> impl Iterator<Item = &AssetFile> {
        self.jpg.iter().chain(self.raw.iter())
    }

    pub fn asset(&self, kind: AssetKind) -> Option<&AssetFile> {
        match kind {
            AssetKind::Jpeg => self.jpg(),
            AssetKind::Raw => self.raw(),
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_exif(mut self, exif: Option<ExifData>) -> Self {
        self.exif = exif;
        self
    }

    pub(crate) fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    /// Returns a copy with the empty slot filled from `other`, keeping this
    /// group's id, selection and existing assets. `None` when this group is
    /// already complete or `other` lacks the missing half.
    pub fn completed_with(&self, other: &PhotoGroup) -> Option<PhotoGroup> {
        let (jpg, raw) = match self.status() {
            GroupStatus::Complete => return None,
            GroupStatus::JpgOnly => (self.jpg.clone(), Some(other.raw.clone()?)),
            GroupStatus::RawOnly => (Some(other.jpg.clone()?), self.raw.clone()),
        };

        Some(PhotoGroup {
            id: self.id.clone(),
            jpg,
            raw,
            selection: self.selection,
            exif: self.exif.clone().or_else(|| other.exif.clone()),
        })
    }
}
