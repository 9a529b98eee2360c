use super::{AssetFile, AssetKind, FileDescriptor, PhotoGroup};
use std::collections::HashMap;
use tracing::{debug, trace};

#[derive(Default)]
struct Slots {
    jpg: Option<AssetFile>,
    raw: Option<AssetFile>,
}

/// Pairs one import batch into groups keyed by base filename.
///
/// Files without an extension, or whose extension is outside the JPEG/RAW
/// allow-lists, are skipped. When two files land in the same slot the later
/// one wins. Groups come out in order of first appearance in the batch, all
/// unmarked.
pub fn group_assets(files: &[FileDescriptor]) -> Vec<PhotoGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut slots: HashMap<String, Slots> = HashMap::new();

    for file in files {
        if file.extension.is_empty() {
            trace!(name = %file.name, "skipping file without extension");
            continue;
        }

        let Some(kind) = AssetKind::from_extension(&file.extension) else {
            trace!(name = %file.name, "skipping unsupported extension");
            continue;
        };

        let Some(base_name) = file.base_name() else {
            continue;
        };

        let entry = slots.entry(base_name.to_string()).or_insert_with(|| {
            order.push(base_name.to_string());
            Slots::default()
        });

        let slot = match kind {
            AssetKind::Jpeg => &mut entry.jpg,
            AssetKind::Raw => &mut entry.raw,
        };
        if let Some(previous) = slot.replace(AssetFile::from(file)) {
            debug!(
                group = base_name,
                replaced = %previous.path().display(),
                by = %file.path.display(),
                "duplicate slot in batch, keeping the later file"
            );
        }
    }

    order
        .into_iter()
        .filter_map(|id| {
            let Slots { jpg, raw } = slots.remove(&id)?;
            PhotoGroup::new(id, jpg, raw)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GroupStatus, Selection};

    fn desc(path: &str) -> FileDescriptor {
        FileDescriptor::new(path, 100)
    }

    #[test]
    fn test_pairs_jpeg_and_raw() {
        let groups = group_assets(&[desc("/in/IMG_0001.JPG"), desc("/in/IMG_0001.ARW")]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id(), "IMG_0001");
        assert_eq!(groups[0].status(), GroupStatus::Complete);
        assert_eq!(groups[0].selection(), Selection::Unmarked);
    }

    #[test]
    fn test_orphans_get_their_status() {
        let groups = group_assets(&[desc("/in/A.JPG"), desc("/in/B.NEF")]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].status(), GroupStatus::JpgOnly);
        assert_eq!(groups[1].status(), GroupStatus::RawOnly);
    }

    #[test]
    fn test_skips_files_without_extension() {
        let groups = group_assets(&[desc("/in/IMG_0001"), desc("/in/IMG_0002.JPG")]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id(), "IMG_0002");
    }

    #[test]
    fn test_skips_unsupported_extensions() {
        let groups = group_assets(&[desc("/in/IMG_0001.PNG"), desc("/in/IMG_0001.XMP")]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_later_file_wins_same_slot() {
        let groups = group_assets(&[desc("/in/IMG_0001.JPG"), desc("/in/IMG_0001.jpeg")]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].jpg().unwrap().name(), "IMG_0001.jpeg");
    }

    #[test]
    fn test_preserves_first_appearance_order() {
        let groups = group_assets(&[
            desc("/in/C.JPG"),
            desc("/in/A.JPG"),
            desc("/in/C.CR2"),
            desc("/in/B.DNG"),
        ]);

        let ids: Vec<_> = groups.iter().map(|g| g.id()).collect();
        assert_eq!(ids, vec!["C", "A", "B"]);
        assert_eq!(groups[0].status(), GroupStatus::Complete);
    }

    #[test]
    fn test_lowercase_extensions_are_classified() {
        let groups = group_assets(&[desc("/in/a.jpg"), desc("/in/a.raf")]);
        assert_eq!(groups[0].status(), GroupStatus::Complete);
        assert_eq!(groups[0].raw().unwrap().extension(), "RAF");
    }

    #[test]
    fn test_empty_batch() {
        assert!(group_assets(&[]).is_empty());
    }
}
