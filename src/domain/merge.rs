use super::PhotoGroup;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Result of folding an import batch into a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub groups: Vec<PhotoGroup>,
    /// Id of the first group appended or completed by this batch
    pub first_touched: Option<String>,
    /// Position of that group in `groups`
    pub first_touched_index: Option<usize>,
    pub added: usize,
    pub completed: usize,
    /// Incoming groups whose every asset was already in the collection
    pub duplicates: usize,
    /// Incoming groups dropped because one of their assets was already present
    pub partial_duplicates: usize,
}

impl MergeOutcome {
    pub fn touched(&self) -> usize {
        self.added + self.completed
    }
}

/// Folds a grouped import batch into `existing` without disturbing user state.
///
/// Duplicates are decided by asset path against the collection as it was
/// before the batch. A group whose every asset is known is dropped, and so is
/// a group with only one known asset: partial duplicates are not salvaged.
/// Otherwise the group either fills the missing half of a same-id orphan
/// (keeping that orphan's selection and metadata) or is appended.
///
/// `existing` is never modified; completed orphans are replaced by copies.
pub fn merge_import(existing: &[PhotoGroup], incoming: Vec<PhotoGroup>) -> MergeOutcome {
    let known_paths: HashSet<&Path> = existing
        .iter()
        .flat_map(|group| group.assets().map(|asset| asset.path()))
        .collect();

    let mut groups = existing.to_vec();
    let mut first_touched = None;
    let mut first_touched_index = None;
    let mut added = 0;
    let mut completed = 0;
    let mut duplicates = 0;
    let mut partial_duplicates = 0;

    for group in incoming {
        let carried = group.assets().count();
        let known = group
            .assets()
            .filter(|asset| known_paths.contains(asset.path()))
            .count();

        if known == carried {
            debug!(group = group.id(), "skipping duplicate group");
            duplicates += 1;
            continue;
        }
        if known > 0 {
            info!(group = group.id(), "skipping group with an already imported file");
            partial_duplicates += 1;
            continue;
        }

        if first_touched.is_none() {
            first_touched = Some(group.id().to_string());
        }

        let orphan = groups
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.id() == group.id())
            .find_map(|(index, candidate)| candidate.completed_with(&group).map(|merged| (index, merged)));

        let index = match orphan {
            Some((index, merged)) => {
                debug!(group = group.id(), "completed orphan group");
                groups[index] = merged;
                completed += 1;
                index
            }
            None => {
                groups.push(group);
                added += 1;
                groups.len() - 1
            }
        };
        first_touched_index.get_or_insert(index);
    }

    MergeOutcome {
        groups,
        first_touched,
        first_touched_index,
        added,
        completed,
        duplicates,
        partial_duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{group_assets, ExifData, FileDescriptor, GroupStatus, Selection};

    fn batch(paths: &[&str]) -> Vec<PhotoGroup> {
        let files: Vec<_> = paths.iter().map(|p| FileDescriptor::new(*p, 10)).collect();
        group_assets(&files)
    }

    #[test]
    fn test_merge_into_empty_collection() {
        let outcome = merge_import(&[], batch(&["/a/IMG_0001.JPG", "/a/IMG_0001.ARW"]));

        assert_eq!(outcome.groups.len(), 1);
        assert_eq!(outcome.groups[0].status(), GroupStatus::Complete);
        assert_eq!(outcome.first_touched.as_deref(), Some("IMG_0001"));
        assert_eq!(outcome.added, 1);
    }

    #[test]
    fn test_reimport_is_idempotent() {
        let first = merge_import(&[], batch(&["/a/A.JPG", "/a/A.ARW", "/a/B.JPG"]));
        let second = merge_import(&first.groups, batch(&["/a/A.JPG", "/a/A.ARW", "/a/B.JPG"]));

        assert_eq!(second.groups, first.groups);
        assert_eq!(second.touched(), 0);
        assert_eq!(second.duplicates, 2);
        assert!(second.first_touched.is_none());
    }

    #[test]
    fn test_same_jpeg_twice_adds_nothing() {
        let first = merge_import(&[], batch(&["/a/IMG_0003.JPG"]));
        let second = merge_import(&first.groups, batch(&["/a/IMG_0003.JPG"]));

        assert_eq!(second.groups.len(), 1);
        assert_eq!(second.groups, first.groups);
        assert!(second.first_touched.is_none());
    }

    #[test]
    fn test_orphan_completion_keeps_selection() {
        let first = merge_import(&[], batch(&["/a/IMG_0002.ARW"]));
        let picked: Vec<_> = first
            .groups
            .into_iter()
            .map(|g| g.with_selection(Selection::Picked))
            .collect();

        let second = merge_import(&picked, batch(&["/a/IMG_0002.JPG"]));

        assert_eq!(second.groups.len(), 1);
        let group = &second.groups[0];
        assert_eq!(group.id(), "IMG_0002");
        assert_eq!(group.status(), GroupStatus::Complete);
        assert_eq!(group.selection(), Selection::Picked);
        assert_eq!(second.completed, 1);
        assert_eq!(second.first_touched.as_deref(), Some("IMG_0002"));
        assert_eq!(second.first_touched_index, Some(0));
        // Input collection untouched
        assert_eq!(picked[0].status(), GroupStatus::RawOnly);
    }

    #[test]
    fn test_orphan_completion_keeps_exif() {
        let exif = ExifData {
            iso: Some("400".to_string()),
            ..Default::default()
        };
        let existing: Vec<_> = batch(&["/a/A.JPG"])
            .into_iter()
            .map(|g| g.with_exif(Some(exif.clone())))
            .collect();
        let incoming: Vec<_> = batch(&["/b/A.NEF"])
            .into_iter()
            .map(|g| {
                g.with_exif(Some(ExifData {
                    iso: Some("3200".to_string()),
                    ..Default::default()
                }))
            })
            .collect();

        let outcome = merge_import(&existing, incoming);
        assert_eq!(outcome.groups[0].exif(), Some(&exif));
    }

    #[test]
    fn test_partial_duplicate_is_discarded() {
        let first = merge_import(&[], batch(&["/a/A.JPG"]));
        // A.JPG is already known, A.ARW is new: the whole group is dropped
        let second = merge_import(&first.groups, batch(&["/a/A.JPG", "/a/A.ARW"]));

        assert_eq!(second.groups, first.groups);
        assert_eq!(second.partial_duplicates, 1);
        assert_eq!(second.groups[0].status(), GroupStatus::JpgOnly);
    }

    #[test]
    fn test_partial_duplicate_of_raw_half_is_discarded() {
        let first = merge_import(&[], batch(&["/a/A.ARW"]));
        let second = merge_import(&first.groups, batch(&["/a/A.ARW", "/a/A.JPG"]));

        assert_eq!(second.groups, first.groups);
        assert_eq!(second.partial_duplicates, 1);
        assert_eq!(second.touched(), 0);
        assert_eq!(second.groups[0].status(), GroupStatus::RawOnly);
        assert!(second.first_touched.is_none());
    }

    #[test]
    fn test_same_id_same_half_is_appended() {
        let first = merge_import(&[], batch(&["/a/A.JPG"]));
        let second = merge_import(&first.groups, batch(&["/b/A.JPG"]));

        assert_eq!(second.groups.len(), 2);
        assert_eq!(second.added, 1);
        assert_eq!(second.groups[1].jpg().unwrap().path(), Path::new("/b/A.JPG"));
        assert_eq!(second.first_touched_index, Some(1));
    }

    #[test]
    fn test_complete_group_is_not_merged_into() {
        let first = merge_import(&[], batch(&["/a/A.JPG", "/a/A.ARW"]));
        let second = merge_import(&first.groups, batch(&["/b/A.ARW"]));

        assert_eq!(second.groups.len(), 2);
        assert_eq!(second.groups[0], first.groups[0]);
    }

    #[test]
    fn test_appends_preserve_batch_order() {
        let first = merge_import(&[], batch(&["/a/M.JPG"]));
        let second = merge_import(&first.groups, batch(&["/a/Z.JPG", "/a/B.JPG", "/a/M.ARW"]));

        let ids: Vec<_> = second.groups.iter().map(|g| g.id()).collect();
        assert_eq!(ids, vec!["M", "Z", "B"]);
        assert_eq!(second.first_touched.as_deref(), Some("Z"));
        assert_eq!(second.first_touched_index, Some(1));
        assert_eq!(second.added, 2);
        assert_eq!(second.completed, 1);
    }
}
