use super::{group_assets, merge_import, AssetKind, FileDescriptor, GroupStatus, PhotoGroup, Selection};
use crate::error::{RawPickError, Result};
use crate::fileops::{ExportRequest, FileOperations, TransferOp};
use crate::metadata::attach_exif;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Which groups the filmstrip shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum GroupFilter {
    #[default]
    All,
    Picked,
    Rejected,
    Unmarked,
    Orphans,
}

impl GroupFilter {
    pub fn matches(&self, group: &PhotoGroup) -> bool {
        match self {
            GroupFilter::All => true,
            GroupFilter::Picked => group.selection() == Selection::Picked,
            GroupFilter::Rejected => group.selection() == Selection::Rejected,
            GroupFilter::Unmarked => group.selection() == Selection::Unmarked,
            GroupFilter::Orphans => group.is_orphan(),
        }
    }
}

/// Counters for the status bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LibraryStatistics {
    pub total: usize,
    pub picked: usize,
    pub rejected: usize,
    pub unmarked: usize,
    pub orphans: usize,
    pub orphan_raw: usize,
    pub orphan_jpg: usize,
}

/// What an import did to the collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub added: usize,
    pub completed: usize,
    pub duplicates: usize,
    pub partial_duplicates: usize,
    pub first_touched: Option<String>,
}

/// The photo groups of one culling session plus the filmstrip cursor.
///
/// The cursor is an index into the filtered view. Navigation methods return
/// the newly current group; the caller hands it to the presentation buffer,
/// which bumps its generation.
#[derive(Debug, Default)]
pub struct PhotoLibrary {
    groups: Vec<PhotoGroup>,
    filter: GroupFilter,
    selected: Option<usize>,
}

impl PhotoLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[PhotoGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// First group with this id
    pub fn get(&self, id: &str) -> Option<&PhotoGroup> {
        self.groups.iter().find(|g| g.id() == id)
    }

    /// Groups scanned files, reads their EXIF and merges them in.
    ///
    /// Folder scans and explicit file lists both come through here, so every
    /// imported group carries metadata from its JPEG half, or its RAW half
    /// when the JPEG has none.
    pub fn import_files(&mut self, files: &[FileDescriptor]) -> ImportOutcome {
        let batch = group_assets(files).into_iter().map(attach_exif).collect();
        self.import(batch)
    }

    /// Merges a grouped batch into the collection and moves the cursor to
    /// the first group the batch added or completed.
    pub fn import(&mut self, batch: Vec<PhotoGroup>) -> ImportOutcome {
        let outcome = merge_import(&self.groups, batch);
        info!(
            added = outcome.added,
            completed = outcome.completed,
            duplicates = outcome.duplicates,
            partial_duplicates = outcome.partial_duplicates,
            "imported batch"
        );
        self.groups = outcome.groups;

        if let Some(index) = outcome.first_touched_index {
            if self.select_group_at(index).is_none() {
                self.auto_select_first();
            }
        } else {
            self.clamp_selection();
        }

        ImportOutcome {
            added: outcome.added,
            completed: outcome.completed,
            duplicates: outcome.duplicates,
            partial_duplicates: outcome.partial_duplicates,
            first_touched: outcome.first_touched,
        }
    }

    /// Marks every group with this id. The cursor stays at its index, so
    /// under a filter it moves on to the next matching group.
    pub fn set_selection(&mut self, id: &str, selection: Selection) -> Result<()> {
        let mut found = false;
        for group in self.groups.iter_mut().filter(|g| g.id() == id) {
            group.set_selection(selection);
            found = true;
        }
        if !found {
            return Err(RawPickError::NotFound(format!("No photo group {}", id)));
        }
        debug!(group = id, %selection, "selection changed");
        self.clamp_selection();
        Ok(())
    }

    pub fn statistics(&self) -> LibraryStatistics {
        let mut stats = LibraryStatistics {
            total: self.groups.len(),
            ..Default::default()
        };
        for group in &self.groups {
            match group.selection() {
                Selection::Picked => stats.picked += 1,
                Selection::Rejected => stats.rejected += 1,
                Selection::Unmarked => stats.unmarked += 1,
            }
            match group.status() {
                GroupStatus::RawOnly => stats.orphan_raw += 1,
                GroupStatus::JpgOnly => stats.orphan_jpg += 1,
                GroupStatus::Complete => {}
            }
        }
        stats.orphans = stats.orphan_raw + stats.orphan_jpg;
        stats
    }

    pub fn filter(&self) -> GroupFilter {
        self.filter
    }

    /// Switches the filter and puts the cursor on the first visible group.
    pub fn set_filter(&mut self, filter: GroupFilter) -> Option<&PhotoGroup> {
        self.filter = filter;
        self.selected = None;
        self.auto_select_first()
    }

    pub fn filtered(&self) -> Vec<&PhotoGroup> {
        self.groups.iter().filter(|g| self.filter.matches(g)).collect()
    }

    fn filtered_len(&self) -> usize {
        self.groups.iter().filter(|g| self.filter.matches(g)).count()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn current(&self) -> Option<&PhotoGroup> {
        let index = self.selected?;
        self.groups.iter().filter(|g| self.filter.matches(g)).nth(index)
    }

    /// Advances the cursor, wrapping past the end.
    pub fn select_next(&mut self) -> Option<&PhotoGroup> {
        let len = self.filtered_len();
        let index = self.selected?;
        if len == 0 {
            return None;
        }
        self.selected = Some((index + 1) % len);
        self.current()
    }

    /// Moves the cursor back, wrapping past the start.
    pub fn select_previous(&mut self) -> Option<&PhotoGroup> {
        let len = self.filtered_len();
        let index = self.selected?;
        if len == 0 {
            return None;
        }
        self.selected = Some((index + len - 1) % len);
        self.current()
    }

    pub fn select_index(&mut self, index: usize) -> Option<&PhotoGroup> {
        if index >= self.filtered_len() {
            return None;
        }
        self.selected = Some(index);
        self.current()
    }

    /// Moves the cursor to the first visible group with this id. Leaves the
    /// cursor alone when no visible group matches.
    ///
    /// Ids can repeat when the same file name was imported from two folders;
    /// this always picks the earlier one.
    pub fn select_by_id(&mut self, id: &str) -> Option<&PhotoGroup> {
        let index = self
            .groups
            .iter()
            .filter(|g| self.filter.matches(g))
            .position(|g| g.id() == id)?;
        self.selected = Some(index);
        self.current()
    }

    /// Selects the first visible group when nothing valid is selected.
    pub fn auto_select_first(&mut self) -> Option<&PhotoGroup> {
        let len = self.filtered_len();
        match self.selected {
            Some(index) if index < len => {}
            _ => self.selected = (len > 0).then_some(0),
        }
        self.current()
    }

    /// Moves rejected groups to the trash and drops them from the collection.
    pub fn delete_rejected(&mut self, ops: &dyn FileOperations) -> Result<usize> {
        self.remove_with(|g| g.selection() == Selection::Rejected, |groups| ops.move_to_trash(groups))
    }

    /// Moves orphans missing their other half to the trash. `AssetKind::Raw`
    /// removes RAW-only groups, `AssetKind::Jpeg` JPEG-only groups.
    pub fn delete_orphans(&mut self, kind: AssetKind, ops: &dyn FileOperations) -> Result<usize> {
        let status = match kind {
            AssetKind::Raw => GroupStatus::RawOnly,
            AssetKind::Jpeg => GroupStatus::JpgOnly,
        };
        self.remove_with(|g| g.status() == status, |groups| ops.move_to_trash(groups))
    }

    /// Permanently deletes the files of every group whose id is listed.
    pub fn force_delete(&mut self, ids: &[&str], ops: &dyn FileOperations) -> Result<usize> {
        self.remove_with(
            |g| ids.iter().any(|id| *id == g.id()),
            |groups| ops.delete_permanently(groups),
        )
    }

    /// Exports picked groups. A move also drops them from the collection.
    pub fn export_picked(&mut self, request: &ExportRequest, ops: &dyn FileOperations) -> Result<usize> {
        let is_picked = |g: &PhotoGroup| g.selection() == Selection::Picked;
        match request.op {
            TransferOp::Move => self.remove_with(is_picked, |groups| ops.export(groups, request)),
            TransferOp::Copy => {
                let picked: Vec<PhotoGroup> = self.groups.iter().filter(|&g| is_picked(g)).cloned().collect();
                if picked.is_empty() {
                    return Ok(0);
                }
                Ok(ops.export(&picked, request)?.len())
            }
        }
    }

    /// Empties the session.
    pub fn reset(&mut self) {
        self.groups.clear();
        self.filter = GroupFilter::All;
        self.selected = None;
    }

    fn remove_with<P, F>(&mut self, matches: P, operation: F) -> Result<usize>
    where
        P: Fn(&PhotoGroup) -> bool,
        F: FnOnce(&[PhotoGroup]) -> Result<Vec<std::path::PathBuf>>,
    {
        let targets: Vec<PhotoGroup> = self.groups.iter().filter(|&g| matches(g)).cloned().collect();
        if targets.is_empty() {
            return Ok(0);
        }

        // Only touch the collection once the filesystem side succeeded
        let processed = operation(&targets)?;
        self.groups.retain(|g| !matches(g));
        self.clamp_selection();
        info!(groups = targets.len(), files = processed.len(), "removed groups");
        Ok(processed.len())
    }

    /// Points the cursor at `groups[index]` if the filter shows it.
    fn select_group_at(&mut self, index: usize) -> Option<&PhotoGroup> {
        let target = self.groups.get(index)?;
        if !self.filter.matches(target) {
            return None;
        }
        let position = self.groups[..index]
            .iter()
            .filter(|g| self.filter.matches(g))
            .count();
        self.selected = Some(position);
        self.current()
    }

    fn clamp_selection(&mut self) {
        let len = self.filtered_len();
        self.selected = match self.selected {
            _ if len == 0 => None,
            Some(index) if index >= len => Some(len - 1),
            other => other,
        };
    }
}
