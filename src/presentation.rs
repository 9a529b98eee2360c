//! Main-viewer double buffer
//!
//! Keeps the last good image on screen while the next one decodes, and uses a
//! generation counter so a slow decode for a group the user already moved
//! past never replaces what is on screen now.

use crate::domain::{AssetFile, PhotoGroup};
use crate::raw::{CacheLookup, DecodeCache, DecodeError, DecodeMode, RenderedImage};
use image::{ImageFormat, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// What the viewer shows when a decode fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayError {
    pub file_name: String,
    pub extension: String,
    pub size: u64,
    pub message: String,
}

impl DisplayError {
    fn for_asset(asset: &AssetFile, error: &DecodeError) -> Self {
        Self {
            file_name: asset.name().to_string(),
            extension: asset.extension().to_string(),
            size: asset.size(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Error(DisplayError),
}

#[derive(Debug, Clone)]
pub enum DisplaySource {
    /// A file the viewer can show as is (the JPEG half or an extracted preview)
    File(PathBuf),
    /// A RAW decode. `raster` is the off-screen preload done before the swap;
    /// cache hits skip it and display the encoded bytes directly.
    Decoded {
        image: Arc<RenderedImage>,
        raster: Option<Arc<RgbaImage>>,
    },
}

/// The image currently in the front buffer.
#[derive(Debug, Clone)]
pub struct Displayed {
    pub group_id: String,
    pub source: DisplaySource,
}

/// A decode started by [`PresentationBuffer::request`]. Resolve it off the
/// UI path and hand the outcome back through [`PresentationBuffer::apply`].
pub struct PendingLoad {
    generation: u64,
    group_id: String,
    asset: AssetFile,
    lookup: CacheLookup,
}

impl PendingLoad {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Waits for the decode, then preloads the raster so the swap itself is
    /// instant.
    pub async fn resolve(self) -> LoadOutcome {
        let result = match self.lookup.resolve().await {
            Ok(image) => match preload(Arc::clone(&image)).await {
                Ok(raster) => Ok(Displayed {
                    group_id: self.group_id.clone(),
                    source: DisplaySource::Decoded {
                        image,
                        raster: Some(Arc::new(raster)),
                    },
                }),
                Err(e) => Err(DisplayError::for_asset(&self.asset, &e)),
            },
            Err(e) => Err(DisplayError::for_asset(&self.asset, &e)),
        };

        LoadOutcome {
            generation: self.generation,
            group_id: self.group_id,
            result,
        }
    }
}

/// Result of a [`PendingLoad`], tagged with the generation it was issued under.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub generation: u64,
    pub group_id: String,
    pub result: Result<Displayed, DisplayError>,
}

async fn preload(image: Arc<RenderedImage>) -> Result<RgbaImage, DecodeError> {
    tokio::task::spawn_blocking(move || {
        image::load_from_memory_with_format(&image.jpeg, ImageFormat::Jpeg)
            .map(|decoded| decoded.to_rgba8())
            .map_err(|e| DecodeError::Encode(e.to_string()))
    })
    .await
    .map_err(|e| DecodeError::TaskFailed(e.to_string()))?
}

/// Front/back buffer for the main viewer.
pub struct PresentationBuffer {
    cache: DecodeCache,
    generation: u64,
    state: LoadState,
    active: Option<String>,
    front: Option<Displayed>,
    overlay: Option<DisplayError>,
}

impl PresentationBuffer {
    pub fn new(cache: DecodeCache) -> Self {
        Self {
            cache,
            generation: 0,
            state: LoadState::Idle,
            active: None,
            front: None,
            overlay: None,
        }
    }

    pub fn cache(&self) -> &DecodeCache {
        &self.cache
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Id of the group the user navigated to last
    pub fn active_group(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn front(&self) -> Option<&Displayed> {
        self.front.as_ref()
    }

    /// Failure shown on top of the previous image
    pub fn overlay(&self) -> Option<&DisplayError> {
        self.overlay.as_ref()
    }

    /// Makes `group` the active group.
    ///
    /// Returns `None` when the group could be shown right away. Otherwise
    /// the buffer enters `Loading` with the previous image still in front,
    /// and the returned load must be resolved and applied.
    pub fn request(&mut self, group: &PhotoGroup) -> Option<PendingLoad> {
        self.generation += 1;
        self.active = Some(group.id().to_string());
        self.overlay = None;

        if let Some(path) = displayable_file(group) {
            self.show(Displayed {
                group_id: group.id().to_string(),
                source: DisplaySource::File(path.to_path_buf()),
            });
            return None;
        }

        // A group without a displayable file always carries a RAW half
        let raw = group.raw()?.clone();
        match self.cache.get(raw.path(), DecodeMode::Full) {
            CacheLookup::Hit(image) => {
                self.show(Displayed {
                    group_id: group.id().to_string(),
                    source: DisplaySource::Decoded { image, raster: None },
                });
                None
            }
            lookup @ CacheLookup::Pending(_) => {
                debug!(group = group.id(), generation = self.generation, "decoding for viewer");
                self.state = LoadState::Loading;
                Some(PendingLoad {
                    generation: self.generation,
                    group_id: group.id().to_string(),
                    asset: raw,
                    lookup,
                })
            }
        }
    }

    /// Applies a finished load. Returns `false` when it was issued before the
    /// latest navigation and has been dropped.
    pub fn apply(&mut self, outcome: LoadOutcome) -> bool {
        if outcome.generation != self.generation {
            debug!(
                group = %outcome.group_id,
                issued = outcome.generation,
                current = self.generation,
                "dropping stale load"
            );
            return false;
        }

        match outcome.result {
            Ok(displayed) => self.show(displayed),
            Err(error) => {
                warn!(group = %outcome.group_id, error = %error.message, "viewer decode failed");
                if self.front.is_some() {
                    self.state = LoadState::Ready;
                    self.overlay = Some(error);
                } else {
                    self.state = LoadState::Error(error);
                }
            }
        }
        true
    }

    /// Back to the empty viewer. Drops every cached decode and invalidates
    /// loads still in flight.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = LoadState::Idle;
        self.active = None;
        self.front = None;
        self.overlay = None;
        self.cache.clear();
    }

    fn show(&mut self, displayed: Displayed) {
        self.front = Some(displayed);
        self.overlay = None;
        self.state = LoadState::Ready;
    }
}

fn displayable_file(group: &PhotoGroup) -> Option<&Path> {
    group
        .jpg()
        .map(AssetFile::path)
        .or_else(|| group.raw().and_then(AssetFile::preview))
}
