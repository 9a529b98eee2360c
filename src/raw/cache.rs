// Decode cache with single-flight request collapsing
//
// Completed results live in one table per mode. A decode that has been started
// but not finished is tracked in the in-flight table so concurrent requests for
// the same (path, mode) share one piece of work.

use super::engine::RawDecodeEngine;
use super::{DecodeError, DecodeKey, DecodeMode, RenderedImage};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, warn};

pub type DecodeResult = Result<Arc<RenderedImage>, DecodeError>;

/// A decode in progress. Cloning it yields another handle to the same work;
/// every clone resolves to the same `Arc`.
pub type PendingDecode = Shared<BoxFuture<'static, DecodeResult>>;

/// Answer to a synchronous cache query.
#[derive(Clone)]
pub enum CacheLookup {
    /// Already decoded
    Hit(Arc<RenderedImage>),
    /// Decode running, either started by this call or by an earlier one
    Pending(PendingDecode),
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub async fn resolve(self) -> DecodeResult {
        match self {
            CacheLookup::Hit(image) => Ok(image),
            CacheLookup::Pending(pending) => pending.await,
        }
    }
}

impl std::fmt::Debug for CacheLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheLookup::Hit(image) => f
                .debug_tuple("Hit")
                .field(&(image.width, image.height))
                .finish(),
            CacheLookup::Pending(_) => f.write_str("Pending"),
        }
    }
}

#[derive(Default)]
struct Tables {
    thumbnails: HashMap<PathBuf, Arc<RenderedImage>>,
    full: HashMap<PathBuf, Arc<RenderedImage>>,
    in_flight: HashMap<DecodeKey, PendingDecode>,
}

impl Tables {
    fn completed(&self, mode: DecodeMode) -> &HashMap<PathBuf, Arc<RenderedImage>> {
        match mode {
            DecodeMode::Thumbnail => &self.thumbnails,
            DecodeMode::Full => &self.full,
        }
    }

    fn completed_mut(&mut self, mode: DecodeMode) -> &mut HashMap<PathBuf, Arc<RenderedImage>> {
        match mode {
            DecodeMode::Thumbnail => &mut self.thumbnails,
            DecodeMode::Full => &mut self.full,
        }
    }
}

fn lock(tables: &Mutex<Tables>) -> MutexGuard<'_, Tables> {
    tables.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Memoized RAW decodes for one session.
///
/// Cloning shares the underlying tables. Failed decodes are never stored, so
/// the next request for the same key tries again. Entries are only dropped
/// by [`DecodeCache::clear`].
#[derive(Clone)]
pub struct DecodeCache {
    engine: RawDecodeEngine,
    tables: Arc<Mutex<Tables>>,
}

impl std::fmt::Debug for DecodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = lock(&self.tables);
        f.debug_struct("DecodeCache")
            .field("thumbnails", &tables.thumbnails.len())
            .field("full", &tables.full.len())
            .field("in_flight", &tables.in_flight.len())
            .finish()
    }
}

impl DecodeCache {
    pub fn new(engine: RawDecodeEngine) -> Self {
        Self {
            engine,
            tables: Arc::new(Mutex::new(Tables::default())),
        }
    }

    pub fn engine(&self) -> &RawDecodeEngine {
        &self.engine
    }

    /// Returns the cached image for `(path, mode)`, joins a decode already
    /// running for that key, or starts a new one.
    ///
    /// Never blocks on decoding. A new decode is spawned on the current Tokio
    /// runtime and runs to completion whether or not anyone awaits it.
    pub fn get(&self, path: &Path, mode: DecodeMode) -> CacheLookup {
        let mut tables = lock(&self.tables);

        if let Some(image) = tables.completed(mode).get(path) {
            return CacheLookup::Hit(Arc::clone(image));
        }

        let key = DecodeKey::new(path, mode);
        if let Some(pending) = tables.in_flight.get(&key) {
            debug!(path = %path.display(), ?mode, "joining in-flight decode");
            return CacheLookup::Pending(pending.clone());
        }

        match self.start(key.clone()) {
            Ok(pending) => {
                tables.in_flight.insert(key, pending.clone());
                CacheLookup::Pending(pending)
            }
            Err(e) => CacheLookup::Pending(future::ready(Err(e)).boxed().shared()),
        }
    }

    /// Convenience wrapper that awaits [`DecodeCache::get`].
    pub async fn fetch(&self, path: &Path, mode: DecodeMode) -> DecodeResult {
        self.get(path, mode).resolve().await
    }

    fn start(&self, key: DecodeKey) -> Result<PendingDecode, DecodeError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DecodeError::TaskFailed(e.to_string()))?;

        let engine = self.engine.clone();
        let tables = Arc::clone(&self.tables);
        let task_key = key.clone();
        let task = runtime.spawn(async move {
            let started = Instant::now();
            let result = engine
                .decode(&task_key.path, task_key.mode)
                .await
                .map(Arc::new);

            let mut tables = lock(&tables);
            match &result {
                Ok(image) => {
                    tables
                        .completed_mut(task_key.mode)
                        .insert(task_key.path.clone(), Arc::clone(image));
                    debug!(
                        path = %task_key.path.display(),
                        mode = ?task_key.mode,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "cached decode"
                    );
                }
                Err(e) => {
                    warn!(path = %task_key.path.display(), mode = ?task_key.mode, error = %e, "decode failed");
                }
            }
            tables.in_flight.remove(&task_key);
            result
        });

        let tables = Arc::clone(&self.tables);
        let pending = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    // The task died before clearing its own marker
                    lock(&tables).in_flight.remove(&key);
                    Err(DecodeError::TaskFailed(e.to_string()))
                }
            }
        };

        Ok(pending.boxed().shared())
    }

    /// Completed entry for `(path, mode)`, if any. Never starts a decode.
    pub fn cached(&self, path: &Path, mode: DecodeMode) -> Option<Arc<RenderedImage>> {
        lock(&self.tables).completed(mode).get(path).cloned()
    }

    pub fn is_in_flight(&self, path: &Path, mode: DecodeMode) -> bool {
        lock(&self.tables)
            .in_flight
            .contains_key(&DecodeKey::new(path, mode))
    }

    pub fn in_flight_len(&self) -> usize {
        lock(&self.tables).in_flight.len()
    }

    /// Number of completed entries for one mode
    pub fn len(&self, mode: DecodeMode) -> usize {
        lock(&self.tables).completed(mode).len()
    }

    pub fn is_empty(&self) -> bool {
        let tables = lock(&self.tables);
        tables.thumbnails.is_empty() && tables.full.is_empty()
    }

    /// Drops every completed entry. Decodes already running keep going and
    /// still store their result when they finish.
    pub fn clear(&self) {
        let mut tables = lock(&self.tables);
        debug!(
            thumbnails = tables.thumbnails.len(),
            full = tables.full.len(),
            "clearing decode cache"
        );
        tables.thumbnails.clear();
        tables.full.clear();
    }
}
