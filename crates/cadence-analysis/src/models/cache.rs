//! In-memory cache of loaded inference models
//!
//! Entries are keyed by pipeline stage and quality tier. Each key owns a slot
//! with its own lock: concurrent callers asking for the same key wait for a
//! single load, while loads of different keys proceed in parallel. The outer
//! map lock is only held to find or create a slot.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Pipeline stage a cached model belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Separation,
    Transcription,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Separation => f.write_str("separation"),
            StageKind::Transcription => f.write_str("transcription"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ModelKey {
    stage: StageKind,
    tier: String,
}

type Handle = Arc<dyn Any + Send + Sync>;
type Slot = Arc<Mutex<Option<Handle>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking loader leaves the slot empty, which is a valid state
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Loaded models shared by every analysis using this cache
#[derive(Default)]
pub struct ModelCache {
    slots: Mutex<HashMap<ModelKey, Slot>>,
    loads: AtomicUsize,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached handle for `(stage, tier)`, running `load` on a miss
    ///
    /// A failed load leaves the slot empty so the next caller retries.
    pub fn get_or_load<H, E, F>(&self, stage: StageKind, tier: &str, load: F) -> Result<H, E>
    where
        H: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<H, E>,
    {
        let key = ModelKey {
            stage,
            tier: tier.to_string(),
        };
        let slot = {
            let mut slots = lock(&self.slots);
            Arc::clone(slots.entry(key).or_default())
        };

        let mut entry = lock(&slot);
        if let Some(handle) = entry.as_ref() {
            if let Some(cached) = handle.downcast_ref::<H>() {
                log::debug!("get_or_load: {} model '{}' cached", stage, tier);
                return Ok(cached.clone());
            }
            log::warn!(
                "get_or_load: {} model '{}' cached with another type, reloading",
                stage,
                tier
            );
        }

        log::info!("get_or_load: Loading {} model '{}'", stage, tier);
        let loaded = load()?;
        *entry = Some(Arc::new(loaded.clone()));
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(loaded)
    }

    pub fn contains(&self, stage: StageKind, tier: &str) -> bool {
        let key = ModelKey {
            stage,
            tier: tier.to_string(),
        };
        let slot = lock(&self.slots).get(&key).cloned();
        slot.map_or(false, |slot| lock(&slot).is_some())
    }

    /// Number of loaded models
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|slot| lock(slot).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total successful loads over the cache's lifetime
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Drop one model; returns whether it was loaded
    pub fn evict(&self, stage: StageKind, tier: &str) -> bool {
        let key = ModelKey {
            stage,
            tier: tier.to_string(),
        };
        let removed = lock(&self.slots).remove(&key);
        removed.map_or(false, |slot| lock(&slot).take().is_some())
    }

    /// Drop every loaded model
    pub fn clear(&self) {
        let drained: Vec<Slot> = lock(&self.slots).drain().map(|(_, slot)| slot).collect();
        log::info!("clear: Releasing {} model slots", drained.len());
        for slot in drained {
            lock(&slot).take();
        }
    }
}

impl fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCache")
            .field("loaded", &self.len())
            .field("loads", &self.load_count())
            .finish()
    }
}
