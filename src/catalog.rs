//! Buffer catalog
//!
//! The external loader decodes audio files and registers them here, one
//! section per sound category, then marks each section ready. From the
//! engine's side the catalog is read-only: voices borrow cheap handles
//! (key + duration) and never own sample data. The catalog is an explicit
//! value handed to the Director, not module state.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};

/// The four kinds of source material the engine arranges. Also used to
/// identify the pool manager responsible for each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundCategory {
    Loops,
    ConcreteOneShots,
    InstrumentalOneShots,
    Drones,
}

impl fmt::Display for SoundCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SoundCategory::Loops => "loops",
            SoundCategory::ConcreteOneShots => "concrete one-shots",
            SoundCategory::InstrumentalOneShots => "instrumental one-shots",
            SoundCategory::Drones => "drones",
        };
        write!(f, "{}", name)
    }
}

/// Descriptor of one decoded sample: its stable key (the source path) and its
/// duration in seconds. Clones share the key allocation.
#[derive(Debug, Clone)]
pub struct BufferHandle {
    key: Arc<str>,
    duration: f64,
}

impl BufferHandle {
    pub fn new(key: &str, duration: f64) -> Self {
        Self {
            key: Arc::from(key),
            duration,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Shared copy of the key, for history tracking and notices.
    pub fn key_arc(&self) -> Arc<str> {
        Arc::clone(&self.key)
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}

#[derive(Debug, Default)]
struct Section {
    buffers: BTreeMap<Arc<str>, BufferHandle>,
    ready: bool,
}

/// Category → key → buffer handle, with a readiness flag per category set by
/// the loader once that category's files have all decoded.
#[derive(Debug, Default)]
pub struct BufferCatalog {
    sections: HashMap<SoundCategory, Section>,
}

impl BufferCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: SoundCategory, key: &str, duration: f64) {
        let handle = BufferHandle::new(key, duration);
        self.sections
            .entry(category)
            .or_default()
            .buffers
            .insert(handle.key_arc(), handle);
    }

    pub fn mark_ready(&mut self, category: SoundCategory) {
        self.sections.entry(category).or_default().ready = true;
    }

    pub fn is_ready(&self, category: SoundCategory) -> bool {
        self.sections.get(&category).map_or(false, |s| s.ready)
    }

    /// Fail-fast gate used before any manager is built: the category must be
    /// marked ready and actually contain material.
    pub fn require_ready(&self, category: SoundCategory) -> EngineResult<()> {
        if !self.is_ready(category) {
            return Err(EngineError::CatalogNotReady(category));
        }
        if self.len(category) == 0 {
            return Err(EngineError::EmptyCatalog(category));
        }
        Ok(())
    }

    pub fn len(&self, category: SoundCategory) -> usize {
        self.sections.get(&category).map_or(0, |s| s.buffers.len())
    }

    pub fn get(&self, category: SoundCategory, key: &str) -> Option<&BufferHandle> {
        self.sections.get(&category)?.buffers.get(key)
    }

    /// All handles in a category, in stable key order.
    pub fn handles(&self, category: SoundCategory) -> impl Iterator<Item = &BufferHandle> {
        self.sections
            .get(&category)
            .into_iter()
            .flat_map(|s| s.buffers.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_catalog() -> BufferCatalog {
        let mut catalog = BufferCatalog::new();
        catalog.insert(SoundCategory::Loops, "audio/loops/tide.wav", 14.0);
        catalog.insert(SoundCategory::Loops, "audio/loops/hum.wav", 9.5);
        catalog.insert(SoundCategory::ConcreteOneShots, "audio/oneshot/concrete/door.wav", 1.2);
        catalog
    }

    #[test]
    fn test_insert_and_get() {
        let catalog = seeded_catalog();

        assert_eq!(catalog.len(SoundCategory::Loops), 2);
        let handle = catalog
            .get(SoundCategory::Loops, "audio/loops/hum.wav")
            .expect("inserted buffer should be retrievable");
        assert_eq!(handle.key(), "audio/loops/hum.wav");
        assert_eq!(handle.duration(), 9.5);

        assert!(catalog.get(SoundCategory::Drones, "audio/loops/hum.wav").is_none());
    }

    #[test]
    fn test_handles_iterate_in_stable_order() {
        let catalog = seeded_catalog();
        let keys: Vec<&str> = catalog
            .handles(SoundCategory::Loops)
            .map(|h| h.key())
            .collect();
        assert_eq!(keys, vec!["audio/loops/hum.wav", "audio/loops/tide.wav"]);
    }

    #[test]
    fn test_readiness_gate() {
        let mut catalog = seeded_catalog();

        assert!(!catalog.is_ready(SoundCategory::Loops));
        assert!(matches!(
            catalog.require_ready(SoundCategory::Loops),
            Err(EngineError::CatalogNotReady(SoundCategory::Loops))
        ));

        catalog.mark_ready(SoundCategory::Loops);
        assert!(catalog.require_ready(SoundCategory::Loops).is_ok());

        // Ready but empty is still unusable
        catalog.mark_ready(SoundCategory::Drones);
        assert!(matches!(
            catalog.require_ready(SoundCategory::Drones),
            Err(EngineError::EmptyCatalog(SoundCategory::Drones))
        ));
    }
}
