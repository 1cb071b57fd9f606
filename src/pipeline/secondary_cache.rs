// src/pipeline/secondary_cache.rs
//
// Per-session slots for the analyses that run on a cadence. A slot keeps the
// last computed value, including "nothing detected", together with the
// admitted-frame index it was produced on.

use crate::analysis::{FacialAnalysis, ObjectAnalysis};

#[derive(Debug, Clone)]
pub struct CacheSlot<T> {
    value: Option<T>,
    updated_at: Option<u64>,
}

impl<T> Default for CacheSlot<T> {
    fn default() -> Self {
        Self {
            value: None,
            updated_at: None,
        }
    }
}

impl<T: Clone> CacheSlot<T> {
    pub fn store(&mut self, value: T, frame_index: u64) {
        self.value = Some(value);
        self.updated_at = Some(frame_index);
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Cached value, or `fallback` if the slot was never filled.
    pub fn get_or(&self, fallback: T) -> T {
        self.value.clone().unwrap_or(fallback)
    }

    pub fn updated_at(&self) -> Option<u64> {
        self.updated_at
    }

    /// Frames since the slot was last written.
    pub fn age(&self, frame_index: u64) -> Option<u64> {
        self.updated_at.map(|at| frame_index.saturating_sub(at))
    }

    pub fn clear(&mut self) {
        self.value = None;
        self.updated_at = None;
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecondaryCache {
    pub facial: CacheSlot<FacialAnalysis>,
    pub object: CacheSlot<ObjectAnalysis>,
}

impl SecondaryCache {
    pub fn clear(&mut self) {
        self.facial.clear();
        self.object.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot_serves_fallback() {
        let slot: CacheSlot<ObjectAnalysis> = CacheSlot::default();
        assert!(slot.get().is_none());
        assert_eq!(slot.get_or(ObjectAnalysis::empty()), ObjectAnalysis::empty());
        assert_eq!(slot.age(10), None);
    }

    #[test]
    fn test_no_detection_overwrites_earlier_detection() {
        let mut cache = SecondaryCache::default();
        let seen = FacialAnalysis {
            pain_score: 40.0,
            face_detected: true,
            ..FacialAnalysis::default()
        };
        cache.facial.store(seen, 1);
        cache.facial.store(FacialAnalysis::not_detected(), 4);

        let current = cache.facial.get().expect("slot filled");
        assert!(!current.face_detected, "loss of face must not resurrect the stale detection");
        assert_eq!(cache.facial.updated_at(), Some(4));
        assert_eq!(cache.facial.age(6), Some(2));

        cache.clear();
        assert!(cache.facial.get().is_none());
    }
}
