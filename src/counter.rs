//! Cumulative unique-object counter.
//!
//! The set only ever grows, or is cleared wholesale by an explicit reset.
//! Only detections the tracker identified are counted: a detection without a
//! track id is drawn but never changes the count, so a flickering false
//! positive that never gets a stable identity is not counted.

use std::collections::HashSet;

use crate::detect::Detection;

#[derive(Clone, Debug, Default)]
pub struct IdentityMemory {
    seen: HashSet<u64>,
}

impl IdentityMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every track id present in `detections`. Returns how many were new.
    pub fn observe(&mut self, detections: &[Detection]) -> usize {
        detections
            .iter()
            .filter_map(|d| d.track_id)
            .filter(|id| self.seen.insert(*id))
            .count()
    }

    /// Forget every identity.
    pub fn reset(&mut self) {
        self.seen.clear();
    }

    /// Number of distinct identities since the last reset.
    pub fn count(&self) -> usize {
        self.seen.len()
    }

    pub fn contains(&self, track_id: u64) -> bool {
        self.seen.contains(&track_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BBox;

    fn tracked(id: u64) -> Detection {
        Detection::new(32, 0.9, BBox::new(0.0, 0.0, 40.0, 40.0)).with_track_id(id)
    }

    fn untracked() -> Detection {
        Detection::new(32, 0.9, BBox::new(0.0, 0.0, 40.0, 40.0))
    }

    #[test]
    fn repeated_ids_count_once() {
        let mut memory = IdentityMemory::new();
        assert_eq!(memory.observe(&[tracked(1), tracked(2)]), 2);
        assert_eq!(memory.observe(&[tracked(1), tracked(2)]), 0);
        assert_eq!(memory.observe(&[tracked(2), tracked(3)]), 1);
        assert_eq!(memory.count(), 3);
        assert!(memory.contains(3));
    }

    #[test]
    fn untracked_detections_are_never_counted() {
        let mut memory = IdentityMemory::new();
        assert_eq!(memory.observe(&[untracked(), untracked()]), 0);
        assert_eq!(memory.count(), 0);
        memory.observe(&[tracked(5), untracked()]);
        assert_eq!(memory.count(), 1);
    }

    #[test]
    fn reset_restarts_from_zero() {
        let mut memory = IdentityMemory::new();
        memory.observe(&[tracked(1), tracked(2)]);
        memory.reset();
        assert_eq!(memory.count(), 0);
        assert!(!memory.contains(1));
        memory.observe(&[tracked(1)]);
        assert_eq!(memory.count(), 1);
    }
}
