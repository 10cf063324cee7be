//! Mapping from data ids to slots.

use crate::types::SlotId;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

/// Hashes data ids onto a fixed number of slots with xxHash64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotFunction {
    slot_num: u32,
}

impl SlotFunction {
    /// Create a slot function over `slot_num` slots.
    pub fn new(slot_num: u32) -> Self {
        Self {
            slot_num: slot_num.max(1),
        }
    }

    /// Number of slots.
    pub fn slot_num(&self) -> u32 {
        self.slot_num
    }

    /// Slot a data id belongs to.
    pub fn slot_of(&self, data_info_id: &str) -> SlotId {
        let mut hasher = XxHash64::with_seed(0);
        data_info_id.as_bytes().hash(&mut hasher);
        (hasher.finish() % self.slot_num as u64) as SlotId
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_slot_in_range_and_stable() {
        let func = SlotFunction::new(16);
        for i in 0..1000 {
            let id = format!("com.example.Service{}#@#DEFAULT_INSTANCE_ID#@#DEFAULT_GROUP", i);
            let slot = func.slot_of(&id);
            assert!(slot < 16);
            assert_eq!(slot, func.slot_of(&id));
        }
    }

    #[test]
    fn test_distribution_covers_all_slots() {
        let func = SlotFunction::new(8);
        let mut counts: HashMap<SlotId, usize> = HashMap::new();
        for i in 0..4000 {
            *counts.entry(func.slot_of(&format!("data-{}", i))).or_insert(0) += 1;
        }
        assert_eq!(counts.len(), 8);
        for count in counts.values() {
            assert!(*count > 250, "uneven distribution: {:?}", counts);
        }
    }

    #[test]
    fn test_zero_slots_clamped() {
        let func = SlotFunction::new(0);
        assert_eq!(func.slot_num(), 1);
        assert_eq!(func.slot_of("anything"), 0);
    }
}
