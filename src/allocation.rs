//! Lookup of the memory ranges assigned to graph values.
//!
//! Choosing buffer addresses is the job of an earlier allocation pass.
//! Lowering only consults its results through [`AllocationOracle`].

use rustc_hash::FxHashMap;

use crate::graph::ValueId;
use crate::instruction::MemoryRange;

/// Resolves graph values to the memory ranges assigned by the allocator.
///
/// Oracles are read-only while lowering runs and may be queried from
/// multiple threads.
pub trait AllocationOracle: Sync {
    /// Return the memory range for a value, or `None` if the allocation pass
    /// did not assign one.
    fn resolve(&self, value: ValueId) -> Option<MemoryRange>;
}

/// An [`AllocationOracle`] backed by a map from value ID to memory range.
#[derive(Clone, Debug, Default)]
pub struct AllocationMap {
    ranges: FxHashMap<ValueId, MemoryRange>,
}

impl AllocationMap {
    pub fn new() -> AllocationMap {
        AllocationMap::default()
    }

    /// Assign a memory range to a value, replacing any previous assignment.
    pub fn insert(&mut self, value: ValueId, range: MemoryRange) -> Option<MemoryRange> {
        self.ranges.insert(value, range)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl AllocationOracle for AllocationMap {
    fn resolve(&self, value: ValueId) -> Option<MemoryRange> {
        self.ranges.get(&value).copied()
    }
}

impl FromIterator<(ValueId, MemoryRange)> for AllocationMap {
    fn from_iter<I: IntoIterator<Item = (ValueId, MemoryRange)>>(iter: I) -> Self {
        AllocationMap {
            ranges: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AllocationMap, AllocationOracle};
    use crate::graph::ValueId;
    use crate::instruction::{MemoryLocation, MemoryRange};

    #[test]
    fn test_allocation_map() {
        let x = ValueId::from_u32(0);
        let y = ValueId::from_u32(1);
        let range = MemoryRange {
            location: MemoryLocation::Input,
            start: 0,
            size: 16,
        };

        let mut map = AllocationMap::new();
        assert!(map.is_empty());
        assert_eq!(map.insert(x, range), None);
        assert_eq!(map.resolve(x), Some(range));
        assert_eq!(map.resolve(y), None);

        // Values of elided nodes may share a range with their source.
        assert_eq!(map.insert(y, range), None);
        assert_eq!(map.resolve(y), Some(range));
        assert_eq!(map.len(), 2);
    }
}
