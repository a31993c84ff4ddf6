use crate::allocation::AllocationMap;
use crate::graph::{Graph, ValueId};
use crate::instruction::{MemoryLocation, MemoryRange};
use crate::ops::Op;

/// Assign every value in `graph` a distinct memory range.
///
/// Values are laid out back to back in the order they were added. Values
/// produced by input nodes go in the input buffer, constants in the read-only
/// buffer and everything else in the scratch buffer.
pub fn allocate_all(graph: &Graph) -> AllocationMap {
    let location_of = |id: ValueId| {
        graph
            .nodes()
            .find(|(_, node)| node.op().outputs().contains(&id))
            .map(|(_, node)| match node.op() {
                Op::Input(_) => MemoryLocation::Input,
                Op::Constant(_) => MemoryLocation::Rdata,
                _ => MemoryLocation::Data,
            })
            .unwrap_or(MemoryLocation::Data)
    };

    let mut offset = 0;
    graph
        .value_ids()
        .map(|id| {
            let size = graph.value(id).unwrap().byte_len() as u32;
            let range = MemoryRange {
                location: location_of(id),
                start: offset,
                size,
            };
            offset += size;
            (id, range)
        })
        .collect()
}
