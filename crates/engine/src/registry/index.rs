use serde::{Deserialize, Serialize};

use super::BlockId;
use crate::state::BlockState;

/// Compact 16-bit state id: `block << 4 | metadata`.
///
/// The metadata nibble is a lossy, block-defined projection of the state's
/// properties, so an id decodes to *a* valid state of its block, not
/// necessarily the one that produced it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DenseStateId(pub u16);

impl DenseStateId {
    pub const fn new(block: BlockId, metadata: u8) -> Self {
        Self((block.0 << 4) | (metadata as u16 & 0x0F))
    }

    pub const fn block(self) -> BlockId {
        BlockId(self.0 >> 4)
    }

    pub const fn metadata(self) -> u8 {
        (self.0 & 0x0F) as u8
    }
}

/// Flat id assignment for every interned state.
///
/// Forward lookups are arena-indexed; reverse lookups go through the block
/// segment to the owning registry entry, which reconstructs a state from the
/// metadata nibble.
#[derive(Debug)]
pub struct GlobalStateIndex {
    forward: Vec<DenseStateId>,
    segments: Vec<Option<u32>>,
    max: DenseStateId,
}

impl GlobalStateIndex {
    pub(crate) fn new() -> Self {
        Self {
            forward: Vec::new(),
            segments: vec![None; BlockId::MAX as usize + 1],
            max: DenseStateId(0),
        }
    }

    /// Assign ids to one block's states. `metadata` is indexed by local state
    /// index and states must be registered in arena order.
    pub(crate) fn register(&mut self, block: BlockId, entry: u32, metadata: &[u8]) {
        self.segments[block.0 as usize] = Some(entry);
        for &meta in metadata {
            let id = DenseStateId::new(block, meta);
            self.max = self.max.max(id);
            self.forward.push(id);
        }
    }

    /// Id of `state`. Reads as id 0 while the registry is still being built.
    pub fn dense_id(&self, state: BlockState) -> DenseStateId {
        self.forward.get(state.0 as usize).copied().unwrap_or_default()
    }

    /// Registry entry owning the block segment of `id`.
    pub(crate) fn segment(&self, id: DenseStateId) -> Option<u32> {
        self.segments.get(id.block().0 as usize).copied().flatten()
    }

    pub fn is_registered(&self, block: BlockId) -> bool {
        self.segments
            .get(block.0 as usize)
            .is_some_and(Option::is_some)
    }

    /// Largest id handed out.
    pub fn max_id(&self) -> DenseStateId {
        self.max
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_block_and_metadata() {
        let id = DenseStateId::new(BlockId(50), 0x13);
        assert_eq!(id.0, (50 << 4) | 3);
        assert_eq!(id.block(), BlockId(50));
        assert_eq!(id.metadata(), 3);
    }

    #[test]
    fn register_tracks_segments_and_max() {
        let mut index = GlobalStateIndex::new();
        index.register(BlockId(0), 0, &[0]);
        index.register(BlockId(7), 1, &[0, 1, 1]);
        assert_eq!(index.len(), 4);
        assert_eq!(index.dense_id(BlockState(2)), DenseStateId::new(BlockId(7), 1));
        assert_eq!(index.max_id(), DenseStateId::new(BlockId(7), 1));
        assert_eq!(index.segment(DenseStateId::new(BlockId(7), 9)), Some(1));
        assert_eq!(index.segment(DenseStateId::new(BlockId(8), 0)), None);
        assert!(!index.is_registered(BlockId(3)));
    }
}
