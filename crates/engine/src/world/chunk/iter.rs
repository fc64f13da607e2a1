use super::{COLUMN_HEIGHT, COLUMNS, Chunk};
use crate::state::BlockState;
use crate::world::position::BlockPos;
use crate::world::section::SECTION_VOLUME;

const END: usize = COLUMNS * COLUMN_HEIGHT as usize;

/// Lazy walk over a chunk's cells in `(y << 8) | (z << 4) | x` order.
///
/// A clone continues independently from the same cell.
#[derive(Clone)]
pub struct ChunkStates<'a> {
    chunk: &'a Chunk,
    next: usize,
    occupied_only: bool,
}

impl Iterator for ChunkStates<'_> {
    type Item = (BlockPos, BlockState);

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < END {
            let index = self.next;
            let band = index / SECTION_VOLUME;
            let section = self.chunk.sections[band].as_ref();
            if self.occupied_only && section.is_none_or(|s| s.is_empty()) {
                self.next = (band + 1) * SECTION_VOLUME;
                continue;
            }
            self.next += 1;

            let (x, y, z) = (index & 0xF, (index >> 8) as i32, (index >> 4) & 0xF);
            let state = match section {
                Some(section) => section.get_state(x, (y & 0xF) as usize, z),
                None => self.chunk.registry.default_state(),
            };
            if self.occupied_only && self.chunk.registry.is_air(state) {
                continue;
            }
            return Some((self.chunk.pos.block_at(x, y, z), state));
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = END - self.next;
        if self.occupied_only { (0, Some(remaining)) } else { (remaining, Some(remaining)) }
    }
}

impl Chunk {
    /// Every cell of the chunk with its state, absent sections included.
    pub fn states(&self) -> ChunkStates<'_> {
        ChunkStates {
            chunk: self,
            next: 0,
            occupied_only: false,
        }
    }

    /// Non-air cells only; absent and empty sections are skipped whole.
    pub fn occupied_states(&self) -> ChunkStates<'_> {
        ChunkStates {
            chunk: self,
            next: 0,
            occupied_only: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::tests::fixture;
    use super::*;
    use crate::world::position::ChunkPos;

    #[test]
    fn full_walk_covers_every_cell() {
        let f = fixture();
        let chunk = Chunk::empty(Arc::clone(&f.registry), ChunkPos::new(1, 1));
        let mut states = chunk.states();
        assert_eq!(states.size_hint(), (END, Some(END)));
        assert_eq!(states.next(), Some((BlockPos::new(16, 0, 16), f.air)));
        assert_eq!(states.count(), END - 1);
    }

    #[test]
    fn occupied_walk_skips_air_and_restarts_from_clone() {
        let f = fixture();
        let mut chunk = Chunk::empty(Arc::clone(&f.registry), ChunkPos::new(0, 0));
        chunk.set_state(BlockPos::new(3, 200, 4), f.glass);
        chunk.set_state(BlockPos::new(1, 2, 3), f.stone);
        chunk.set_state(BlockPos::new(5, 40, 5), f.stone);
        chunk.set_state(BlockPos::new(5, 40, 5), f.air);

        let occupied = chunk.occupied_states();
        let snapshot = occupied.clone();
        let found: Vec<_> = occupied.collect();
        assert_eq!(
            found,
            vec![(BlockPos::new(1, 2, 3), f.stone), (BlockPos::new(3, 200, 4), f.glass)]
        );
        assert_eq!(snapshot.count(), 2);
    }
}
