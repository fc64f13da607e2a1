use super::Chunk;
use crate::world::entity::EntityKey;
use crate::world::position::ChunkPos;
use crate::world::section::SECTION_COUNT;
use crate::world::snapshot::ChunkSnapshot;

/// A chunk on its way out.
///
/// Only entity buckets can be inspected; block, light and tile access is
/// gone. [`UnloadingChunk::flush`] finishes the unload.
pub struct UnloadingChunk {
    chunk: Chunk,
}

impl UnloadingChunk {
    pub(super) fn new(chunk: Chunk) -> Self {
        tracing::trace!(chunk = ?chunk.pos(), "unloading");
        Self { chunk }
    }

    pub fn pos(&self) -> ChunkPos {
        self.chunk.pos()
    }

    /// Entities still bucketed here, bottom band first. The host moves or
    /// despawns them before flushing.
    pub fn entities(&self) -> impl Iterator<Item = EntityKey> + '_ {
        (0..SECTION_COUNT).flat_map(|bucket| self.chunk.entities_in(bucket).iter().copied())
    }

    pub fn has_entities(&self) -> bool {
        self.chunk.has_entities()
    }

    pub fn is_modified(&self) -> bool {
        self.chunk.is_modified()
    }

    /// Invalidate every tile entity and hand back the persisted form.
    pub fn flush(mut self) -> ChunkSnapshot {
        for tile in self.chunk.tiles.values_mut() {
            tile.invalidate();
        }
        self.chunk.snapshot()
    }
}

impl std::fmt::Debug for UnloadingChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnloadingChunk").field("pos", &self.pos()).finish()
    }
}
