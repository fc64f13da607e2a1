//! Spatial storage: sections, chunks and what hangs off them.

pub mod chunk;
pub mod entity;
pub mod nibble;
pub mod packed;
pub mod position;
pub mod section;
pub mod snapshot;
pub mod tile;

pub use chunk::{Chunk, StateChange};
pub use position::{BlockPos, ChunkPos};
pub use section::SectionStorage;
pub use snapshot::{ChunkSnapshot, SectionData};

/// The two light channels stored per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightChannel {
    Sky,
    Block,
}

impl LightChannel {
    /// Light assumed where nothing is stored.
    pub const fn default_value(self) -> u8 {
        match self {
            LightChannel::Sky => 15,
            LightChannel::Block => 0,
        }
    }
}
