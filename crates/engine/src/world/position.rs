use crate::state::Facing;

/// Absolute block position in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The chunk column this block belongs to.
    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: self.x >> 4,
            z: self.z >> 4,
        }
    }

    /// Position within the chunk (x, z in 0..16; y unchanged).
    pub const fn local(&self) -> LocalBlockPos {
        LocalBlockPos {
            x: (self.x & 0xF) as u8,
            y: self.y,
            z: (self.z & 0xF) as u8,
        }
    }

    pub const fn offset(&self, facing: Facing) -> BlockPos {
        let (dx, dy, dz) = facing.offset();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The six cardinal neighbors.
    pub const fn neighbors(&self) -> [BlockPos; 6] {
        [
            Self::new(self.x + 1, self.y, self.z),
            Self::new(self.x - 1, self.y, self.z),
            Self::new(self.x, self.y + 1, self.z),
            Self::new(self.x, self.y - 1, self.z),
            Self::new(self.x, self.y, self.z + 1),
            Self::new(self.x, self.y, self.z - 1),
        ]
    }
}

/// Chunk column position (each chunk is 16x16 blocks horizontally).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub const fn block_origin(&self, y: i32) -> BlockPos {
        BlockPos::new(self.x << 4, y, self.z << 4)
    }

    /// Absolute position of local column `(x, z)` at height `y`.
    pub const fn block_at(&self, x: usize, y: i32, z: usize) -> BlockPos {
        BlockPos::new((self.x << 4) + x as i32, y, (self.z << 4) + z as i32)
    }
}

/// Block position local to a chunk (x, z in 0..16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalBlockPos {
    pub x: u8,
    pub y: i32,
    pub z: u8,
}

impl LocalBlockPos {
    pub const fn section_index(&self) -> i32 {
        self.y >> 4
    }

    pub const fn section_local_y(&self) -> u8 {
        self.y.rem_euclid(16) as u8
    }

    /// Index into 256-entry per-column maps: `z << 4 | x`.
    pub const fn column(&self) -> usize {
        ((self.z as usize) << 4) | self.x as usize
    }
}
