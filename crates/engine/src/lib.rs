//! Voxel state storage core.
//!
//! Blocks declare properties; the registry interns every property combination
//! as a canonical [`state::BlockState`] and gives it a dense 16-bit id. Chunks
//! store those ids in bit-packed 16³ sections alongside block/sky light and
//! per-column height maps.

pub mod error;
pub mod registry;
pub mod state;
pub mod world;
