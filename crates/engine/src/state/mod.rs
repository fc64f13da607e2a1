//! Block properties and the two block-state representations.
//!
//! [`BlockState`] is the interned form: a `Copy` handle into the registry's
//! state arena, where equal property mappings are the same handle and every
//! single-property change is a table lookup. [`DetachedState`] carries its own
//! freshly allocated mapping and compares structurally. Both implement
//! [`StateView`]; never compare across the two.

mod detached;
mod property;
mod table;
mod view;

pub use detached::DetachedState;
pub use property::{AnyProperty, Axis, ErasedProperty, Facing, Property, PropertyKey, PropertyValue};
pub use table::{MAX_STATES_PER_BLOCK, StateTable};
pub use view::{StateRef, StateView};

/// Interned block state.
///
/// An index into the owning [`crate::registry::BlockRegistry`]'s state arena.
/// Handles are only meaningful with the registry that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockState(pub(crate) u32);

impl BlockState {
    /// Position in the registry's state arena.
    pub const fn index(self) -> u32 {
        self.0
    }
}
