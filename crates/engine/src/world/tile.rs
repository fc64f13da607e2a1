use std::fmt;

/// Auxiliary mutable data attached to one position (containers, signs, ...).
///
/// The chunk only indexes tile entities by position and tracks their
/// validity; what they hold is up to the host.
pub trait TileEntity: fmt::Debug + Send + Sync {
    /// An invalid tile is dropped from the index the next time it is looked up.
    fn is_invalid(&self) -> bool;

    fn invalidate(&mut self);

    fn validate(&mut self);

    /// Forget anything cached about the block state at this position.
    fn reset_cached_state(&mut self) {}

    /// Downcasting hook for hosts.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// What a tile lookup does when no valid tile is indexed at the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileLookup {
    /// Create one from the block now.
    Immediate,
    /// Queue the position for the world to create one later.
    Queued,
    /// Only report what is there.
    Check,
}
