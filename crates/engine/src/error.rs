use thiserror::Error;

/// Contract violations around properties and state transitions.
///
/// These indicate a registration or programming bug; callers should treat
/// them as fatal rather than recover.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("block `{block}` has no property `{property}`")]
    UnknownProperty { block: String, property: String },

    #[error("value `{value}` is not allowed for property `{property}`")]
    DisallowedValue { property: String, value: String },

    #[error("property `{0}` has an empty domain")]
    EmptyDomain(String),

    #[error("property `{property}` lists value `{value}` more than once")]
    DuplicateValue { property: String, value: String },

    #[error("block `{block}` declares property `{property}` twice")]
    DuplicateProperty { block: String, property: String },

    #[error("block `{block}` would generate {count} states (limit {limit})")]
    TooManyStates {
        block: String,
        count: usize,
        limit: usize,
    },

    #[error("transition table for `{0}` was already built")]
    TransitionsAlreadyBuilt(String),

    #[error("transition table for `{0}` has not been built")]
    TransitionsNotBuilt(String),

    #[error("detached state belongs to a different property layout than `{0}`")]
    LayoutMismatch(String),
}

/// Errors raised while assembling a [`crate::registry::BlockRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("block id {0} is outside the 12-bit dense id range")]
    IdOutOfRange(u16),

    #[error("block id {0} is already registered")]
    DuplicateId(u16),

    #[error("block name `{0}` is already registered")]
    DuplicateName(String),

    #[error("no block registered at id 0 (the default/air block)")]
    MissingDefault,

    #[error(transparent)]
    State(#[from] StateError),
}

/// Malformed persisted or generated data handed to the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("`{field}` has {actual} bytes, expected {expected}")]
    BadLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("section band {0} is outside the column (0..16)")]
    BandOutOfRange(u8),

    #[error("generation buffer has {actual} entries, expected {expected}")]
    BufferLength { expected: usize, actual: usize },

    #[error("height map has {actual} entries, expected {expected}")]
    HeightMapLength { expected: usize, actual: usize },
}
