use std::borrow::Cow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::StateError;

static NEXT_KEY: AtomicU32 = AtomicU32::new(0);

/// Process-unique identity of a property axis.
///
/// Two properties with the same name and domain are still distinct axes; a
/// block only answers to the exact properties it was registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyKey(u32);

impl PropertyKey {
    fn next() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

/// A value a property can take.
pub trait PropertyValue: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Name used in debug output and persisted palettes (`"north"`, `"true"`, `"3"`).
    fn serialized_name(&self) -> Cow<'static, str>;
}

impl PropertyValue for bool {
    fn serialized_name(&self) -> Cow<'static, str> {
        Cow::Borrowed(if *self { "true" } else { "false" })
    }
}

impl PropertyValue for i32 {
    fn serialized_name(&self) -> Cow<'static, str> {
        Cow::Owned(self.to_string())
    }
}

/// Declare a fieldless enum usable as a property value.
///
/// ```
/// blockstore_engine::property_enum! {
///     pub enum Half { Top => "top", Bottom => "bottom" }
/// }
/// assert_eq!(Half::ALL.len(), 2);
/// ```
#[macro_export]
macro_rules! property_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl $crate::state::PropertyValue for $name {
            fn serialized_name(&self) -> ::std::borrow::Cow<'static, str> {
                match self {
                    $($name::$variant => ::std::borrow::Cow::Borrowed($text)),+
                }
            }
        }
    };
}

crate::property_enum! {
    /// The six block faces.
    pub enum Facing {
        Down => "down",
        Up => "up",
        North => "north",
        South => "south",
        West => "west",
        East => "east",
    }
}

impl Facing {
    pub const HORIZONTAL: [Facing; 4] = [Facing::North, Facing::South, Facing::West, Facing::East];

    pub const fn opposite(self) -> Facing {
        match self {
            Facing::Down => Facing::Up,
            Facing::Up => Facing::Down,
            Facing::North => Facing::South,
            Facing::South => Facing::North,
            Facing::West => Facing::East,
            Facing::East => Facing::West,
        }
    }

    /// Unit offset `(dx, dy, dz)` of this face.
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Facing::Down => (0, -1, 0),
            Facing::Up => (0, 1, 0),
            Facing::North => (0, 0, -1),
            Facing::South => (0, 0, 1),
            Facing::West => (-1, 0, 0),
            Facing::East => (1, 0, 0),
        }
    }
}

crate::property_enum! {
    pub enum Axis {
        X => "x",
        Y => "y",
        Z => "z",
    }
}

#[derive(Debug)]
struct Domain<T> {
    key: PropertyKey,
    name: String,
    values: Box<[T]>,
}

/// A named axis of variation with an ordered, finite domain.
///
/// Cheap to clone: clones share the same identity.
#[derive(Debug, Clone)]
pub struct Property<T: PropertyValue> {
    domain: Arc<Domain<T>>,
}

impl<T: PropertyValue> Property<T> {
    pub fn new(
        name: impl Into<String>,
        values: impl IntoIterator<Item = T>,
    ) -> Result<Self, StateError> {
        let name = name.into();
        let values: Vec<T> = values.into_iter().collect();
        if values.is_empty() {
            return Err(StateError::EmptyDomain(name));
        }
        for (i, value) in values.iter().enumerate() {
            if values[..i].contains(value) {
                return Err(StateError::DuplicateValue {
                    property: name,
                    value: value.serialized_name().into_owned(),
                });
            }
        }
        Ok(Self::from_values(name, values))
    }

    fn from_values(name: String, values: Vec<T>) -> Self {
        Self {
            domain: Arc::new(Domain {
                key: PropertyKey::next(),
                name,
                values: values.into_boxed_slice(),
            }),
        }
    }

    pub fn key(&self) -> PropertyKey {
        self.domain.key
    }

    pub fn name(&self) -> &str {
        &self.domain.name
    }

    pub fn values(&self) -> &[T] {
        &self.domain.values
    }

    pub fn len(&self) -> usize {
        self.domain.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domain.values.is_empty()
    }

    pub fn contains(&self, value: T) -> bool {
        self.index_of(value).is_some()
    }

    pub fn index_of(&self, value: T) -> Option<usize> {
        self.domain.values.iter().position(|v| *v == value)
    }

    pub fn value_at(&self, index: usize) -> Option<T> {
        self.domain.values.get(index).copied()
    }

    /// The value after `value` in domain order, wrapping to the first.
    pub fn next_after(&self, value: T) -> Option<T> {
        let index = self.index_of(value)?;
        Some(self.domain.values[(index + 1) % self.domain.values.len()])
    }

    /// Type-erased handle used when registering a block.
    pub fn erased(&self) -> ErasedProperty {
        self.domain.clone()
    }

    pub(crate) fn disallowed(&self, value: T) -> StateError {
        StateError::DisallowedValue {
            property: self.domain.name.clone(),
            value: value.serialized_name().into_owned(),
        }
    }
}

impl Property<bool> {
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::from_values(name.into(), vec![false, true])
    }
}

impl Property<i32> {
    /// Integer property over `min..=max`.
    pub fn int_range(name: impl Into<String>, min: i32, max: i32) -> Result<Self, StateError> {
        Self::new(name, min..=max)
    }
}

impl<T: PropertyValue> PartialEq for Property<T> {
    fn eq(&self, other: &Self) -> bool {
        self.domain.key == other.domain.key
    }
}

impl<T: PropertyValue> Eq for Property<T> {}

impl<T: PropertyValue> From<&Property<T>> for ErasedProperty {
    fn from(property: &Property<T>) -> Self {
        property.erased()
    }
}

/// Property access without knowing the value type.
pub trait AnyProperty: fmt::Debug + Send + Sync {
    fn key(&self) -> PropertyKey;
    fn name(&self) -> &str;
    fn len(&self) -> usize;
    fn value_name(&self, index: usize) -> Option<Cow<'static, str>>;

    /// Domain index of the value serialized as `name`.
    fn index_of_name(&self, name: &str) -> Option<usize> {
        (0..self.len()).find(|&i| self.value_name(i).is_some_and(|n| n == name))
    }
}

impl<T: PropertyValue> AnyProperty for Domain<T> {
    fn key(&self) -> PropertyKey {
        self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn value_name(&self, index: usize) -> Option<Cow<'static, str>> {
        self.values.get(index).map(PropertyValue::serialized_name)
    }
}

pub type ErasedProperty = Arc<dyn AnyProperty>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_duplicate_domains() {
        assert_eq!(
            Property::<i32>::new("level", []).unwrap_err(),
            StateError::EmptyDomain("level".into())
        );
        assert!(matches!(
            Property::new("facing", [Facing::North, Facing::North]),
            Err(StateError::DuplicateValue { .. })
        ));
        assert!(Property::int_range("age", 3, 1).is_err());
    }

    #[test]
    fn next_after_wraps() {
        let age = Property::int_range("age", 0, 2).unwrap();
        assert_eq!(age.next_after(0), Some(1));
        assert_eq!(age.next_after(2), Some(0));
        assert_eq!(age.next_after(7), None);
    }

    #[test]
    fn same_name_is_not_same_property() {
        let a = Property::boolean("lit");
        let b = Property::boolean("lit");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn erased_names_values() {
        let axis = Property::new("axis", Axis::ALL.iter().copied()).unwrap();
        let erased = axis.erased();
        assert_eq!(erased.name(), "axis");
        assert_eq!(erased.len(), 3);
        assert_eq!(erased.value_name(1).as_deref(), Some("y"));
        assert_eq!(erased.index_of_name("z"), Some(2));
        assert_eq!(erased.key(), axis.key());
    }

    #[test]
    fn facing_helpers() {
        assert_eq!(Facing::North.opposite(), Facing::South);
        assert_eq!(Facing::East.offset(), (1, 0, 0));
        assert_eq!(Facing::ALL.len(), 6);
    }
}
