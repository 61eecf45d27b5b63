//! Code for handling IDs
use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};

/// A trait alias for ID types
pub trait IDLike:
    Eq + std::hash::Hash + Copy + Ord + std::fmt::Display + std::fmt::Debug + From<u32>
{
}
impl<T> IDLike for T where
    T: Eq + std::hash::Hash + Copy + Ord + std::fmt::Display + std::fmt::Debug + From<u32>
{
}

/// Define a numeric ID type (e.g. `ZoneID`, `TechnologyID`, etc.)
macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            Copy,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Debug,
            serde::Deserialize,
            serde::Serialize,
            derive_more::Display,
        )]
        #[serde(transparent)]
        /// A numeric ID type
        pub struct $name(pub u32);

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                $name(id)
            }
        }

        impl $name {
            /// Get the underlying number
            pub fn value(self) -> u32 {
                self.0
            }
        }
    };
}
pub(crate) use define_id_type;

#[cfg(test)]
define_id_type!(GenericID);

/// Indicates that the struct has an ID field
pub trait HasID<ID: IDLike> {
    /// Get the struct's ID
    fn get_id(&self) -> ID;
}

/// Implement the `HasID` trait for the given type, assuming it has a field called `id`
macro_rules! define_id_getter {
    ($t:ty, $id_ty:ty) => {
        impl crate::id::HasID<$id_ty> for $t {
            fn get_id(&self) -> $id_ty {
                self.id
            }
        }
    };
}
pub(crate) use define_id_getter;

/// A data structure containing a set of IDs
pub trait IDCollection<ID: IDLike> {
    /// Check if the ID is in the collection, returning a copy of it if found.
    ///
    /// # Arguments
    ///
    /// * `id` - The ID to check
    ///
    /// # Returns
    ///
    /// A copy of the ID in `self`, or an error if not found.
    fn check_id(&self, id: ID) -> Result<ID>;
}

impl<ID: IDLike> IDCollection<ID> for IndexSet<ID> {
    fn check_id(&self, id: ID) -> Result<ID> {
        let found = self.get(&id).with_context(|| format!("Unknown ID {id} found"))?;
        Ok(*found)
    }
}

impl<ID: IDLike, V> IDCollection<ID> for IndexMap<ID, V> {
    fn check_id(&self, id: ID) -> Result<ID> {
        let (found, _) = self
            .get_key_value(&id)
            .with_context(|| format!("Unknown ID {id} found"))?;
        Ok(*found)
    }
}

/// Build an [`IndexMap`] keyed by ID from an iterator of items, rejecting duplicates
pub fn collect_by_id<ID, T, I>(iter: I) -> Result<IndexMap<ID, T>>
where
    ID: IDLike,
    T: HasID<ID>,
    I: IntoIterator<Item = T>,
{
    let mut map = IndexMap::new();
    for item in iter {
        let id = item.get_id();
        anyhow::ensure!(map.insert(id, item).is_none(), "Duplicate ID {id} found");
    }

    Ok(map)
}
