//! Type-keyed extension data attached to solver frames.
//!
//! Decoders for optional payload types store their results here instead
//! of growing [`SolverFrame`](crate::SolverFrame) with one field per
//! feature. Values are shared through `Arc`, so cloning a frame is cheap.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

/// A small heterogeneous map keyed by the value's concrete type.
///
/// At most one value per type is stored.
#[derive(Clone, Default)]
pub struct CustomFrameData {
    entries: IndexMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl CustomFrameData {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, replacing any previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Borrow the value of type `T`, if present.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Mutably borrow the value of type `T`.
    ///
    /// Returns `None` when absent or when the value is currently shared
    /// with another clone of this map.
    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(Arc::get_mut)
            .and_then(|v| v.downcast_mut::<T>())
    }

    /// Whether a value of type `T` is present.
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no values are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy every entry of `other` into `self`; `other` wins on conflict.
    pub fn merge_from(&mut self, other: &CustomFrameData) {
        for (k, v) in &other.entries {
            self.entries.insert(*k, Arc::clone(v));
        }
    }
}

/// Two maps are equal when they hold the same shared values per type.
impl PartialEq for CustomFrameData {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.entries.get(k).is_some_and(|o| Arc::ptr_eq(v, o)))
    }
}

impl fmt::Debug for CustomFrameData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFrameData")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Broadphase(u32);

    #[derive(Debug, PartialEq)]
    struct Islands(Vec<u32>);

    #[test]
    fn insert_replaces_same_type() {
        let mut data = CustomFrameData::new();
        data.insert(Broadphase(1));
        data.insert(Islands(vec![1, 2]));
        data.insert(Broadphase(2));
        assert_eq!(data.len(), 2);
        assert_eq!(data.get::<Broadphase>(), Some(&Broadphase(2)));
        assert!(data.get::<u64>().is_none());
    }

    #[test]
    fn get_mut_refuses_shared_values() {
        let mut data = CustomFrameData::new();
        data.insert(Broadphase(1));
        let clone = data.clone();
        assert!(data.get_mut::<Broadphase>().is_none());
        drop(clone);
        data.get_mut::<Broadphase>().unwrap().0 = 9;
        assert_eq!(data.get::<Broadphase>(), Some(&Broadphase(9)));
    }

    #[test]
    fn merge_prefers_incoming() {
        let mut older = CustomFrameData::new();
        older.insert(Broadphase(1));
        older.insert(Islands(vec![]));
        let mut newer = CustomFrameData::new();
        newer.insert(Broadphase(5));

        older.merge_from(&newer);
        assert_eq!(older.get::<Broadphase>(), Some(&Broadphase(5)));
        assert!(older.contains::<Islands>());
    }

    #[test]
    fn clones_compare_equal_until_replaced() {
        let mut a = CustomFrameData::new();
        a.insert(Broadphase(1));
        let b = a.clone();
        assert_eq!(a, b);
        a.insert(Broadphase(1));
        assert_ne!(a, b);
    }
}
