//! Linear traversal over sequence-like and mapping-like collections.
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::BuildHasher;

/// A collection that can hand each of its elements to a callback, in order.
///
/// The callback receives the element, its index (sequences) or key (maps), and
/// the collection itself.
pub trait Traverse {
    type Key;
    type Item;

    fn traverse<F>(&self, callback: F)
    where
        F: FnMut(&Self::Item, &Self::Key, &Self);
}

impl<T> Traverse for [T] {
    type Key = usize;
    type Item = T;

    fn traverse<F>(&self, mut callback: F)
    where
        F: FnMut(&T, &usize, &Self),
    {
        for (index, item) in self.iter().enumerate() {
            callback(item, &index, self);
        }
    }
}

impl<T, const N: usize> Traverse for [T; N] {
    type Key = usize;
    type Item = T;

    fn traverse<F>(&self, mut callback: F)
    where
        F: FnMut(&T, &usize, &Self),
    {
        for (index, item) in self.iter().enumerate() {
            callback(item, &index, self);
        }
    }
}

impl<T> Traverse for Vec<T> {
    type Key = usize;
    type Item = T;

    fn traverse<F>(&self, mut callback: F)
    where
        F: FnMut(&T, &usize, &Self),
    {
        for (index, item) in self.iter().enumerate() {
            callback(item, &index, self);
        }
    }
}

impl<T> Traverse for VecDeque<T> {
    type Key = usize;
    type Item = T;

    fn traverse<F>(&self, mut callback: F)
    where
        F: FnMut(&T, &usize, &Self),
    {
        for (index, item) in self.iter().enumerate() {
            callback(item, &index, self);
        }
    }
}

impl<K, V> Traverse for BTreeMap<K, V> {
    type Key = K;
    type Item = V;

    fn traverse<F>(&self, mut callback: F)
    where
        F: FnMut(&V, &K, &Self),
    {
        for (key, value) in self {
            callback(value, key, self);
        }
    }
}

/// Visits entries in the map's own iteration order, which is unspecified.
impl<K, V, S> Traverse for HashMap<K, V, S>
where
    S: BuildHasher,
{
    type Key = K;
    type Item = V;

    fn traverse<F>(&self, mut callback: F)
    where
        F: FnMut(&V, &K, &Self),
    {
        for (key, value) in self {
            callback(value, key, self);
        }
    }
}

/// Invokes `callback(element, index_or_key, collection)` once per element.
///
/// An absent collection is not an error: the callback is simply never invoked.
///
/// ```
/// use callguard::each;
///
/// let mut seen = Vec::new();
/// each(Some(&vec!["a", "b"]), |item, index, _| seen.push((*index, *item)));
/// assert_eq!(seen, [(0, "a"), (1, "b")]);
/// ```
pub fn each<C, F>(collection: Option<&C>, callback: F)
where
    C: Traverse + ?Sized,
    F: FnMut(&C::Item, &C::Key, &C),
{
    if let Some(collection) = collection {
        collection.traverse(callback);
    }
}
