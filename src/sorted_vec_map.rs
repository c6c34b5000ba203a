//! A small ordered map backed by a sorted `SmallVec`, adapted from
//! `chapaty::sorted_vec_map`. The engine keeps per-(application, substance)
//! state keyed by small, append-mostly key sets (streams, units), where a
//! `SmallVec` with binary search beats a `HashMap`'s hashing overhead and
//! gives deterministic iteration order for free, which `EngineResult`
//! serialization relies on.
//!
//! `N` is the inline capacity before the backing `SmallVec` spills to the
//! heap; 8 covers every per-substance key set this engine builds (six stream
//! kinds, a handful of unit pairs).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SortedVecMap<K, V, const N: usize = 8> {
    inner: SmallVec<[(K, V); N]>,
}

impl<K: Ord, V, const N: usize> SortedVecMap<K, V, N> {
    pub fn new() -> Self {
        Self { inner: SmallVec::new() }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.binary_search_by(|(k, _)| k.cmp(key)).ok().map(|i| &self.inner[i].1)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self.inner.binary_search_by(|(k, _)| k.cmp(key)) {
            Ok(i) => Some(&mut self.inner[i].1),
            Err(_) => None,
        }
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.inner.binary_search_by(|(k, _)| k.cmp(&key)) {
            Ok(i) => Some(std::mem::replace(&mut self.inner[i].1, value)),
            Err(i) => {
                self.inner.insert(i, (key, value));
                None
            }
        }
    }

    pub fn entry_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> &mut V {
        let idx = match self.inner.binary_search_by(|(k, _)| k.cmp(&key)) {
            Ok(i) => i,
            Err(i) => {
                self.inner.insert(i, (key, default()));
                i
            }
        };
        &mut self.inner[idx].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_sorted_by_key() {
        let mut m: SortedVecMap<i32, &str> = SortedVecMap::new();
        m.insert(3, "c");
        m.insert(1, "a");
        m.insert(2, "b");
        let keys: Vec<_> = m.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }

    #[test]
    fn entry_or_insert_with_reuses_existing() {
        let mut m: SortedVecMap<i32, Vec<i32>> = SortedVecMap::new();
        m.entry_or_insert_with(1, Vec::new).push(10);
        m.entry_or_insert_with(1, Vec::new).push(20);
        assert_eq!(m.get(&1).unwrap(), &vec![10, 20]);
    }

    #[test]
    fn serializes_round_trip() {
        let mut m: SortedVecMap<i32, &str> = SortedVecMap::new();
        m.insert(1, "a");
        let json = serde_json::to_string(&m).unwrap();
        let back: SortedVecMap<i32, &str> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(&1), Some(&"a"));
    }
}
