//! A map whose entries can be written once and never overwritten.

use std::collections::HashMap;
use std::hash::Hash;

/// Records the first value seen per key and ignores every later one.
///
/// Used for the locations participants had before a match touched them:
/// activating twice must not replace "where they came from" with "the team
/// channel they were just moved to".
#[derive(Debug, Clone)]
pub struct ClaimOnce<K, V> {
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V> ClaimOnce<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Stores `value` under `key` unless the key is already claimed.
    /// Returns `true` if this call made the claim.
    pub fn claim(&mut self, key: K, value: V) -> bool {
        match self.entries.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash, V> Default for ClaimOnce<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_first_write_wins() {
        let mut map = ClaimOnce::new();

        assert!(map.claim(1, "general"));
        assert!(!map.claim(1, "team 1"));

        assert_eq!(map.get(&1), Some(&"general"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_claim_none_value_still_counts() {
        let mut map: ClaimOnce<u64, Option<u64>> = ClaimOnce::new();

        assert!(map.claim(7, None));
        assert!(!map.claim(7, Some(3)));

        assert!(map.contains(&7));
        assert_eq!(map.get(&7), Some(&None));
    }
}
