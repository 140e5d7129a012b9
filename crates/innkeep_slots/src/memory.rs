//! In-memory slot store.

use crate::error::{SlotError, SlotResult};
use crate::store::{validate_key, SlotStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory slot store.
///
/// Suitable for:
/// - Unit and integration tests
/// - Sessions that do not need to survive the process
///
/// An optional quota caps the total size of keys plus values, the way a
/// browser caps its key-value storage. Writes that would exceed it fail
/// with [`SlotError::QuotaExceeded`] and leave the previous value intact.
///
/// # Example
///
/// ```rust
/// use innkeep_slots::{SlotStore, InMemorySlots};
///
/// let slots = InMemorySlots::with_quota(16);
/// slots.set("a", "[]").unwrap();
/// assert!(slots.set("b", "a value that is far too long").is_err());
/// ```
#[derive(Debug, Default)]
pub struct InMemorySlots {
    slots: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl InMemorySlots {
    /// Creates a new empty store with no quota.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty store capped at `quota` bytes.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            slots: RwLock::new(BTreeMap::new()),
            quota: Some(quota),
        }
    }

    /// Creates a store with pre-existing slots.
    ///
    /// Useful for testing how the adapter reads data it did not write.
    #[must_use]
    pub fn with_slots<I, K, V>(slots: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            slots: RwLock::new(
                slots
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            quota: None,
        }
    }

    /// Returns the number of bytes currently used by keys and values.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.slots
            .read()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    /// Removes every slot.
    pub fn clear(&self) {
        self.slots.write().clear();
    }
}

impl SlotStore for InMemorySlots {
    fn get(&self, key: &str) -> SlotResult<Option<String>> {
        validate_key(key)?;
        Ok(self.slots.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> SlotResult<()> {
        validate_key(key)?;
        let mut slots = self.slots.write();

        if let Some(quota) = self.quota {
            let others: usize = slots
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(SlotError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    quota,
                });
            }
        }

        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> SlotResult<()> {
        validate_key(key)?;
        self.slots.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> SlotResult<Vec<String>> {
        Ok(self.slots.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let slots = InMemorySlots::new();
        assert!(slots.keys().unwrap().is_empty());
        assert_eq!(slots.used_bytes(), 0);
    }

    #[test]
    fn memory_set_then_get() {
        let slots = InMemorySlots::new();
        slots.set("bookings", "[{\"id\":1}]").unwrap();
        assert_eq!(
            slots.get("bookings").unwrap().as_deref(),
            Some("[{\"id\":1}]")
        );
    }

    #[test]
    fn memory_set_replaces_value() {
        let slots = InMemorySlots::new();
        slots.set("rooms", "[1]").unwrap();
        slots.set("rooms", "[2]").unwrap();
        assert_eq!(slots.get("rooms").unwrap().as_deref(), Some("[2]"));
        assert_eq!(slots.keys().unwrap(), vec!["rooms".to_string()]);
    }

    #[test]
    fn memory_missing_slot_is_none() {
        let slots = InMemorySlots::new();
        assert!(slots.get("guests").unwrap().is_none());
        assert!(!slots.contains("guests").unwrap());
    }

    #[test]
    fn memory_remove_missing_is_ok() {
        let slots = InMemorySlots::new();
        assert!(slots.remove("nothing").is_ok());
    }

    #[test]
    fn memory_invalid_key_rejected() {
        let slots = InMemorySlots::new();
        assert!(matches!(
            slots.set("../x", "[]"),
            Err(SlotError::InvalidKey(_))
        ));
    }

    #[test]
    fn memory_quota_rejects_and_keeps_old_value() {
        let slots = InMemorySlots::with_quota(12);
        slots.set("rooms", "[1]").unwrap();

        let result = slots.set("rooms", "[1,2,3,4,5,6]");
        assert!(matches!(result, Err(SlotError::QuotaExceeded { .. })));
        assert_eq!(slots.get("rooms").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn memory_quota_counts_replacement_not_sum() {
        let slots = InMemorySlots::with_quota(10);
        slots.set("k", "12345678").unwrap();
        // Replacing the same key must not count the old value.
        slots.set("k", "87654321").unwrap();
    }

    #[test]
    fn memory_with_slots_preloads() {
        let slots = InMemorySlots::with_slots([("rooms", "[]"), ("tasks", "[]")]);
        assert_eq!(slots.keys().unwrap().len(), 2);
        slots.clear();
        assert!(slots.keys().unwrap().is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[derive(Debug, Clone)]
    enum Op {
        Set(String, String),
        Remove(String),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let key = "[a-c]{1,2}";
        prop_oneof![
            (key, "[ -~]{0,16}").prop_map(|(k, v)| Op::Set(k, v)),
            key.prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn matches_a_plain_map(ops in prop::collection::vec(op_strategy(), 0..40)) {
            let slots = InMemorySlots::new();
            let mut model = HashMap::new();

            for op in ops {
                match op {
                    Op::Set(k, v) => {
                        slots.set(&k, &v).unwrap();
                        model.insert(k, v);
                    }
                    Op::Remove(k) => {
                        slots.remove(&k).unwrap();
                        model.remove(&k);
                    }
                }
            }

            let used: usize = model.iter().map(|(k, v)| k.len() + v.len()).sum();
            prop_assert_eq!(slots.used_bytes(), used);
            for (k, v) in &model {
                let got = slots.get(k).unwrap();
                prop_assert_eq!(got.as_ref(), Some(v));
            }
            prop_assert_eq!(slots.keys().unwrap().len(), model.len());
        }

        #[test]
        fn rejects_keys_with_separators(prefix in "[a-z]{0,4}", suffix in "[a-z]{0,4}") {
            let key = format!("{prefix}/{suffix}");
            prop_assert!(matches!(validate_key(&key), Err(SlotError::InvalidKey(_))));
        }
    }
}
