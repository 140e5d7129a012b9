//! Slot store trait definition.

use crate::error::{SlotError, SlotResult};

/// A flat key-value slot space.
///
/// Slot stores hold **opaque strings** under string keys. They know nothing
/// about the JSON documents innkeep writes into them.
///
/// # Invariants
///
/// - `get` returns exactly the value of the last successful `set`
/// - `set` replaces the whole value; there are no partial writes
/// - `remove` of a missing key succeeds
/// - Stores must be `Send + Sync` for shared access
///
/// # Implementors
///
/// - [`super::InMemorySlots`] - For testing
/// - [`super::FileSlots`] - For persistent storage
pub trait SlotStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if the slot is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the value cannot be read.
    fn get(&self, key: &str) -> SlotResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid, the store is over quota,
    /// or an I/O error occurs.
    fn set(&self, key: &str, value: &str) -> SlotResult<()>;

    /// Removes the slot under `key`. Removing a missing slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn remove(&self, key: &str) -> SlotResult<()>;

    /// Lists all keys currently holding a value, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be enumerated.
    fn keys(&self) -> SlotResult<Vec<String>>;

    /// Returns true if `key` currently holds a value.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`SlotStore::get`].
    fn contains(&self, key: &str) -> SlotResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Checks that `key` is usable as a slot name.
///
/// Keys are non-empty, at most 128 bytes, and made of ASCII letters,
/// digits, `_`, `-` and `.`, and never start with `.`.
///
/// # Errors
///
/// Returns [`SlotError::InvalidKey`] if the key does not qualify.
pub fn validate_key(key: &str) -> SlotResult<()> {
    let well_formed = !key.is_empty()
        && key.len() <= 128
        && !key.starts_with('.')
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'));

    if well_formed {
        Ok(())
    } else {
        Err(SlotError::InvalidKey(key.to_string()))
    }
}
