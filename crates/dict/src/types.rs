use std::marker::PhantomData;

use crate::hash::{gen_case_hash, gen_hash, int_hash};

/// Describes how a [`Dict`](crate::Dict) treats its keys and values.
///
/// The implementing value is handed to every callback, so any context the
/// callbacks need lives in `self`.
pub trait DictType {
    type Key;
    type Value;

    /// Must return the same hash for a key for as long as it is stored
    fn hash(&self, key: &Self::Key) -> u32;

    fn key_eq(&self, a: &Self::Key, b: &Self::Key) -> bool;

    /// Applied to every key before it is stored
    fn dup_key(&self, key: Self::Key) -> Self::Key {
        key
    }

    /// Applied to every value passed to `insert`/`insert_or_replace`
    fn dup_val(&self, val: Self::Value) -> Self::Value {
        val
    }

    /// Runs when an entry is destroyed by the dictionary
    fn free_key(&self, key: Self::Key) {
        drop(key);
    }

    /// Runs when a stored value is destroyed or replaced by the dictionary
    fn free_val(&self, val: Self::Value) {
        drop(val);
    }
}

/// `String` keys compared byte for byte
#[derive(Debug)]
pub struct StringKeys<V>(PhantomData<fn() -> V>);

impl<V> StringKeys<V> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<V> Default for StringKeys<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> DictType for StringKeys<V> {
    type Key = String;
    type Value = V;

    fn hash(&self, key: &String) -> u32 {
        gen_hash(key.as_bytes())
    }

    fn key_eq(&self, a: &String, b: &String) -> bool {
        a == b
    }
}

/// `String` keys where ASCII case does not matter, `"GET"` and `"get"`
/// are the same key
#[derive(Debug)]
pub struct CaseStringKeys<V>(PhantomData<fn() -> V>);

impl<V> CaseStringKeys<V> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<V> Default for CaseStringKeys<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> DictType for CaseStringKeys<V> {
    type Key = String;
    type Value = V;

    fn hash(&self, key: &String) -> u32 {
        gen_case_hash(key.as_bytes())
    }

    fn key_eq(&self, a: &String, b: &String) -> bool {
        a.eq_ignore_ascii_case(b)
    }
}

/// `u32` keys
#[derive(Debug)]
pub struct IntKeys<V>(PhantomData<fn() -> V>);

impl<V> IntKeys<V> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<V> Default for IntKeys<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> DictType for IntKeys<V> {
    type Key = u32;
    type Value = V;

    fn hash(&self, key: &u32) -> u32 {
        int_hash(*key)
    }

    fn key_eq(&self, a: &u32, b: &u32) -> bool {
        a == b
    }
}
