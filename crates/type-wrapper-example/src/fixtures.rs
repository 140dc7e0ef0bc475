//! Payload types used by the wrappers in `wrappers.rs`.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A payload with its own notion of equality and a fixed hash.
///
/// Two values are equal when `value` matches; `hash_code` is what gets hashed.
#[derive(Debug, Clone)]
pub struct RefType {
    pub value: i32,
    pub hash_code: u64,
}

impl RefType {
    pub fn new(value: i32, hash_code: u64) -> Self {
        Self { value, hash_code }
    }
}

impl PartialEq for RefType {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for RefType {}

impl Hash for RefType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SomeEnum {
    First,
    Second,
}
