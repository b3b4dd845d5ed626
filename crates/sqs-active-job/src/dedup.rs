//! Keys excluded from FIFO message deduplication.

use crate::queue::canonical_key;
use std::collections::BTreeSet;

/// Job attribute that is always excluded from deduplication
pub const JOB_ID_KEY: &str = "job_id";

/// Set of job attribute names excluded when hashing a job for FIFO
/// deduplication.
///
/// Always contains [`JOB_ID_KEY`]: every job carries a unique id, so hashing
/// it would make every submission distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeduplicationKeys(BTreeSet<String>);

impl DeduplicationKeys {
    /// Build the key set from caller-supplied identifiers.
    ///
    /// Each identifier is reduced to its string form (`:job_class` and
    /// `job_class` are the same key) and the result is unioned with
    /// `{"job_id"}`.
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut set: BTreeSet<String> = keys
            .into_iter()
            .map(|key| canonical_key(key.as_ref()).to_string())
            .collect();
        set.insert(JOB_ID_KEY.to_string());
        Self(set)
    }

    /// Check whether an attribute is excluded from deduplication
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(canonical_key(key))
    }

    /// Iterate the excluded keys in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false, `job_id` is always present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for DeduplicationKeys {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}

impl From<Vec<String>> for DeduplicationKeys {
    fn from(keys: Vec<String>) -> Self {
        Self::new(keys)
    }
}

impl From<DeduplicationKeys> for Vec<String> {
    fn from(keys: DeduplicationKeys) -> Self {
        keys.0.into_iter().collect()
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
