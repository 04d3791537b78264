//! Key reuse cache (§4.2 "Key Reuse Cache").
//!
//! A one-shot snapshot of `qntm_keys` seen in the primary collection at the
//! start of a pipeline run, handed to every generation call for that run.
//! Per §9 "Cyclic reuse cache vs. storage": this is a soft optimization, not
//! kept consistent with concurrent writes during the run.

use std::collections::BTreeSet;

/// Immutable per-run snapshot of existing QNTM keys.
#[derive(Debug, Clone, Default)]
pub struct ReuseCache {
    keys: BTreeSet<String>,
}

impl ReuseCache {
    pub fn from_keys<I: IntoIterator<Item = String>>(keys: I) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// A bounded sample to include in a generation prompt; deterministic
    /// ordering (`BTreeSet`) keeps prompts stable across runs for the same
    /// snapshot.
    pub fn sample(&self, limit: usize) -> Vec<String> {
        self.keys.iter().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_deterministically_ordered() {
        let cache = ReuseCache::from_keys(vec![
            "z ~ y ~ x".to_string(),
            "a ~ b ~ c".to_string(),
        ]);
        assert_eq!(cache.sample(10), vec!["a ~ b ~ c".to_string(), "z ~ y ~ x".to_string()]);
    }

    #[test]
    fn sample_respects_limit() {
        let cache = ReuseCache::from_keys((0..10).map(|i| format!("k{i} ~ b ~ c")));
        assert_eq!(cache.sample(3).len(), 3);
    }
}
