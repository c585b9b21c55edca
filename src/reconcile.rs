use crate::models::sample::RawSample;
use std::collections::BTreeSet;

/// The set of category/path keys currently exposed downstream.
///
/// Owned by the scheduling path and mutated only via [`PublishedSet::commit`]
/// after a cycle's breakdown is fully computed, never partially.
#[derive(Debug, Default, Clone)]
pub struct PublishedSet {
    keys: BTreeSet<String>,
}

/// Add/remove instructions for the presentation layer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub to_add:    Vec<String>,
    pub to_remove: Vec<String>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Diff the newest sample's key set against the previously published set.
///
/// Idempotent: an unchanged sample reconciles to empty add/remove sets. A
/// key that disappears is reported for removal exactly once (the commit
/// drops it), and a later reappearance is a fresh addition.
pub fn reconcile(previous: &PublishedSet, sample: &RawSample) -> Reconciliation {
    let new_keys = sample.keys();
    Reconciliation {
        to_add:    new_keys.difference(&previous.keys).cloned().collect(),
        to_remove: previous.keys.difference(&new_keys).cloned().collect(),
    }
}

impl PublishedSet {
    /// Replace the published keys with the sample's key set.
    pub fn commit(&mut self, sample: &RawSample) {
        self.keys = sample.keys();
    }

    #[allow(dead_code)]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample::{Capacity, RawSample, ScanMode};
    use std::collections::BTreeMap;

    fn sample(keys: &[&str]) -> RawSample {
        RawSample {
            mode:     ScanMode::Tree,
            capacity: Capacity::default(),
            entries:  keys.iter().map(|k| (k.to_string(), 1u64)).collect(),
            per_root: BTreeMap::new(),
        }
    }

    #[test]
    fn first_cycle_adds_everything() {
        let published = PublishedSet::default();
        let diff = reconcile(&published, &sample(&["/a", "/b"]));
        assert_eq!(diff.to_add, vec!["/a".to_string(), "/b".to_string()]);
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn unchanged_sample_reconciles_to_nothing_twice() {
        let mut published = PublishedSet::default();
        let s = sample(&["/a", "/b"]);
        published.commit(&s);

        assert!(reconcile(&published, &s).is_empty());
        assert!(reconcile(&published, &s).is_empty());
    }

    #[test]
    fn one_new_one_gone() {
        let mut published = PublishedSet::default();
        published.commit(&sample(&["/keep", "/q"]));

        let diff = reconcile(&published, &sample(&["/keep", "/p"]));
        assert_eq!(diff.to_add, vec!["/p".to_string()]);
        assert_eq!(diff.to_remove, vec!["/q".to_string()]);
    }

    #[test]
    fn removal_reported_once_then_readd_is_fresh() {
        let mut published = PublishedSet::default();
        published.commit(&sample(&["/a"]));

        let gone = sample(&[]);
        let diff = reconcile(&published, &gone);
        assert_eq!(diff.to_remove, vec!["/a".to_string()]);
        published.commit(&gone);

        // Second cycle without the key: nothing further to remove.
        assert!(reconcile(&published, &gone).is_empty());

        // The key returning is an addition, not an update.
        let back = sample(&["/a"]);
        let diff = reconcile(&published, &back);
        assert_eq!(diff.to_add, vec!["/a".to_string()]);
        assert!(diff.to_remove.is_empty());
    }
}
