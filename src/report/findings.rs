use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How findings from two tools for the same path are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Append one tool's list to the other's. Duplicates are only collapsed
    /// within a single tool's records, never across tools.
    #[default]
    Concatenate,
    /// Full union: every finding string appears once per path
    Deduplicate,
}

impl MergePolicy {
    pub fn from_cross_tool_dedup(enabled: bool) -> Self {
        if enabled {
            MergePolicy::Deduplicate
        } else {
            MergePolicy::Concatenate
        }
    }
}

/// Finding strings per repository-relative path, for one repository.
///
/// Paths are kept sorted so reports are stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedFindings(BTreeMap<String, Vec<String>>);

impl NormalizedFindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `strings` to `path`, skipping any already recorded for it
    pub fn add_unique<I>(&mut self, path: &str, strings: I)
    where
        I: IntoIterator<Item = String>,
    {
        let entry = self.0.entry(path.to_string()).or_default();
        for string in strings {
            if !entry.contains(&string) {
                entry.push(string);
            }
        }
    }

    /// Replace whatever `path` held with `strings`
    pub fn assign(&mut self, path: &str, strings: Vec<String>) {
        self.0.insert(path.to_string(), strings);
    }

    pub fn get(&self, path: &str) -> Option<&[String]> {
        self.0.get(path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no path carries a finding
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Drop paths with no findings (and empty path keys)
    pub fn prune(&mut self) {
        self.0
            .retain(|path, strings| !path.is_empty() && !strings.is_empty());
    }

    /// Fold `other` into `self`. For a path present in both, `other`'s
    /// strings go after the ones already here.
    pub fn merge(&mut self, other: NormalizedFindings, policy: MergePolicy) {
        for (path, strings) in other.0 {
            match policy {
                MergePolicy::Concatenate => self.0.entry(path).or_default().extend(strings),
                MergePolicy::Deduplicate => self.add_unique(&path, strings),
            }
        }
        if policy == MergePolicy::Deduplicate {
            for strings in self.0.values_mut() {
                let mut seen = Vec::with_capacity(strings.len());
                strings.retain(|s| {
                    if seen.contains(s) {
                        false
                    } else {
                        seen.push(s.clone());
                        true
                    }
                });
            }
        }
    }
}

impl From<BTreeMap<String, Vec<String>>> for NormalizedFindings {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn findings(entries: &[(&str, &[&str])]) -> NormalizedFindings {
        let mut map = NormalizedFindings::new();
        for (path, strings) in entries {
            map.assign(path, strings.iter().map(|s| s.to_string()).collect());
        }
        map
    }

    #[test]
    fn test_add_unique_collapses_duplicates() {
        let mut map = NormalizedFindings::new();
        map.add_unique("a.txt", vec!["KEY1".to_string()]);
        map.add_unique("a.txt", vec!["KEY1".to_string(), "KEY2".to_string()]);
        assert_eq!(map.get("a.txt").unwrap(), ["KEY1", "KEY2"]);
    }

    #[test]
    fn test_concatenate_keeps_cross_tool_duplicates() {
        // repo-supervisor output first, truffleHog output merged in after it
        let mut merged = findings(&[("a.txt", &["KEY2"]), ("b.txt", &["S"])]);
        merged.merge(
            findings(&[("a.txt", &["KEY1"]), ("c.txt", &["T"])]),
            MergePolicy::Concatenate,
        );
        assert_eq!(merged.get("a.txt").unwrap(), ["KEY2", "KEY1"]);
        assert_eq!(merged.get("b.txt").unwrap(), ["S"]);
        assert_eq!(merged.get("c.txt").unwrap(), ["T"]);

        let mut overlap = findings(&[("a.txt", &["KEY1"])]);
        overlap.merge(findings(&[("a.txt", &["KEY1"])]), MergePolicy::Concatenate);
        assert_eq!(overlap.get("a.txt").unwrap(), ["KEY1", "KEY1"]);
    }

    #[test]
    fn test_deduplicate_is_full_union() {
        let mut merged = findings(&[("a.txt", &["KEY2", "KEY2"])]);
        merged.merge(
            findings(&[("a.txt", &["KEY1", "KEY2"])]),
            MergePolicy::Deduplicate,
        );
        let mut strings = merged.get("a.txt").unwrap().to_vec();
        strings.sort();
        assert_eq!(strings, vec!["KEY1", "KEY2"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let build = || {
            let mut merged = findings(&[("a.txt", &["KEY2"])]);
            merged.merge(findings(&[("a.txt", &["KEY1"])]), MergePolicy::Concatenate);
            merged
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_prune_and_emptiness() {
        let mut map = findings(&[("", &["X"]), ("empty.txt", &[])]);
        assert!(!map.is_empty());
        map.prune();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let map = findings(&[("a.txt", &["KEY1"])]);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"a.txt":["KEY1"]}"#);
        assert_eq!(MergePolicy::from_cross_tool_dedup(true), MergePolicy::Deduplicate);
    }
}
