/*============================================================
  Project: nuget-mirror
  Module: nuget_mirror::selector
  ------------------------------------------------------------
  Purpose:
    Pick the bounded set of versions mirrored for a package:
    the newest version of each major family, newest families
    first.

  Security / Safety Notes:
    Pure function; no I/O performed in this module.

  Dependencies:
    None beyond std.

  Operational Scope:
    Invoked by the orchestrator once per claimed package.

  Revision History:
    2026-10-16 NMR  Authored major-bucket version selection.
  ------------------------------------------------------------
  Principles Observed:
    - Deterministic output for identical input
    - Opaque bucket keys never fail selection
============================================================*/

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::package_info::{MirrorTarget, VersionEntry};

/// Select at most `cap` versions, one per major bucket.
///
/// Buckets with numeric keys come first in descending numeric order,
/// followed by non-numeric keys in descending lexical order. Within a
/// bucket the highest parsed version wins; unparsable entries only win a
/// bucket that has no parsable entry.
pub fn select_versions(versions: &[VersionEntry], cap: usize) -> Vec<VersionEntry> {
    let mut buckets: HashMap<&str, &VersionEntry> = HashMap::new();
    for entry in versions {
        buckets
            .entry(entry.bucket())
            .and_modify(|best| {
                if compare_entries(entry, *best) == Ordering::Greater {
                    *best = entry;
                }
            })
            .or_insert(entry);
    }

    let mut chosen: Vec<(&str, &VersionEntry)> = buckets.into_iter().collect();
    chosen.sort_by(|(a, _), (b, _)| compare_keys(b, a));
    chosen
        .into_iter()
        .take(cap)
        .map(|(_, entry)| entry.clone())
        .collect()
}

/// Convenience wrapper producing a [`MirrorTarget`] for a package id.
pub fn mirror_target(package_id: &str, versions: &[VersionEntry], cap: usize) -> MirrorTarget {
    MirrorTarget {
        package_id: package_id.to_lowercase(),
        selected: select_versions(versions, cap),
    }
}

fn compare_entries(a: &VersionEntry, b: &VersionEntry) -> Ordering {
    match (&a.parsed, &b.parsed) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.version.cmp(&b.version),
    }
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Greater,
        (Err(_), Ok(_)) => Ordering::Less,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(raw: &[&str]) -> Vec<VersionEntry> {
        raw.iter().map(|v| VersionEntry::new(*v, None)).collect()
    }

    fn names(selected: &[VersionEntry]) -> Vec<&str> {
        selected.iter().map(|e| e.version.as_str()).collect()
    }

    #[test]
    fn one_entry_per_major_newest_first() {
        let versions = entries(&["1.0.0", "2.1.0", "2.0.5", "3.0.0-rc.1", "1.4.2"]);
        let selected = select_versions(&versions, 10);
        assert_eq!(names(&selected), vec!["3.0.0-rc.1", "2.1.0", "1.4.2"]);
    }

    #[test]
    fn output_is_strictly_decreasing_in_major() {
        let versions = entries(&["1.0.0", "2.0.0", "2.3.0", "3.0.0", "10.0.0", "9.1.0"]);
        let selected = select_versions(&versions, 10);
        let majors: Vec<u64> = selected
            .iter()
            .map(|e| e.parsed.as_ref().unwrap().major)
            .collect();
        assert_eq!(majors, vec![10, 9, 3, 2, 1]);
        assert!(majors.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn empty_input_selects_nothing() {
        assert!(select_versions(&[], 10).is_empty());
    }

    #[test]
    fn cap_keeps_newest_families() {
        let versions = entries(&["1.0.0", "2.0.0", "3.0.0", "4.0.0"]);
        let selected = select_versions(&versions, 2);
        assert_eq!(names(&selected), vec!["4.0.0", "3.0.0"]);
    }

    #[test]
    fn release_beats_prerelease_of_same_numbers() {
        let versions = entries(&["2.0.0", "2.0.0-beta", "2.0.0-alpha"]);
        assert_eq!(names(&select_versions(&versions, 10)), vec!["2.0.0"]);
    }

    #[test]
    fn prerelease_only_bucket_is_kept() {
        let versions = entries(&["1.0.0", "1.2.0", "2.0.0-beta"]);
        assert_eq!(
            names(&select_versions(&versions, 10)),
            vec!["2.0.0-beta", "1.2.0"]
        );
    }

    #[test]
    fn non_numeric_keys_follow_numeric_buckets() {
        let versions = entries(&["v2.0", "1.0.0", "alpha", "v2.1", "3.0.0"]);
        let selected = select_versions(&versions, 10);
        assert_eq!(names(&selected), vec!["3.0.0", "1.0.0", "v2.1", "alpha"]);
    }

    #[test]
    fn mirror_target_lowercases_id() {
        let target = mirror_target("Foo.Bar", &entries(&["1.0.0"]), 10);
        assert_eq!(target.package_id, "foo.bar");
        assert_eq!(target.selected.len(), 1);
    }
}
