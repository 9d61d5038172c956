//! A map from channel (or mirror group) identifier to a list of candidate mirror base URLs,
//! with simple least-failures selection (C5/C6).

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use url::Url;

/// A single mirror: its base URL plus a running count of observed failures, used to steer
/// future selections away from mirrors that are currently unhealthy.
#[derive(Debug)]
struct Mirror {
    url: Url,
    failures: AtomicUsize,
}

impl Mirror {
    fn new(mut url: Url) -> Self {
        if !url.path().ends_with('/') {
            url.set_path(&format!("{}/", url.path()));
        }
        Self {
            url,
            failures: AtomicUsize::new(0),
        }
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn failure_count(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Maps a channel (or any other mirror-group key, e.g. a channel id) to the mirrors that may
/// serve it. A passthrough default means channels with no configured mirrors are fetched from
/// their original URL unmodified.
#[derive(Debug, Default)]
pub struct MirrorMap {
    mirrors: HashMap<String, Vec<Mirror>>,
}

impl MirrorMap {
    /// Builds a mirror map from a plain `{key -> [mirror base urls]}` configuration.
    pub fn from_map(map: HashMap<String, Vec<Url>>) -> Self {
        Self {
            mirrors: map
                .into_iter()
                .map(|(key, urls)| (key, urls.into_iter().map(Mirror::new).collect()))
                .collect(),
        }
    }

    /// Resolves `relative_path` against the least-failed mirror registered for `key`. Returns
    /// `None` if `key` has no configured mirrors (the caller should pass the request through
    /// unmodified in that case).
    pub fn select(&self, key: &str, relative_path: &str) -> Option<Url> {
        self.candidates(key, relative_path).into_iter().next()
    }

    /// Resolves `relative_path` against every mirror registered for `key`, ordered from least
    /// to most failures observed so far. Used to fail over to the next mirror on a permanent
    /// error. Empty if `key` has no configured mirrors.
    pub fn candidates(&self, key: &str, relative_path: &str) -> Vec<Url> {
        let Some(mirrors) = self.mirrors.get(key) else {
            return Vec::new();
        };
        let mut ordered: Vec<&Mirror> = mirrors.iter().collect();
        ordered.sort_by_key(|m| m.failure_count());
        ordered
            .into_iter()
            .filter_map(|m| m.url.join(relative_path.trim_start_matches('/')).ok())
            .collect()
    }

    /// Records that a request to `selected` (a URL previously returned by [`Self::select`])
    /// failed, so future selections favor healthier mirrors.
    pub fn record_failure(&self, key: &str, selected: &Url) {
        if let Some(mirrors) = self.mirrors.get(key) {
            if let Some(mirror) = mirrors.iter().find(|m| &m.url == selected) {
                mirror.record_failure();
            }
        }
    }

    /// True if any mirrors are configured for `key`.
    pub fn has_mirrors(&self, key: &str) -> bool {
        self.mirrors.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_joins_relative_path() {
        let mut map = HashMap::new();
        map.insert(
            "conda-forge".to_string(),
            vec![Url::parse("https://mirror.example.com/conda-forge").unwrap()],
        );
        let mirrors = MirrorMap::from_map(map);
        let selected = mirrors.select("conda-forge", "linux-64/repodata.json").unwrap();
        assert_eq!(
            selected.as_str(),
            "https://mirror.example.com/conda-forge/linux-64/repodata.json"
        );
    }

    #[test]
    fn test_select_prefers_least_failures() {
        let mut map = HashMap::new();
        map.insert(
            "conda-forge".to_string(),
            vec![
                Url::parse("https://a.example.com/cf").unwrap(),
                Url::parse("https://b.example.com/cf").unwrap(),
            ],
        );
        let mirrors = MirrorMap::from_map(map);

        let first = mirrors.select("conda-forge", "noarch/repodata.json").unwrap();
        mirrors.record_failure("conda-forge", &first);
        mirrors.record_failure("conda-forge", &first);

        let second = mirrors.select("conda-forge", "noarch/repodata.json").unwrap();
        assert_ne!(first.host_str(), second.host_str());
    }

    #[test]
    fn test_no_mirrors_for_unknown_key() {
        let mirrors = MirrorMap::from_map(HashMap::new());
        assert!(!mirrors.has_mirrors("conda-forge"));
        assert_eq!(mirrors.select("conda-forge", "repodata.json"), None);
    }
}
