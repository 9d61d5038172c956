//! The solver's output: an ordered list of actions over [`RepoDataRecord`]s.

use rattler_conda_types::RepoDataRecord;

/// A single action in a [`Solution`]. Grounded in libmamba's `solver::Solution` action set
/// (`Omit`/`Upgrade`/`Downgrade`/`Change`/`Reinstall`/`Remove`/`Install`), which distinguishes
/// *why* a package transitions rather than just *that* it does, so a transaction executor (C13)
/// can choose the right link/unlink strategy and a report sink can render a meaningful diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverAction {
    /// Install a package that was not previously installed.
    Install(RepoDataRecord),

    /// Remove a package that is no longer needed and was not replaced by anything.
    Remove(RepoDataRecord),

    /// Remove and install the exact same record again (e.g. the cache was invalidated, or the
    /// record's `requested_spec` changed from implicit to explicit).
    Reinstall(RepoDataRecord),

    /// Replace an installed record with a strictly newer one of the same name.
    Upgrade {
        /// The currently-installed record being replaced.
        remove: RepoDataRecord,
        /// The newer record being installed.
        install: RepoDataRecord,
    },

    /// Replace an installed record with a strictly older one of the same name (e.g. the user
    /// pinned an older version, or a newer version was removed to resolve a conflict).
    Downgrade {
        /// The currently-installed record being replaced.
        remove: RepoDataRecord,
        /// The older record being installed.
        install: RepoDataRecord,
    },

    /// Replace an installed record with a different record of the same name and version (e.g. a
    /// different build, or from a different channel).
    Change {
        /// The currently-installed record being replaced.
        remove: RepoDataRecord,
        /// The replacement record being installed.
        install: RepoDataRecord,
    },

    /// A package that was considered but left untouched: already installed, already satisfies
    /// every job that named it, and nothing else forces a change.
    Omit(RepoDataRecord),
}

impl SolverAction {
    /// The record this action removes from the prefix, if any.
    pub fn to_remove(&self) -> Option<&RepoDataRecord> {
        match self {
            SolverAction::Remove(record) | SolverAction::Reinstall(record) => Some(record),
            SolverAction::Upgrade { remove, .. }
            | SolverAction::Downgrade { remove, .. }
            | SolverAction::Change { remove, .. } => Some(remove),
            SolverAction::Install(_) | SolverAction::Omit(_) => None,
        }
    }

    /// The record this action installs into the prefix, if any.
    pub fn to_install(&self) -> Option<&RepoDataRecord> {
        match self {
            SolverAction::Install(record) | SolverAction::Reinstall(record) => Some(record),
            SolverAction::Upgrade { install, .. }
            | SolverAction::Downgrade { install, .. }
            | SolverAction::Change { install, .. } => Some(install),
            SolverAction::Remove(_) | SolverAction::Omit(_) => None,
        }
    }

    /// The record this action leaves untouched, if any.
    pub fn to_omit(&self) -> Option<&RepoDataRecord> {
        match self {
            SolverAction::Omit(record) => Some(record),
            _ => None,
        }
    }
}

/// A solver's output: an ordered list of [`SolverAction`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Solution {
    /// The actions to apply, in solver-determined order.
    pub actions: Vec<SolverAction>,
}

impl Solution {
    /// Every record removed by some action in this solution, in order.
    pub fn to_remove(&self) -> impl Iterator<Item = &RepoDataRecord> {
        self.actions.iter().filter_map(SolverAction::to_remove)
    }

    /// Every record installed by some action in this solution, in order.
    pub fn to_install(&self) -> impl Iterator<Item = &RepoDataRecord> {
        self.actions.iter().filter_map(SolverAction::to_install)
    }

    /// Every record left untouched by this solution, in order.
    pub fn to_omit(&self) -> impl Iterator<Item = &RepoDataRecord> {
        self.actions.iter().filter_map(SolverAction::to_omit)
    }
}

#[cfg(test)]
mod test {
    use rattler_conda_types::{PackageRecord, Version};
    use std::str::FromStr;
    use url::Url;

    use super::{SolverAction, Solution};

    fn record(name: &str) -> rattler_conda_types::RepoDataRecord {
        let file_name = format!("{name}-1.0-0.tar.bz2");
        rattler_conda_types::RepoDataRecord {
            package_record: PackageRecord {
                name: name.parse().unwrap(),
                version: Version::from_str("1.0").unwrap(),
                build: "0".to_string(),
                build_number: 0,
                channel_id: String::new(),
                platform: None,
                depends: Vec::new(),
                constrains: Vec::new(),
                track_features: Vec::new(),
                noarch: Default::default(),
                timestamp: None,
                size: None,
                md5: None,
                sha256: None,
                filename: file_name.clone(),
                package_url: None,
                license: None,
                signatures: None,
            },
            file_name,
            url: Url::parse("https://example.com/noarch/foo-1.0-0.tar.bz2").unwrap(),
            channel: "https://example.com".to_string(),
        }
    }

    #[test]
    fn iterates_over_every_action_kind() {
        let solution = Solution {
            actions: vec![
                SolverAction::Omit(record("omit")),
                SolverAction::Upgrade {
                    remove: record("upgrade_remove"),
                    install: record("upgrade_install"),
                },
                SolverAction::Downgrade {
                    remove: record("downgrade_remove"),
                    install: record("downgrade_install"),
                },
                SolverAction::Change {
                    remove: record("change_remove"),
                    install: record("change_install"),
                },
                SolverAction::Reinstall(record("reinstall")),
                SolverAction::Remove(record("remove")),
                SolverAction::Install(record("install")),
            ],
        };

        assert_eq!(solution.to_remove().count(), 5);
        assert_eq!(solution.to_install().count(), 5);
        assert_eq!(solution.to_omit().count(), 1);
    }
}
