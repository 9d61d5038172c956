//! The transaction planner and executor (C13, §4.8). Grounded in the teacher's
//! `install/transaction.rs` for the diff-by-name shape and `install/driver.rs` for the bounded
//! IO concurrency and pre/post-process split, adapted to this crate's own [`rattler_solve`]
//! types instead of the teacher's libsolv-specific ones.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rattler_cache::package_cache::PackageCache;
use rattler_conda_types::{
    History, MatchSpec, PackageName, PrefixData, PrefixRecord, RepoDataRecord, Revision,
};
use rattler_networking::Fetcher;
use rattler_solve::Solution;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::RattlerError;
use crate::link;
use crate::lock::DirLock;
use crate::report::{NullReportSink, ReportSink, TransactionPlan};

/// Extracts the package name a `depends`/`constrains` string names, if it parses as a match spec
/// at all. Unparseable entries (there shouldn't be any in real repodata) are silently skipped,
/// they just can't participate in ordering.
fn dependency_name(dep: &str) -> Option<PackageName> {
    MatchSpec::from_str(dep).ok()?.name.as_exact().cloned()
}

/// Orders `records` so that a record always comes after every other record in the set that it
/// depends on (dependencies before dependents) — the order installs must happen in.
///
/// Reversing this order gives dependents-before-dependencies, which is the order removes must
/// happen in (§4.8 step 4).
fn dependency_postorder(records: &[RepoDataRecord]) -> Vec<RepoDataRecord> {
    let by_name: HashMap<&str, usize> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.package_record.name.as_normalized(), i))
        .collect();

    let mut visited = vec![false; records.len()];
    let mut visiting = vec![false; records.len()];
    let mut order = Vec::with_capacity(records.len());

    fn visit(
        i: usize,
        records: &[RepoDataRecord],
        by_name: &HashMap<&str, usize>,
        visited: &mut [bool],
        visiting: &mut [bool],
        order: &mut Vec<RepoDataRecord>,
    ) {
        if visited[i] || visiting[i] {
            return;
        }
        visiting[i] = true;
        for dep in &records[i].package_record.depends {
            if let Some(name) = dependency_name(dep) {
                if let Some(&j) = by_name.get(name.as_normalized()) {
                    visit(j, records, by_name, visited, visiting, order);
                }
            }
        }
        visiting[i] = false;
        visited[i] = true;
        order.push(records[i].clone());
    }

    for i in 0..records.len() {
        visit(i, records, &by_name, &mut visited, &mut visiting, &mut order);
    }
    order
}

/// A planned set of installs and removes derived from a solver [`Solution`] (§4.8).
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    to_remove: Vec<RepoDataRecord>,
    to_install: Vec<RepoDataRecord>,
}

impl Transaction {
    /// Builds a transaction from a solver [`Solution`]. `Upgrade`/`Downgrade`/`Change` actions
    /// contribute both their `remove` and `install` side; `Reinstall` contributes to both lists.
    pub fn from_solution(solution: &Solution) -> Self {
        Self {
            to_remove: solution.to_remove().cloned().collect(),
            to_install: solution.to_install().cloned().collect(),
        }
    }

    /// Whether this transaction has nothing to do.
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_install.is_empty()
    }

    /// Removes, in dependents-before-dependencies order, then installs, in
    /// dependencies-before-dependents order (§4.8 step 4, §8 "Transaction order").
    pub fn topological_order(&self) -> (Vec<RepoDataRecord>, Vec<RepoDataRecord>) {
        let mut removes = dependency_postorder(&self.to_remove);
        removes.reverse();
        let installs = dependency_postorder(&self.to_install);
        (removes, installs)
    }
}

/// Configures a [`TransactionExecutor`].
pub struct ExecutorOptions {
    /// Maximum number of files linked or unlinked concurrently.
    pub io_concurrency: usize,
    /// Maximum time to wait to acquire the prefix lock before giving up with
    /// [`RattlerError::LockTimeout`].
    pub lock_timeout: Duration,
    /// The command line recorded in the `conda-meta/history` entry for this transaction.
    pub command: Option<String>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            io_concurrency: 8,
            lock_timeout: Duration::from_secs(60),
            command: None,
        }
    }
}

/// Executes a [`Transaction`] against a prefix: downloads and caches any missing archives, links
/// and unlinks files in topological order, and records the change in `conda-meta/history`
/// (§4.8).
pub struct TransactionExecutor {
    package_cache: PackageCache,
    fetcher: Arc<Fetcher>,
    sink: Arc<dyn ReportSink>,
    options: ExecutorOptions,
    cancel: CancellationToken,
}

impl TransactionExecutor {
    /// Creates an executor backed by `package_cache` and `fetcher`, reporting to `sink`.
    pub fn new(
        package_cache: PackageCache,
        fetcher: Arc<Fetcher>,
        sink: Arc<dyn ReportSink>,
        options: ExecutorOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self { package_cache, fetcher, sink, options, cancel }
    }

    /// Creates an executor with a [`NullReportSink`] and no cancellation, for headless/test use.
    pub fn headless(package_cache: PackageCache, fetcher: Arc<Fetcher>) -> Self {
        Self::new(
            package_cache,
            fetcher,
            Arc::new(NullReportSink),
            ExecutorOptions::default(),
            CancellationToken::new(),
        )
    }

    /// Runs `transaction` against `prefix`. `prefix_data` is consulted for the existing
    /// [`PrefixRecord`] of every package being removed, to know what files to unlink.
    pub async fn execute(
        &self,
        transaction: &Transaction,
        prefix: &Path,
        prefix_data: &PrefixData,
    ) -> Result<(), RattlerError> {
        if transaction.is_empty() {
            return Ok(());
        }

        let plan = TransactionPlan::from_solution(&Solution {
            actions: transaction
                .to_install
                .iter()
                .cloned()
                .map(rattler_solve::SolverAction::Install)
                .chain(transaction.to_remove.iter().cloned().map(rattler_solve::SolverAction::Remove))
                .collect(),
        });
        if !self.sink.on_transaction_plan(&plan) {
            return Err(RattlerError::UserInterrupted);
        }

        let conda_meta = prefix.join("conda-meta");
        let _prefix_lock = DirLock::acquire(&conda_meta, self.options.lock_timeout).await?;

        let io_permits = Arc::new(Semaphore::new(self.options.io_concurrency.max(1)));

        // Ensure every package being installed is present and extracted in the cache before any
        // file is touched — a download failure should leave the prefix untouched (§4.8 failure
        // semantics, §5 suspension points).
        let mut extracted_dirs = HashMap::new();
        for record in &transaction.to_install {
            if self.cancel.is_cancelled() {
                return Err(RattlerError::UserInterrupted);
            }
            let lock = self
                .package_cache
                .get_or_fetch_from_url(
                    &record.url,
                    self.fetcher.clone(),
                    record.package_record.sha256,
                    None,
                )
                .await?;
            self.sink.on_package_cached(record);
            extracted_dirs.insert(cache_key_string(record), lock.path().to_path_buf());
        }

        let (remove_order, install_order) = transaction.topological_order();

        let mut removed_names = Vec::new();
        for record in &remove_order {
            if self.cancel.is_cancelled() {
                return Err(RattlerError::UserInterrupted);
            }
            self.remove_package(record, prefix, prefix_data).await?;
            removed_names.push(dist_string(record));
        }

        let mut installed_names = Vec::new();
        for record in &install_order {
            if self.cancel.is_cancelled() {
                return Err(RattlerError::UserInterrupted);
            }
            let extracted_dir = extracted_dirs
                .get(&cache_key_string(record))
                .expect("every install was cached above")
                .clone();
            self.install_package(record, &extracted_dir, prefix, io_permits.clone()).await?;
            installed_names.push(dist_string(record));
        }

        self.append_history(prefix, &removed_names, &installed_names)?;

        self.sink.on_transaction_complete();
        Ok(())
    }

    async fn remove_package(
        &self,
        record: &RepoDataRecord,
        prefix: &Path,
        prefix_data: &PrefixData,
    ) -> Result<(), RattlerError> {
        let existing = prefix_data
            .get(&record.package_record.name)
            .ok_or_else(|| RattlerError::PrefixNotFound { path: prefix.to_path_buf() })?
            .map_err(|err| RattlerError::Io {
                path: prefix.join("conda-meta"),
                cause: std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string()),
            })?;

        for entry in &existing.paths_data.paths {
            link::unlink_file(entry, prefix).map_err(link_err)?;
        }

        let record_path = prefix.join("conda-meta").join(existing.file_name());
        if record_path.exists() {
            std::fs::remove_file(&record_path).map_err(|cause| RattlerError::Io { path: record_path, cause })?;
        }

        self.sink.on_package_removed(record);
        Ok(())
    }

    async fn install_package(
        &self,
        record: &RepoDataRecord,
        extracted_dir: &Path,
        prefix: &Path,
        io_permits: Arc<Semaphore>,
    ) -> Result<(), RattlerError> {
        let entries = link::read_package_manifest(extracted_dir).map_err(link_err)?;

        let mut linked = Vec::with_capacity(entries.len());
        for entry in &entries {
            let _permit = io_permits.acquire().await.expect("semaphore is never closed");
            if let Err(err) = link::link_file(entry, extracted_dir, prefix) {
                // Roll back only the files this package itself linked; earlier packages in this
                // transaction are left alone (§4.8 failure semantics).
                for done in &linked {
                    let _ = link::unlink_file(done, prefix);
                }
                return Err(link_err(err));
            }
            linked.push(entry.clone());
        }

        let prefix_record = PrefixRecord::from_repodata_record(
            record.clone(),
            None,
            Some(extracted_dir.to_path_buf()),
            entries,
            None,
        );
        let meta_dir = prefix.join("conda-meta");
        std::fs::create_dir_all(&meta_dir).map_err(|cause| RattlerError::Io { path: meta_dir.clone(), cause })?;
        let record_path = meta_dir.join(prefix_record.file_name());
        let json = serde_json::to_string_pretty(&prefix_record).map_err(|err| RattlerError::Io {
            path: record_path.clone(),
            cause: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
        })?;
        std::fs::write(&record_path, json).map_err(|cause| RattlerError::Io { path: record_path, cause })?;

        self.sink.on_package_linked(record);
        Ok(())
    }

    fn append_history(
        &self,
        prefix: &Path,
        removed: &[String],
        installed: &[String],
    ) -> Result<(), RattlerError> {
        let history = History::new(prefix);
        let revision = Revision {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S.%6f").to_string(),
            removed: removed.iter().cloned().collect(),
            added: installed.iter().cloned().collect(),
        };
        history.write_full_revision(
            &revision,
            self.options.command.as_deref(),
            Some(env!("CARGO_PKG_VERSION")),
            None,
        )?;
        Ok(())
    }
}

fn cache_key_string(record: &RepoDataRecord) -> String {
    rattler_cache::package_cache::CacheKey::from(&record.package_record).to_string()
}

fn dist_string(record: &RepoDataRecord) -> String {
    format!(
        "{}-{}-{}",
        record.package_record.name.as_normalized(),
        record.package_record.version,
        record.package_record.build
    )
}

fn link_err(err: link::LinkError) -> RattlerError {
    match err {
        link::LinkError::Conflict(path) => RattlerError::Conflict { path },
        link::LinkError::CreateParentDir { path, cause }
        | link::LinkError::ReadSource { path, cause }
        | link::LinkError::Link { path, cause }
        | link::LinkError::Remove { path, cause } => RattlerError::Io { path, cause },
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use rattler_conda_types::{PackageRecord, Version};
    use url::Url;

    use super::*;

    fn record(name: &str, depends: &[&str]) -> RepoDataRecord {
        RepoDataRecord {
            package_record: PackageRecord {
                name: PackageName::from_str(name).unwrap(),
                version: Version::from_str("1.0").unwrap(),
                build: "0".to_string(),
                build_number: 0,
                channel_id: String::new(),
                platform: None,
                depends: depends.iter().map(|s| s.to_string()).collect(),
                constrains: Vec::new(),
                track_features: Vec::new(),
                noarch: Default::default(),
                timestamp: None,
                size: None,
                md5: None,
                sha256: None,
                filename: String::new(),
                package_url: None,
                license: None,
                signatures: None,
            },
            file_name: format!("{name}-1.0-0.tar.bz2"),
            url: Url::from_str(&format!("https://example.com/{name}-1.0-0.tar.bz2")).unwrap(),
            channel: "https://example.com".to_string(),
        }
    }

    #[test]
    fn removes_before_installs_and_in_dependency_order() {
        // B depends on A; C has no relation to either. Removing C, installing A and B.
        let a = record("a", &[]);
        let b = record("b", &["a"]);
        let c = record("c", &[]);

        let solution = Solution {
            actions: vec![
                rattler_solve::SolverAction::Install(a.clone()),
                rattler_solve::SolverAction::Install(b.clone()),
                rattler_solve::SolverAction::Remove(c.clone()),
            ],
        };

        let transaction = Transaction::from_solution(&solution);
        let (removes, installs) = transaction.topological_order();

        assert_eq!(removes, vec![c]);
        assert_eq!(installs[0].package_record.name, a.package_record.name);
        assert_eq!(installs[1].package_record.name, b.package_record.name);
    }
}
