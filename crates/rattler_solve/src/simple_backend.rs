//! [`SimpleBackend`]: a small backtracking [`Backend`] used as a reference implementation and by
//! this crate's own tests.
//!
//! Grounded in `rattler_libsolv_rs`'s job/decision model (candidates are tried in priority order,
//! a name is decided once, conflicts propagate back up the recursion) but deliberately without a
//! full SAT core: this is a depth-first search with chronological backtracking, not a CDCL solver.
//! It is sufficient to drive every scenario in §8 and to validate a caller's driver logic; a
//! production `Backend` over `resolvo` or `libsolv` is the intended replacement at scale.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use rattler_conda_types::{
    Channel, GenericVirtualPackage, MatchSpec, PackageRecord, RepoData, RepoDataRecord,
};
use url::Url;

use crate::backend::{stamping_channel, Backend, BackendError, RepoHandle, RepoPriority, SolveResult, Unsolvable};
use crate::problems_graph::{ConflictCause, ProblemNode, ProblemsGraph};
use crate::request::{ChannelPriority, Job, Request};
use crate::solution::{Solution, SolverAction};

struct Repo {
    name: String,
    records: Vec<RepoDataRecord>,
    priority: RepoPriority,
}

/// A small in-memory [`Backend`] implemented as a backtracking search.
#[derive(Default)]
pub struct SimpleBackend {
    repos: Vec<Repo>,
    installed: Option<RepoHandle>,
}

impl SimpleBackend {
    /// Creates an empty backend with no repos.
    pub fn new() -> Self {
        Self::default()
    }

    fn repo(&self, handle: RepoHandle) -> Option<&Repo> {
        self.repos.get(handle.0)
    }

    fn repo_mut(&mut self, handle: RepoHandle) -> Option<&mut Repo> {
        self.repos.get_mut(handle.0)
    }

    fn apply_pip_as_python_dep(records: &mut [RepoDataRecord], enabled: bool) {
        if !enabled {
            return;
        }
        for record in records {
            if record.package_record.name.as_normalized() == "python"
                && !record.package_record.depends.iter().any(|d| d == "pip")
            {
                record.package_record.depends.push("pip".to_string());
            }
        }
    }

    /// Every record across every repo, paired with its repo's priority, in descending preference
    /// order (honoring `channel_priority`).
    fn all_candidates(&self, name: &str, channel_priority: ChannelPriority) -> Vec<&RepoDataRecord> {
        let mut by_repo: Vec<(&Repo, Vec<&RepoDataRecord>)> = self
            .repos
            .iter()
            .map(|repo| {
                let matching = repo
                    .records
                    .iter()
                    .filter(|r| r.package_record.name.as_normalized() == name)
                    .collect();
                (repo, matching)
            })
            .filter(|(_, records): &(_, Vec<_>)| !records.is_empty())
            .collect();

        if by_repo.is_empty() {
            return Vec::new();
        }

        match channel_priority {
            ChannelPriority::Disabled => {}
            ChannelPriority::Flexible => {
                by_repo.sort_by_key(|(repo, _)| std::cmp::Reverse(repo.priority));
            }
            ChannelPriority::Strict => {
                let best = by_repo
                    .iter()
                    .map(|(repo, _)| repo.priority)
                    .max()
                    .unwrap_or_default();
                by_repo.retain(|(repo, _)| repo.priority == best);
            }
        }

        let mut candidates: Vec<&RepoDataRecord> =
            by_repo.into_iter().flat_map(|(_, records)| records).collect();
        candidates.sort_by(|a, b| {
            b.package_record
                .version
                .cmp(&a.package_record.version)
                .then(b.package_record.build_number.cmp(&a.package_record.build_number))
        });
        candidates
    }

    fn installed_records(&self) -> &[RepoDataRecord] {
        self.installed
            .and_then(|h| self.repo(h))
            .map(|r| r.records.as_slice())
            .unwrap_or(&[])
    }
}

impl Backend for SimpleBackend {
    fn add_repo_from_repodata_json(
        &mut self,
        path: &Path,
        base_url: &Url,
        channel_id: &str,
        pip_as_python_dep: bool,
        only_tar_bz2: bool,
    ) -> Result<RepoHandle, BackendError> {
        let repo_data = RepoData::from_path(path).map_err(|source| BackendError::RepoDataJson {
            path: path.to_path_buf(),
            source,
        })?;
        let channel: Channel = stamping_channel(base_url, channel_id);
        let mut records = repo_data.into_repo_data_records(&channel);
        if only_tar_bz2 {
            records.retain(|r| r.file_name.ends_with(".tar.bz2"));
        }
        Self::apply_pip_as_python_dep(&mut records, pip_as_python_dep);
        Ok(self.add_repo_from_packages(records, channel_id, false))
    }

    fn add_repo_from_packages(
        &mut self,
        mut packages: Vec<RepoDataRecord>,
        name: &str,
        pip_as_python_dep: bool,
    ) -> RepoHandle {
        Self::apply_pip_as_python_dep(&mut packages, pip_as_python_dep);
        let handle = RepoHandle(self.repos.len());
        self.repos.push(Repo {
            name: name.to_string(),
            records: packages,
            priority: RepoPriority::default(),
        });
        handle
    }

    fn set_installed_repo(&mut self, handle: RepoHandle) -> Result<(), BackendError> {
        if self.repo(handle).is_none() {
            return Err(BackendError::UnknownRepoHandle);
        }
        self.installed = Some(handle);
        Ok(())
    }

    fn installed_repo(&self) -> Option<RepoHandle> {
        self.installed
    }

    fn set_repo_priority(&mut self, handle: RepoHandle, priority: RepoPriority) -> Result<(), BackendError> {
        let repo = self.repo_mut(handle).ok_or(BackendError::UnknownRepoHandle)?;
        repo.priority = priority;
        Ok(())
    }

    fn add_virtual_packages(&mut self, packages: Vec<GenericVirtualPackage>) {
        let records: Vec<RepoDataRecord> = packages
            .into_iter()
            .map(|pkg| {
                let file_name = format!("{}-{}-{}.tar.bz2", pkg.name.as_normalized(), pkg.version, pkg.build_string);
                RepoDataRecord {
                    url: Url::parse(&format!("https://virtual/{file_name}")).expect("valid synthetic url"),
                    channel: "@virtual".to_string(),
                    file_name: file_name.clone(),
                    package_record: PackageRecord {
                        name: pkg.name,
                        version: pkg.version,
                        build: pkg.build_string.clone(),
                        build_number: 0,
                        channel_id: "@virtual".to_string(),
                        platform: None,
                        depends: Vec::new(),
                        constrains: Vec::new(),
                        track_features: Vec::new(),
                        noarch: Default::default(),
                        timestamp: None,
                        size: None,
                        md5: None,
                        sha256: None,
                        filename: file_name,
                        package_url: None,
                        license: None,
                        signatures: None,
                    },
                }
            })
            .collect();

        match self.installed {
            Some(handle) => {
                if let Some(repo) = self.repo_mut(handle) {
                    repo.records.extend(records);
                }
            }
            None => {
                let handle = self.add_repo_from_packages(records, "@virtual", false);
                self.installed = Some(handle);
            }
        }
    }

    fn for_each_package_matching(&self, spec: &MatchSpec, callback: &mut dyn FnMut(&RepoDataRecord)) {
        for repo in &self.repos {
            for record in &repo.records {
                if spec.matches_except_channel(&record.package_record) {
                    callback(record);
                }
            }
        }
    }

    fn for_each_package_depending_on(&self, spec: &MatchSpec, callback: &mut dyn FnMut(&RepoDataRecord)) {
        let Some(name) = spec.name.as_exact().map(|n| n.as_normalized()) else {
            return;
        };
        for repo in &self.repos {
            for record in &repo.records {
                let depends_on = record
                    .package_record
                    .depends
                    .iter()
                    .chain(&record.package_record.constrains)
                    .filter_map(|dep| MatchSpec::from_str(dep).ok())
                    .any(|dep_spec| dep_spec.name.as_exact().map(|n| n.as_normalized()) == Some(name));
                if depends_on {
                    callback(record);
                }
            }
        }
    }

    #[tracing::instrument(skip_all, fields(jobs = request.jobs.len()))]
    fn solve(&mut self, request: &Request) -> SolveResult {
        let mut resolver = Resolver {
            backend: self,
            channel_priority: request.flags.channel_priority,
        };
        match resolver.run(request) {
            Ok(selected) => {
                tracing::debug!(actions = selected.len(), "solve succeeded");
                Ok(Ok(resolver.backend.build_solution(request, selected)))
            }
            Err(failure) => {
                tracing::debug!(name = %failure.name, "solve failed");
                Ok(Err(resolver.backend.build_unsolvable(request, &failure)))
            }
        }
    }
}

impl SimpleBackend {
    fn build_solution(&self, request: &Request, selected: HashMap<String, RepoDataRecord>) -> Solution {
        let installed: HashMap<&str, &RepoDataRecord> = self
            .installed_records()
            .iter()
            .map(|r| (r.package_record.name.as_normalized(), r))
            .collect();

        let kept_by_omit: HashSet<&str> = request
            .jobs
            .iter()
            .filter_map(|job| match job {
                Job::Keep(spec) | Job::Freeze(spec) => spec.name.as_exact().map(|n| n.as_normalized()),
                _ => None,
            })
            .collect();

        let mut actions = Vec::new();
        for (name, new_record) in &selected {
            match installed.get(name.as_str()) {
                None => actions.push(SolverAction::Install(new_record.clone())),
                Some(old_record) => {
                    if *old_record == new_record {
                        actions.push(SolverAction::Omit((*old_record).clone()));
                    } else if old_record.package_record.version == new_record.package_record.version {
                        actions.push(SolverAction::Change {
                            remove: (*old_record).clone(),
                            install: new_record.clone(),
                        });
                    } else if old_record.package_record.version < new_record.package_record.version {
                        actions.push(SolverAction::Upgrade {
                            remove: (*old_record).clone(),
                            install: new_record.clone(),
                        });
                    } else {
                        actions.push(SolverAction::Downgrade {
                            remove: (*old_record).clone(),
                            install: new_record.clone(),
                        });
                    }
                }
            }
        }

        for (name, old_record) in &installed {
            if !selected.contains_key(*name) && !kept_by_omit.contains(name) {
                actions.push(SolverAction::Remove((*old_record).clone()));
            }
        }

        Solution { actions }
    }

    fn build_unsolvable(&self, request: &Request, failure: &ResolveFailure) -> Unsolvable {
        let mut graph = ProblemsGraph::new();
        let root = graph.root_node();

        let conflicting = failure
            .constraints
            .get(&failure.name)
            .cloned()
            .unwrap_or_default();

        // Every constraint that contributed to this name's failure gets its own node: one hung
        // directly off root for a job/pin, one hung off the dependent package's own node for a
        // transitive dependency. This is what keeps every conflict endpoint (§4.7) in the graph,
        // not just the unresolvable name itself.
        let mut constraint_nodes = Vec::new();
        for (spec, source) in &conflicting {
            let constraint = graph.add_node(ProblemNode::Constraint(spec.clone()));
            match source {
                ConstraintSource::Job(_) | ConstraintSource::Installed => {
                    graph.add_edge(root, constraint, spec.clone());
                }
                ConstraintSource::Dependency { parent } => {
                    let parent_node = failure
                        .selected
                        .get(parent)
                        .cloned()
                        .map(ProblemNode::Package)
                        .unwrap_or_else(|| {
                            ProblemNode::Constraint(MatchSpec::from(
                                rattler_conda_types::PackageName::new_unchecked(parent.clone()),
                            ))
                        });
                    let parent_idx = graph.add_node(parent_node);
                    graph.add_edge(root, parent_idx, spec.clone());
                    graph.add_edge(parent_idx, constraint, spec.clone());
                }
            }
            constraint_nodes.push(constraint);
        }

        let spec = conflicting
            .first()
            .map(|(spec, _)| spec.clone())
            .unwrap_or_else(|| {
                MatchSpec::from(rattler_conda_types::PackageName::new_unchecked(failure.name.clone()))
            });

        if constraint_nodes.is_empty() {
            let constraint = graph.add_node(ProblemNode::Constraint(spec.clone()));
            graph.add_edge(root, constraint, spec.clone());
            constraint_nodes.push(constraint);
        }

        let candidates = self.all_candidates(&failure.name, request.flags.channel_priority);
        if candidates.is_empty() {
            let unresolved = graph.add_node(ProblemNode::UnresolvedDependency(spec.clone()));
            graph.add_edge(constraint_nodes[0], unresolved, spec.clone());
            for &constraint in &constraint_nodes {
                graph.add_conflict(constraint, unresolved, ConflictCause::Constrains(spec.clone()));
            }
        } else {
            for candidate in candidates {
                let package = graph.add_node(ProblemNode::Package(candidate.clone()));
                graph.add_edge(constraint_nodes[0], package, spec.clone());
                for (constraint_spec, &constraint) in conflicting.iter().map(|(s, _)| s).zip(&constraint_nodes) {
                    if !constraint_spec.matches_except_channel(&candidate.package_record) {
                        graph.add_conflict(
                            constraint,
                            package,
                            ConflictCause::Constrains(constraint_spec.clone()),
                        );
                    }
                }
            }
        }

        graph.prune_unreachable();
        Unsolvable::new(graph)
    }
}

/// Where a constraint accumulated for a given package name during [`Resolver::run`] came from:
/// needed to rebuild a [`ProblemsGraph`] that includes every conflict endpoint, not just the
/// package name that ultimately had no matching candidate.
#[derive(Debug, Clone)]
enum ConstraintSource {
    /// A direct `Install`/`Update`/`Freeze`/`Keep`/`Pin` job in the request.
    Job(MatchSpec),
    /// The version an already-installed record is held at, absent any job touching it.
    Installed,
    /// A dependency of an already-selected package, named by its package name.
    Dependency { parent: String },
}

/// A failed [`Resolver::run`]: the name that had no matching candidate, plus every constraint
/// accumulated for every name up to the point of failure, so [`SimpleBackend::build_unsolvable`]
/// can name every package involved in the conflict, not just `name`.
struct ResolveFailure {
    name: String,
    constraints: HashMap<String, Vec<(MatchSpec, ConstraintSource)>>,
    selected: HashMap<String, RepoDataRecord>,
}

struct Resolver<'b> {
    backend: &'b SimpleBackend,
    channel_priority: ChannelPriority,
}

impl<'b> Resolver<'b> {
    /// Attempts to resolve `request`, returning the selected record per package name, or a
    /// [`ResolveFailure`] describing the first package for which no candidate satisfies the
    /// accumulated constraints.
    fn run(&mut self, request: &Request) -> Result<HashMap<String, RepoDataRecord>, ResolveFailure> {
        let mut selected: HashMap<String, RepoDataRecord> = HashMap::new();
        let mut constraints: HashMap<String, Vec<(MatchSpec, ConstraintSource)>> = HashMap::new();

        for spec in request.pins() {
            if let Some(name) = spec.name.as_exact().map(|n| n.as_normalized().to_string()) {
                constraints
                    .entry(name)
                    .or_default()
                    .push((spec.clone(), ConstraintSource::Job(spec.clone())));
            }
        }

        let mut roots: Vec<(MatchSpec, ConstraintSource)> = Vec::new();

        let update_all = request
            .jobs
            .iter()
            .any(|job| matches!(job, Job::UpdateAll { .. }));

        if !update_all {
            for record in self.backend.installed_records() {
                let name = record.package_record.name.as_normalized().to_string();
                let removed = request.jobs.iter().any(|job| match job {
                    Job::Remove(spec, _) => spec.name.as_exact().map(|n| n.as_normalized()) == Some(name.as_str()),
                    _ => false,
                });
                let touched = request.jobs.iter().any(|job| match job {
                    Job::Update(spec) | Job::Install(spec) => {
                        spec.name.as_exact().map(|n| n.as_normalized()) == Some(name.as_str())
                    }
                    _ => false,
                });
                if removed || touched {
                    continue;
                }
                if let Ok(version) =
                    rattler_conda_types::VersionSpec::from_str(&format!("=={}", record.package_record.version))
                {
                    let spec = MatchSpec {
                        version: Some(version),
                        ..MatchSpec::from(record.package_record.name.clone())
                    };
                    roots.push((spec, ConstraintSource::Installed));
                }
            }
        }

        for job in &request.jobs {
            match job {
                Job::Install(spec) | Job::Update(spec) | Job::Freeze(spec) | Job::Keep(spec) => {
                    roots.push((spec.clone(), ConstraintSource::Job(spec.clone())));
                }
                _ => {}
            }
        }

        for (spec, source) in roots {
            self.resolve_name(&spec, source, &mut selected, &mut constraints)
                .map_err(|name| ResolveFailure {
                    name,
                    constraints: constraints.clone(),
                    selected: selected.clone(),
                })?;
        }

        Ok(selected)
    }

    fn resolve_name(
        &self,
        spec: &MatchSpec,
        source: ConstraintSource,
        selected: &mut HashMap<String, RepoDataRecord>,
        constraints: &mut HashMap<String, Vec<(MatchSpec, ConstraintSource)>>,
    ) -> Result<(), String> {
        let Some(name) = spec.name.as_exact().map(|n| n.as_normalized().to_string()) else {
            return Ok(());
        };

        constraints
            .entry(name.clone())
            .or_default()
            .push((spec.clone(), source));

        if let Some(existing) = selected.get(&name) {
            return if spec.matches_except_channel(&existing.package_record) {
                Ok(())
            } else {
                Err(name)
            };
        }

        let all_constraints = constraints.get(&name).cloned().unwrap_or_default();

        let candidate = self
            .backend
            .all_candidates(&name, self.channel_priority)
            .into_iter()
            .find(|candidate| {
                all_constraints
                    .iter()
                    .all(|(c, _)| c.matches_except_channel(&candidate.package_record))
            })
            .cloned();

        let Some(candidate) = candidate else {
            return Err(name);
        };

        selected.insert(name.clone(), candidate.clone());

        for dep in &candidate.package_record.depends {
            let Ok(dep_spec) = MatchSpec::from_str(dep) else {
                continue;
            };
            self.resolve_name(
                &dep_spec,
                ConstraintSource::Dependency { parent: name.clone() },
                selected,
                constraints,
            )?;
        }

        Ok(())
    }
}
