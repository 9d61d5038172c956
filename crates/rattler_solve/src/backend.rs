//! The [`Backend`] trait: the capability set the core assumes a package-database-and-solver
//! implementation provides, independent of which solving engine backs it.

use std::path::Path;

use rattler_conda_types::{Channel, GenericVirtualPackage, MatchSpec, RepoDataRecord};
use url::Url;

use crate::{problems_graph::ProblemsGraph, Request, Solution};

/// An opaque handle to a repo previously added to a [`Backend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoHandle(pub(crate) usize);

/// A repo's position in the channel priority order.
///
/// See [`crate::request::ChannelPriority`] for how these interact with a [`Request`]'s flags: a
/// strictly-higher `priority` can eclipse lower repos entirely, while `subpriority` only breaks
/// ties within the same `priority`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct RepoPriority {
    /// The repo's priority. Higher sorts first.
    pub priority: i32,
    /// The tiebreaker used when two repos share the same `priority`.
    pub subpriority: i32,
}

/// An error produced while adding repo data or solving a [`Request`].
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Failed to read or parse a `repodata.json` (or `.zst`) file.
    #[error("failed to read repodata at {path}: {source}")]
    RepoDataJson {
        /// The path that failed to load.
        path: std::path::PathBuf,
        /// The underlying error.
        #[source]
        source: rattler_conda_types::RepoDataError,
    },

    /// This backend does not implement a native on-disk serialization tier (only production SAT
    /// backends are expected to).
    #[error("this backend does not support native repo serialization")]
    NativeSerializationUnsupported,

    /// `set_installed_repo`/`set_repo_priority` referenced a [`RepoHandle`] this backend never
    /// issued.
    #[error("unknown repo handle")]
    UnknownRepoHandle,
}

/// The outcome of [`Backend::solve`] when no solution satisfies the request.
#[derive(Debug)]
pub struct Unsolvable {
    graph: ProblemsGraph,
}

impl Unsolvable {
    /// Constructs an `Unsolvable` from a fully-built problems graph.
    pub fn new(graph: ProblemsGraph) -> Self {
        Self { graph }
    }

    /// The graph of why this request could not be solved (see §4.7).
    pub fn problems_graph(&self) -> &ProblemsGraph {
        &self.graph
    }
}

/// The result of a solve: either a [`Solution`] or an [`Unsolvable`] explanation.
pub type SolveResult = Result<Result<Solution, Unsolvable>, BackendError>;

/// The capability set a package-database-and-solver implementation provides.
///
/// This is the trait-object boundary named in §9 REDESIGN: callers that need a production SAT
/// engine implement this trait over `resolvo` or `libsolv`; [`crate::SimpleBackend`] is the
/// minimal in-repository reference implementation used by tests and by embedders that don't need
/// one of those.
pub trait Backend {
    /// Loads every record from a `repodata.json` (or `.json.zst`) file on disk into a new repo.
    ///
    /// `base_url` and `channel_id` are used to stamp every resulting [`RepoDataRecord`]'s `url`
    /// and `channel_id` fields. When `pip_as_python_dep` is set, `"pip"` is appended to the
    /// `depends` of every `python` record. When `only_tar_bz2` is set, `.conda`-packaged records
    /// are skipped.
    fn add_repo_from_repodata_json(
        &mut self,
        path: &Path,
        base_url: &Url,
        channel_id: &str,
        pip_as_python_dep: bool,
        only_tar_bz2: bool,
    ) -> Result<RepoHandle, BackendError>;

    /// Loads an explicit, in-memory list of records into a new repo (used for installed records,
    /// synthetic virtual packages, and tests).
    fn add_repo_from_packages(
        &mut self,
        packages: Vec<RepoDataRecord>,
        name: &str,
        pip_as_python_dep: bool,
    ) -> RepoHandle;

    /// Loads a repo from a backend-specific native serialization previously produced by this same
    /// backend (the subdir loader's native tier, §4.4). `expected_origin` must match the file's
    /// embedded origin (url/etag/modified) or the backend must reject it.
    ///
    /// The default implementation returns [`BackendError::NativeSerializationUnsupported`];
    /// [`crate::SimpleBackend`] does not implement a native tier.
    fn add_repo_from_native_serialization(
        &mut self,
        _path: &Path,
        _expected_origin: (&Url, Option<&str>, Option<&str>),
        _channel_id: &str,
    ) -> Result<RepoHandle, BackendError> {
        Err(BackendError::NativeSerializationUnsupported)
    }

    /// Designates `handle` as the repo of already-installed records (at most one at a time).
    fn set_installed_repo(&mut self, handle: RepoHandle) -> Result<(), BackendError>;

    /// The currently-designated installed repo, if any.
    fn installed_repo(&self) -> Option<RepoHandle>;

    /// Sets the channel priority of a previously-added repo.
    fn set_repo_priority(
        &mut self,
        handle: RepoHandle,
        priority: RepoPriority,
    ) -> Result<(), BackendError>;

    /// Adds a synthetic installed record for each detected virtual package (`__glibc`, `__cuda`,
    /// …), so that solver constraints against them resolve. Equivalent to converting each into a
    /// [`RepoDataRecord`] and merging it into the installed repo.
    fn add_virtual_packages(&mut self, packages: Vec<GenericVirtualPackage>);

    /// Invokes `callback` once for every record across every repo that matches `spec`
    /// (`matches_except_channel`, per §3.2 — the solver-facing filter is channel-agnostic).
    fn for_each_package_matching(&self, spec: &MatchSpec, callback: &mut dyn FnMut(&RepoDataRecord));

    /// Invokes `callback` once for every record across every repo that has a `depends` or
    /// `constrains` entry whose parsed name matches `spec`'s name.
    fn for_each_package_depending_on(
        &self,
        spec: &MatchSpec,
        callback: &mut dyn FnMut(&RepoDataRecord),
    );

    /// Solves `request` against every repo added so far, returning either a [`Solution`] or an
    /// [`Unsolvable`] explanation.
    fn solve(&mut self, request: &Request) -> SolveResult;
}

/// Builds a [`Channel`] suitable for stamping [`RepoDataRecord`]s loaded from a single
/// `repodata.json`, matching the `(id, canonical_base_url)` pair a [`Backend`] is handed.
pub(crate) fn stamping_channel(base_url: &Url, channel_id: &str) -> Channel {
    Channel {
        id: channel_id.to_string(),
        canonical_base_url: base_url.clone(),
        display_name: channel_id.to_string(),
        mirror_urls: Vec::new(),
        platform_filters: Vec::new(),
    }
}
