//! The solver's input: a set of flags plus an ordered list of jobs.

use rattler_conda_types::MatchSpec;

/// Solver-wide flags that influence how [`crate::Backend::solve`] resolves a [`Request`].
///
/// Grounded in the three flags threaded through libmamba's `MSolver` construction
/// (`SOLVER_FLAG_ALLOW_DOWNGRADE`, `SOLVER_FLAG_ALLOW_UNINSTALL`,
/// `SOLVER_FLAG_STRICT_REPO_PRIORITY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    /// Whether the solver is allowed to select an older version of an already-installed package
    /// than the one currently installed.
    pub allow_downgrade: bool,

    /// Whether the solver is allowed to remove an already-installed package entirely in order to
    /// satisfy the request.
    pub allow_uninstall: bool,

    /// Channel priority policy. Defaults to [`ChannelPriority::Strict`].
    pub channel_priority: ChannelPriority,
}

/// How a repo's `(priority, subpriority)` pair affects candidate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelPriority {
    /// A strictly-higher-priority repo completely eclipses lower ones for a given package name:
    /// if any record of that name exists in the higher repo, records from lower repos are never
    /// considered, even if they have a higher version.
    #[default]
    Strict,

    /// Priority is used only as a tiebreaker among records that are otherwise equally preferred.
    Flexible,

    /// All repos are treated as equal priority (as if every repo had priority zero).
    Disabled,
}

/// A single user-level intent in a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Install a package matching this spec, adding it if not already installed.
    Install(MatchSpec),

    /// Update an already-installed package matching this spec to the best available version.
    Update(MatchSpec),

    /// Update every installed package to its best available version.
    UpdateAll {
        /// Whether packages that become unreferenced as a result of the update should also be
        /// removed.
        clean_dependencies: bool,
    },

    /// Remove a package matching this spec.
    Remove(MatchSpec, CleanDependencies),

    /// Keep an installed package at its currently installed version: behaves like an implicit
    /// `Install` for that exact record, without forbidding an upgrade that some other job forces.
    Freeze(MatchSpec),

    /// An alias for [`Job::Freeze`] used for installed records the caller wants kept unless a
    /// direct job says otherwise.
    Keep(MatchSpec),

    /// Constrain (but do not require) future resolutions of the named package to this spec,
    /// without installing it if not already present.
    Pin(MatchSpec),
}

/// Whether a [`Job::Remove`] should also remove packages that are no longer required by anything
/// else once the removal completes.
pub type CleanDependencies = bool;

/// The solver's input.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Flags controlling the overall solve.
    pub flags: Flags,

    /// The ordered list of jobs to satisfy. Order can matter for diagnostics (which job is blamed
    /// first) but does not change the resulting set, since the solver considers the whole request
    /// jointly.
    pub jobs: Vec<Job>,
}

impl Request {
    /// Creates an empty request with default flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a job and returns `self`, for fluent construction.
    #[must_use]
    pub fn with_job(mut self, job: Job) -> Self {
        self.jobs.push(job);
        self
    }

    /// Returns every [`MatchSpec`] named by a [`Job::Pin`] in this request, in order.
    pub fn pins(&self) -> impl Iterator<Item = &MatchSpec> {
        self.jobs.iter().filter_map(|job| match job {
            Job::Pin(spec) => Some(spec),
            _ => None,
        })
    }
}
