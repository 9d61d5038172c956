//! The solver driver (C12): builds a [`Request`] from user jobs, pins, installed state, and
//! virtual packages, submits it to a [`Backend`], and turns an unsolvable outcome into a
//! rendered problem tree (§4.7).

use std::time::Duration;

use rattler_conda_types::{GenericVirtualPackage, PrefixData, RepoDataRecord};
use rattler_solve::{Backend, CompressedProblemsGraph, Job, Request, Solution};
use rattler_virtual_packages::{VirtualPackage, VirtualPackageOverrides};

use crate::error::RattlerError;
use crate::pin;

/// A rendered, human-readable explanation of why a request could not be solved (§4.7).
#[derive(Debug, Clone)]
pub struct ProblemReport {
    rendered: String,
}

impl ProblemReport {
    /// Renders the compressed problem tree to its final message text.
    pub fn render(&self) -> &str {
        &self.rendered
    }
}

/// Configures [`SolverDriver::solve`].
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Whether to detect and add the host's virtual packages to the installed repo.
    pub add_virtual_packages: bool,
    /// Whether to compute and add the automatic Python pin (and `python_abi` pin).
    pub auto_pin_python: bool,
    /// Whether a first `Unsolvable` outcome is allowed to trigger one retry with a shortened
    /// repodata TTL (§4.6 step 4).
    pub allow_stale_cache_retry: bool,
    /// The repodata TTL used on the retry attempt, if one happens.
    pub retry_ttl: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            add_virtual_packages: true,
            auto_pin_python: true,
            allow_stale_cache_retry: true,
            retry_ttl: Duration::from_secs(0),
        }
    }
}

/// Drives one solve cycle against a [`Backend`], folding in pins and installed/virtual state
/// per §4.6.
pub struct SolverDriver {
    options: DriverOptions,
}

impl SolverDriver {
    /// Creates a driver with the given options.
    pub fn new(options: DriverOptions) -> Self {
        Self { options }
    }

    /// Builds the final [`Request`] for a solve: the caller's `jobs` plus pins read from
    /// `<prefix>/conda-meta/pinned`, plus the automatic Python pin, in that order (§4.6 step 1).
    pub fn build_request(
        &self,
        prefix_data: &PrefixData,
        mut request: Request,
    ) -> Result<Request, RattlerError> {
        for spec in pin::read_pinned_file(prefix_data)? {
            request.jobs.push(Job::Pin(spec));
        }

        if self.options.auto_pin_python {
            for job in pin::python_auto_pins(prefix_data, &request.jobs)? {
                request.jobs.push(job);
            }
        }

        Ok(request)
    }

    /// Adds the installed records from `prefix_data` and, if enabled, the host's virtual
    /// packages to `backend` as the installed repo (§4.6 step 2).
    #[tracing::instrument(skip_all)]
    pub fn load_installed_state(
        &self,
        backend: &mut dyn Backend,
        installed: Vec<RepoDataRecord>,
    ) -> Result<(), RattlerError> {
        let handle = backend.add_repo_from_packages(installed, "installed", false);
        backend.set_installed_repo(handle)?;

        if self.options.add_virtual_packages {
            let detected = VirtualPackage::detect(&VirtualPackageOverrides::from_env())
                .unwrap_or_default();
            let generic: Vec<GenericVirtualPackage> =
                detected.into_iter().map(GenericVirtualPackage::from).collect();
            backend.add_virtual_packages(generic);
        }

        Ok(())
    }

    /// Submits `request` to `backend` (§4.6 step 3). On `Unsolvable`, if a retry is allowed and
    /// `reload` (a closure that reloads channel data with a shortened TTL) is provided, reinvokes
    /// the whole `load_channels -> solve` pipeline once (§4.6 step 4) before giving up and
    /// rendering the problem tree (§4.6 step 5, §4.7).
    #[tracing::instrument(skip_all, fields(jobs = request.jobs.len()))]
    pub async fn solve<F, Fut>(
        &self,
        backend: &mut dyn Backend,
        request: &Request,
        retry: Option<F>,
    ) -> Result<Solution, RattlerError>
    where
        F: FnOnce(Duration) -> Fut,
        Fut: std::future::Future<Output = Result<(), RattlerError>>,
    {
        match backend.solve(request).map_err(RattlerError::Backend)? {
            Ok(solution) => {
                tracing::debug!(actions = solution.actions.len(), "solve succeeded");
                Ok(solution)
            }
            Err(unsolvable) => {
                if self.options.allow_stale_cache_retry {
                    if let Some(retry) = retry {
                        tracing::debug!("solve failed, retrying with a shortened repodata TTL");
                        retry(self.options.retry_ttl).await?;
                        return match backend.solve(request).map_err(RattlerError::Backend)? {
                            Ok(solution) => Ok(solution),
                            Err(unsolvable) => Err(self.render_unsolvable(unsolvable)),
                        };
                    }
                }
                Err(self.render_unsolvable(unsolvable))
            }
        }
    }

    fn render_unsolvable(&self, unsolvable: rattler_solve::Unsolvable) -> RattlerError {
        let compressed = CompressedProblemsGraph::from_problems_graph(unsolvable.problems_graph());
        RattlerError::Unsolvable {
            report: ProblemReport { rendered: compressed.render() },
        }
    }
}
