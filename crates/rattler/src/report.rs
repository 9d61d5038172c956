//! The `ReportSink` capability (§9 REDESIGN): every place this crate would otherwise print to
//! the console or prompt the user goes through a trait call instead, so the solver/transaction
//! path stays usable headless (tests, embedding callers rendering their own progress UI).

use rattler_conda_types::RepoDataRecord;
use rattler_solve::Solution;

/// One row of a printed transaction plan.
#[derive(Debug, Clone)]
pub struct PlanRow {
    /// The record being installed or removed.
    pub record: RepoDataRecord,
    /// A short label for the kind of change (`install`, `remove`, `upgrade`, …).
    pub kind: &'static str,
}

/// The name/version/build/channel/size table printed before a transaction executes
/// (§4.8 step 1).
#[derive(Debug, Clone, Default)]
pub struct TransactionPlan {
    /// Rows to print, in the order they'll be listed to the user. Not the execution order —
    /// see [`crate::transaction::Transaction::topological_order`] for that.
    pub rows: Vec<PlanRow>,
}

impl TransactionPlan {
    /// Builds a plan from a solver [`Solution`], one row per non-`Omit` action.
    pub fn from_solution(solution: &Solution) -> Self {
        use rattler_solve::SolverAction;

        let mut rows = Vec::new();
        for action in &solution.actions {
            match action {
                SolverAction::Install(record) => rows.push(PlanRow { record: record.clone(), kind: "install" }),
                SolverAction::Remove(record) => rows.push(PlanRow { record: record.clone(), kind: "remove" }),
                SolverAction::Reinstall(record) => rows.push(PlanRow { record: record.clone(), kind: "reinstall" }),
                SolverAction::Upgrade { remove, install } => {
                    rows.push(PlanRow { record: remove.clone(), kind: "remove" });
                    rows.push(PlanRow { record: install.clone(), kind: "upgrade" });
                }
                SolverAction::Downgrade { remove, install } => {
                    rows.push(PlanRow { record: remove.clone(), kind: "remove" });
                    rows.push(PlanRow { record: install.clone(), kind: "downgrade" });
                }
                SolverAction::Change { remove, install } => {
                    rows.push(PlanRow { record: remove.clone(), kind: "remove" });
                    rows.push(PlanRow { record: install.clone(), kind: "change" });
                }
                SolverAction::Omit(_) => {}
            }
        }
        Self { rows }
    }
}

/// Sink for everything a transaction would otherwise print to a terminal or prompt the user
/// about. Implementations that back an interactive CLI can render progress bars and ask for
/// confirmation; [`NullReportSink`] does neither.
pub trait ReportSink: Send + Sync {
    /// Called with the plan before any package is downloaded or linked. An interactive sink may
    /// use this to prompt for confirmation; a `false` return aborts the transaction before
    /// anything is touched.
    fn on_transaction_plan(&self, plan: &TransactionPlan) -> bool {
        let _ = plan;
        true
    }

    /// Called once a package's archive is confirmed present (and hash-verified) in the cache.
    fn on_package_cached(&self, record: &RepoDataRecord) {
        let _ = record;
    }

    /// Called after a package has been fully unlinked from the prefix.
    fn on_package_removed(&self, record: &RepoDataRecord) {
        let _ = record;
    }

    /// Called after a package has been fully linked into the prefix.
    fn on_package_linked(&self, record: &RepoDataRecord) {
        let _ = record;
    }

    /// Called once every operation in the transaction has completed successfully.
    fn on_transaction_complete(&self) {}
}

/// A [`ReportSink`] that does nothing and always approves the plan. Used by default in
/// non-interactive contexts (tests, embedding callers that render their own progress UI).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReportSink;

impl ReportSink for NullReportSink {}
