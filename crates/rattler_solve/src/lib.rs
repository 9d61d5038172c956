#![deny(missing_docs)]

//! A package-database-and-solver capability set, and a small reference implementation.
//!
//! This crate defines the [`Backend`] trait object boundary (§9 REDESIGN): a package database
//! that repos can be loaded into, queried, and solved against. [`SimpleBackend`] is an
//! in-repository backtracking reference implementation sufficient for tests and for embedders
//! that don't need a production SAT engine. Plugging in `resolvo` or `libsolv` behind the same
//! trait is the intended extension point and is out of this crate's scope.
//!
//! [`Request`]/[`Job`] describe what the caller wants; [`Solution`]/[`SolverAction`] describe what
//! the solver decided; [`ProblemsGraph`]/[`CompressedProblemsGraph`] explain why it couldn't.

mod backend;
mod problems_graph;
mod request;
mod simple_backend;
mod solution;

pub use backend::{Backend, BackendError, RepoHandle, RepoPriority, SolveResult, Unsolvable};
pub use problems_graph::{CompressedNode, CompressedProblemsGraph, ConflictCause, ConflictMap, ProblemNode, ProblemsGraph};
pub use request::{ChannelPriority, CleanDependencies, Flags, Job, Request};
pub use simple_backend::SimpleBackend;
pub use solution::{Solution, SolverAction};

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use std::str::FromStr;

    use rattler_conda_types::{MatchSpec, PackageRecord, RepoDataRecord, Version};
    use url::Url;

    use super::{Backend, Job, ProblemNode, Request, SimpleBackend};

    fn record(name: &str, version: &str, depends: Vec<&str>) -> RepoDataRecord {
        let file_name = format!("{name}-{version}-0.tar.bz2");
        RepoDataRecord {
            package_record: PackageRecord {
                name: name.parse().unwrap(),
                version: Version::from_str(version).unwrap(),
                build: "0".to_string(),
                build_number: 0,
                channel_id: "test".to_string(),
                platform: None,
                depends: depends.into_iter().map(ToString::to_string).collect(),
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
            url: Url::parse(&format!("https://example.com/noarch/{}", name)).unwrap(),
            channel: "test".to_string(),
        }
    }

    #[test]
    fn installs_a_package_and_its_dependency() {
        let mut backend = SimpleBackend::new();
        backend.add_repo_from_packages(
            vec![
                record("a", "1.0", vec!["b"]),
                record("b", "1.0", vec![]),
            ],
            "test",
            false,
        );

        let request = Request::new().with_job(Job::Install(MatchSpec::from_str("a").unwrap()));
        let solution = backend.solve(&request).unwrap().unwrap();

        assert_eq!(solution.to_install().count(), 2);
        assert!(solution
            .to_install()
            .any(|r| r.package_record.name.as_normalized() == "a"));
        assert!(solution
            .to_install()
            .any(|r| r.package_record.name.as_normalized() == "b"));
    }

    #[test]
    fn missing_dependency_is_unsolvable() {
        let mut backend = SimpleBackend::new();
        backend.add_repo_from_packages(vec![record("a", "1.0", vec!["missing"])], "test", false);

        let request = Request::new().with_job(Job::Install(MatchSpec::from_str("a").unwrap()));
        let outcome = backend.solve(&request).unwrap();

        assert!(outcome.is_err());
    }

    #[test]
    fn upgrade_replaces_an_older_installed_version() {
        let mut backend = SimpleBackend::new();
        let installed = backend.add_repo_from_packages(vec![record("a", "1.0", vec![])], "installed", false);
        backend.set_installed_repo(installed).unwrap();
        backend.add_repo_from_packages(vec![record("a", "2.0", vec![])], "test", false);

        let request = Request::new().with_job(Job::Update(MatchSpec::from_str("a").unwrap()));
        let solution = backend.solve(&request).unwrap().unwrap();

        assert_eq!(solution.to_remove().count(), 1);
        assert_eq!(solution.to_install().count(), 1);
        assert_eq!(
            solution.to_install().next().unwrap().package_record.version.to_string(),
            "2.0"
        );
    }

    #[test]
    fn unsatisfiable_version_mentions_every_existing_candidate() {
        let mut backend = SimpleBackend::new();
        backend.add_repo_from_packages(
            vec![
                record("a", "0.1.0", vec![]),
                record("a", "0.2.0", vec![]),
                record("a", "0.3.0", vec![]),
            ],
            "test",
            false,
        );

        let request = Request::new().with_job(Job::Install(MatchSpec::from_str("a=0.4.0").unwrap()));
        let unsolvable = backend.solve(&request).unwrap().unwrap_err();

        let names: Vec<&str> = unsolvable
            .problems_graph()
            .graph()
            .node_weights()
            .filter_map(|n| match n {
                ProblemNode::Package(r) => Some(r.package_record.name.as_normalized()),
                _ => None,
            })
            .collect();
        assert_eq!(names.iter().filter(|n| **n == "a").count(), 3);
    }

    #[test]
    fn pin_conflict_mentions_both_the_dependent_and_the_pinned_package() {
        let mut backend = SimpleBackend::new();
        backend.add_repo_from_packages(
            vec![
                record("foo", "2.0.0", vec!["bar=2.0"]),
                record("bar", "1.0.0", vec![]),
                record("bar", "2.0.0", vec![]),
            ],
            "test",
            false,
        );

        let request = Request::new()
            .with_job(Job::Install(MatchSpec::from_str("foo").unwrap()))
            .with_job(Job::Pin(MatchSpec::from_str("bar=1.0").unwrap()));
        let unsolvable = backend.solve(&request).unwrap().unwrap_err();

        let names: HashSet<&str> = unsolvable
            .problems_graph()
            .graph()
            .node_weights()
            .filter_map(|n| match n {
                ProblemNode::Package(r) => Some(r.package_record.name.as_normalized()),
                ProblemNode::Constraint(spec) => spec.name.as_exact().map(|n| n.as_normalized()),
                _ => None,
            })
            .collect();
        assert!(names.contains("foo"), "graph should mention foo: {names:?}");
        assert!(names.contains("bar"), "graph should mention bar: {names:?}");
    }
}
