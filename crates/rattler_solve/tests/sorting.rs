//! Tests that channel priority ordering of candidates behaves as documented in §4.5.

use std::str::FromStr;

use rattler_conda_types::{MatchSpec, PackageRecord, RepoDataRecord, Version};
use rattler_solve::{Backend, ChannelPriority, Flags, Job, Request, RepoPriority, SimpleBackend};
use rstest::rstest;
use url::Url;

fn record(channel: &str, name: &str, version: &str) -> RepoDataRecord {
    let file_name = format!("{name}-{version}-0.tar.bz2");
    RepoDataRecord {
        package_record: PackageRecord {
            name: name.parse().unwrap(),
            version: Version::from_str(version).unwrap(),
            build: "0".to_string(),
            build_number: 0,
            channel_id: channel.to_string(),
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
        url: Url::parse(&format!("https://example.com/{channel}/{name}")).unwrap(),
        channel: channel.to_string(),
    }
}

#[rstest]
#[case::strict(ChannelPriority::Strict, "1.0")]
#[case::flexible(ChannelPriority::Flexible, "2.0")]
#[case::disabled(ChannelPriority::Disabled, "2.0")]
fn channel_priority_picks_the_expected_candidate(
    #[case] channel_priority: ChannelPriority,
    #[case] expected_version: &str,
) {
    let mut backend = SimpleBackend::new();
    let high = backend.add_repo_from_packages(vec![record("high", "a", "1.0")], "high", false);
    let low = backend.add_repo_from_packages(vec![record("low", "a", "2.0")], "low", false);
    backend
        .set_repo_priority(high, RepoPriority { priority: 10, subpriority: 0 })
        .unwrap();
    backend
        .set_repo_priority(low, RepoPriority { priority: 0, subpriority: 0 })
        .unwrap();

    let request = Request {
        flags: Flags {
            channel_priority,
            ..Flags::default()
        },
        jobs: vec![Job::Install(MatchSpec::from_str("a").unwrap())],
    };

    let solution = backend.solve(&request).unwrap().unwrap();
    let installed = solution.to_install().next().unwrap();
    assert_eq!(installed.package_record.version.to_string(), expected_version);
}
