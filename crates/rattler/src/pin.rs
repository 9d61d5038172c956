//! Automatic and file-based pins folded into a [`Request`] before it reaches the solver
//! (§4.6 step 1), grounded in libmamba's `pinning.cpp`.

use std::str::FromStr;

use rattler_conda_types::{MatchSpec, PackageName, PrefixData};
use rattler_solve::Job;

use crate::error::{parse_match_spec, RattlerError};

/// Reads one match-spec string per line from `<prefix>/conda-meta/pinned`, skipping blank lines
/// and `#`-comments. Returns an empty list if the file does not exist.
pub fn read_pinned_file(prefix_data: &PrefixData) -> Result<Vec<MatchSpec>, RattlerError> {
    let path = prefix_data.prefix_path().join("conda-meta").join("pinned");
    if !path.exists() {
        return Ok(Vec::new());
    }

    let contents = std::fs::read_to_string(&path).map_err(|cause| RattlerError::Io { path: path.clone(), cause })?;
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(parse_match_spec)
        .collect()
}

/// Appends an automatic pin for `python` (to `<major>.<minor>.*`) and, if present, for
/// `python_abi` (to the exact installed build, which already carries any free-threading
/// `_cp<ver>t` suffix) — unless the caller's own jobs already name `python` explicitly.
///
/// Does nothing if Python isn't installed in `prefix_data`.
pub fn python_auto_pins(prefix_data: &PrefixData, jobs: &[Job]) -> Result<Vec<Job>, RattlerError> {
    let python_name = PackageName::new_unchecked("python");
    let Some(python_record) = prefix_data.get(&python_name) else {
        return Ok(Vec::new());
    };
    let python_record = python_record.map_err(|err| RattlerError::Io {
        path: prefix_data.prefix_path().join("conda-meta"),
        cause: std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string()),
    })?;

    let names_python_explicitly = jobs.iter().any(|job| job_names(job, &python_name));
    if names_python_explicitly {
        return Ok(Vec::new());
    }

    let version = &python_record.repodata_record.package_record.version;
    let Some((major, minor)) = version.as_major_minor() else {
        return Ok(Vec::new());
    };

    let mut pins = vec![Job::Pin(
        MatchSpec::from_str(&format!("python {major}.{minor}.*"))
            .map_err(|err| RattlerError::parse_match_spec(&format!("python {major}.{minor}.*"), err))?,
    )];

    let python_abi_name = PackageName::new_unchecked("python_abi");
    if let Some(Ok(abi_record)) = prefix_data.get(&python_abi_name) {
        let abi_version = &abi_record.repodata_record.package_record.version;
        let abi_build = &abi_record.repodata_record.package_record.build;
        let spec_str = format!("python_abi {abi_version} {abi_build}");
        pins.push(Job::Pin(
            MatchSpec::from_str(&spec_str).map_err(|err| RattlerError::parse_match_spec(&spec_str, err))?,
        ));
    }

    Ok(pins)
}

fn job_names(job: &Job, name: &PackageName) -> bool {
    let spec = match job {
        Job::Install(spec) | Job::Update(spec) | Job::Remove(spec, _) | Job::Freeze(spec) | Job::Keep(spec) | Job::Pin(spec) => spec,
        Job::UpdateAll { .. } => return false,
    };
    spec.name.as_exact().is_some_and(|exact| exact == name)
}
