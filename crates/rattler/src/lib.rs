#![deny(missing_docs)]

//! Installs conda environments: drives a solve against a [`rattler_solve::Backend`] (C12) and
//! applies the resulting [`Solution`] to a prefix (C13).
//!
//! This crate sits on top of `rattler_repodata_gateway` (channel data), `rattler_solve` (the
//! dependency resolver), `rattler_cache` (package archive cache) and `rattler_conda_types` (the
//! shared vocabulary of records, specs and prefix state) and wires them into the two operations a
//! package manager's core actually performs: deciding what should change, and making it so.

mod error;
mod link;
mod lock;
mod pin;

pub mod driver;
pub mod report;
pub mod transaction;

pub use error::RattlerError;
pub use rattler_solve::Solution;
