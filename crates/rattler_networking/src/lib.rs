#![deny(missing_docs)]

//! Authenticated, retrying HTTP for the conda ecosystem: credential storage keyed by host
//! (C5), a mirror map with least-failures selection, and a fetcher that issues conditional
//! GETs, retries transient failures with backoff, fails over across mirrors, and verifies size
//! and hash before a download is considered complete (C6).

pub mod authentication_storage;
pub mod fetch;
pub mod mirror;
pub mod retry;

pub use authentication_storage::{authentication::Authentication, storage::AuthenticationStorage};
pub use fetch::{FetchError, FetchOutcome, Fetcher, Request};
pub use mirror::MirrorMap;
