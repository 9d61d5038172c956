/// The name of the directory inside the cache directory that holds extracted packages and
/// downloaded archives.
pub const PACKAGE_CACHE_DIR: &str = "pkgs";

/// The name of the directory inside the cache directory that holds cached repodata.
pub const REPODATA_CACHE_DIR: &str = "cache";
