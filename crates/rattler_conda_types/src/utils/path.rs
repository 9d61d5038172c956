use itertools::Itertools;

/// Returns true if the given string looks like a filesystem path rather than a channel name or
/// URL.
pub(crate) fn is_path(path: &str) -> bool {
    if path.contains("://") {
        return false;
    }

    path.starts_with("./")
        || path.starts_with("..")
        || path.starts_with('~')
        || path.starts_with('/')
        || path.starts_with('\\')
        || path.starts_with("//")
        || path
            .chars()
            .take(3)
            .collect_tuple()
            .is_some_and(|(drive, colon, sep)| drive.is_ascii_alphabetic() && colon == ':' && (sep == '/' || sep == '\\'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_path() {
        assert!(is_path("./foo"));
        assert!(is_path("../foo"));
        assert!(is_path("~/foo"));
        assert!(is_path("/foo/bar"));
        assert!(is_path("C:/foo"));
        assert!(is_path("C:\\foo"));
        assert!(!is_path("conda-forge"));
        assert!(!is_path("https://example.com"));
    }
}
