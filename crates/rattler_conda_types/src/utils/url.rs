/// Extracts the scheme of a channel string if it has one, e.g. `https` for
/// `https://example.com`. Returns `None` if there is no `://` or the part before it doesn't look
/// like a valid URL scheme.
pub(crate) fn parse_scheme(channel: &str) -> Option<&str> {
    let scheme_end = channel.find("://")?;
    let scheme = &channel[..scheme_end];

    if scheme.is_empty() || scheme.len() > 11 {
        return None;
    }

    let mut chars = scheme.chars();
    if !chars.next()?.is_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_alphanumeric() || c == '+' || c == '-' || c == '.') {
        return None;
    }

    Some(scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scheme() {
        assert_eq!(parse_scheme("https://example.com"), Some("https"));
        assert_eq!(parse_scheme("file:///foo/bar"), Some("file"));
        assert_eq!(parse_scheme("conda-forge"), None);
        assert_eq!(parse_scheme("1abc://example.com"), None);
        assert_eq!(parse_scheme("areallylongscheme://example.com"), None);
    }
}
