//! Same-origin vs cross-origin classification.
//!
//! Same-origin and header-less requests are trusted and skip the token
//! gates entirely; only requests declaring a foreign `Origin` are checked.

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginClass {
    SameOrigin,
    CrossOrigin,
    /// No `Origin` header at all (same-process or non-browser callers).
    /// Treated like `SameOrigin` by the guard.
    NoOrigin,
}

/// Classify a request's declared origin against the service base URL.
///
/// Host and port must match exactly (missing ports resolve from the
/// scheme: https → 443, otherwise 80); the scheme itself is not compared.
/// An origin that fails to parse is cross-origin, never trusted.
pub fn classify(origin: Option<&str>, base_url: &Url) -> OriginClass {
    let Some(origin) = origin else {
        return OriginClass::NoOrigin;
    };

    let Ok(parsed) = Url::parse(origin) else {
        return OriginClass::CrossOrigin;
    };
    let (Some(origin_host), Some(base_host)) = (parsed.host_str(), base_url.host_str()) else {
        return OriginClass::CrossOrigin;
    };

    if origin_host.eq_ignore_ascii_case(base_host)
        && resolved_port(&parsed) == resolved_port(base_url)
    {
        OriginClass::SameOrigin
    } else {
        OriginClass::CrossOrigin
    }
}

fn resolved_port(url: &Url) -> u16 {
    url.port()
        .unwrap_or(if url.scheme() == "https" { 443 } else { 80 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_missing_origin_header() {
        assert_eq!(
            classify(None, &base("https://api.example.com")),
            OriginClass::NoOrigin
        );
    }

    #[test]
    fn test_same_host_and_default_port() {
        let b = base("https://api.example.com");
        assert_eq!(
            classify(Some("https://api.example.com"), &b),
            OriginClass::SameOrigin
        );
        // 443 is the https default, so an explicit port still matches
        assert_eq!(
            classify(Some("https://api.example.com:443"), &b),
            OriginClass::SameOrigin
        );
    }

    #[test]
    fn test_scheme_is_not_compared() {
        // http on port 443 resolves to the same (host, port) tuple
        assert_eq!(
            classify(
                Some("http://api.example.com:443"),
                &base("https://api.example.com")
            ),
            OriginClass::SameOrigin
        );
    }

    #[test]
    fn test_http_default_port() {
        let b = base("http://localhost:8080");
        assert_eq!(
            classify(Some("http://localhost:8080"), &b),
            OriginClass::SameOrigin
        );
        assert_eq!(
            classify(Some("http://localhost"), &b),
            OriginClass::CrossOrigin
        );
    }

    #[test]
    fn test_host_case_insensitive() {
        assert_eq!(
            classify(Some("https://API.Example.COM"), &base("https://api.example.com")),
            OriginClass::SameOrigin
        );
    }

    #[test]
    fn test_different_host() {
        assert_eq!(
            classify(Some("https://evil.example.com"), &base("https://api.example.com")),
            OriginClass::CrossOrigin
        );
    }

    #[test]
    fn test_different_port() {
        assert_eq!(
            classify(
                Some("https://api.example.com:8443"),
                &base("https://api.example.com")
            ),
            OriginClass::CrossOrigin
        );
    }

    #[test]
    fn test_malformed_origin_fails_closed() {
        let b = base("https://api.example.com");
        assert_eq!(classify(Some("not a url"), &b), OriginClass::CrossOrigin);
        assert_eq!(classify(Some("null"), &b), OriginClass::CrossOrigin);
        assert_eq!(classify(Some(""), &b), OriginClass::CrossOrigin);
    }
}
