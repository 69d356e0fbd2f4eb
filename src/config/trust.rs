//! Host allowlists for post-verification redirects and browser origins.

use std::fmt;
use url::Url;

/// Hosts a post-verification redirect is allowed to land on.
///
/// A host is trusted when it equals one of the exact hosts or ends with one
/// of the suffixes. Suffixes include their leading dot, so `.vercel.app`
/// trusts `app.vercel.app` but not `vercel.app` or `evilvercel.app`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustedReturnHosts {
    exact: Vec<String>,
    suffixes: Vec<String>,
}

impl TrustedReturnHosts {
    /// Hosts trusted when nothing else is configured.
    pub const DEFAULT_EXACT: [&'static str; 2] = ["localhost", "127.0.0.1"];

    /// Host suffixes trusted when nothing else is configured.
    pub const DEFAULT_SUFFIXES: [&'static str; 5] = [
        ".vercel.app",
        ".netlify.app",
        ".web.app",
        ".firebaseapp.com",
        ".konsiyer.com",
    ];

    /// Builds an allowlist from exact hosts and suffixes.
    ///
    /// Suffixes without a leading dot get one.
    #[must_use]
    pub fn new<E, S>(exact: E, suffixes: S) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        Self {
            exact: exact
                .into_iter()
                .map(|h| h.as_ref().trim().to_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            suffixes: suffixes
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .map(|s| if s.starts_with('.') { s } else { format!(".{s}") })
                .collect(),
        }
    }

    /// Returns whether `host` is on the allowlist.
    #[must_use]
    pub fn permits_host(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.exact.iter().any(|h| *h == host)
            || self.suffixes.iter().any(|s| host.ends_with(s.as_str()))
    }

    /// Validates a caller-supplied return URL.
    ///
    /// The URL must be absolute, use `http` or `https`, have a host, and that
    /// host must be trusted. Returns `None` otherwise.
    #[must_use]
    pub fn validate(&self, raw: &str) -> Option<ReturnUrl> {
        let url = Url::parse(raw.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str().filter(|h| !h.is_empty())?;
        if !self.permits_host(host) {
            return None;
        }
        Some(ReturnUrl(url))
    }
}

impl Default for TrustedReturnHosts {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EXACT, Self::DEFAULT_SUFFIXES)
    }
}

/// A return URL that passed [`TrustedReturnHosts::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReturnUrl(Url);

impl ReturnUrl {
    /// Returns `scheme://host[:port]`, dropping path, query and fragment.
    #[must_use]
    pub fn origin(&self) -> String {
        self.0.origin().ascii_serialization()
    }
}

impl AsRef<str> for ReturnUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ReturnUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Browser origins that receive credentialed CORS responses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowedOrigins {
    exact: Vec<String>,
    host_suffixes: Vec<String>,
}

impl AllowedOrigins {
    /// Origins allowed when nothing else is configured.
    pub const DEFAULT_EXACT: [&'static str; 3] = [
        "https://dev-konsiyer.ikas.shop",
        "http://localhost:5173",
        "http://localhost:3000",
    ];

    /// Origin host suffixes allowed when nothing else is configured.
    pub const DEFAULT_HOST_SUFFIXES: [&'static str; 2] = [".ikas.shop", ".myikas.com"];

    /// Builds an origin allowlist.
    #[must_use]
    pub fn new<E, S>(exact: E, host_suffixes: S) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        Self {
            exact: exact
                .into_iter()
                .map(|o| o.as_ref().trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            host_suffixes: host_suffixes
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Returns whether a request `Origin` header value is allowlisted.
    #[must_use]
    pub fn permits(&self, origin: &str) -> bool {
        if self.exact.iter().any(|o| o == origin) {
            return true;
        }
        Url::parse(origin)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
            .is_some_and(|host| self.host_suffixes.iter().any(|s| host.ends_with(s.as_str())))
    }
}

impl Default for AllowedOrigins {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EXACT, Self::DEFAULT_HOST_SUFFIXES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_return_hosts_accept_trusted_urls() {
        let hosts = TrustedReturnHosts::default();
        for url in [
            "http://localhost:5173/settings",
            "http://127.0.0.1:8080",
            "https://preview-123.vercel.app/onboarding?step=2",
            "https://site.netlify.app",
            "https://proj.web.app",
            "https://proj.firebaseapp.com/x",
            "https://panel.konsiyer.com",
        ] {
            assert!(hosts.validate(url).is_some(), "{url} should be trusted");
        }
    }

    #[test]
    fn test_default_return_hosts_reject_untrusted_urls() {
        let hosts = TrustedReturnHosts::default();
        for url in [
            "https://evil.com",
            "https://vercel.app",
            "https://evilvercel.app",
            "https://app.vercel.app.evil.com",
            "https://app.vercel.app@evil.com/",
            "javascript:alert(1)",
            "ftp://localhost/file",
            "//app.vercel.app/path",
            "not a url",
        ] {
            assert!(hosts.validate(url).is_none(), "{url} should be rejected");
        }
    }

    #[test]
    fn test_return_url_origin_drops_path_and_query() {
        let hosts = TrustedReturnHosts::default();
        let url = hosts
            .validate("https://shop-admin.vercel.app/settings?tab=1#top")
            .unwrap();
        assert_eq!(url.origin(), "https://shop-admin.vercel.app");

        let url = hosts.validate("http://localhost:5173/x").unwrap();
        assert_eq!(url.origin(), "http://localhost:5173");
    }

    #[test]
    fn test_custom_suffixes_get_leading_dot() {
        let hosts = TrustedReturnHosts::new(Vec::<String>::new(), ["example.org"]);
        assert!(hosts.permits_host("app.example.org"));
        assert!(!hosts.permits_host("example.org"));
        assert!(!hosts.permits_host("badexample.org"));
    }

    #[test]
    fn test_allowed_origins_exact_and_suffix() {
        let origins = AllowedOrigins::default();
        assert!(origins.permits("https://dev-konsiyer.ikas.shop"));
        assert!(origins.permits("http://localhost:5173"));
        assert!(origins.permits("https://any-store.myikas.com"));
        assert!(origins.permits("https://another.ikas.shop"));
        assert!(!origins.permits("http://localhost:8000"));
        assert!(!origins.permits("https://ikas.shop.evil.com"));
        assert!(!origins.permits("null"));
    }
}
