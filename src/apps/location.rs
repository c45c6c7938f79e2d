//! # Minimal location model handed to activity predicates.
//!
//! Predicates receive a [`Location`]; how they match it is up to the host.
//!
//! ## Example
//! ```rust
//! use appvisor::Location;
//!
//! let loc = Location::new("https://shop.test/cart/42?coupon=x#summary");
//! assert_eq!(loc.origin(), "https://shop.test");
//! assert_eq!(loc.pathname(), "/cart/42");
//! assert_eq!(loc.search(), "?coupon=x");
//! assert_eq!(loc.hash(), "#summary");
//!
//! let next = loc.resolve("/settings");
//! assert_eq!(next.href(), "https://shop.test/settings");
//! ```

use std::fmt;

/// Current URL of the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    href: String,
}

impl Default for Location {
    fn default() -> Self {
        Self::new("http://localhost/")
    }
}

impl Location {
    /// Wraps an absolute href.
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into() }
    }

    /// Full href.
    pub fn href(&self) -> &str {
        &self.href
    }

    /// Scheme and host, e.g. `https://shop.test`. Empty for relative hrefs.
    pub fn origin(&self) -> &str {
        match self.href.find("://") {
            Some(scheme_end) => {
                let rest = &self.href[scheme_end + 3..];
                let host_len = rest.find(&['/', '?', '#'][..]).unwrap_or(rest.len());
                &self.href[..scheme_end + 3 + host_len]
            }
            None => "",
        }
    }

    /// Path component, always starting with `/`.
    pub fn pathname(&self) -> &str {
        let rest = &self.href[self.origin().len()..];
        let end = rest.find(&['?', '#'][..]).unwrap_or(rest.len());
        match &rest[..end] {
            "" => "/",
            path => path,
        }
    }

    /// Query string including the leading `?`, or empty.
    pub fn search(&self) -> &str {
        let without_hash = self.href.split('#').next().unwrap_or_default();
        match without_hash.find('?') {
            Some(i) => &without_hash[i..],
            None => "",
        }
    }

    /// Fragment including the leading `#`, or empty.
    pub fn hash(&self) -> &str {
        match self.href.find('#') {
            Some(i) => &self.href[i..],
            None => "",
        }
    }

    /// Resolves `url` against this location.
    ///
    /// - `#frag` replaces the fragment only
    /// - `/path` keeps the origin
    /// - `scheme://...` replaces everything
    /// - anything else is treated as a path relative to the origin root
    pub fn resolve(&self, url: &str) -> Location {
        if url.contains("://") {
            return Location::new(url);
        }
        if url.starts_with('#') {
            let base = self.href.split('#').next().unwrap_or_default();
            return Location::new(format!("{base}{url}"));
        }
        let path = url.trim_start_matches('/');
        Location::new(format!("{}/{path}", self.origin()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href)
    }
}

impl From<&str> for Location {
    fn from(href: &str) -> Self {
        Location::new(href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_path_defaults_to_slash() {
        let loc = Location::new("http://localhost");
        assert_eq!(loc.pathname(), "/");
        assert_eq!(loc.search(), "");
        assert_eq!(loc.hash(), "");
    }

    #[test]
    fn test_hash_before_query_is_not_search() {
        let loc = Location::new("http://localhost/a#frag?notquery");
        assert_eq!(loc.pathname(), "/a");
        assert_eq!(loc.search(), "");
        assert_eq!(loc.hash(), "#frag?notquery");
    }

    #[test]
    fn test_resolve_hash_keeps_path_and_query() {
        let loc = Location::new("http://localhost/a?x=1#old");
        assert_eq!(loc.resolve("#new").href(), "http://localhost/a?x=1#new");
    }

    #[test]
    fn test_resolve_absolute_replaces_origin() {
        let loc = Location::new("http://localhost/a");
        assert_eq!(loc.resolve("https://other.test/b").origin(), "https://other.test");
    }
}
