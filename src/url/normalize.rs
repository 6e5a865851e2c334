use crate::UrlError;
use serde::{Serialize, Serializer};
use std::fmt;
use url::Url;

/// A URL in canonical form
///
/// Two discovered URLs that denote the same page have equal canonical forms.
/// Construct one with [`canonicalize`] or [`CanonicalUrl::from_url`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    /// Canonicalizes an already parsed URL
    pub fn from_url(url: &Url) -> Result<Self, UrlError> {
        canonicalize_parsed(url.clone())
    }

    /// Returns the canonical form as a string slice
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the underlying parsed URL
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the path component (always starts with `/`)
    pub fn path(&self) -> &str {
        self.0.path()
    }

    pub fn into_url(self) -> Url {
        self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Serialize for CanonicalUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}

/// Canonicalizes a URL string
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject schemes other than http and https, and URLs without a host
/// 3. Drop the query string and the fragment
/// 4. If the final path segment contains no `.` (it looks like a directory),
///    make sure the path ends with `/`
///
/// Scheme and host are lowercased by the parser. The function is idempotent:
/// canonicalizing a canonical URL returns it unchanged.
///
/// # Arguments
///
/// * `url_str` - The absolute URL string to canonicalize
///
/// # Returns
///
/// * `Ok(CanonicalUrl)` - The canonical form
/// * `Err(UrlError)` - Failed to parse, or not an http(s) URL
///
/// # Examples
///
/// ```
/// use sitewalk::url::canonicalize;
///
/// let url = canonicalize("https://Example.com/about?x=1#team").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/about/");
///
/// let file = canonicalize("https://example.com/report.pdf").unwrap();
/// assert_eq!(file.as_str(), "https://example.com/report.pdf");
/// ```
pub fn canonicalize(url_str: &str) -> Result<CanonicalUrl, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize_parsed(url)
}

fn canonicalize_parsed(mut url: Url) -> Result<CanonicalUrl, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(UrlError::MissingDomain),
    }

    url.set_query(None);
    url.set_fragment(None);

    let path = url.path().to_string();
    if needs_directory_slash(&path) {
        url.set_path(&format!("{}/", path));
    }

    Ok(CanonicalUrl(url))
}

/// Returns true when the last path segment has no `.` and no trailing slash yet
fn needs_directory_slash(path: &str) -> bool {
    if path.ends_with('/') {
        return false;
    }
    let last_segment = path.rsplit('/').next().unwrap_or("");
    !last_segment.contains('.')
}

/// Resolves a link target against the page it was found on
///
/// Returns `None` for targets that cannot form a URL.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    base.join(href.trim()).ok()
}
