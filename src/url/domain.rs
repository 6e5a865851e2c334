use std::fmt;
use url::Url;

/// The scheme and network location that scope a crawl
///
/// Two URLs belong to the same site only when scheme, host and effective port
/// all agree. `www.example.com` and `example.com` are different domains.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SiteDomain {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
}

impl fmt::Display for SiteDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}://{}:{}", self.scheme, self.host, port),
            None => write!(f, "{}://{}", self.scheme, self.host),
        }
    }
}

/// Extracts the domain of a URL
///
/// The host is lowercased; the port is kept only when it differs from the
/// scheme's default.
///
/// # Arguments
///
/// * `url` - The URL to extract the domain from
///
/// # Returns
///
/// * `Some(SiteDomain)` - Scheme, host and explicit port
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitewalk::url::domain_of;
///
/// let url = Url::parse("https://EXAMPLE.com/path").unwrap();
/// let domain = domain_of(&url).unwrap();
/// assert_eq!(domain.host, "example.com");
/// assert_eq!(domain.to_string(), "https://example.com");
/// ```
pub fn domain_of(url: &Url) -> Option<SiteDomain> {
    let host = url.host_str()?;
    if host.is_empty() {
        return None;
    }
    Some(SiteDomain {
        scheme: url.scheme().to_lowercase(),
        host: host.to_lowercase(),
        port: url.port(),
    })
}

/// Returns true if both URLs share scheme and network location
pub fn is_same_domain(a: &Url, b: &Url) -> bool {
    match (domain_of(a), domain_of(b)) {
        (Some(da), Some(db)) => da == db,
        _ => false,
    }
}
