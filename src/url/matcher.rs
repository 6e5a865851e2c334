use crate::ConfigError;
use regex::{Regex, RegexBuilder};

/// Patterns excluded from link discovery unless the configuration overrides them
///
/// Binary downloads, admin and session pages, search result pages, and
/// in-page anchors.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    r"\.pdf$",
    r"\.docx?$",
    r"\.xlsx?$",
    r"\.zip$",
    r"\.rar$",
    r"\.exe$",
    r"\.dmg$",
    r"/wp-admin/",
    r"/admin/",
    r"/login",
    r"/logout",
    r"\?.*search=",
    r"\?.*query=",
    r"#.*$",
];

/// A compiled set of case-insensitive URL exclusion patterns
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    patterns: Vec<Regex>,
}

impl ExcludeMatcher {
    /// Compiles the given patterns
    ///
    /// # Arguments
    ///
    /// * `patterns` - Regular expressions matched anywhere in the absolute URL
    ///
    /// # Returns
    ///
    /// * `Ok(ExcludeMatcher)` - All patterns compiled
    /// * `Err(ConfigError::InvalidPattern)` - The first pattern that failed
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p.as_ref(), e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Builds the matcher from [`DEFAULT_EXCLUDE_PATTERNS`]
    pub fn with_defaults() -> Self {
        let patterns = DEFAULT_EXCLUDE_PATTERNS
            .iter()
            .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
            .collect();
        Self { patterns }
    }

    /// Returns true if any pattern matches the URL
    ///
    /// # Examples
    ///
    /// ```
    /// use sitewalk::url::ExcludeMatcher;
    ///
    /// let matcher = ExcludeMatcher::with_defaults();
    /// assert!(matcher.is_excluded("https://example.com/files/Report.PDF"));
    /// assert!(!matcher.is_excluded("https://example.com/news/"));
    /// ```
    pub fn is_excluded(&self, url: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(url))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for ExcludeMatcher {
    fn default() -> Self {
        Self::with_defaults()
    }
}
