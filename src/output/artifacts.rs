//! Per-page JSON artifacts
//!
//! Each processed page can be written to `<dir>/<name>.json`, where the name
//! is derived from the page's canonical URL so reruns overwrite rather than
//! duplicate. Image references carry a short cache key derived from their URL.

use crate::SitewalkError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Hex characters of the SHA-256 digest used in artifact file names
const ARTIFACT_NAME_HEX_LEN: usize = 16;

/// Hex characters of the MD5 digest used as an image cache key
const IMAGE_KEY_HEX_LEN: usize = 8;

/// An image referenced by a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub src: String,
    pub cache_key: String,
}

impl ImageRef {
    pub fn new(src: impl Into<String>) -> Self {
        let src = src.into();
        let cache_key = image_cache_key(&src);
        Self { src, cache_key }
    }
}

/// The stored form of a processed page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageArtifact {
    /// Canonical URL of the page
    pub url: String,
    pub title: Option<String>,
    pub text: String,
    /// In-scope links found on the page
    pub links: Vec<String>,
    pub images: Vec<ImageRef>,
    pub scraped_at: DateTime<Utc>,
}

/// Returns the artifact file name for a canonical URL
///
/// # Examples
///
/// ```
/// use sitewalk::output::artifact_file_name;
///
/// let name = artifact_file_name("https://example.com/");
/// assert_eq!(name.len(), 16 + ".json".len());
/// assert!(name.ends_with(".json"));
/// ```
pub fn artifact_file_name(canonical_url: &str) -> String {
    let digest = hex::encode(Sha256::digest(canonical_url.as_bytes()));
    format!("{}.json", &digest[..ARTIFACT_NAME_HEX_LEN])
}

/// Returns the cache key for an image URL
pub fn image_cache_key(image_url: &str) -> String {
    let digest = format!("{:x}", md5::compute(image_url.as_bytes()));
    digest[..IMAGE_KEY_HEX_LEN].to_string()
}

/// A directory of page artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Opens the directory, creating it if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SitewalkError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the artifact for `canonical_url` is written to
    pub fn path_for(&self, canonical_url: &str) -> PathBuf {
        self.dir.join(artifact_file_name(canonical_url))
    }

    /// Writes an artifact, replacing any earlier one for the same URL
    pub fn write(&self, artifact: &PageArtifact) -> Result<PathBuf, SitewalkError> {
        let path = self.path_for(&artifact.url);
        let json = serde_json::to_string_pretty(artifact)?;
        fs::write(&path, json)?;
        debug!("Wrote artifact {}", path.display());
        Ok(path)
    }

    /// Loads every artifact in the directory, ordered by URL
    ///
    /// JSON files that do not decode as artifacts are skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<PageArtifact>, SitewalkError> {
        let mut artifacts = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<PageArtifact>(&content) {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
        artifacts.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact(url: &str) -> PageArtifact {
        PageArtifact {
            url: url.to_string(),
            title: Some("Title".to_string()),
            text: "body text".to_string(),
            links: vec!["https://example.com/a/".to_string()],
            images: vec![ImageRef::new("https://example.com/logo.png")],
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_artifact_file_name_is_sha256_prefix() {
        let full = hex::encode(Sha256::digest(b"https://example.com/"));
        let name = artifact_file_name("https://example.com/");
        assert_eq!(name, format!("{}.json", &full[..16]));
    }

    #[test]
    fn test_artifact_file_name_differs_per_url() {
        assert_ne!(
            artifact_file_name("https://example.com/a/"),
            artifact_file_name("https://example.com/b/")
        );
    }

    #[test]
    fn test_image_cache_key_is_md5_prefix() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(image_cache_key(""), "d41d8cd9");
        assert_eq!(image_cache_key("https://example.com/logo.png").len(), 8);
    }

    #[test]
    fn test_write_and_load() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path().join("pages")).unwrap();

        let path = store.write(&artifact("https://example.com/b/")).unwrap();
        store.write(&artifact("https://example.com/a/")).unwrap();
        assert!(path.exists());
        assert_eq!(path, store.path_for("https://example.com/b/"));

        std::fs::write(store.dir().join("notes.txt"), "ignored").unwrap();
        std::fs::write(store.dir().join("broken.json"), "{").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].url, "https://example.com/a/");
        assert_eq!(loaded[0].images[0].cache_key.len(), 8);
    }

    #[test]
    fn test_rewrite_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let mut page = artifact("https://example.com/");
        store.write(&page).unwrap();
        page.title = Some("Updated".to_string());
        store.write(&page).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title.as_deref(), Some("Updated"));
    }
}
