//! Output module for run summaries and page artifacts
//!
//! This module handles:
//! - Aggregating per-URL results into a [`SiteStructure`]
//! - Printing run summaries and stored statistics
//! - Naming and writing per-page JSON artifacts

mod artifacts;
pub mod stats;

pub use artifacts::{artifact_file_name, image_cache_key, ArtifactStore, ImageRef, PageArtifact};
pub use stats::{
    load_statistics, print_site_structure, print_statistics, RunStatistics, SiteStructure,
};
