//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `UrlState`: the lifecycle of a single URL from discovery to its terminal outcome

mod url_state;

pub use url_state::UrlState;
