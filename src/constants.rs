//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!`, so there is no runtime file I/O.
//! Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// Service endpoints and request defaults.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Tenor v2 endpoints
  pub search_url: String,
  pub featured_url: String,
  pub client_key: String,

  // Request shaping
  pub page_size: u32,
  pub media_filter: String,
  pub sticker_search_filter: String,
  /// Media renditions to try, most preferred first.
  pub rendition_preference: Vec<String>,

  pub request_timeout_secs: u64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
