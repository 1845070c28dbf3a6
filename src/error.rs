use thiserror::Error;

/// Why a page request failed. Any of these ends the current navigation step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
  #[error("HTTP {0}")]
  Status(u16),
  #[error("request failed: {0}")]
  Transport(String),
  #[error("unreadable response: {0}")]
  Decode(String),
}

/// Errors surfaced by the pager. The `Display` text doubles as the status line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PagerError {
  #[error("Enter Tenor API key")]
  MissingCredential,
  #[error("Enter search query")]
  MissingQuery,
  #[error("Error: {0}")]
  Gateway(#[from] GatewayError),
}
