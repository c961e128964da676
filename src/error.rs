//! Error types for hero-fx

use thiserror::Error;

use crate::dom::NodeId;

/// Errors raised at the fallible edges: loading pages and configs, and
/// rejecting an overlapping typing reveal.
#[derive(Error, Debug)]
pub enum FxError {
    /// Reading a page or config file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Page or config JSON could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A config value is out of range
    #[error("Config error: {0}")]
    Config(String),

    /// A selector uses syntax outside the supported subset
    #[error("Unsupported selector: {0}")]
    Selector(String),

    /// A typing reveal is already running against this node
    #[error("Typing reveal already in progress on node {0}")]
    RevealInProgress(NodeId),
}

pub type Result<T> = std::result::Result<T, FxError>;
