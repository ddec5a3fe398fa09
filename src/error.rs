// error.rs — error taxonomy for the turntable viewer

use std::time::Duration;

use thiserror::Error;

/// Errors raised while building the viewer's inputs. These are fatal to the
/// single call that produced them and never leave a partial sequence behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewerError {
    #[error("invalid subject: {0}")]
    InvalidSubject(String),

    #[error("invalid angle code table: {0}")]
    InvalidCodeTable(String),

    #[error("invalid locator template: {0}")]
    InvalidTemplate(String),
}

/// Per-slot failure recorded in the preload state. Never fatal to the sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("asset load failed: {0}")]
    LoadFailure(String),

    #[error("asset timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors from the resource-fetch primitive.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("unsupported locator: {0}")]
    UnsupportedLocator(String),
}

/// Errors while loading a [`crate::config::ViewerConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ViewerError),
}

pub type Result<T> = std::result::Result<T, ViewerError>;
