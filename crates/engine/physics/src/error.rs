//! Error types for the terrain physics crate

use std::io;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while turning section geometry into engine shapes
#[derive(Debug, Error)]
pub enum MeshError {
    /// The physics engine rejected the triangle mesh
    #[error("Degenerate collision mesh: {0}")]
    Degenerate(String),

    /// No geometry to build a shape from
    #[error("Collision geometry is empty")]
    Empty,
}

/// Errors emitted by the region store
///
/// Corruption never reaches callers of the store's lookup API; it only shows
/// up here for code that decodes region files directly.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Truncated or malformed region record
    #[error("corrupt region record at byte {offset}: {reason}")]
    Corrupt { offset: usize, reason: &'static str },
}

/// Top-level pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Worker threads could not be started
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}
