//! Crate-wide error taxonomy.

use crate::engine::EngineError;

/// Errors produced by the gripper and mount control layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An open-scale argument was outside the valid range [0.1, 1.0].
    #[error("open scale {0} is outside the valid range [0.1, 1.0]")]
    InvalidOpenScale(f32),

    /// An operation that requires simulation state was invoked before `load`.
    #[error("gripper is not loaded in a simulation")]
    NotLoaded,

    /// `load` was invoked on an already-loaded gripper.
    #[error("gripper is already loaded in a simulation")]
    AlreadyLoaded,

    /// The engine rejected a malformed or missing model asset.
    #[error("failed to load model asset: {0}")]
    Asset(anyhow::Error),

    /// A fault reported by the physics engine.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
