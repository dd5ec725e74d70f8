//! Error types for the Dominion engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and simulation execution.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: dominion_core::config::ConfigError,
    },

    /// Territory graph construction failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: dominion_world::WorldError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: dominion_core::runner::RunnerError,
    },
}
