//! Tessera Engine -- fixed-timestep frame driver around the Tessera ECS.
//!
//! This crate builds on [`tessera_ecs`] to provide what a host needs to run a
//! simulation: a JSON-loadable [`EngineConfig`](config::EngineConfig), a
//! [`FrameLoop`](frame::FrameLoop) that advances the world at a fixed `dt`
//! and keeps per-frame diagnostics, and tracing setup.
//!
//! # Quick Start
//!
//! ```
//! use tessera_engine::prelude::*;
//!
//! let config = EngineConfig::from_json_str(r#"{ "fixed_dt": 0.02 }"#).unwrap();
//! let mut frames = FrameLoop::from_config(config).unwrap();
//!
//! frames
//!     .add_system("example", |_world: &mut World, _entities: &[EntityId], _dt: f64| {
//!         // game logic here
//!     })
//!     .unwrap();
//!
//! frames.run_frames(100);
//! assert_eq!(frames.frame_count(), 100);
//! assert!((frames.sim_time() - 2.0).abs() < 1e-9);
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod frame;
pub mod logging;

use std::path::PathBuf;

use tessera_ecs::EcsError;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the ECS crate for convenience.
pub use tessera_ecs;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while configuring or starting the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config text is not valid JSON for [`EngineConfig`](config::EngineConfig).
    #[error("malformed config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A config value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// The tracing subscriber could not be installed.
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Re-export everything from the ECS prelude.
    pub use tessera_ecs::prelude::*;

    // Engine-specific exports.
    pub use crate::config::EngineConfig;
    pub use crate::frame::{FrameDiagnostics, FrameLoop};
    pub use crate::logging::init_tracing;
    pub use crate::EngineError;
}
