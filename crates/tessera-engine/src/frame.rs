//! Fixed-timestep frame loop.
//!
//! The [`FrameLoop`] drives a [`World`] forward one [`World::advance_frame`]
//! per call to [`FrameLoop::frame`], always with the configured `fixed_dt`.
//! Each frame:
//!
//! 1. The world reconciles pending creations/removals and marks its query
//!    cache dirty if the population changed.
//! 2. The spatial rebuild policy is stepped.
//! 3. All registered systems run in registration order.
//! 4. The frame counter advances and [`FrameDiagnostics`] are recorded.
//!
//! Simulation time is `frame_count * fixed_dt`, never an accumulated sum.
//!
//! # Example
//!
//! ```
//! use tessera_engine::prelude::*;
//!
//! let mut frames = FrameLoop::new(World::new(), EngineConfig::default()).unwrap();
//!
//! frames
//!     .add_system("physics", |_world: &mut World, _entities: &[EntityId], _dt: f64| {
//!         // physics logic here
//!     })
//!     .unwrap();
//!
//! for _ in 0..10 {
//!     frames.frame();
//! }
//!
//! assert_eq!(frames.frame_count(), 10);
//! ```

use std::time::{Duration, Instant};

use serde::Serialize;
use tessera_ecs::entity::EntityId;
use tessera_ecs::query::QueryCacheStats;
use tessera_ecs::spatial::RebuildStats;
use tessera_ecs::world::{FrameReport, World};

use crate::config::EngineConfig;
use crate::EngineError;

// ---------------------------------------------------------------------------
// FrameDiagnostics
// ---------------------------------------------------------------------------

/// What happened in the last frame and how long it took.
#[derive(Debug, Clone, Serialize)]
pub struct FrameDiagnostics {
    /// The world's own account of the frame, including per-system times.
    pub report: FrameReport,
    /// Wall-clock time for the whole frame.
    pub total_time: Duration,
    /// Query cache counters after the frame.
    pub query_cache: QueryCacheStats,
    /// Spatial rebuild counters after the frame.
    pub spatial: RebuildStats,
}

// ---------------------------------------------------------------------------
// FrameLoop
// ---------------------------------------------------------------------------

/// Fixed-timestep driver owning a [`World`].
///
/// Given the same initial world, the same systems in the same order and no
/// unseeded randomness, running the same number of frames produces the same
/// state: system order is fixed, structural changes are applied in request
/// order, and `dt` never varies.
pub struct FrameLoop {
    world: World,
    config: EngineConfig,
    last_diagnostics: Option<FrameDiagnostics>,
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("frame", &self.world.frame())
            .field("fixed_dt", &self.config.fixed_dt)
            .field("world", &self.world)
            .finish()
    }
}

impl FrameLoop {
    /// Wrap an existing world. Only the frame settings of `config` apply;
    /// its `world` section was already consumed when the world was built.
    pub fn new(world: World, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        tracing::info!(
            fixed_dt = config.fixed_dt,
            systems = world.system_count(),
            "frame loop created"
        );
        Ok(Self {
            world,
            config,
            last_diagnostics: None,
        })
    }

    /// Build a fresh world from `config.world` and wrap it.
    pub fn from_config(config: EngineConfig) -> Result<Self, EngineError> {
        let world = World::with_config(config.world)?;
        Self::new(world, config)
    }

    /// Register a named system on the world. See [`World::add_system`].
    pub fn add_system<F>(&mut self, name: &str, func: F) -> Result<(), EngineError>
    where
        F: FnMut(&mut World, &[EntityId], f64) + Send + 'static,
    {
        Ok(self.world.add_system(name, func)?)
    }

    /// Run one frame with the fixed `dt`.
    pub fn frame(&mut self) -> &FrameDiagnostics {
        let start = Instant::now();
        let report = self.world.advance_frame(self.config.fixed_dt);

        let diagnostics = FrameDiagnostics {
            report,
            total_time: start.elapsed(),
            query_cache: self.world.query_cache_stats(),
            spatial: self.world.spatial().stats(),
        };
        tracing::trace!(
            frame = self.world.frame(),
            total_us = diagnostics.total_time.as_micros() as u64,
            "frame complete"
        );
        self.last_diagnostics.insert(diagnostics)
    }

    /// Run `count` frames. Returns how many entities were spawned plus
    /// retired across them.
    pub fn run_frames(&mut self, count: u64) -> u64 {
        let mut churn = 0u64;
        for _ in 0..count {
            let report = &self.frame().report;
            churn += (report.spawned + report.retired) as u64;
        }
        tracing::debug!(
            frames = count,
            churn,
            live = self.world.live_count(),
            "ran frames"
        );
        churn
    }

    // -- accessors ----------------------------------------------------------

    /// Frames the world has advanced, counting any it ran before it was
    /// wrapped. Always equal to the last [`FrameReport::frame`].
    pub fn frame_count(&self) -> u64 {
        self.world.frame()
    }

    /// Current simulation time in seconds.
    pub fn sim_time(&self) -> f64 {
        self.world.frame() as f64 * self.config.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.config.fixed_dt
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world, for setup and tests. During simulation,
    /// prefer doing work inside systems.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Diagnostics from the last frame, if any has run.
    pub fn last_diagnostics(&self) -> Option<&FrameDiagnostics> {
        self.last_diagnostics.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
