//! When to rebuild the spatial tree.
//!
//! The tree goes stale whenever entities move, but rebuilding it every frame
//! wastes work when nothing moved meaningfully. [`RebuildPolicy`] is stepped
//! once per frame and answers with a [`RebuildDecision`]:
//!
//! - every `check_interval` frames there is a check point. If the index is
//!   dirty and at least `min_cooldown` frames have passed since the last
//!   rebuild, rebuild ([`Lazy`](RebuildDecision::Lazy)); if it is dirty but
//!   the cooldown has not elapsed, keep the flag for the next check point
//!   ([`Deferred`](RebuildDecision::Deferred)); if it is clean, do nothing
//!   ([`Skipped`](RebuildDecision::Skipped)).
//! - once `2 * check_interval` frames pass without any rebuild, rebuild
//!   regardless of the flag ([`Forced`](RebuildDecision::Forced)). This
//!   bounds worst-case staleness.

use serde::{Deserialize, Serialize};

/// Rebuild scheduling knobs, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebuildConfig {
    /// Frames between check points. Must be at least 1.
    pub check_interval: u64,
    /// Minimum frames between two dirty-triggered rebuilds.
    pub min_cooldown: u64,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            check_interval: 60,
            min_cooldown: 10,
        }
    }
}

impl RebuildConfig {
    /// Frames without a rebuild after which one is forced.
    pub fn forced_after(&self) -> u64 {
        self.check_interval.saturating_mul(2)
    }
}

/// What the policy decided for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebuildDecision {
    /// Not a check point; nothing to do.
    Idle,
    /// Check point with a clean index.
    Skipped,
    /// Check point with a dirty index, cooldown still running.
    Deferred,
    /// Dirty-triggered rebuild.
    Lazy,
    /// Staleness bound reached; rebuilt unconditionally.
    Forced,
}

impl RebuildDecision {
    /// Whether the index was rebuilt on this step.
    pub fn rebuilds(self) -> bool {
        matches!(self, RebuildDecision::Lazy | RebuildDecision::Forced)
    }
}

/// Counters for each kind of outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildStats {
    pub forced: u64,
    pub lazy: u64,
    pub skipped: u64,
    pub deferred: u64,
    /// Rebuilds requested directly rather than by the policy.
    pub manual: u64,
}

impl RebuildStats {
    /// All rebuilds, whatever triggered them.
    pub fn total_rebuilds(&self) -> u64 {
        self.forced + self.lazy + self.manual
    }
}

/// Frame-driven rebuild scheduler.
#[derive(Debug, Clone)]
pub struct RebuildPolicy {
    config: RebuildConfig,
    frame: u64,
    frames_since_rebuild: u64,
    dirty: bool,
    stats: RebuildStats,
}

impl RebuildPolicy {
    /// A zero `check_interval` is treated as one.
    pub fn new(mut config: RebuildConfig) -> Self {
        config.check_interval = config.check_interval.max(1);
        Self {
            config,
            frame: 0,
            frames_since_rebuild: 0,
            dirty: false,
            stats: RebuildStats::default(),
        }
    }

    /// Effective configuration, after clamping.
    pub fn config(&self) -> RebuildConfig {
        self.config
    }

    /// Flag indexed positions as stale until the next rebuild.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether a dirty flag is waiting for a rebuild.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Counters per decision since construction.
    pub fn stats(&self) -> RebuildStats {
        self.stats
    }

    /// Frames stepped since the last rebuild of any kind.
    pub fn frames_since_rebuild(&self) -> u64 {
        self.frames_since_rebuild
    }

    /// Advance one frame and decide. The caller performs the rebuild when
    /// [`RebuildDecision::rebuilds`] is true; the policy has already reset
    /// its own state by then.
    pub fn step(&mut self) -> RebuildDecision {
        self.frame += 1;
        self.frames_since_rebuild += 1;

        let decision = if self.frames_since_rebuild >= self.config.forced_after() {
            self.stats.forced += 1;
            RebuildDecision::Forced
        } else if self.frame % self.config.check_interval != 0 {
            RebuildDecision::Idle
        } else if !self.dirty {
            self.stats.skipped += 1;
            RebuildDecision::Skipped
        } else if self.frames_since_rebuild < self.config.min_cooldown {
            self.stats.deferred += 1;
            RebuildDecision::Deferred
        } else {
            self.stats.lazy += 1;
            RebuildDecision::Lazy
        };

        if decision.rebuilds() {
            self.reset();
        }
        decision
    }

    /// Record a rebuild performed outside [`step`](Self::step).
    pub fn record_manual_rebuild(&mut self) {
        self.stats.manual += 1;
        self.reset();
    }

    fn reset(&mut self) {
        self.dirty = false;
        self.frames_since_rebuild = 0;
    }
}
