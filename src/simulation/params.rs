//! Runtime settings for the solver
//!
//! `SolverParams` holds:
//! - the node merge threshold used when goals and binders are attached,
//! - how many iterations a background tick runs (0 = time-boxed tick),
//! - momentum on/off and the damping applied when a move opposes velocity,
//! - whether the interactive handle pull is applied

use std::time::Duration;

/// Wall-clock length of a background tick when `iteration_count == 0`
pub const TIME_BOXED_TICK: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct SolverParams {
    pub node_merge_threshold: f64,      // positions closer than this share a node
    pub iteration_count: usize,         // iterations per background tick, 0 = time-boxed
    pub damping_factor: f64,            // velocity multiplier (0-1) when a move opposes velocity
    pub enable_momentum: bool,          // integrate velocity between iterations
    pub enable_mouse_interaction: bool, // apply the handle pull toward the pointer ray
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            node_merge_threshold: 1e-3,
            iteration_count: 10,
            damping_factor: 0.9,
            enable_momentum: true,
            enable_mouse_interaction: false,
        }
    }
}

impl SolverParams {
    pub fn with_merge_threshold(mut self, threshold: f64) -> Self {
        self.node_merge_threshold = threshold.abs();
        self
    }

    pub fn with_iteration_count(mut self, count: usize) -> Self {
        self.iteration_count = count;
        self
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping_factor = damping.clamp(0.0, 1.0);
        self
    }

    pub fn with_momentum(mut self, enabled: bool) -> Self {
        self.enable_momentum = enabled;
        self
    }

    pub fn with_mouse_interaction(mut self, enabled: bool) -> Self {
        self.enable_mouse_interaction = enabled;
        self
    }
}
