//! Pairwise metric goals.
//!
//! Each works on node pairs `(2k, 2k + 1)`: measure the current segment, work
//! out the correction needed to hit the target (length, length range, shared
//! length, shared or fixed direction) and split it evenly between the two
//! endpoints so the pair's net momentum is unchanged.

use crate::error::{Result, SolverError};
use crate::goals::goal::{
    length_correction, require_even, require_finite_point, require_non_negative, require_weight,
    split_pair, Goal, GoalOutput, GoalState,
};
use crate::math::triple::{Triple, TripleExt};
use crate::simulation::states::Node;

/// Keeps two nodes at a fixed distance
pub struct LengthGoal {
    state: GoalState,
    pub length: f64,
}

impl LengthGoal {
    /// Rest length taken from the starting positions
    pub fn new(start: Triple, end: Triple, weight: f64) -> Result<Self> {
        Self::with_length(start, end, (end - start).norm(), weight)
    }

    pub fn with_length(start: Triple, end: Triple, length: f64, weight: f64) -> Result<Self> {
        require_non_negative("LengthGoal", "length", length)?;
        require_weight("LengthGoal", weight)?;
        Ok(Self {
            state: GoalState::new(vec![start, end], weight),
            length,
        })
    }

    /// Update parameters; `None` leaves a value unchanged
    pub fn change(&mut self, length: Option<f64>, weight: Option<f64>) -> Result<()> {
        if let Some(length) = length {
            require_non_negative("LengthGoal", "length", length)?;
        }
        self.state.change_weight("LengthGoal", weight)?;
        if let Some(length) = length {
            self.length = length;
        }
        Ok(())
    }
}

impl Goal for LengthGoal {
    goal_accessors!("LengthGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let delta = self.state.position(nodes, 1) - self.state.position(nodes, 0);
        match length_correction(&delta, self.length) {
            Some(c) => split_pair(&mut self.state, 0, 1, c),
            None => self.state.deactivate(),
        }
    }

    /// Current distance between the two nodes
    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        let d = (self.state.position(nodes, 1) - self.state.position(nodes, 0)).norm();
        vec![GoalOutput::Scalar(d)]
    }
}

/// Keeps the distance between two nodes inside `[min, max]`; inactive while inside
pub struct ClampLengthGoal {
    state: GoalState,
    pub min: f64,
    pub max: f64,
}

impl ClampLengthGoal {
    pub fn new(start: Triple, end: Triple, min: f64, max: f64, weight: f64) -> Result<Self> {
        require_weight("ClampLengthGoal", weight)?;
        check_range(min, max)?;
        Ok(Self {
            state: GoalState::new(vec![start, end], weight),
            min,
            max,
        })
    }

    /// Update parameters; `None` leaves a value unchanged. An inverted range is rejected.
    pub fn change(&mut self, min: Option<f64>, max: Option<f64>, weight: Option<f64>) -> Result<()> {
        let min = min.unwrap_or(self.min);
        let max = max.unwrap_or(self.max);
        check_range(min, max)?;
        self.state.change_weight("ClampLengthGoal", weight)?;
        self.min = min;
        self.max = max;
        Ok(())
    }
}

impl Goal for ClampLengthGoal {
    goal_accessors!("ClampLengthGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let delta = self.state.position(nodes, 1) - self.state.position(nodes, 0);
        let d = delta.norm();
        let target = d.clamp(self.min, self.max);
        if target == d {
            self.state.deactivate();
            return;
        }
        match length_correction(&delta, target) {
            Some(c) => split_pair(&mut self.state, 0, 1, c),
            None => self.state.deactivate(),
        }
    }

    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        let d = (self.state.position(nodes, 1) - self.state.position(nodes, 0)).norm();
        vec![GoalOutput::Scalar(d)]
    }
}

/// Pulls every segment `(2k, 2k + 1)` toward the mean segment length
pub struct EqualLengthsGoal {
    state: GoalState,
}

impl EqualLengthsGoal {
    /// `endpoints` lists segment start/end pairs back to back
    pub fn new(endpoints: Vec<Triple>, weight: f64) -> Result<Self> {
        require_even("EqualLengthsGoal", &endpoints)?;
        require_weight("EqualLengthsGoal", weight)?;
        Ok(Self {
            state: GoalState::new(endpoints, weight),
        })
    }

    pub fn change(&mut self, weight: Option<f64>) -> Result<()> {
        self.state.change_weight("EqualLengthsGoal", weight)
    }

    fn segment_deltas(&self, nodes: &[Node]) -> Vec<Triple> {
        (0..self.state.node_count() / 2)
            .map(|k| self.state.position(nodes, 2 * k + 1) - self.state.position(nodes, 2 * k))
            .collect()
    }
}

impl Goal for EqualLengthsGoal {
    goal_accessors!("EqualLengthsGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let deltas = self.segment_deltas(nodes);
        let mean = deltas.iter().map(|d| d.norm()).sum::<f64>() / deltas.len() as f64;

        for (k, delta) in deltas.iter().enumerate() {
            let (i, j) = (2 * k, 2 * k + 1);
            match length_correction(delta, mean) {
                Some(c) => split_pair(&mut self.state, i, j, c),
                None => {
                    self.state.moves[i] = Triple::zeros();
                    self.state.moves[j] = Triple::zeros();
                    self.state.weights[i] = 0.0;
                    self.state.weights[j] = 0.0;
                }
            }
        }
    }

    /// Mean segment length
    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        let deltas = self.segment_deltas(nodes);
        let mean = deltas.iter().map(|d| d.norm()).sum::<f64>() / deltas.len() as f64;
        vec![GoalOutput::Scalar(mean)]
    }
}

/// Rotates every segment `(2k, 2k + 1)` about its midpoint onto a shared
/// direction, keeping each segment's length
pub struct ParallelLinesGoal {
    state: GoalState,
}

impl ParallelLinesGoal {
    pub fn new(endpoints: Vec<Triple>, weight: f64) -> Result<Self> {
        require_even("ParallelLinesGoal", &endpoints)?;
        require_weight("ParallelLinesGoal", weight)?;
        Ok(Self {
            state: GoalState::new(endpoints, weight),
        })
    }

    pub fn change(&mut self, weight: Option<f64>) -> Result<()> {
        self.state.change_weight("ParallelLinesGoal", weight)
    }

    /// Sign-aligned mean of the unit segment directions; `None` if it cancels out
    fn common_direction(deltas: &[Triple]) -> Option<Triple> {
        let mut reference: Option<Triple> = None;
        let mut sum = Triple::zeros();
        for d in deltas {
            if d.is_almost_zero(1e-12) {
                continue;
            }
            let unit = d.normalise();
            let r = *reference.get_or_insert(unit);
            sum += if unit.dot(&r) < 0.0 { -unit } else { unit };
        }
        if sum.is_almost_zero(1e-12) {
            None
        } else {
            Some(sum.normalise())
        }
    }
}

impl Goal for ParallelLinesGoal {
    goal_accessors!("ParallelLinesGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let n = self.state.node_count() / 2;
        let deltas: Vec<Triple> = (0..n)
            .map(|k| self.state.position(nodes, 2 * k + 1) - self.state.position(nodes, 2 * k))
            .collect();

        let Some(common) = Self::common_direction(&deltas) else {
            self.state.deactivate();
            return;
        };

        for (k, delta) in deltas.iter().enumerate() {
            let (i, j) = (2 * k, 2 * k + 1);
            if delta.is_almost_zero(1e-12) {
                self.state.moves[i] = Triple::zeros();
                self.state.moves[j] = Triple::zeros();
                self.state.weights[i] = 0.0;
                self.state.weights[j] = 0.0;
                continue;
            }
            let sign = if delta.dot(&common) < 0.0 { -1.0 } else { 1.0 };
            let target = common * (sign * delta.norm());
            split_pair(&mut self.state, i, j, delta - target);
        }
    }

    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        let n = self.state.node_count() / 2;
        let deltas: Vec<Triple> = (0..n)
            .map(|k| self.state.position(nodes, 2 * k + 1) - self.state.position(nodes, 2 * k))
            .collect();
        Self::common_direction(&deltas)
            .map(|d| vec![GoalOutput::Vector(d)])
            .unwrap_or_default()
    }
}

fn check_range(min: f64, max: f64) -> Result<()> {
    require_non_negative("ClampLengthGoal", "min", min)?;
    require_non_negative("ClampLengthGoal", "max", max)?;
    if min > max {
        return Err(SolverError::InvalidParameter {
            goal: "ClampLengthGoal",
            reason: format!("min ({min}) exceeds max ({max})"),
        });
    }
    Ok(())
}

/// Unit direction, rejecting zero and non-finite input
fn check_direction(direction: &Triple) -> Result<Triple> {
    require_finite_point("DirectionGoal", "direction", direction)?;
    if direction.is_almost_zero(1e-12) {
        return Err(SolverError::InvalidParameter {
            goal: "DirectionGoal",
            reason: "direction must be non-zero".into(),
        });
    }
    Ok(direction.normalise())
}

/// Aligns a two-node segment with a fixed direction (either sense), keeping its length
pub struct DirectionGoal {
    state: GoalState,
    direction: Triple,
}

impl DirectionGoal {
    pub fn new(start: Triple, end: Triple, direction: Triple, weight: f64) -> Result<Self> {
        require_weight("DirectionGoal", weight)?;
        Ok(Self {
            state: GoalState::new(vec![start, end], weight),
            direction: check_direction(&direction)?,
        })
    }

    pub fn direction(&self) -> Triple {
        self.direction
    }

    /// Update parameters; `None` leaves a value unchanged
    pub fn change(&mut self, direction: Option<Triple>, weight: Option<f64>) -> Result<()> {
        let direction = direction.map(|d| check_direction(&d)).transpose()?;
        self.state.change_weight("DirectionGoal", weight)?;
        if let Some(direction) = direction {
            self.direction = direction;
        }
        Ok(())
    }
}

impl Goal for DirectionGoal {
    goal_accessors!("DirectionGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let delta = self.state.position(nodes, 1) - self.state.position(nodes, 0);
        if delta.is_almost_zero(1e-12) {
            self.state.deactivate();
            return;
        }
        let sign = if delta.dot(&self.direction) < 0.0 { -1.0 } else { 1.0 };
        let target = self.direction * (sign * delta.norm());
        split_pair(&mut self.state, 0, 1, delta - target);
    }

    /// Angle in radians between the segment's line and the direction
    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        let delta = self.state.position(nodes, 1) - self.state.position(nodes, 0);
        if delta.is_almost_zero(1e-12) {
            return Vec::new();
        }
        let cos = (delta.normalise().dot(&self.direction)).abs().min(1.0);
        vec![GoalOutput::Scalar(cos.acos())]
    }
}
