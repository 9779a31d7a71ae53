//! The goal capability and the buffers every goal carries.
//!
//! A goal reads current node positions and writes, for each node it touches,
//! a desired displacement (`moves[i]`) and a confidence (`weights[i]`). It never
//! writes to the nodes. That is what lets the solver run all goals in parallel
//! without locks and then reduce their buffers on one thread.
//!
//! The helpers at the bottom are the shared skeletons of the goal families:
//! symmetric pair splitting, projection onto a target, averaged collision
//! corrections and unsplit per-face forces.

use std::any::Any;

use crate::error::{Result, SolverError};
use crate::math::triple::Triple;
use crate::simulation::states::Node;

/// Derived values a goal can report about the current configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GoalOutput {
    Scalar(f64),
    Point(Triple),
    Vector(Triple),
}

/// Buffers shared by all goals.
/// Invariant: `starting_positions`, `node_indices` (once attached), `moves` and
/// `weights` all have the same length.
#[derive(Debug, Clone)]
pub struct GoalState {
    pub weight: f64,                   // stiffness applied to every active node
    pub starting_positions: Vec<Triple>, // positions requested at construction
    pub node_indices: Vec<usize>,      // indices into the solver's node list, set on attach
    pub moves: Vec<Triple>,            // desired displacement per node, written by compute
    pub weights: Vec<f64>,             // confidence per node, written by compute
}

impl GoalState {
    pub fn new(starting_positions: Vec<Triple>, weight: f64) -> Self {
        let n = starting_positions.len();
        Self {
            weight,
            starting_positions,
            node_indices: Vec::with_capacity(n),
            moves: vec![Triple::zeros(); n],
            weights: vec![weight; n],
        }
    }

    pub fn node_count(&self) -> usize {
        self.starting_positions.len()
    }

    /// Current position of this goal's `i`-th node
    #[inline]
    pub fn position(&self, nodes: &[Node], i: usize) -> Triple {
        nodes[self.node_indices[i]].position
    }

    /// Current positions of all of this goal's nodes, in goal order
    pub fn positions(&self, nodes: &[Node]) -> Vec<Triple> {
        self.node_indices.iter().map(|&idx| nodes[idx].position).collect()
    }

    /// Zero every move and weight (the goal sits this iteration out)
    pub fn deactivate(&mut self) {
        self.moves.iter_mut().for_each(|m| *m = Triple::zeros());
        self.weights.iter_mut().for_each(|w| *w = 0.0);
    }

    /// Validate and apply a new stiffness; `None` leaves it unchanged
    pub fn change_weight(&mut self, goal: &'static str, weight: Option<f64>) -> Result<()> {
        if let Some(weight) = weight {
            require_weight(goal, weight)?;
            self.weight = weight;
        }
        Ok(())
    }

    /// Check the buffer-length invariant
    pub fn validate(&self, goal: &'static str) -> Result<()> {
        let n = self.starting_positions.len();
        if self.moves.len() != n || self.weights.len() != n {
            return Err(SolverError::InconsistentGoal {
                goal,
                reason: format!(
                    "{n} starting positions, {} moves, {} weights",
                    self.moves.len(),
                    self.weights.len()
                ),
            });
        }
        if !self.node_indices.is_empty() && self.node_indices.len() != n {
            return Err(SolverError::InconsistentGoal {
                goal,
                reason: format!("{n} starting positions, {} node indices", self.node_indices.len()),
            });
        }
        Ok(())
    }
}

/// Capability implemented by every goal type
pub trait Goal: Send + Sync {
    /// Type name used in logs and errors
    fn name(&self) -> &'static str;

    fn state(&self) -> &GoalState;

    fn state_mut(&mut self) -> &mut GoalState;

    /// Downcasting hooks, used to reach a concrete goal's `change` after the
    /// solver has taken ownership of it
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Fill `moves` and `weights` from the current node positions
    fn compute(&mut self, nodes: &[Node]);

    /// Values derived from the current configuration, for result reporting
    fn output(&self, _nodes: &[Node]) -> Vec<GoalOutput> {
        Vec::new()
    }

    fn node_count(&self) -> usize {
        self.state().node_count()
    }

    fn node_indices(&self) -> &[usize] {
        &self.state().node_indices
    }

    fn weight(&self) -> f64 {
        self.state().weight
    }
}

// =========================================================================================
// Construction checks
// =========================================================================================

pub(crate) fn require_at_least(goal: &'static str, points: &[Triple], required: usize) -> Result<()> {
    if points.len() < required {
        return Err(SolverError::TooFewNodes {
            goal,
            required,
            got: points.len(),
        });
    }
    Ok(())
}

pub(crate) fn require_even(goal: &'static str, points: &[Triple]) -> Result<()> {
    if points.is_empty() || points.len() % 2 != 0 {
        return Err(SolverError::OddNodeCount {
            goal,
            got: points.len(),
        });
    }
    Ok(())
}

pub(crate) fn require_finite(goal: &'static str, what: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(SolverError::InvalidParameter {
            goal,
            reason: format!("{what} must be finite, got {value}"),
        });
    }
    Ok(())
}

pub(crate) fn require_non_negative(goal: &'static str, what: &str, value: f64) -> Result<()> {
    require_finite(goal, what, value)?;
    if value < 0.0 {
        return Err(SolverError::InvalidParameter {
            goal,
            reason: format!("{what} must be non-negative, got {value}"),
        });
    }
    Ok(())
}

/// Stiffness must be finite and non-negative
pub(crate) fn require_weight(goal: &'static str, weight: f64) -> Result<()> {
    require_non_negative(goal, "weight", weight)
}

pub(crate) fn require_finite_point(goal: &'static str, what: &str, p: &Triple) -> Result<()> {
    if p.iter().any(|c| !c.is_finite()) {
        return Err(SolverError::InvalidParameter {
            goal,
            reason: format!("{what} must be finite, got [{}, {}, {}]", p.x, p.y, p.z),
        });
    }
    Ok(())
}

/// Check triangle faces against a vertex count
pub(crate) fn require_faces(faces: &[[usize; 3]], vertex_count: usize) -> Result<()> {
    for (face, tri) in faces.iter().enumerate() {
        if let Some(&vertex) = tri.iter().find(|&&v| v >= vertex_count) {
            return Err(SolverError::FaceOutOfRange {
                face,
                vertex,
                count: vertex_count,
            });
        }
    }
    Ok(())
}

// =========================================================================================
// Shared skeletons
// =========================================================================================

/// Split `correction` symmetrically: node `i` moves by `+correction / 2`,
/// node `j` by `-correction / 2`, so the pair's momentum is unchanged
#[inline]
pub(crate) fn split_pair(state: &mut GoalState, i: usize, j: usize, correction: Triple) {
    let half = correction * 0.5;
    state.moves[i] = half;
    state.moves[j] = -half;
    state.weights[i] = state.weight;
    state.weights[j] = state.weight;
}

/// Correction that brings the vector `delta = b - a` to length `target`,
/// expressed as the move of `a` (times two). Zero for coincident endpoints.
#[inline]
pub(crate) fn length_correction(delta: &Triple, target: f64) -> Option<Triple> {
    let d = delta.norm();
    if d < 1e-12 {
        return None;
    }
    Some(delta * (1.0 - target / d))
}

/// Move every node onto `closest(p)` with the goal's weight
pub(crate) fn project_all(state: &mut GoalState, nodes: &[Node], closest: impl Fn(&Triple) -> Triple) {
    for i in 0..state.node_count() {
        let p = state.position(nodes, i);
        state.moves[i] = closest(&p) - p;
        state.weights[i] = state.weight;
    }
}

/// Per-node accumulation of collision corrections; each node's total is
/// averaged by the number of violations it took part in
pub(crate) struct CollisionAccumulator {
    sums: Vec<Triple>,
    counts: Vec<u32>,
}

impl CollisionAccumulator {
    pub fn new(n: usize) -> Self {
        Self {
            sums: vec![Triple::zeros(); n],
            counts: vec![0; n],
        }
    }

    #[inline]
    pub fn push(&mut self, i: usize, correction: Triple) {
        self.sums[i] += correction;
        self.counts[i] += 1;
    }

    /// Write averaged corrections; nodes without violations get zero weight
    pub fn finish(self, state: &mut GoalState) {
        let weight = state.weight;
        for (i, (sum, count)) in self.sums.into_iter().zip(self.counts).enumerate() {
            if count > 0 {
                state.moves[i] = sum / count as f64;
                state.weights[i] = weight;
            } else {
                state.moves[i] = Triple::zeros();
                state.weights[i] = 0.0;
            }
        }
    }
}

/// Area-weighted normal of a triangle: half the cross product of its edges
#[inline]
pub(crate) fn triangle_area_normal(a: &Triple, b: &Triple, c: &Triple) -> Triple {
    (b - a).cross(&(c - a)) * 0.5
}

/// Sum a per-face force onto every vertex of the face, unsplit.
/// Vertices no face references get zero weight.
pub(crate) fn apply_face_forces(
    state: &mut GoalState,
    nodes: &[Node],
    faces: &[[usize; 3]],
    force: impl Fn(&Triple) -> Triple,
) {
    state.deactivate();
    let weight = state.weight;
    for tri in faces {
        let [a, b, c] = tri.map(|v| state.position(nodes, v));
        let f = force(&triangle_area_normal(&a, &b, &c));
        for &v in tri {
            state.moves[v] += f;
            state.weights[v] = weight;
        }
    }
}
