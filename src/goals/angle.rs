//! Angle at a vertex.
//!
//! For nodes `A`, `B`, `C` with the vertex at `B`, the bisector of the two arms
//! is rotated by half the target angle either way around the arms' normal.
//! That gives the directions `A` and `C` should lie along; each moves onto its
//! direction at its current arm length. The vertex itself is left alone.

use std::f64::consts::PI;

use nalgebra::{Rotation3, Unit};

use crate::error::{Result, SolverError};
use crate::goals::goal::{require_weight, Goal, GoalOutput, GoalState};
use crate::math::triple::{Triple, TripleExt};
use crate::simulation::states::Node;

pub struct AngleGoal {
    state: GoalState,
    pub angle: f64, // radians, in [0, pi]
}

impl AngleGoal {
    /// Target angle taken from the starting positions
    pub fn new(a: Triple, vertex: Triple, c: Triple, weight: f64) -> Result<Self> {
        let angle = current_angle(&(a - vertex), &(c - vertex)).unwrap_or(0.0);
        Self::with_angle(a, vertex, c, angle, weight)
    }

    pub fn with_angle(a: Triple, vertex: Triple, c: Triple, angle: f64, weight: f64) -> Result<Self> {
        require_weight("AngleGoal", weight)?;
        check_angle(angle)?;
        Ok(Self {
            state: GoalState::new(vec![a, vertex, c], weight),
            angle,
        })
    }

    /// Update parameters; `None` leaves a value unchanged, an out-of-range angle is rejected
    pub fn change(&mut self, angle: Option<f64>, weight: Option<f64>) -> Result<()> {
        if let Some(angle) = angle {
            check_angle(angle)?;
        }
        self.state.change_weight("AngleGoal", weight)?;
        if let Some(angle) = angle {
            self.angle = angle;
        }
        Ok(())
    }
}

fn check_angle(angle: f64) -> Result<()> {
    if !(0.0..=PI).contains(&angle) {
        return Err(SolverError::InvalidParameter {
            goal: "AngleGoal",
            reason: format!("angle must lie in [0, pi], got {angle}"),
        });
    }
    Ok(())
}

fn current_angle(ba: &Triple, bc: &Triple) -> Option<f64> {
    if ba.is_almost_zero(1e-12) || bc.is_almost_zero(1e-12) {
        return None;
    }
    let cos = ba.normalise().dot(&bc.normalise()).clamp(-1.0, 1.0);
    Some(cos.acos())
}

impl Goal for AngleGoal {
    goal_accessors!("AngleGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let a = self.state.position(nodes, 0);
        let b = self.state.position(nodes, 1);
        let c = self.state.position(nodes, 2);
        let (ba, bc) = (a - b, c - b);
        if ba.is_almost_zero(1e-12) || bc.is_almost_zero(1e-12) {
            self.state.deactivate();
            return;
        }
        let (ua, uc) = (ba.normalise(), bc.normalise());

        // bisector and rotation axis; straight or folded arms need a fallback axis
        let mut normal = ba.cross(&bc);
        let bisector_sum = ua + uc;
        let bisector = if bisector_sum.is_almost_zero(1e-9) {
            let perp = if normal.is_almost_zero(1e-12) { ua.perpendicular() } else { normal.cross(&ua) };
            perp.normalise()
        } else {
            bisector_sum.normalise()
        };
        if normal.is_almost_zero(1e-12) {
            normal = ua.cross(&bisector);
            if normal.is_almost_zero(1e-12) {
                normal = ua.perpendicular();
            }
        }
        let axis = Unit::new_normalize(normal);

        // rotating toward C around (A - B) x (C - B) is the positive sense
        let half = 0.5 * self.angle;
        let dir_a = Rotation3::from_axis_angle(&axis, -half) * bisector;
        let dir_c = Rotation3::from_axis_angle(&axis, half) * bisector;

        let w = self.state.weight;
        self.state.moves[0] = b + dir_a * ba.norm() - a;
        self.state.moves[1] = Triple::zeros();
        self.state.moves[2] = b + dir_c * bc.norm() - c;
        self.state.weights[0] = w;
        self.state.weights[1] = 0.0;
        self.state.weights[2] = w;
    }

    /// Current angle at the vertex, radians
    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        let a = self.state.position(nodes, 0);
        let b = self.state.position(nodes, 1);
        let c = self.state.position(nodes, 2);
        current_angle(&(a - b), &(c - b))
            .map(|angle| vec![GoalOutput::Scalar(angle)])
            .unwrap_or_default()
    }
}
