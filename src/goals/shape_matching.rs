//! Rigid (optionally uniformly scaled) shape matching.
//!
//! The nodes are pulled toward the best rigid placement of a target shape:
//! center both point sets, build the 3x3 cross-covariance, take its fast SVD
//! `H = U S V^T` and use `R = U V^T`. A reflection (`det R < 0`) is corrected
//! by flipping the third left singular vector, unless the target is planar,
//! in which case a mirrored placement is as good as any other.
//! With scaling on, the scale is Umeyama's `(s1 + s2 + d s3) / sum |t|^2`.

use nalgebra::Matrix3;

use crate::error::{Result, SolverError};
use crate::goals::goal::{require_at_least, require_weight, Goal, GoalOutput, GoalState};
use crate::math::fast_svd::fast_svd3;
use crate::math::triple::{centroid, Triple};
use crate::simulation::states::Node;

/// Planarity test on the target covariance: `|det| < PLANAR_TOLERANCE * trace^3`
const PLANAR_TOLERANCE: f64 = 1e-9;

pub struct ShapeMatchingGoal {
    state: GoalState,
    target: Vec<Triple>, // target shape, centered on its centroid
    target_norm2: f64,   // sum of |t|^2 over the centered target
    is_2d: bool,
    pub allow_scaling: bool,
}

/// Optimal placement for the current node positions
struct Placement {
    rotation: Matrix3<f64>,
    scale: f64,
    center: Triple,
}

impl ShapeMatchingGoal {
    /// `points` are the nodes' starting positions, `target_shape` the shape they
    /// should take, in the same order
    pub fn new(points: Vec<Triple>, target_shape: Vec<Triple>, allow_scaling: bool, weight: f64) -> Result<Self> {
        require_at_least("ShapeMatchingGoal", &points, 2)?;
        require_weight("ShapeMatchingGoal", weight)?;
        if points.len() != target_shape.len() {
            return Err(SolverError::InvalidParameter {
                goal: "ShapeMatchingGoal",
                reason: format!(
                    "{} nodes but {} target shape points",
                    points.len(),
                    target_shape.len()
                ),
            });
        }

        let c = centroid(&target_shape);
        let target: Vec<Triple> = target_shape.iter().map(|t| t - c).collect();
        let target_norm2: f64 = target.iter().map(|t| t.norm_squared()).sum();

        let covariance = target.iter().fold(Matrix3::zeros(), |acc, t| acc + t * t.transpose());
        let trace = covariance.trace();
        let is_2d = covariance.determinant().abs() <= PLANAR_TOLERANCE * trace * trace * trace;

        Ok(Self {
            state: GoalState::new(points, weight),
            target,
            target_norm2,
            is_2d,
            allow_scaling,
        })
    }

    /// Whether the target shape was found to be planar
    pub fn is_2d(&self) -> bool {
        self.is_2d
    }

    pub fn change(&mut self, allow_scaling: Option<bool>, weight: Option<f64>) -> Result<()> {
        self.state.change_weight("ShapeMatchingGoal", weight)?;
        if let Some(allow_scaling) = allow_scaling {
            self.allow_scaling = allow_scaling;
        }
        Ok(())
    }

    fn placement(&self, nodes: &[Node]) -> Placement {
        let points = self.state.positions(nodes);
        let center = centroid(&points);

        if self.target_norm2 < 1e-24 {
            // point-like target: everything goes to the centroid
            return Placement {
                rotation: Matrix3::identity(),
                scale: 1.0,
                center,
            };
        }

        let h = points
            .iter()
            .zip(&self.target)
            .fold(Matrix3::zeros(), |acc, (p, t)| acc + (p - center) * t.transpose());

        let svd = fast_svd3(&h);
        let (mut u, mut s) = (svd.u, svd.s);
        if s.z < 0.0 {
            let flipped = -u.column(2);
            u.set_column(2, &flipped);
            s.z = -s.z;
        }

        let mut d = 1.0;
        let mut rotation = u * svd.v.transpose();
        if rotation.determinant() < 0.0 && !self.is_2d {
            let flipped = -u.column(2);
            u.set_column(2, &flipped);
            d = -1.0;
            rotation = u * svd.v.transpose();
        }

        let scale = if self.allow_scaling {
            (s.x + s.y + d * s.z) / self.target_norm2
        } else {
            1.0
        };

        Placement { rotation, scale, center }
    }
}

impl Goal for ShapeMatchingGoal {
    goal_accessors!("ShapeMatchingGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let Placement { rotation, scale, center } = self.placement(nodes);
        let weight = self.state.weight;
        for i in 0..self.state.node_count() {
            let goal = rotation * self.target[i] * scale + center;
            self.state.moves[i] = goal - self.state.position(nodes, i);
            self.state.weights[i] = weight;
        }
    }

    /// Scale factor of the current placement
    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        vec![GoalOutput::Scalar(self.placement(nodes).scale)]
    }
}
