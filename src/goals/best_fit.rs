//! Aggregate best-fit projections.
//!
//! Every iteration these refit a primitive (line, plane, circle, sphere, or a
//! single point) through the *current* positions of their nodes and move each
//! node to its closest point on it. If no fit exists this iteration the goal
//! contributes nothing instead of failing.

use crate::error::Result;
use crate::goals::goal::{
    project_all, require_at_least, require_weight, Goal, GoalOutput, GoalState,
};
use crate::math::fitting::{best_fit_circle, best_fit_line, best_fit_plane, best_fit_sphere};
use crate::math::triple::{centroid, Triple};
use crate::simulation::states::Node;

fn new_state(goal: &'static str, points: Vec<Triple>, required: usize, weight: f64) -> Result<GoalState> {
    require_at_least(goal, &points, required)?;
    require_weight(goal, weight)?;
    Ok(GoalState::new(points, weight))
}

/// Pulls its nodes onto their best-fit line
pub struct CoLinearGoal {
    state: GoalState,
}

impl CoLinearGoal {
    pub fn new(points: Vec<Triple>, weight: f64) -> Result<Self> {
        Ok(Self {
            state: new_state("CoLinearGoal", points, 3, weight)?,
        })
    }

    pub fn change(&mut self, weight: Option<f64>) -> Result<()> {
        self.state.change_weight("CoLinearGoal", weight)
    }
}

impl Goal for CoLinearGoal {
    goal_accessors!("CoLinearGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let points = self.state.positions(nodes);
        match best_fit_line(&points) {
            Ok(line) => project_all(&mut self.state, nodes, |p| line.closest_point(p)),
            Err(_) => self.state.deactivate(),
        }
    }

    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        best_fit_line(&self.state.positions(nodes))
            .map(|line| vec![GoalOutput::Point(line.origin), GoalOutput::Vector(line.direction)])
            .unwrap_or_default()
    }
}

/// Pulls its nodes onto their best-fit plane
pub struct CoPlanarGoal {
    state: GoalState,
}

impl CoPlanarGoal {
    pub fn new(points: Vec<Triple>, weight: f64) -> Result<Self> {
        Ok(Self {
            state: new_state("CoPlanarGoal", points, 4, weight)?,
        })
    }

    pub fn change(&mut self, weight: Option<f64>) -> Result<()> {
        self.state.change_weight("CoPlanarGoal", weight)
    }
}

impl Goal for CoPlanarGoal {
    goal_accessors!("CoPlanarGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let points = self.state.positions(nodes);
        match best_fit_plane(&points) {
            Ok(plane) => project_all(&mut self.state, nodes, |p| plane.closest_point(p)),
            Err(_) => self.state.deactivate(),
        }
    }

    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        best_fit_plane(&self.state.positions(nodes))
            .map(|plane| vec![GoalOutput::Point(plane.origin), GoalOutput::Vector(plane.normal)])
            .unwrap_or_default()
    }
}

/// Pulls its nodes onto their best-fit circle
pub struct CoCircularGoal {
    state: GoalState,
}

impl CoCircularGoal {
    pub fn new(points: Vec<Triple>, weight: f64) -> Result<Self> {
        Ok(Self {
            state: new_state("CoCircularGoal", points, 4, weight)?,
        })
    }

    pub fn change(&mut self, weight: Option<f64>) -> Result<()> {
        self.state.change_weight("CoCircularGoal", weight)
    }
}

impl Goal for CoCircularGoal {
    goal_accessors!("CoCircularGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let points = self.state.positions(nodes);
        match best_fit_circle(&points) {
            Some(circle) => project_all(&mut self.state, nodes, |p| circle.closest_point(p)),
            None => self.state.deactivate(),
        }
    }

    /// Center and radius of the current fit
    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        best_fit_circle(&self.state.positions(nodes))
            .map(|c| vec![GoalOutput::Point(c.center), GoalOutput::Scalar(c.radius)])
            .unwrap_or_default()
    }
}

/// Pulls its nodes onto their best-fit sphere
pub struct CoSphericalGoal {
    state: GoalState,
}

impl CoSphericalGoal {
    pub fn new(points: Vec<Triple>, weight: f64) -> Result<Self> {
        Ok(Self {
            state: new_state("CoSphericalGoal", points, 5, weight)?,
        })
    }

    pub fn change(&mut self, weight: Option<f64>) -> Result<()> {
        self.state.change_weight("CoSphericalGoal", weight)
    }
}

impl Goal for CoSphericalGoal {
    goal_accessors!("CoSphericalGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let points = self.state.positions(nodes);
        match best_fit_sphere(&points) {
            Some(sphere) => project_all(&mut self.state, nodes, |p| sphere.closest_point(p)),
            None => self.state.deactivate(),
        }
    }

    /// Center and radius of the current fit
    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        best_fit_sphere(&self.state.positions(nodes))
            .map(|s| vec![GoalOutput::Point(s.center), GoalOutput::Scalar(s.radius)])
            .unwrap_or_default()
    }
}

/// Pulls its nodes together onto their centroid
pub struct CoincidentGoal {
    state: GoalState,
}

impl CoincidentGoal {
    pub fn new(points: Vec<Triple>, weight: f64) -> Result<Self> {
        Ok(Self {
            state: new_state("CoincidentGoal", points, 2, weight)?,
        })
    }

    pub fn change(&mut self, weight: Option<f64>) -> Result<()> {
        self.state.change_weight("CoincidentGoal", weight)
    }
}

impl Goal for CoincidentGoal {
    goal_accessors!("CoincidentGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let c = centroid(&self.state.positions(nodes));
        project_all(&mut self.state, nodes, |_| c);
    }

    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        vec![GoalOutput::Point(centroid(&self.state.positions(nodes)))]
    }
}
