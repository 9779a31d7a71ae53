//! Pinning: a single node pulled straight to a target point.

use crate::error::Result;
use crate::goals::goal::{require_finite_point, require_weight, Goal, GoalOutput, GoalState};
use crate::math::triple::Triple;
use crate::simulation::states::Node;

pub struct AnchorGoal {
    state: GoalState,
    pub target: Triple,
}

impl AnchorGoal {
    /// Anchor a node to the position it starts at
    pub fn new(position: Triple, weight: f64) -> Result<Self> {
        Self::with_target(position, position, weight)
    }

    /// Anchor the node starting at `position` to a different `target`
    pub fn with_target(position: Triple, target: Triple, weight: f64) -> Result<Self> {
        require_finite_point("AnchorGoal", "target", &target)?;
        require_weight("AnchorGoal", weight)?;
        Ok(Self {
            state: GoalState::new(vec![position], weight),
            target,
        })
    }

    /// Update parameters; `None` leaves a value unchanged
    pub fn change(&mut self, target: Option<Triple>, weight: Option<f64>) -> Result<()> {
        if let Some(target) = &target {
            require_finite_point("AnchorGoal", "target", target)?;
        }
        self.state.change_weight("AnchorGoal", weight)?;
        if let Some(target) = target {
            self.target = target;
        }
        Ok(())
    }
}

impl Goal for AnchorGoal {
    goal_accessors!("AnchorGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let p = self.state.position(nodes, 0);
        self.state.moves[0] = self.target - p;
        self.state.weights[0] = self.state.weight;
    }

    /// Remaining distance to the target
    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        vec![GoalOutput::Scalar((self.target - self.state.position(nodes, 0)).norm())]
    }
}
