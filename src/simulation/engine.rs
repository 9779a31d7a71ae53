//! The solver: node pool, goal list and the iteration loop
//!
//! One iteration is:
//! 1. drain pointer commands,
//! 2. drift (x += v) when momentum is on,
//! 3. compute every goal in parallel against a shared read-only node slice,
//! 4. reduce the goals' weighted moves per node on this thread,
//! 5. add the handle pull, then move the nodes and update velocities.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::error::{Result, SolverError};
use crate::goals::goal::{Goal, GoalOutput};
use crate::math::triple::{Triple, TripleExt};
use crate::simulation::binder::{BoundGeometry, GeometryBinder};
use crate::simulation::integrator::{accumulate, add_pull, apply_moves, drift};
use crate::simulation::interaction::{InteractionContext, InteractionHandle, HANDLE_WEIGHT};
use crate::simulation::params::SolverParams;
use crate::simulation::states::Node;

/// How an `execute` run ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionReport {
    pub iterations: usize,     // iterations actually run
    pub kinetic_energy: f64,   // after the last iteration
    pub converged: bool,       // kinetic energy fell below the threshold
}

pub struct Solver {
    pub params: SolverParams,
    nodes: Vec<Node>,
    goals: Vec<Box<dyn Goal>>,
    binders: Vec<GeometryBinder>,
    current_iteration: usize,
    interaction: InteractionContext,
    move_sums: Vec<Triple>, // reduction buffers, one slot per node
    weight_sums: Vec<f64>,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new(SolverParams::default())
    }
}

impl Solver {
    pub fn new(params: SolverParams) -> Self {
        Self {
            params,
            nodes: Vec::new(),
            goals: Vec::new(),
            binders: Vec::new(),
            current_iteration: 0,
            interaction: InteractionContext::new(),
            move_sums: Vec::new(),
            weight_sums: Vec::new(),
        }
    }

    /// Add a goal, builder style
    pub fn with<G>(mut self, goal: G) -> Result<Self>
    where
        G: Goal + 'static,
    {
        self.add_goal(goal)?;
        Ok(self)
    }

    // =====================================================================================
    // Setup
    // =====================================================================================

    /// Attach a goal using the configured merge threshold; returns its index
    pub fn add_goal<G>(&mut self, goal: G) -> Result<usize>
    where
        G: Goal + 'static,
    {
        self.add_boxed_goal(Box::new(goal))
    }

    pub fn add_boxed_goal(&mut self, goal: Box<dyn Goal>) -> Result<usize> {
        let threshold = self.params.node_merge_threshold;
        self.add_goal_with_threshold(goal, threshold)
    }

    /// Attach a goal, merging each of its starting positions into an existing
    /// node closer than `threshold` or creating a new node.
    /// The goal is validated before any node is touched.
    pub fn add_goal_with_threshold(&mut self, mut goal: Box<dyn Goal>, threshold: f64) -> Result<usize> {
        let name = goal.name();
        let state = goal.state();
        if state.node_count() == 0 {
            return Err(SolverError::TooFewNodes {
                goal: name,
                required: 1,
                got: 0,
            });
        }
        state.validate(name)?;

        let indices: Vec<usize> = state
            .starting_positions
            .iter()
            .map(|p| self.find_or_create_node(p, threshold))
            .collect();
        goal.state_mut().node_indices = indices;

        debug!(goal = name, nodes = goal.node_count(), total_nodes = self.nodes.len(), "goal added");
        self.goals.push(goal);
        Ok(self.goals.len() - 1)
    }

    /// Attach several goals; stops at the first invalid one
    pub fn add_goals<I>(&mut self, goals: I) -> Result<()>
    where
        I: IntoIterator<Item = Box<dyn Goal>>,
    {
        for goal in goals {
            self.add_boxed_goal(goal)?;
        }
        Ok(())
    }

    pub fn add_geometry_binder(&mut self, binder: GeometryBinder) -> Result<usize> {
        let threshold = self.params.node_merge_threshold;
        self.add_geometry_binder_with_threshold(binder, threshold)
    }

    pub fn add_geometry_binder_with_threshold(&mut self, mut binder: GeometryBinder, threshold: f64) -> Result<usize> {
        binder.node_indices = binder
            .starting_positions()
            .iter()
            .map(|p| self.find_or_create_node(p, threshold))
            .collect();

        debug!(kind = ?binder.kind, nodes = binder.node_indices.len(), "geometry binder added");
        self.binders.push(binder);
        Ok(self.binders.len() - 1)
    }

    pub fn add_geometry_binders<I>(&mut self, binders: I) -> Result<()>
    where
        I: IntoIterator<Item = GeometryBinder>,
    {
        for binder in binders {
            self.add_geometry_binder(binder)?;
        }
        Ok(())
    }

    /// Linear scan for a node within `threshold`, else append one
    fn find_or_create_node(&mut self, position: &Triple, threshold: f64) -> usize {
        let threshold2 = threshold * threshold;
        if let Some(i) = self
            .nodes
            .iter()
            .position(|n| n.position.distance_squared(position) < threshold2)
        {
            trace!(node = i, "position merged into existing node");
            return i;
        }

        self.nodes.push(Node::new(*position));
        self.move_sums.push(Triple::zeros());
        self.weight_sums.push(0.0);
        self.nodes.len() - 1
    }

    // =====================================================================================
    // Iteration
    // =====================================================================================

    pub fn iterate(&mut self) {
        self.interaction.drain(&self.nodes);

        if self.params.enable_momentum {
            drift(&mut self.nodes);
        }

        let nodes = &self.nodes;
        self.goals.par_iter_mut().for_each(|goal| goal.compute(nodes));

        accumulate(&self.goals, &mut self.move_sums, &mut self.weight_sums);

        if self.params.enable_mouse_interaction {
            if let Some((index, target)) = self.interaction.handle_target(&self.nodes) {
                add_pull(
                    &self.nodes,
                    index,
                    &target,
                    HANDLE_WEIGHT,
                    &mut self.move_sums,
                    &mut self.weight_sums,
                );
            }
        }

        apply_moves(&mut self.nodes, &self.move_sums, &self.weight_sums, &self.params);
        self.current_iteration += 1;

        trace!(
            iteration = self.current_iteration,
            kinetic_energy = self.kinetic_energy(),
            "iteration"
        );
    }

    pub fn iterate_n(&mut self, count: usize) {
        for _ in 0..count {
            self.iterate();
        }
    }

    /// Iterate until `duration` of wall-clock time has passed; returns the
    /// number of iterations run. Always runs at least one.
    pub fn iterate_for(&mut self, duration: Duration) -> usize {
        let start = Instant::now();
        let mut count = 0;
        loop {
            self.iterate();
            count += 1;
            if start.elapsed() >= duration {
                return count;
            }
        }
    }

    /// Iterate until the kinetic energy drops below `kinetic_energy_threshold`
    /// or `max_iterations` have run
    pub fn execute(&mut self, max_iterations: usize, kinetic_energy_threshold: f64) -> ExecutionReport {
        let mut iterations = 0;
        let mut kinetic_energy = self.kinetic_energy();
        let mut converged = false;

        while iterations < max_iterations {
            self.iterate();
            iterations += 1;
            kinetic_energy = self.kinetic_energy();
            if kinetic_energy < kinetic_energy_threshold {
                converged = true;
                break;
            }
        }

        info!(iterations, kinetic_energy, converged, "execution finished");
        ExecutionReport {
            iterations,
            kinetic_energy,
            converged,
        }
    }

    // =====================================================================================
    // Results
    // =====================================================================================

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_positions(&self) -> Vec<Triple> {
        self.nodes.iter().map(|n| n.position).collect()
    }

    pub fn node_position(&self, index: usize) -> Result<Triple> {
        self.nodes
            .get(index)
            .map(|n| n.position)
            .ok_or(SolverError::UnknownNode(index))
    }

    /// Sum of squared node velocities
    pub fn kinetic_energy(&self) -> f64 {
        self.nodes.iter().map(Node::kinetic_energy).sum()
    }

    pub fn current_iteration(&self) -> usize {
        self.current_iteration
    }

    pub fn goals(&self) -> &[Box<dyn Goal>] {
        &self.goals
    }

    pub fn goal_count(&self) -> usize {
        self.goals.len()
    }

    /// A goal by index, downcast to its concrete type
    pub fn goal<G: Goal + 'static>(&self, index: usize) -> Option<&G> {
        self.goals.get(index)?.as_any().downcast_ref::<G>()
    }

    /// Mutable access to a goal by index, e.g. to call its `change` method
    pub fn goal_mut<G: Goal + 'static>(&mut self, index: usize) -> Option<&mut G> {
        self.goals.get_mut(index)?.as_any_mut().downcast_mut::<G>()
    }

    /// Every goal's name and outputs, in goal order
    pub fn goal_outputs(&self) -> Vec<(&'static str, Vec<GoalOutput>)> {
        self.goals
            .iter()
            .map(|g| (g.name(), g.output(&self.nodes)))
            .collect()
    }

    pub fn binders(&self) -> &[GeometryBinder] {
        &self.binders
    }

    pub fn bound_geometry(&self) -> Vec<BoundGeometry> {
        self.binders.iter().map(|b| b.bind(&self.nodes)).collect()
    }

    // =====================================================================================
    // Interaction and lifecycle
    // =====================================================================================

    pub fn interaction_handle(&self) -> InteractionHandle {
        self.interaction.handle()
    }

    pub fn interaction(&self) -> &InteractionContext {
        &self.interaction
    }

    /// Move every node back to its starting position and stop it
    pub fn reset(&mut self) {
        self.nodes.iter_mut().for_each(Node::reset);
        self.current_iteration = 0;
        debug!(nodes = self.nodes.len(), "solver reset");
    }

    /// Drop all nodes, goals and binders
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.goals.clear();
        self.binders.clear();
        self.move_sums.clear();
        self.weight_sums.clear();
        self.current_iteration = 0;
        self.interaction.reset();
        debug!("solver cleared");
    }
}
