//! Core state types for the solver.
//!
//! A `Node` is a point mass shared by every goal that references it. Nodes are
//! created by the solver when a goal or binder asks for a position that is not
//! already occupied, and are only mutated by the solver's reduction step.

use crate::math::triple::Triple;

#[derive(Debug, Clone)]
pub struct Node {
    pub starting_position: Triple, // position the node was created at
    pub position: Triple,          // current position
    pub velocity: Triple,          // accumulated move, used when momentum is on
}

impl Node {
    pub fn new(position: Triple) -> Self {
        Self {
            starting_position: position,
            position,
            velocity: Triple::zeros(),
        }
    }

    /// Put the node back where it started and stop it
    pub fn reset(&mut self) {
        self.position = self.starting_position;
        self.velocity = Triple::zeros();
    }

    /// Squared speed, this node's share of the kinetic energy
    pub fn kinetic_energy(&self) -> f64 {
        self.velocity.norm_squared()
    }
}
