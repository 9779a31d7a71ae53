//! Pointer interaction with a running solver.
//!
//! The UI side never touches solver state directly. It holds an
//! [`InteractionHandle`] and sends [`InteractionCommand`]s through a channel;
//! the solver drains that channel once at the start of every iteration, so
//! the pointer ray and the grabbed node only ever change between iterations.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::error::{Result, SolverError};
use crate::math::triple::{Triple, TripleExt};
use crate::simulation::states::Node;

/// Weight of the pull toward the pointer ray on the grabbed node
pub const HANDLE_WEIGHT: f64 = 30.0;

/// Half-line from a camera through the pointer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Triple,
    pub direction: Triple, // unit
}

impl Ray {
    pub fn new(origin: Triple, direction: Triple) -> Result<Self> {
        if direction.is_almost_zero(1e-12) {
            return Err(SolverError::InvalidParameter {
                goal: "Ray",
                reason: "direction must be non-zero".into(),
            });
        }
        Ok(Self {
            origin,
            direction: direction.normalise(),
        })
    }

    /// Closest point on the ray; points behind the origin map to the origin
    pub fn closest_point(&self, p: &Triple) -> Triple {
        let t = (p - self.origin).dot(&self.direction).max(0.0);
        self.origin + self.direction * t
    }

    pub fn distance_squared(&self, p: &Triple) -> f64 {
        self.closest_point(p).distance_squared(p)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionCommand {
    PointerMoved(Ray),
    Grab,    // grab the node nearest the pointer
    Release, // let go of the grabbed node
    SetHandle(Option<usize>),
}

/// Cloneable sending side, safe to hand to another thread
#[derive(Debug, Clone)]
pub struct InteractionHandle {
    tx: Sender<InteractionCommand>,
}

impl InteractionHandle {
    /// Queue a command; `false` once the solver is gone
    pub fn send(&self, command: InteractionCommand) -> bool {
        self.tx.send(command).is_ok()
    }

    pub fn pointer_moved(&self, ray: Ray) -> bool {
        self.send(InteractionCommand::PointerMoved(ray))
    }

    pub fn grab(&self) -> bool {
        self.send(InteractionCommand::Grab)
    }

    pub fn release(&self) -> bool {
        self.send(InteractionCommand::Release)
    }
}

/// Solver-owned interaction state
#[derive(Debug)]
pub struct InteractionContext {
    tx: Sender<InteractionCommand>,
    rx: Receiver<InteractionCommand>,
    pointer: Option<Ray>,
    nearest_node: Option<usize>,
    handle_node: Option<usize>,
}

impl Default for InteractionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionContext {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            pointer: None,
            nearest_node: None,
            handle_node: None,
        }
    }

    pub fn handle(&self) -> InteractionHandle {
        InteractionHandle { tx: self.tx.clone() }
    }

    pub fn pointer(&self) -> Option<Ray> {
        self.pointer
    }

    pub fn nearest_node(&self) -> Option<usize> {
        self.nearest_node
    }

    pub fn handle_node(&self) -> Option<usize> {
        self.handle_node
    }

    /// Apply every queued command, then refresh the nearest node
    pub fn drain(&mut self, nodes: &[Node]) {
        while let Ok(command) = self.rx.try_recv() {
            match command {
                InteractionCommand::PointerMoved(ray) => {
                    self.pointer = Some(ray);
                    self.nearest_node = nearest_to_ray(&ray, nodes);
                }
                InteractionCommand::Grab => {
                    self.nearest_node = self.pointer.and_then(|ray| nearest_to_ray(&ray, nodes));
                    self.handle_node = self.nearest_node;
                }
                InteractionCommand::Release => self.handle_node = None,
                InteractionCommand::SetHandle(index) => {
                    self.handle_node = index.filter(|&i| i < nodes.len());
                }
            }
        }
        if let Some(ray) = self.pointer {
            self.nearest_node = nearest_to_ray(&ray, nodes);
        }
        if self.handle_node.is_some_and(|i| i >= nodes.len()) {
            self.handle_node = None;
        }
    }

    /// Grabbed node and the point it is pulled toward, if both exist
    pub fn handle_target(&self, nodes: &[Node]) -> Option<(usize, Triple)> {
        let index = self.handle_node?;
        let ray = self.pointer?;
        let node = nodes.get(index)?;
        Some((index, ray.closest_point(&node.position)))
    }

    /// Forget the pointer and any grabbed node; queued commands are dropped
    pub fn reset(&mut self) {
        while self.rx.try_recv().is_ok() {}
        self.pointer = None;
        self.nearest_node = None;
        self.handle_node = None;
    }
}

fn nearest_to_ray(ray: &Ray, nodes: &[Node]) -> Option<usize> {
    nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (i, ray.distance_squared(&n.position)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}
