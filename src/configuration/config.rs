//! Configuration types for loading solver scenarios from YAML.
//!
//! A scenario consists of:
//!
//! - [`SolverConfig`]    – runtime solver settings (merge threshold, momentum, ...)
//! - [`ExecutionConfig`] – how long `execute` may run and when it counts as converged
//! - [`GoalConfig`]      – one entry per goal, tagged by `type`
//! - [`BinderConfig`]    – output geometry bound to the nodes
//!
//! # YAML format
//!
//! ```yaml
//! solver:
//!   node_merge_threshold: 1.0e-3
//!   iteration_count: 10       # per background tick, 0 = 25 ms time-boxed tick
//!   damping_factor: 0.9
//!   enable_momentum: true
//!
//! execution:
//!   max_iterations: 1000
//!   kinetic_energy_threshold: 1.0e-12
//!
//! goals:
//!   - type: anchor
//!     position: [0.0, 0.0, 0.0]
//!     weight: 100.0
//!   - type: length
//!     start: [0.0, 0.0, 0.0]
//!     end: [3.0, 0.0, 0.0]
//!     length: 1.0
//!
//! binders:
//!   - type: polyline
//!     points: [[0.0, 0.0, 0.0], [3.0, 0.0, 0.0]]
//! ```
//!
//! Every section except `goals` may be omitted; `weight` defaults to 1.

use serde::Deserialize;

pub type Point = [f64; 3];

fn default_weight() -> f64 {
    1.0
}

/// Runtime solver settings, mirrors `SolverParams`
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SolverConfig {
    pub node_merge_threshold: f64,      // positions closer than this share a node
    pub iteration_count: usize,         // iterations per background tick
    pub damping_factor: f64,            // velocity damping when a move opposes velocity
    pub enable_momentum: bool,          // integrate velocities between iterations
    pub enable_mouse_interaction: bool, // apply the handle pull
}

impl Default for SolverConfig {
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

/// Bounds for a foreground `execute` run
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ExecutionConfig {
    pub max_iterations: usize,         // hard cap on iterations
    pub kinetic_energy_threshold: f64, // stop once the kinetic energy drops below this
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            kinetic_energy_threshold: 1e-12,
        }
    }
}

/// Fixed surface for `on_surface` goals
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceConfig {
    Plane { origin: Point, normal: Point },
    Sphere { center: Point, radius: f64 },
    Mesh { vertices: Vec<Point>, faces: Vec<[usize; 3]> },
}

/// One goal, selected by `type:`
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoalConfig {
    Anchor {
        position: Point,
        target: Option<Point>, // defaults to `position`
        #[serde(default = "default_weight")]
        weight: f64,
    },
    Force {
        points: Vec<Point>,
        force: Point,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    Length {
        start: Point,
        end: Point,
        length: Option<f64>, // defaults to the starting distance
        #[serde(default = "default_weight")]
        weight: f64,
    },
    ClampLength {
        start: Point,
        end: Point,
        min: f64,
        max: f64,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    EqualLengths {
        endpoints: Vec<Point>, // segment start/end pairs back to back
        #[serde(default = "default_weight")]
        weight: f64,
    },
    ParallelLines {
        endpoints: Vec<Point>,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    Direction {
        start: Point,
        end: Point,
        direction: Point,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    Angle {
        a: Point,
        vertex: Point,
        c: Point,
        angle: Option<f64>, // radians, defaults to the starting angle
        #[serde(default = "default_weight")]
        weight: f64,
    },
    #[serde(rename = "colinear")]
    CoLinear {
        points: Vec<Point>,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    #[serde(rename = "coplanar")]
    CoPlanar {
        points: Vec<Point>,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    #[serde(rename = "cocircular")]
    CoCircular {
        points: Vec<Point>,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    #[serde(rename = "cospherical")]
    CoSpherical {
        points: Vec<Point>,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    Coincident {
        points: Vec<Point>,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    OnLine {
        points: Vec<Point>,
        origin: Point,
        direction: Point,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    OnPlane {
        points: Vec<Point>,
        origin: Point,
        normal: Point,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    OnCurve {
        points: Vec<Point>,
        curve: Vec<Point>, // polyline vertices
        #[serde(default)]
        closed: bool,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    OnSurface {
        points: Vec<Point>,
        surface: SurfaceConfig,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    Floor {
        points: Vec<Point>,
        #[serde(default)]
        height: f64,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    SphereCollision {
        centers: Vec<Point>,
        radius: f64,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    SphereStaticLineCollision {
        centers: Vec<Point>,
        segments: Vec<[Point; 2]>,
        radius: f64,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    ConvexPolygonCollision {
        polygons: Vec<Vec<Point>>,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    ConvexPolygonContainment {
        points: Vec<Point>,
        boundary: Vec<Point>,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    ConstantPressure {
        vertices: Vec<Point>,
        faces: Vec<[usize; 3]>,
        pressure: f64,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    ConstantVolumePressure {
        vertices: Vec<Point>,
        faces: Vec<[usize; 3]>,
        volume_constant: f64,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    DirectionalWind {
        vertices: Vec<Point>,
        faces: Vec<[usize; 3]>,
        wind: Point,
        #[serde(default = "default_weight")]
        weight: f64,
    },
    ShapeMatching {
        points: Vec<Point>,
        target_shape: Vec<Point>,
        #[serde(default)]
        allow_scaling: bool,
        #[serde(default = "default_weight")]
        weight: f64,
    },
}

/// Output geometry bound to nodes
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BinderConfig {
    Points { points: Vec<Point> },
    Polyline {
        points: Vec<Point>,
        #[serde(default)]
        closed: bool,
    },
    Mesh { vertices: Vec<Point>, faces: Vec<[usize; 3]> },
}

/// Top-level scenario configuration loaded from YAML
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub solver: SolverConfig, // solver settings
    #[serde(default)]
    pub execution: ExecutionConfig, // foreground run bounds
    pub goals: Vec<GoalConfig>, // goals, attached in order
    #[serde(default)]
    pub binders: Vec<BinderConfig>, // output geometry
}
