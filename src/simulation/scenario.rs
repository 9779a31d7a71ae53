//! Build a ready-to-run solver from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a `Scenario`:
//! - a `Solver` with the configured `SolverParams`,
//! - every configured goal attached in order (nodes merged as they are added),
//! - every configured geometry binder attached after the goals,
//! - the execution bounds for a foreground run.
//!
//! The first goal or binder that fails validation aborts the build.

use std::sync::Arc;

use tracing::info;

use crate::configuration::config::{BinderConfig, ExecutionConfig, GoalConfig, Point, ScenarioConfig, SurfaceConfig};
use crate::error::Result;
use crate::goals::*;
use crate::math::triple::Triple;
use crate::simulation::binder::GeometryBinder;
use crate::simulation::engine::{ExecutionReport, Solver};
use crate::simulation::params::SolverParams;

/// A configured solver plus the bounds to run it with
pub struct Scenario {
    pub solver: Solver,
    pub execution: ExecutionConfig,
}

fn triple(p: &Point) -> Triple {
    Triple::new(p[0], p[1], p[2])
}

fn triples(points: &[Point]) -> Vec<Triple> {
    points.iter().map(triple).collect()
}

impl Scenario {
    pub fn build_scenario(cfg: ScenarioConfig) -> Result<Self> {
        let s_cfg = cfg.solver;
        let params = SolverParams::default()
            .with_merge_threshold(s_cfg.node_merge_threshold)
            .with_iteration_count(s_cfg.iteration_count)
            .with_damping(s_cfg.damping_factor)
            .with_momentum(s_cfg.enable_momentum)
            .with_mouse_interaction(s_cfg.enable_mouse_interaction);

        let mut solver = Solver::new(params);
        for g_cfg in &cfg.goals {
            solver.add_boxed_goal(build_goal(g_cfg)?)?;
        }
        for b_cfg in &cfg.binders {
            solver.add_geometry_binder(build_binder(b_cfg)?)?;
        }

        info!(
            goals = solver.goal_count(),
            nodes = solver.node_count(),
            binders = solver.binders().len(),
            "scenario built"
        );
        Ok(Self {
            solver,
            execution: cfg.execution,
        })
    }

    /// Run `execute` with the configured bounds
    pub fn run(&mut self) -> ExecutionReport {
        self.solver
            .execute(self.execution.max_iterations, self.execution.kinetic_energy_threshold)
    }
}

/// Map one goal entry to its runtime goal
pub fn build_goal(cfg: &GoalConfig) -> Result<Box<dyn Goal>> {
    let goal: Box<dyn Goal> = match cfg {
        GoalConfig::Anchor { position, target, weight } => {
            let target = target.as_ref().map_or(triple(position), triple);
            Box::new(AnchorGoal::with_target(triple(position), target, *weight)?)
        }
        GoalConfig::Force { points, force, weight } => {
            Box::new(ForceGoal::new(triples(points), triple(force), *weight)?)
        }
        GoalConfig::Length { start, end, length, weight } => {
            let (start, end) = (triple(start), triple(end));
            match length {
                Some(length) => Box::new(LengthGoal::with_length(start, end, *length, *weight)?),
                None => Box::new(LengthGoal::new(start, end, *weight)?),
            }
        }
        GoalConfig::ClampLength { start, end, min, max, weight } => {
            Box::new(ClampLengthGoal::new(triple(start), triple(end), *min, *max, *weight)?)
        }
        GoalConfig::EqualLengths { endpoints, weight } => {
            Box::new(EqualLengthsGoal::new(triples(endpoints), *weight)?)
        }
        GoalConfig::ParallelLines { endpoints, weight } => {
            Box::new(ParallelLinesGoal::new(triples(endpoints), *weight)?)
        }
        GoalConfig::Direction { start, end, direction, weight } => {
            Box::new(DirectionGoal::new(triple(start), triple(end), triple(direction), *weight)?)
        }
        GoalConfig::Angle { a, vertex, c, angle, weight } => {
            let (a, vertex, c) = (triple(a), triple(vertex), triple(c));
            match angle {
                Some(angle) => Box::new(AngleGoal::with_angle(a, vertex, c, *angle, *weight)?),
                None => Box::new(AngleGoal::new(a, vertex, c, *weight)?),
            }
        }
        GoalConfig::CoLinear { points, weight } => Box::new(CoLinearGoal::new(triples(points), *weight)?),
        GoalConfig::CoPlanar { points, weight } => Box::new(CoPlanarGoal::new(triples(points), *weight)?),
        GoalConfig::CoCircular { points, weight } => Box::new(CoCircularGoal::new(triples(points), *weight)?),
        GoalConfig::CoSpherical { points, weight } => Box::new(CoSphericalGoal::new(triples(points), *weight)?),
        GoalConfig::Coincident { points, weight } => Box::new(CoincidentGoal::new(triples(points), *weight)?),
        GoalConfig::OnLine { points, origin, direction, weight } => {
            let line = Line::new(triple(origin), triple(direction))?;
            Box::new(OnLineGoal::new(triples(points), line, *weight)?)
        }
        GoalConfig::OnPlane { points, origin, normal, weight } => {
            let plane = Plane::new(triple(origin), triple(normal))?;
            Box::new(OnPlaneGoal::new(triples(points), plane, *weight)?)
        }
        GoalConfig::OnCurve { points, curve, closed, weight } => {
            let curve = Polyline::new(triples(curve), *closed)?;
            Box::new(OnCurveGoal::new(triples(points), Arc::new(curve), *weight)?)
        }
        GoalConfig::OnSurface { points, surface, weight } => {
            let surface: Arc<dyn ClosestPoint> = match surface {
                SurfaceConfig::Plane { origin, normal } => Arc::new(Plane::new(triple(origin), triple(normal))?),
                SurfaceConfig::Sphere { center, radius } => Arc::new(SphereSurface {
                    center: triple(center),
                    radius: *radius,
                }),
                SurfaceConfig::Mesh { vertices, faces } => {
                    Arc::new(TriangleMesh::new(triples(vertices), faces.clone())?)
                }
            };
            Box::new(OnSurfaceGoal::new(triples(points), surface, *weight)?)
        }
        GoalConfig::Floor { points, height, weight } => {
            Box::new(FloorGoal::with_height(triples(points), *height, *weight)?)
        }
        GoalConfig::SphereCollision { centers, radius, weight } => {
            Box::new(SphereCollisionGoal::new(triples(centers), *radius, *weight)?)
        }
        GoalConfig::SphereStaticLineCollision { centers, segments, radius, weight } => {
            let segments = segments.iter().map(|[a, b]| [triple(a), triple(b)]).collect();
            Box::new(SphereStaticLineCollisionGoal::new(triples(centers), segments, *radius, *weight)?)
        }
        GoalConfig::ConvexPolygonCollision { polygons, weight } => {
            let polygons = polygons.iter().map(|p| triples(p)).collect();
            Box::new(ConvexPolygonCollisionGoal::new(polygons, *weight)?)
        }
        GoalConfig::ConvexPolygonContainment { points, boundary, weight } => {
            Box::new(ConvexPolygonContainmentGoal::new(triples(points), triples(boundary), *weight)?)
        }
        GoalConfig::ConstantPressure { vertices, faces, pressure, weight } => {
            Box::new(ConstantPressureGoal::new(triples(vertices), faces.clone(), *pressure, *weight)?)
        }
        GoalConfig::ConstantVolumePressure { vertices, faces, volume_constant, weight } => Box::new(
            ConstantVolumePressureGoal::new(triples(vertices), faces.clone(), *volume_constant, *weight)?,
        ),
        GoalConfig::DirectionalWind { vertices, faces, wind, weight } => {
            Box::new(DirectionalWindGoal::new(triples(vertices), faces.clone(), triple(wind), *weight)?)
        }
        GoalConfig::ShapeMatching { points, target_shape, allow_scaling, weight } => Box::new(
            ShapeMatchingGoal::new(triples(points), triples(target_shape), *allow_scaling, *weight)?,
        ),
    };
    Ok(goal)
}

pub fn build_binder(cfg: &BinderConfig) -> Result<GeometryBinder> {
    match cfg {
        BinderConfig::Points { points } => GeometryBinder::points(triples(points)),
        BinderConfig::Polyline { points, closed } => GeometryBinder::polyline(triples(points), *closed),
        BinderConfig::Mesh { vertices, faces } => GeometryBinder::mesh(triples(vertices), faces.clone()),
    }
}
