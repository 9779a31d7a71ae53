//! Goals that hold nodes on externally supplied, fixed geometry.
//!
//! Unlike the best-fit goals, the target here is not refitted each iteration.
//! Anything that can answer "closest point to p" can be a target; the
//! [`ClosestPoint`] implementors below cover lines, planes, polylines,
//! spheres and triangle meshes.

use std::sync::Arc;

use crate::error::{Result, SolverError};
use crate::goals::goal::{project_all, require_faces, require_weight, Goal, GoalOutput, GoalState};
use crate::math::triple::{closest_point_on_segment, Triple, TripleExt};
use crate::simulation::states::Node;

/// Geometry a node can be projected onto
pub trait ClosestPoint: Send + Sync {
    fn closest_point(&self, p: &Triple) -> Triple;
}

/// Infinite line
#[derive(Debug, Clone, Copy)]
pub struct Line {
    pub origin: Triple,
    pub direction: Triple, // unit
}

impl Line {
    pub fn new(origin: Triple, direction: Triple) -> Result<Self> {
        if direction.is_almost_zero(1e-12) {
            return Err(SolverError::InvalidParameter {
                goal: "Line",
                reason: "direction must be non-zero".into(),
            });
        }
        Ok(Self {
            origin,
            direction: direction.normalise(),
        })
    }
}

impl ClosestPoint for Line {
    fn closest_point(&self, p: &Triple) -> Triple {
        self.origin + self.direction * (p - self.origin).dot(&self.direction)
    }
}

/// Infinite plane
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub origin: Triple,
    pub normal: Triple, // unit
}

impl Plane {
    pub fn new(origin: Triple, normal: Triple) -> Result<Self> {
        if normal.is_almost_zero(1e-12) {
            return Err(SolverError::InvalidParameter {
                goal: "Plane",
                reason: "normal must be non-zero".into(),
            });
        }
        Ok(Self {
            origin,
            normal: normal.normalise(),
        })
    }

    /// Signed distance, positive on the side the normal points to
    pub fn signed_distance(&self, p: &Triple) -> f64 {
        (p - self.origin).dot(&self.normal)
    }
}

impl ClosestPoint for Plane {
    fn closest_point(&self, p: &Triple) -> Triple {
        p - self.normal * self.signed_distance(p)
    }
}

/// Sphere surface
#[derive(Debug, Clone, Copy)]
pub struct SphereSurface {
    pub center: Triple,
    pub radius: f64,
}

impl ClosestPoint for SphereSurface {
    fn closest_point(&self, p: &Triple) -> Triple {
        let mut rel = p - self.center;
        if rel.is_almost_zero(1e-12) {
            rel = Triple::x();
        }
        self.center + rel.normalise() * self.radius
    }
}

/// Piecewise-linear curve
#[derive(Debug, Clone)]
pub struct Polyline {
    pub points: Vec<Triple>,
    pub closed: bool,
}

impl Polyline {
    pub fn new(points: Vec<Triple>, closed: bool) -> Result<Self> {
        if points.len() < 2 {
            return Err(SolverError::InvalidParameter {
                goal: "Polyline",
                reason: format!("needs at least 2 points, got {}", points.len()),
            });
        }
        Ok(Self { points, closed })
    }

    fn segments(&self) -> impl Iterator<Item = (&Triple, &Triple)> {
        let wrap = if self.closed { self.points.first() } else { None };
        self.points
            .windows(2)
            .map(|w| (&w[0], &w[1]))
            .chain(wrap.zip(self.points.last()).map(|(first, last)| (last, first)))
    }
}

impl ClosestPoint for Polyline {
    fn closest_point(&self, p: &Triple) -> Triple {
        self.segments()
            .map(|(a, b)| closest_point_on_segment(p, a, b))
            .min_by(|x, y| x.distance_squared(p).total_cmp(&y.distance_squared(p)))
            .unwrap_or(*p)
    }
}

/// Triangle mesh surface
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    pub vertices: Vec<Triple>,
    pub faces: Vec<[usize; 3]>,
}

impl TriangleMesh {
    pub fn new(vertices: Vec<Triple>, faces: Vec<[usize; 3]>) -> Result<Self> {
        require_faces(&faces, vertices.len())?;
        if faces.is_empty() {
            return Err(SolverError::InvalidParameter {
                goal: "TriangleMesh",
                reason: "mesh has no faces".into(),
            });
        }
        Ok(Self { vertices, faces })
    }
}

impl ClosestPoint for TriangleMesh {
    fn closest_point(&self, p: &Triple) -> Triple {
        self.faces
            .iter()
            .map(|&[a, b, c]| {
                closest_point_on_triangle(p, &self.vertices[a], &self.vertices[b], &self.vertices[c])
            })
            .min_by(|x, y| x.distance_squared(p).total_cmp(&y.distance_squared(p)))
            .unwrap_or(*p)
    }
}

/// Closest point on triangle `abc` by Voronoi region tests
pub fn closest_point_on_triangle(p: &Triple, a: &Triple, b: &Triple, c: &Triple) -> Triple {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = (va + vb + vc).recip();
    a + ab * (vb * denom) + ac * (vc * denom)
}

// =========================================================================================
// Goals
// =========================================================================================

fn new_state(goal: &'static str, points: Vec<Triple>, weight: f64) -> Result<GoalState> {
    crate::goals::goal::require_at_least(goal, &points, 1)?;
    require_weight(goal, weight)?;
    Ok(GoalState::new(points, weight))
}

/// Mean distance from the goal's nodes to a target
fn mean_distance(state: &GoalState, nodes: &[Node], target: &dyn ClosestPoint) -> Vec<GoalOutput> {
    let points = state.positions(nodes);
    let total: f64 = points.iter().map(|p| (target.closest_point(p) - p).norm()).sum();
    vec![GoalOutput::Scalar(total / points.len() as f64)]
}

/// Holds nodes on a fixed line
pub struct OnLineGoal {
    state: GoalState,
    pub line: Line,
}

impl OnLineGoal {
    pub fn new(points: Vec<Triple>, line: Line, weight: f64) -> Result<Self> {
        Ok(Self {
            state: new_state("OnLineGoal", points, weight)?,
            line,
        })
    }

    pub fn change(&mut self, line: Option<Line>, weight: Option<f64>) -> Result<()> {
        self.state.change_weight("OnLineGoal", weight)?;
        if let Some(line) = line {
            self.line = line;
        }
        Ok(())
    }
}

impl Goal for OnLineGoal {
    goal_accessors!("OnLineGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let line = self.line;
        project_all(&mut self.state, nodes, |p| line.closest_point(p));
    }

    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        mean_distance(&self.state, nodes, &self.line)
    }
}

/// Holds nodes on a fixed plane
pub struct OnPlaneGoal {
    state: GoalState,
    pub plane: Plane,
}

impl OnPlaneGoal {
    pub fn new(points: Vec<Triple>, plane: Plane, weight: f64) -> Result<Self> {
        Ok(Self {
            state: new_state("OnPlaneGoal", points, weight)?,
            plane,
        })
    }

    pub fn change(&mut self, plane: Option<Plane>, weight: Option<f64>) -> Result<()> {
        self.state.change_weight("OnPlaneGoal", weight)?;
        if let Some(plane) = plane {
            self.plane = plane;
        }
        Ok(())
    }
}

impl Goal for OnPlaneGoal {
    goal_accessors!("OnPlaneGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let plane = self.plane;
        project_all(&mut self.state, nodes, |p| plane.closest_point(p));
    }

    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        mean_distance(&self.state, nodes, &self.plane)
    }
}

/// Holds nodes on a curve
pub struct OnCurveGoal {
    state: GoalState,
    curve: Arc<dyn ClosestPoint>,
}

impl OnCurveGoal {
    pub fn new(points: Vec<Triple>, curve: Arc<dyn ClosestPoint>, weight: f64) -> Result<Self> {
        Ok(Self {
            state: new_state("OnCurveGoal", points, weight)?,
            curve,
        })
    }

    pub fn change(&mut self, curve: Option<Arc<dyn ClosestPoint>>, weight: Option<f64>) -> Result<()> {
        self.state.change_weight("OnCurveGoal", weight)?;
        if let Some(curve) = curve {
            self.curve = curve;
        }
        Ok(())
    }
}

impl Goal for OnCurveGoal {
    goal_accessors!("OnCurveGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let curve = Arc::clone(&self.curve);
        project_all(&mut self.state, nodes, |p| curve.closest_point(p));
    }

    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        mean_distance(&self.state, nodes, self.curve.as_ref())
    }
}

/// Holds nodes on a surface
pub struct OnSurfaceGoal {
    state: GoalState,
    surface: Arc<dyn ClosestPoint>,
}

impl OnSurfaceGoal {
    pub fn new(points: Vec<Triple>, surface: Arc<dyn ClosestPoint>, weight: f64) -> Result<Self> {
        Ok(Self {
            state: new_state("OnSurfaceGoal", points, weight)?,
            surface,
        })
    }

    pub fn change(&mut self, surface: Option<Arc<dyn ClosestPoint>>, weight: Option<f64>) -> Result<()> {
        self.state.change_weight("OnSurfaceGoal", weight)?;
        if let Some(surface) = surface {
            self.surface = surface;
        }
        Ok(())
    }
}

impl Goal for OnSurfaceGoal {
    goal_accessors!("OnSurfaceGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let surface = Arc::clone(&self.surface);
        project_all(&mut self.state, nodes, |p| surface.closest_point(p));
    }

    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        mean_distance(&self.state, nodes, self.surface.as_ref())
    }
}
