//! Collision and containment goals.
//!
//! All of these are inequality constraints: a node that is not violating
//! anything gets zero weight, so it does not drag its neighbours' averages
//! toward "stay put". A node caught in several violations at once gets the
//! mean of their corrections (see `CollisionAccumulator`).
//!
//! The convex polygon goals work in the XY plane; z is left alone.

use std::ops::Range;

use nalgebra::Vector2;

use crate::error::{Result, SolverError};
use crate::goals::goal::{
    require_at_least, require_finite, require_non_negative, require_weight, CollisionAccumulator,
    Goal, GoalOutput, GoalState,
};
use crate::math::triple::{closest_point_on_segment, Triple, TripleExt};
use crate::simulation::states::Node;

type Vec2 = Vector2<f64>;

// =========================================================================================
// Floor
// =========================================================================================

/// Keeps nodes at or above the horizontal plane `z = height`
pub struct FloorGoal {
    state: GoalState,
    pub height: f64,
}

impl FloorGoal {
    pub fn new(points: Vec<Triple>, weight: f64) -> Result<Self> {
        Self::with_height(points, 0.0, weight)
    }

    pub fn with_height(points: Vec<Triple>, height: f64, weight: f64) -> Result<Self> {
        require_at_least("FloorGoal", &points, 1)?;
        require_finite("FloorGoal", "height", height)?;
        require_weight("FloorGoal", weight)?;
        Ok(Self {
            state: GoalState::new(points, weight),
            height,
        })
    }

    pub fn change(&mut self, height: Option<f64>, weight: Option<f64>) -> Result<()> {
        if let Some(height) = height {
            require_finite("FloorGoal", "height", height)?;
        }
        self.state.change_weight("FloorGoal", weight)?;
        if let Some(height) = height {
            self.height = height;
        }
        Ok(())
    }
}

impl Goal for FloorGoal {
    goal_accessors!("FloorGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let mut acc = CollisionAccumulator::new(self.state.node_count());
        for i in 0..self.state.node_count() {
            let depth = self.height - self.state.position(nodes, i).z;
            if depth > 0.0 {
                acc.push(i, Triple::new(0.0, 0.0, depth));
            }
        }
        acc.finish(&mut self.state);
    }
}

// =========================================================================================
// Spheres
// =========================================================================================

/// Treats every node as a sphere of `radius` and pushes overlapping pairs apart.
/// Pairs are checked exhaustively.
pub struct SphereCollisionGoal {
    state: GoalState,
    pub radius: f64,
}

impl SphereCollisionGoal {
    pub fn new(centers: Vec<Triple>, radius: f64, weight: f64) -> Result<Self> {
        require_at_least("SphereCollisionGoal", &centers, 2)?;
        require_non_negative("SphereCollisionGoal", "radius", radius)?;
        require_weight("SphereCollisionGoal", weight)?;
        Ok(Self {
            state: GoalState::new(centers, weight),
            radius,
        })
    }

    pub fn change(&mut self, radius: Option<f64>, weight: Option<f64>) -> Result<()> {
        if let Some(radius) = radius {
            require_non_negative("SphereCollisionGoal", "radius", radius)?;
        }
        self.state.change_weight("SphereCollisionGoal", weight)?;
        if let Some(radius) = radius {
            self.radius = radius;
        }
        Ok(())
    }
}

impl Goal for SphereCollisionGoal {
    goal_accessors!("SphereCollisionGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let n = self.state.node_count();
        let diameter = 2.0 * self.radius;
        let points = self.state.positions(nodes);
        let mut acc = CollisionAccumulator::new(n);

        for i in 0..n {
            for j in (i + 1)..n {
                let delta = points[j] - points[i];
                let d2 = delta.norm_squared();
                if d2 >= diameter * diameter {
                    continue;
                }
                let d = d2.sqrt();
                // coincident centres: pick a fixed axis to separate along
                let dir = if delta.is_almost_zero(1e-12) { Triple::x() } else { delta / d };
                let push = dir * (0.5 * (diameter - d));
                acc.push(i, -push);
                acc.push(j, push);
            }
        }
        acc.finish(&mut self.state);
    }

    /// Number of overlapping pairs
    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        let points = self.state.positions(nodes);
        let diameter2 = 4.0 * self.radius * self.radius;
        let mut count = 0usize;
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                if points[i].distance_squared(&points[j]) < diameter2 {
                    count += 1;
                }
            }
        }
        vec![GoalOutput::Scalar(count as f64)]
    }
}

/// Keeps spheres of `radius` centred at the nodes off a set of fixed segments
pub struct SphereStaticLineCollisionGoal {
    state: GoalState,
    segments: Vec<[Triple; 2]>,
    pub radius: f64,
}

impl SphereStaticLineCollisionGoal {
    pub fn new(centers: Vec<Triple>, segments: Vec<[Triple; 2]>, radius: f64, weight: f64) -> Result<Self> {
        require_at_least("SphereStaticLineCollisionGoal", &centers, 1)?;
        require_non_negative("SphereStaticLineCollisionGoal", "radius", radius)?;
        require_weight("SphereStaticLineCollisionGoal", weight)?;
        Ok(Self {
            state: GoalState::new(centers, weight),
            segments,
            radius,
        })
    }

    pub fn segments(&self) -> &[[Triple; 2]] {
        &self.segments
    }

    pub fn change(&mut self, radius: Option<f64>, weight: Option<f64>) -> Result<()> {
        if let Some(radius) = radius {
            require_non_negative("SphereStaticLineCollisionGoal", "radius", radius)?;
        }
        self.state.change_weight("SphereStaticLineCollisionGoal", weight)?;
        if let Some(radius) = radius {
            self.radius = radius;
        }
        Ok(())
    }
}

impl Goal for SphereStaticLineCollisionGoal {
    goal_accessors!("SphereStaticLineCollisionGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let mut acc = CollisionAccumulator::new(self.state.node_count());
        for i in 0..self.state.node_count() {
            let p = self.state.position(nodes, i);
            for [a, b] in &self.segments {
                let c = closest_point_on_segment(&p, a, b);
                let delta = p - c;
                let d = delta.norm();
                if d >= self.radius {
                    continue;
                }
                // centre on the segment: push out sideways
                let dir = if delta.is_almost_zero(1e-12) {
                    let along = b - a;
                    if along.is_almost_zero(1e-12) { Triple::z() } else { along.perpendicular().normalise() }
                } else {
                    delta / d
                };
                // segments are static, so the node takes the full correction
                acc.push(i, dir * (self.radius - d));
            }
        }
        acc.finish(&mut self.state);
    }
}

// =========================================================================================
// Convex polygons (XY plane)
// =========================================================================================

fn to_xy(p: &Triple) -> Vec2 {
    Vec2::new(p.x, p.y)
}

/// Twice the signed area; positive for counter-clockwise winding
fn signed_area2(poly: &[Vec2]) -> f64 {
    (0..poly.len())
        .map(|i| {
            let (a, b) = (poly[i], poly[(i + 1) % poly.len()]);
            a.x * b.y - b.x * a.y
        })
        .sum()
}

/// Unit edge normals; degenerate edges are skipped
fn edge_normals(poly: &[Vec2]) -> impl Iterator<Item = Vec2> + '_ {
    (0..poly.len()).filter_map(move |i| {
        let e = poly[(i + 1) % poly.len()] - poly[i];
        let len = e.norm();
        (len > 1e-12).then(|| Vec2::new(e.y, -e.x) / len)
    })
}

fn project(poly: &[Vec2], axis: &Vec2) -> (f64, f64) {
    poly.iter()
        .map(|p| p.dot(axis))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(x), hi.max(x)))
}

/// Minimum translation that moves `b` out of `a`, pointing from `a` to `b`;
/// `None` when a separating axis exists
fn separating_translation(a: &[Vec2], b: &[Vec2]) -> Option<Vec2> {
    let mut best: Option<(f64, Vec2)> = None;
    for axis in edge_normals(a).chain(edge_normals(b)) {
        let (amin, amax) = project(a, &axis);
        let (bmin, bmax) = project(b, &axis);
        let overlap = amax.min(bmax) - amin.max(bmin);
        if overlap <= 0.0 {
            return None;
        }
        if best.map_or(true, |(o, _)| overlap < o) {
            best = Some((overlap, axis));
        }
    }

    let (overlap, mut axis) = best?;
    let ca = a.iter().sum::<Vec2>() / a.len() as f64;
    let cb = b.iter().sum::<Vec2>() / b.len() as f64;
    if (cb - ca).dot(&axis) < 0.0 {
        axis = -axis;
    }
    Some(axis * overlap)
}

/// Pushes overlapping convex polygons apart in the XY plane. Each polygon's
/// vertices are nodes; an overlapping pair splits the minimum translation
/// half to each side.
pub struct ConvexPolygonCollisionGoal {
    state: GoalState,
    polygons: Vec<Range<usize>>, // vertex ranges into the goal's nodes
}

impl ConvexPolygonCollisionGoal {
    pub fn new(polygons: Vec<Vec<Triple>>, weight: f64) -> Result<Self> {
        if polygons.len() < 2 {
            return Err(SolverError::InvalidParameter {
                goal: "ConvexPolygonCollisionGoal",
                reason: format!("needs at least 2 polygons, got {}", polygons.len()),
            });
        }
        require_weight("ConvexPolygonCollisionGoal", weight)?;

        let mut points = Vec::new();
        let mut ranges = Vec::with_capacity(polygons.len());
        for poly in polygons {
            require_at_least("ConvexPolygonCollisionGoal", &poly, 3)?;
            let start = points.len();
            points.extend(poly);
            ranges.push(start..points.len());
        }
        Ok(Self {
            state: GoalState::new(points, weight),
            polygons: ranges,
        })
    }

    pub fn change(&mut self, weight: Option<f64>) -> Result<()> {
        self.state.change_weight("ConvexPolygonCollisionGoal", weight)
    }
}

impl Goal for ConvexPolygonCollisionGoal {
    goal_accessors!("ConvexPolygonCollisionGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let flat: Vec<Vec2> = self.state.positions(nodes).iter().map(to_xy).collect();
        let mut acc = CollisionAccumulator::new(flat.len());

        for (k, ra) in self.polygons.iter().enumerate() {
            for rb in &self.polygons[k + 1..] {
                let Some(mtv) = separating_translation(&flat[ra.clone()], &flat[rb.clone()]) else {
                    continue;
                };
                let half = Triple::new(0.5 * mtv.x, 0.5 * mtv.y, 0.0);
                ra.clone().for_each(|i| acc.push(i, -half));
                rb.clone().for_each(|i| acc.push(i, half));
            }
        }
        acc.finish(&mut self.state);
    }
}

/// Keeps nodes inside a fixed convex polygon in the XY plane
pub struct ConvexPolygonContainmentGoal {
    state: GoalState,
    boundary: Vec<Vec2>, // counter-clockwise
}

impl ConvexPolygonContainmentGoal {
    /// `boundary` may be wound either way
    pub fn new(points: Vec<Triple>, boundary: Vec<Triple>, weight: f64) -> Result<Self> {
        require_at_least("ConvexPolygonContainmentGoal", &points, 1)?;
        require_at_least("ConvexPolygonContainmentGoal", &boundary, 3)?;
        require_weight("ConvexPolygonContainmentGoal", weight)?;

        let mut boundary: Vec<Vec2> = boundary.iter().map(to_xy).collect();
        let area2 = signed_area2(&boundary);
        if area2.abs() < 1e-12 {
            return Err(SolverError::InvalidParameter {
                goal: "ConvexPolygonContainmentGoal",
                reason: "boundary polygon has zero area".into(),
            });
        }
        if area2 < 0.0 {
            boundary.reverse();
        }
        Ok(Self {
            state: GoalState::new(points, weight),
            boundary,
        })
    }

    pub fn change(&mut self, weight: Option<f64>) -> Result<()> {
        self.state.change_weight("ConvexPolygonContainmentGoal", weight)
    }

    /// Largest signed distance outside any edge, with that edge's outward normal
    fn worst_violation(&self, p: &Vec2) -> Option<(f64, Vec2)> {
        let n = self.boundary.len();
        (0..n)
            .filter_map(|i| {
                let a = self.boundary[i];
                let e = self.boundary[(i + 1) % n] - a;
                let len = e.norm();
                if len < 1e-12 {
                    return None;
                }
                let normal = Vec2::new(e.y, -e.x) / len;
                Some(((p - a).dot(&normal), normal))
            })
            .max_by(|x, y| x.0.total_cmp(&y.0))
    }
}

impl Goal for ConvexPolygonContainmentGoal {
    goal_accessors!("ConvexPolygonContainmentGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let mut acc = CollisionAccumulator::new(self.state.node_count());
        for i in 0..self.state.node_count() {
            let p = to_xy(&self.state.position(nodes, i));
            if let Some((depth, normal)) = self.worst_violation(&p).filter(|(d, _)| *d > 0.0) {
                acc.push(i, Triple::new(-normal.x * depth, -normal.y * depth, 0.0));
            }
        }
        acc.finish(&mut self.state);
    }

    /// Number of nodes currently outside the boundary
    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        let outside = self
            .state
            .positions(nodes)
            .iter()
            .filter(|p| self.worst_violation(&to_xy(p)).is_some_and(|(d, _)| d > 0.0))
            .count();
        vec![GoalOutput::Scalar(outside as f64)]
    }
}
