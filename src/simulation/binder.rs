//! Output geometry tied to solver nodes.
//!
//! A binder asks for node positions just like a goal does (and shares nodes
//! with goals through the same merge rule) but never computes anything. After
//! iterating, [`GeometryBinder::bind`] rebuilds its geometry from the current
//! node positions.

use crate::error::Result;
use crate::goals::goal::{require_at_least, require_faces};
use crate::goals::on_geometry::TriangleMesh;
use crate::math::triple::Triple;
use crate::simulation::states::Node;

#[derive(Debug, Clone, PartialEq)]
pub enum BinderKind {
    Points,
    Polyline { closed: bool },
    Mesh { faces: Vec<[usize; 3]> },
}

#[derive(Debug, Clone)]
pub struct GeometryBinder {
    pub kind: BinderKind,
    starting_positions: Vec<Triple>,
    pub(crate) node_indices: Vec<usize>,
}

/// Geometry rebuilt from current node positions
#[derive(Debug, Clone)]
pub enum BoundGeometry {
    Points(Vec<Triple>),
    Polyline { points: Vec<Triple>, closed: bool },
    Mesh(TriangleMesh),
}

impl GeometryBinder {
    pub fn points(positions: Vec<Triple>) -> Result<Self> {
        require_at_least("GeometryBinder", &positions, 1)?;
        Ok(Self::with_kind(BinderKind::Points, positions))
    }

    pub fn polyline(positions: Vec<Triple>, closed: bool) -> Result<Self> {
        require_at_least("GeometryBinder", &positions, 2)?;
        Ok(Self::with_kind(BinderKind::Polyline { closed }, positions))
    }

    pub fn mesh(vertices: Vec<Triple>, faces: Vec<[usize; 3]>) -> Result<Self> {
        require_at_least("GeometryBinder", &vertices, 3)?;
        require_faces(&faces, vertices.len())?;
        Ok(Self::with_kind(BinderKind::Mesh { faces }, vertices))
    }

    fn with_kind(kind: BinderKind, starting_positions: Vec<Triple>) -> Self {
        let n = starting_positions.len();
        Self {
            kind,
            starting_positions,
            node_indices: Vec::with_capacity(n),
        }
    }

    pub fn starting_positions(&self) -> &[Triple] {
        &self.starting_positions
    }

    /// Indices into the solver's nodes; empty until the binder is added to a solver
    pub fn node_indices(&self) -> &[usize] {
        &self.node_indices
    }

    pub fn bind(&self, nodes: &[Node]) -> BoundGeometry {
        let points: Vec<Triple> = self.node_indices.iter().map(|&i| nodes[i].position).collect();
        match &self.kind {
            BinderKind::Points => BoundGeometry::Points(points),
            BinderKind::Polyline { closed } => BoundGeometry::Polyline {
                points,
                closed: *closed,
            },
            BinderKind::Mesh { faces } => BoundGeometry::Mesh(TriangleMesh {
                vertices: points,
                faces: faces.clone(),
            }),
        }
    }
}
