//! Force-like goals.
//!
//! These don't target a configuration, they push. The per-face goals compute a
//! force from the face's area-weighted normal and add it in full to each of
//! the face's three vertices (no splitting). Face indices are local to the
//! goal's own vertex list.

use crate::error::{Result, SolverError};
use crate::goals::goal::{
    apply_face_forces, require_at_least, require_faces, require_finite, require_finite_point,
    require_weight, Goal, GoalOutput, GoalState,
};
use crate::math::triple::Triple;
use crate::simulation::states::Node;

/// Volume below which the enclosed volume counts as collapsed
const MIN_VOLUME: f64 = 1e-12;

/// Constant displacement applied to every node, e.g. gravity
pub struct ForceGoal {
    state: GoalState,
    pub force: Triple,
}

impl ForceGoal {
    pub fn new(points: Vec<Triple>, force: Triple, weight: f64) -> Result<Self> {
        require_at_least("ForceGoal", &points, 1)?;
        require_finite_point("ForceGoal", "force", &force)?;
        require_weight("ForceGoal", weight)?;
        Ok(Self {
            state: GoalState::new(points, weight),
            force,
        })
    }

    pub fn change(&mut self, force: Option<Triple>, weight: Option<f64>) -> Result<()> {
        if let Some(force) = &force {
            require_finite_point("ForceGoal", "force", force)?;
        }
        self.state.change_weight("ForceGoal", weight)?;
        if let Some(force) = force {
            self.force = force;
        }
        Ok(())
    }
}

impl Goal for ForceGoal {
    goal_accessors!("ForceGoal");

    fn compute(&mut self, _nodes: &[Node]) {
        let (force, weight) = (self.force, self.state.weight);
        self.state.moves.iter_mut().for_each(|m| *m = force);
        self.state.weights.iter_mut().for_each(|w| *w = weight);
    }
}

fn check_mesh(goal: &'static str, vertices: &[Triple], faces: &[[usize; 3]]) -> Result<()> {
    require_at_least(goal, vertices, 3)?;
    if faces.is_empty() {
        return Err(SolverError::InvalidParameter {
            goal,
            reason: "mesh has no faces".into(),
        });
    }
    require_faces(faces, vertices.len())
}

/// Signed volume enclosed by a closed triangle mesh, positive for outward-facing triangles
pub fn enclosed_volume(points: &[Triple], faces: &[[usize; 3]]) -> Result<f64> {
    require_faces(faces, points.len())?;
    Ok(signed_volume(points, faces))
}

/// Faces must already be checked against `points`
fn signed_volume(points: &[Triple], faces: &[[usize; 3]]) -> f64 {
    faces
        .iter()
        .map(|&[a, b, c]| points[a].dot(&points[b].cross(&points[c])))
        .sum::<f64>()
        / 6.0
}

/// Inflates a mesh with a fixed pressure along its face normals
pub struct ConstantPressureGoal {
    state: GoalState,
    faces: Vec<[usize; 3]>,
    pub pressure: f64,
}

impl ConstantPressureGoal {
    pub fn new(vertices: Vec<Triple>, faces: Vec<[usize; 3]>, pressure: f64, weight: f64) -> Result<Self> {
        check_mesh("ConstantPressureGoal", &vertices, &faces)?;
        require_finite("ConstantPressureGoal", "pressure", pressure)?;
        require_weight("ConstantPressureGoal", weight)?;
        Ok(Self {
            state: GoalState::new(vertices, weight),
            faces,
            pressure,
        })
    }

    pub fn change(&mut self, pressure: Option<f64>, weight: Option<f64>) -> Result<()> {
        if let Some(pressure) = pressure {
            require_finite("ConstantPressureGoal", "pressure", pressure)?;
        }
        self.state.change_weight("ConstantPressureGoal", weight)?;
        if let Some(pressure) = pressure {
            self.pressure = pressure;
        }
        Ok(())
    }
}

impl Goal for ConstantPressureGoal {
    goal_accessors!("ConstantPressureGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let pressure = self.pressure;
        apply_face_forces(&mut self.state, nodes, &self.faces, |n| n * pressure);
    }
}

/// Pressure from a fixed amount of gas: the force scales with
/// `volume_constant / current_volume` (Boyle's law)
pub struct ConstantVolumePressureGoal {
    state: GoalState,
    faces: Vec<[usize; 3]>,
    pub volume_constant: f64,
}

impl ConstantVolumePressureGoal {
    pub fn new(vertices: Vec<Triple>, faces: Vec<[usize; 3]>, volume_constant: f64, weight: f64) -> Result<Self> {
        check_mesh("ConstantVolumePressureGoal", &vertices, &faces)?;
        require_finite("ConstantVolumePressureGoal", "volume_constant", volume_constant)?;
        require_weight("ConstantVolumePressureGoal", weight)?;
        Ok(Self {
            state: GoalState::new(vertices, weight),
            faces,
            volume_constant,
        })
    }

    pub fn change(&mut self, volume_constant: Option<f64>, weight: Option<f64>) -> Result<()> {
        if let Some(volume_constant) = volume_constant {
            require_finite("ConstantVolumePressureGoal", "volume_constant", volume_constant)?;
        }
        self.state.change_weight("ConstantVolumePressureGoal", weight)?;
        if let Some(volume_constant) = volume_constant {
            self.volume_constant = volume_constant;
        }
        Ok(())
    }

    fn volume(&self, nodes: &[Node]) -> f64 {
        signed_volume(&self.state.positions(nodes), &self.faces)
    }
}

impl Goal for ConstantVolumePressureGoal {
    goal_accessors!("ConstantVolumePressureGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let volume = self.volume(nodes);
        if volume.abs() < MIN_VOLUME {
            self.state.deactivate();
            return;
        }
        let pressure = self.volume_constant / volume;
        apply_face_forces(&mut self.state, nodes, &self.faces, |n| n * pressure);
    }

    /// Enclosed volume
    fn output(&self, nodes: &[Node]) -> Vec<GoalOutput> {
        vec![GoalOutput::Scalar(self.volume(nodes))]
    }
}

/// Wind load: each face is pushed along its normal by the wind component
/// normal to it, times its area
pub struct DirectionalWindGoal {
    state: GoalState,
    faces: Vec<[usize; 3]>,
    pub wind: Triple,
}

impl DirectionalWindGoal {
    pub fn new(vertices: Vec<Triple>, faces: Vec<[usize; 3]>, wind: Triple, weight: f64) -> Result<Self> {
        check_mesh("DirectionalWindGoal", &vertices, &faces)?;
        require_finite_point("DirectionalWindGoal", "wind", &wind)?;
        require_weight("DirectionalWindGoal", weight)?;
        Ok(Self {
            state: GoalState::new(vertices, weight),
            faces,
            wind,
        })
    }

    pub fn change(&mut self, wind: Option<Triple>, weight: Option<f64>) -> Result<()> {
        if let Some(wind) = &wind {
            require_finite_point("DirectionalWindGoal", "wind", wind)?;
        }
        self.state.change_weight("DirectionalWindGoal", weight)?;
        if let Some(wind) = wind {
            self.wind = wind;
        }
        Ok(())
    }
}

impl Goal for DirectionalWindGoal {
    goal_accessors!("DirectionalWindGoal");

    fn compute(&mut self, nodes: &[Node]) {
        let wind = self.wind;
        apply_face_forces(&mut self.state, nodes, &self.faces, |n| {
            let area = n.norm();
            if area < 1e-12 {
                Triple::zeros()
            } else {
                n * (n.dot(&wind) / area)
            }
        });
    }
}
