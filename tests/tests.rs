use std::f64::consts::{FRAC_PI_2, FRAC_PI_3};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nalgebra::{DMatrix, Matrix3};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use goalsim::*;

/// Shorthand for building points
pub fn t(x: f64, y: f64, z: f64) -> Triple {
    Triple::new(x, y, z)
}

/// Give a goal its own private nodes at its starting positions, in order
pub fn attach(goal: &mut dyn Goal) -> Vec<Node> {
    let nodes: Vec<Node> = goal.state().starting_positions.iter().map(|p| Node::new(*p)).collect();
    goal.state_mut().node_indices = (0..nodes.len()).collect();
    nodes
}

/// Solver without momentum, so one iteration applies the averaged moves exactly
pub fn plain_solver() -> Solver {
    Solver::new(SolverParams::default().with_momentum(false))
}

/// Tetrahedron with outward-facing triangles
pub fn tetrahedron() -> (Vec<Triple>, Vec<[usize; 3]>) {
    let vertices = vec![t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), t(0.0, 1.0, 0.0), t(0.0, 0.0, 1.0)];
    let faces = vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];
    (vertices, faces)
}

fn close(a: &Triple, b: &Triple, tol: f64) -> bool {
    (a - b).norm() < tol
}

// ==================================================================================
// Triple tests
// ==================================================================================

#[test]
fn triple_basic_identities() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..100 {
        let v = t(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0));
        if v.is_almost_zero(1e-6) {
            continue;
        }
        assert!((v.normalise().norm() - 1.0).abs() < 1e-12);
        assert!(v.cross(&v).norm() < 1e-12);
        assert!((v.dot(&v) - v.norm() * v.norm()).abs() < 1e-9);
        assert!(v.dot(&v.perpendicular()).abs() < 1e-9);
    }
}

// ==================================================================================
// Goal tests
// ==================================================================================

#[test]
fn anchor_move_is_exact() {
    let p = t(0.1, 0.2, 0.3);
    let target = t(1.7, -2.5, 3.9);
    let mut goal = AnchorGoal::with_target(p, target, 5.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    assert_eq!(goal.state().moves[0], target - p);
    assert_eq!(goal.state().weights[0], 5.0);
}

#[test]
fn length_goal_splits_correction_symmetrically() {
    let mut goal = LengthGoal::with_length(t(0.0, 0.0, 0.0), t(3.0, 0.0, 0.0), 1.0, 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    let moves = &goal.state().moves;
    assert!(close(&moves[0], &t(1.0, 0.0, 0.0), 1e-12), "got {:?}", moves[0]);
    assert!(close(&moves[1], &t(-1.0, 0.0, 0.0), 1e-12), "got {:?}", moves[1]);

    let a = nodes[0].position + moves[0];
    let b = nodes[1].position + moves[1];
    assert!(close(&a, &t(1.0, 0.0, 0.0), 1e-12));
    assert!(close(&b, &t(2.0, 0.0, 0.0), 1e-12));
}

#[test]
fn clamp_length_is_inactive_inside_range() {
    let mut goal = ClampLengthGoal::new(t(0.0, 0.0, 0.0), t(2.0, 0.0, 0.0), 1.0, 3.0, 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);
    assert!(goal.state().weights.iter().all(|w| *w == 0.0));

    goal.change(None, Some(1.5), None).unwrap();
    goal.compute(&nodes);
    assert!(close(&goal.state().moves[0], &t(0.25, 0.0, 0.0), 1e-12));
    assert!(close(&goal.state().moves[1], &t(-0.25, 0.0, 0.0), 1e-12));
}

#[test]
fn angle_goal_reaches_target_angle() {
    let (a, b, c) = (t(1.0, 0.0, 0.0), t(0.0, 0.0, 0.0), t(0.0, 2.0, 0.0));
    let mut goal = AngleGoal::with_angle(a, b, c, FRAC_PI_3, 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    let s = goal.state();
    assert_eq!(s.weights[1], 0.0);
    assert_eq!(s.moves[1], Triple::zeros());

    let a2 = a + s.moves[0];
    let c2 = c + s.moves[2];
    let angle = (a2 - b).normalise().dot(&(c2 - b).normalise()).acos();
    assert!((angle - FRAC_PI_3).abs() < 1e-9, "angle = {angle}");
    assert!(((a2 - b).norm() - 1.0).abs() < 1e-9);
    assert!(((c2 - b).norm() - 2.0).abs() < 1e-9);
}

#[test]
fn angle_goal_at_target_does_not_move() {
    let mut goal = AngleGoal::with_angle(t(1.0, 0.0, 0.0), t(0.0, 0.0, 0.0), t(0.0, 1.0, 0.0), FRAC_PI_2, 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);
    assert!(goal.state().moves.iter().all(|m| m.norm() < 1e-12));
}

#[test]
fn cocircular_goal_disables_on_colinear_points() {
    let points = vec![t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), t(2.0, 0.0, 0.0), t(3.0, 0.0, 0.0)];
    let mut goal = CoCircularGoal::new(points, 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    assert!(goal.state().weights.iter().all(|w| *w == 0.0));
    assert!(goal.state().moves.iter().all(|m| *m == Triple::zeros()));
}

#[test]
fn coplanar_goal_flattens_points() {
    let points = vec![t(0.0, 0.0, 0.1), t(1.0, 0.0, -0.1), t(1.0, 1.0, 0.1), t(0.0, 1.0, -0.1)];
    let mut goal = CoPlanarGoal::new(points, 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    let moved: Vec<Triple> = nodes.iter().zip(&goal.state().moves).map(|(n, m)| n.position + m).collect();
    let fit = best_fit_plane(&moved).unwrap();
    assert_eq!(fit.kind, PlaneFitKind::Coplanar);
}

#[test]
fn on_curve_and_surface_projection() {
    let curve = Arc::new(Polyline::new(vec![t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0)], false).unwrap());
    let mut goal = OnCurveGoal::new(vec![t(0.5, 2.0, 0.3)], curve, 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);
    assert!(close(&(nodes[0].position + goal.state().moves[0]), &t(0.5, 0.0, 0.0), 1e-12));

    let mesh = TriangleMesh::new(vec![t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), t(0.0, 1.0, 0.0)], vec![[0, 1, 2]]).unwrap();
    assert!(close(&mesh.closest_point(&t(0.2, 0.2, 5.0)), &t(0.2, 0.2, 0.0), 1e-12));
    assert!(close(&mesh.closest_point(&t(2.0, 2.0, 0.0)), &t(0.5, 0.5, 0.0), 1e-12));
    assert!(close(&mesh.closest_point(&t(-1.0, -1.0, 0.0)), &t(0.0, 0.0, 0.0), 1e-12));

    let plane = Plane::new(t(0.0, 0.0, 1.0), t(0.0, 0.0, 2.0)).unwrap();
    let mut goal = OnPlaneGoal::new(vec![t(3.0, 4.0, -2.0)], plane, 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);
    assert!(close(&goal.state().moves[0], &t(0.0, 0.0, 3.0), 1e-12));
}

#[test]
fn shape_matching_at_rest_has_zero_moves() {
    let shape = vec![t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), t(0.0, 2.0, 0.0), t(0.0, 0.0, 3.0), t(1.0, 1.0, 1.0)];
    for scaling in [false, true] {
        let mut goal = ShapeMatchingGoal::new(shape.clone(), shape.clone(), scaling, 1.0).unwrap();
        assert!(!goal.is_2d());
        let nodes = attach(&mut goal);
        goal.compute(&nodes);
        for m in &goal.state().moves {
            assert!(m.norm() < 1e-3, "scaling = {scaling}, move = {m:?}");
        }
    }
}

#[test]
fn shape_matching_planar_target_and_scale() {
    let square = vec![t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), t(1.0, 1.0, 0.0), t(0.0, 1.0, 0.0)];
    let goal = ShapeMatchingGoal::new(square.clone(), square.clone(), false, 1.0).unwrap();
    assert!(goal.is_2d());

    let shape = vec![t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), t(0.0, 2.0, 0.0), t(0.0, 0.0, 3.0)];
    let doubled: Vec<Triple> = shape.iter().map(|p| p * 2.0).collect();
    let mut goal = ShapeMatchingGoal::new(shape, doubled, true, 1.0).unwrap();
    let nodes = attach(&mut goal);
    match goal.output(&nodes).as_slice() {
        [GoalOutput::Scalar(scale)] => assert!((scale - 0.5).abs() < 1e-3, "scale = {scale}"),
        other => panic!("unexpected output {other:?}"),
    }
    goal.compute(&nodes);
    assert!(goal.state().moves.iter().all(|m| m.norm() < 1e-3));
}


#[test]
fn equal_lengths_pulls_segments_to_mean() {
    let endpoints = vec![t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), t(0.0, 1.0, 0.0), t(3.0, 1.0, 0.0)];
    let mut goal = EqualLengthsGoal::new(endpoints, 1.0).unwrap();
    let nodes = attach(&mut goal);
    match goal.output(&nodes).as_slice() {
        [GoalOutput::Scalar(mean)] => assert!((mean - 2.0).abs() < 1e-12),
        other => panic!("unexpected output {other:?}"),
    }
    goal.compute(&nodes);

    let s = goal.state();
    for k in 0..2 {
        let (i, j) = (2 * k, 2 * k + 1);
        assert!(close(&s.moves[i], &-s.moves[j], 1e-12));
        let a = nodes[i].position + s.moves[i];
        let b = nodes[j].position + s.moves[j];
        assert!(((b - a).norm() - 2.0).abs() < 1e-12, "segment {k}");
    }
}

#[test]
fn parallel_lines_share_a_direction() {
    let endpoints = vec![t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), t(0.0, 1.0, 0.0), t(1.0, 2.0, 0.0)];
    let mut goal = ParallelLinesGoal::new(endpoints, 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    let s = goal.state();
    let moved: Vec<Triple> = nodes.iter().zip(&s.moves).map(|(n, m)| n.position + m).collect();
    let (d0, d1) = (moved[1] - moved[0], moved[3] - moved[2]);
    assert!(d0.cross(&d1).norm() < 1e-12, "{d0:?} vs {d1:?}");
    assert!((d0.norm() - 1.0).abs() < 1e-12);
    assert!((d1.norm() - 2.0_f64.sqrt()).abs() < 1e-12);
    assert!(close(&s.moves[0], &-s.moves[1], 1e-12));
    assert!(close(&s.moves[2], &-s.moves[3], 1e-12));
}

#[test]
fn direction_goal_rotates_segment_about_midpoint() {
    let (a, b) = (t(0.0, 0.0, 0.0), t(1.0, 1.0, 0.0));
    let mut goal = DirectionGoal::new(a, b, t(2.0, 0.0, 0.0), 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    let s = goal.state();
    assert!(close(&s.moves[0], &-s.moves[1], 1e-12));
    let (a2, b2) = (a + s.moves[0], b + s.moves[1]);
    assert!(close(&(b2 - a2), &t(2.0_f64.sqrt(), 0.0, 0.0), 1e-12), "got {:?}", b2 - a2);
    assert!(close(&((a2 + b2) * 0.5), &t(0.5, 0.5, 0.0), 1e-12));
}

#[test]
fn colinear_goal_projects_onto_fitted_line() {
    let points = vec![t(0.0, 0.1, 0.0), t(1.0, -0.2, 0.1), t(2.0, 0.15, -0.1), t(3.0, -0.05, 0.0)];
    let mut goal = CoLinearGoal::new(points, 1.0).unwrap();
    let nodes = attach(&mut goal);
    let (origin, direction) = match goal.output(&nodes).as_slice() {
        [GoalOutput::Point(o), GoalOutput::Vector(d)] => (*o, *d),
        other => panic!("unexpected output {other:?}"),
    };
    goal.compute(&nodes);

    for (n, m) in nodes.iter().zip(&goal.state().moves) {
        let moved = n.position + m;
        assert!((moved - origin).cross(&direction).norm() < 1e-9, "{moved:?} off the line");
        assert!(m.dot(&direction).abs() < 1e-9);
    }
}

#[test]
fn cospherical_goal_moves_onto_fitted_sphere() {
    let c = t(1.0, 1.0, 1.0);
    let on_sphere = vec![
        c + t(2.0, 0.0, 0.0),
        c + t(-2.0, 0.0, 0.0),
        c + t(0.0, 2.0, 0.0),
        c + t(0.0, -2.0, 0.0),
        c + t(0.0, 0.0, 2.0),
        c + t(0.0, 0.0, -2.0),
    ];
    let mut goal = CoSphericalGoal::new(on_sphere.clone(), 1.0).unwrap();
    let nodes = attach(&mut goal);
    match goal.output(&nodes).as_slice() {
        [GoalOutput::Point(center), GoalOutput::Scalar(radius)] => {
            assert!(close(center, &c, 1e-6));
            assert!((radius - 2.0).abs() < 1e-6);
        }
        other => panic!("unexpected output {other:?}"),
    }
    goal.compute(&nodes);
    assert!(goal.state().moves.iter().all(|m| m.norm() < 1e-6));

    let mut bumped = on_sphere;
    bumped[0] += t(0.3, 0.0, 0.0);
    bumped[3] -= t(0.0, 0.2, 0.0);
    let mut goal = CoSphericalGoal::new(bumped, 1.0).unwrap();
    let nodes = attach(&mut goal);
    let (center, radius) = match goal.output(&nodes).as_slice() {
        [GoalOutput::Point(center), GoalOutput::Scalar(radius)] => (*center, *radius),
        other => panic!("unexpected output {other:?}"),
    };
    goal.compute(&nodes);
    for (n, m) in nodes.iter().zip(&goal.state().moves) {
        let moved = n.position + m;
        assert!(((moved - center).norm() - radius).abs() < 1e-9);
        assert!(m.cross(&(n.position - center)).norm() < 1e-9, "move is not radial");
    }
}

#[test]
fn coincident_goal_gathers_at_centroid() {
    let points = vec![t(0.0, 0.0, 0.0), t(2.0, 0.0, 0.0), t(1.0, 3.0, 0.0)];
    let mut goal = CoincidentGoal::new(points, 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    for (n, m) in nodes.iter().zip(&goal.state().moves) {
        assert!(close(&(n.position + m), &t(1.0, 1.0, 0.0), 1e-12));
    }
}

#[test]
fn on_line_goal_projects_onto_fixed_line() {
    let line = Line::new(t(0.0, 0.0, 0.0), t(0.0, 0.0, 2.0)).unwrap();
    let mut goal = OnLineGoal::new(vec![t(3.0, 4.0, 5.0)], line, 1.0).unwrap();
    let nodes = attach(&mut goal);
    match goal.output(&nodes).as_slice() {
        [GoalOutput::Scalar(d)] => assert!((d - 5.0).abs() < 1e-12),
        other => panic!("unexpected output {other:?}"),
    }
    goal.compute(&nodes);
    assert!(close(&goal.state().moves[0], &t(-3.0, -4.0, 0.0), 1e-12));
}

// ==================================================================================
// Validation tests
// ==================================================================================

#[test]
fn goals_reject_invalid_construction() {
    let three = vec![t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), t(0.0, 1.0, 0.0)];

    assert!(matches!(
        CoCircularGoal::new(three.clone(), 1.0),
        Err(SolverError::TooFewNodes { required: 4, got: 3, .. })
    ));
    assert!(matches!(
        CoSphericalGoal::new(three.clone(), 1.0),
        Err(SolverError::TooFewNodes { required: 5, .. })
    ));
    assert!(matches!(
        EqualLengthsGoal::new(three.clone(), 1.0),
        Err(SolverError::OddNodeCount { got: 3, .. })
    ));
    assert!(matches!(
        ClampLengthGoal::new(three[0], three[1], 2.0, 1.0, 1.0),
        Err(SolverError::InvalidParameter { .. })
    ));
    assert!(matches!(
        ConstantPressureGoal::new(three, vec![[0, 1, 5]], 1.0, 1.0),
        Err(SolverError::FaceOutOfRange { vertex: 5, .. })
    ));
}


#[test]
fn negative_or_non_finite_parameters_are_rejected() {
    let (a, b) = (t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0));
    assert!(matches!(LengthGoal::new(a, b, -1.0), Err(SolverError::InvalidParameter { .. })));
    assert!(matches!(LengthGoal::new(a, b, f64::NAN), Err(SolverError::InvalidParameter { .. })));
    assert!(matches!(
        AnchorGoal::with_target(a, t(f64::INFINITY, 0.0, 0.0), 1.0),
        Err(SolverError::InvalidParameter { .. })
    ));
    assert!(matches!(
        DirectionGoal::new(a, b, Triple::zeros(), 1.0),
        Err(SolverError::InvalidParameter { .. })
    ));
}

#[test]
fn change_validates_new_values() {
    let mut solver = plain_solver();
    let index = solver
        .add_goal(LengthGoal::with_length(t(0.0, 0.0, 0.0), t(3.0, 0.0, 0.0), 1.0, 1.0).unwrap())
        .unwrap();

    let goal = solver.goal_mut::<LengthGoal>(index).unwrap();
    assert!(matches!(goal.change(None, Some(f64::NAN)), Err(SolverError::InvalidParameter { .. })));
    assert!(matches!(goal.change(None, Some(-2.0)), Err(SolverError::InvalidParameter { .. })));
    assert!(matches!(goal.change(Some(-1.0), None), Err(SolverError::InvalidParameter { .. })));
    // a rejected call changes nothing
    assert!(goal.change(Some(2.0), Some(f64::INFINITY)).is_err());
    assert_eq!(goal.length, 1.0);
    assert_eq!(goal.weight(), 1.0);

    solver.iterate();
    let p = solver.node_positions();
    assert!(p.iter().all(|p| p.iter().all(|c| c.is_finite())));
    assert!(((p[1] - p[0]).norm() - 1.0).abs() < 1e-12);

    let goal = solver.goal_mut::<LengthGoal>(index).unwrap();
    goal.change(Some(2.0), Some(3.0)).unwrap();
    assert_eq!((goal.length, goal.weight()), (2.0, 3.0));

    let mut clamp = ClampLengthGoal::new(t(0.0, 0.0, 0.0), t(2.0, 0.0, 0.0), 1.0, 3.0, 1.0).unwrap();
    assert!(clamp.change(Some(4.0), None, None).is_err());
    assert_eq!((clamp.min, clamp.max), (1.0, 3.0));

    let mut angle = AngleGoal::with_angle(t(1.0, 0.0, 0.0), t(0.0, 0.0, 0.0), t(0.0, 1.0, 0.0), FRAC_PI_2, 1.0).unwrap();
    assert!(angle.change(Some(4.0), None).is_err());
    assert_eq!(angle.angle, FRAC_PI_2);

    let mut direction = DirectionGoal::new(t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), t(1.0, 0.0, 0.0), 1.0).unwrap();
    assert!(direction.change(Some(Triple::zeros()), None).is_err());
    assert_eq!(direction.direction(), t(1.0, 0.0, 0.0));
}

// ==================================================================================
// Collision tests
// ==================================================================================

#[test]
fn sphere_collision_pushes_pair_apart() {
    let centers = vec![t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), t(10.0, 0.0, 0.0)];
    let mut goal = SphereCollisionGoal::new(centers, 1.0, 2.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    let s = goal.state();
    assert!(close(&s.moves[0], &t(-0.5, 0.0, 0.0), 1e-12));
    assert!(close(&s.moves[1], &t(0.5, 0.0, 0.0), 1e-12));
    assert_eq!(s.weights[0], 2.0);
    assert_eq!(s.weights[2], 0.0);
}

#[test]
fn sphere_collision_averages_multiple_violations() {
    let centers = vec![t(-1.0, 0.0, 0.0), t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0)];
    let mut goal = SphereCollisionGoal::new(centers, 0.75, 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    let s = goal.state();
    assert!(close(&s.moves[0], &t(-0.25, 0.0, 0.0), 1e-12));
    assert!(close(&s.moves[1], &Triple::zeros(), 1e-12));
    assert!(close(&s.moves[2], &t(0.25, 0.0, 0.0), 1e-12));
    assert_eq!(s.weights[1], 1.0);
}

#[test]
fn convex_polygons_are_separated() {
    let a = vec![t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), t(1.0, 1.0, 0.0), t(0.0, 1.0, 0.0)];
    let b: Vec<Triple> = a.iter().map(|p| p + t(0.5, 0.0, 0.0)).collect();
    let mut goal = ConvexPolygonCollisionGoal::new(vec![a, b], 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    let s = goal.state();
    for i in 0..4 {
        assert!(close(&s.moves[i], &t(-0.25, 0.0, 0.0), 1e-12), "a[{i}] = {:?}", s.moves[i]);
        assert!(close(&s.moves[i + 4], &t(0.25, 0.0, 0.0), 1e-12), "b[{i}] = {:?}", s.moves[i + 4]);
    }
}

#[test]
fn containment_pushes_outside_points_back() {
    // clockwise on purpose
    let boundary = vec![t(0.0, 0.0, 0.0), t(0.0, 2.0, 0.0), t(2.0, 2.0, 0.0), t(2.0, 0.0, 0.0)];
    let mut goal = ConvexPolygonContainmentGoal::new(vec![t(3.0, 1.0, 5.0), t(1.0, 1.0, 0.0)], boundary, 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    let s = goal.state();
    assert!(close(&s.moves[0], &t(-1.0, 0.0, 0.0), 1e-12), "got {:?}", s.moves[0]);
    assert_eq!(s.weights[1], 0.0);
}

#[test]
fn floor_lifts_only_points_below() {
    let mut goal = FloorGoal::with_height(vec![t(0.0, 0.0, -0.5), t(1.0, 0.0, 0.5)], 0.0, 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    assert!(close(&goal.state().moves[0], &t(0.0, 0.0, 0.5), 1e-12));
    assert_eq!(goal.state().weights[1], 0.0);
}


#[test]
fn static_segment_pushes_sphere_out_fully() {
    let centers = vec![t(0.5, 0.3, 0.0), t(0.5, 5.0, 0.0)];
    let segments = vec![[t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0)]];
    let mut goal = SphereStaticLineCollisionGoal::new(centers, segments, 1.0, 2.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    let s = goal.state();
    assert!(close(&s.moves[0], &t(0.0, 0.7, 0.0), 1e-12), "got {:?}", s.moves[0]);
    assert_eq!(s.weights[0], 2.0);
    assert_eq!(s.weights[1], 0.0);
}

// ==================================================================================
// Force-like tests
// ==================================================================================

#[test]
fn constant_pressure_sums_face_normals() {
    let (vertices, faces) = tetrahedron();
    let mut goal = ConstantPressureGoal::new(vertices, faces, 1.0, 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    assert!(close(&goal.state().moves[0], &t(-0.5, -0.5, -0.5), 1e-12));
}

#[test]
fn volume_pressure_follows_boyle() {
    let (vertices, faces) = tetrahedron();
    let mut goal = ConstantVolumePressureGoal::new(vertices, faces, 1.0 / 6.0, 1.0).unwrap();
    let nodes = attach(&mut goal);

    match goal.output(&nodes).as_slice() {
        [GoalOutput::Scalar(volume)] => assert!((volume - 1.0 / 6.0).abs() < 1e-12),
        other => panic!("unexpected output {other:?}"),
    }

    // volume constant / volume = 1, so same as unit pressure
    goal.compute(&nodes);
    assert!(close(&goal.state().moves[0], &t(-0.5, -0.5, -0.5), 1e-12));
}


#[test]
fn wind_pushes_faces_by_normal_component() {
    let vertices = vec![t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), t(0.0, 1.0, 0.0), t(5.0, 5.0, 5.0)];
    let mut goal = DirectionalWindGoal::new(vertices, vec![[0, 1, 2]], t(1.0, 0.0, 2.0), 1.0).unwrap();
    let nodes = attach(&mut goal);
    goal.compute(&nodes);

    // area 0.5 times the normal wind component 2
    let s = goal.state();
    for i in 0..3 {
        assert!(close(&s.moves[i], &t(0.0, 0.0, 1.0), 1e-12), "vertex {i}: {:?}", s.moves[i]);
        assert_eq!(s.weights[i], 1.0);
    }
    assert_eq!(s.weights[3], 0.0);
}

#[test]
fn vertices_outside_faces_do_not_dilute_other_goals() {
    let mut solver = plain_solver();
    let vertices = vec![t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), t(0.0, 1.0, 0.0), t(5.0, 5.0, 5.0)];
    solver
        .add_goal(ConstantPressureGoal::new(vertices, vec![[0, 1, 2]], 1.0, 1.0).unwrap())
        .unwrap();
    solver
        .add_goal(AnchorGoal::with_target(t(5.0, 5.0, 5.0), t(6.0, 5.0, 5.0), 1.0).unwrap())
        .unwrap();
    assert_eq!(solver.node_count(), 4);

    solver.iterate();
    let p = solver.node_position(3).unwrap();
    assert!(close(&p, &t(6.0, 5.0, 5.0), 1e-12), "got {p:?}");
}

#[test]
fn enclosed_volume_checks_faces() {
    let (vertices, faces) = tetrahedron();
    assert!((enclosed_volume(&vertices, &faces).unwrap() - 1.0 / 6.0).abs() < 1e-12);
    assert!(matches!(
        enclosed_volume(&vertices, &[[0, 1, 9]]),
        Err(SolverError::FaceOutOfRange { vertex: 9, .. })
    ));
}

// ==================================================================================
// Solver tests
// ==================================================================================

#[test]
fn nearby_positions_share_a_node() {
    let mut solver = plain_solver();
    solver.add_goal(AnchorGoal::new(t(0.0, 0.0, 0.0), 1.0).unwrap()).unwrap();
    solver.add_goal(AnchorGoal::new(t(0.0005, 0.0, 0.0), 1.0).unwrap()).unwrap();
    assert_eq!(solver.node_count(), 1);

    solver.add_goal(AnchorGoal::new(t(0.01, 0.0, 0.0), 1.0).unwrap()).unwrap();
    assert_eq!(solver.node_count(), 2);
    assert_eq!(solver.goals()[1].node_indices(), &[0]);
    assert_eq!(solver.goals()[2].node_indices(), &[1]);
}

#[test]
fn length_converges_in_one_iteration_without_momentum() {
    let mut solver = plain_solver();
    solver
        .add_goal(LengthGoal::with_length(t(0.0, 0.0, 0.0), t(3.0, 0.0, 0.0), 1.0, 1.0).unwrap())
        .unwrap();
    solver.iterate();

    let p = solver.node_positions();
    assert!(((p[1] - p[0]).norm() - 1.0).abs() < 1e-12);
    assert_eq!(solver.current_iteration(), 1);
}

#[test]
fn iterate_for_is_time_boxed() {
    let mut solver = plain_solver();
    solver
        .add_goal(LengthGoal::with_length(t(0.0, 0.0, 0.0), t(3.0, 0.0, 0.0), 1.0, 1.0).unwrap())
        .unwrap();

    let budget = Duration::from_millis(20);
    let start = Instant::now();
    let count = solver.iterate_for(budget);
    assert!(start.elapsed() >= budget);
    assert!(count >= 1);
    assert_eq!(solver.current_iteration(), count);

    // a zero budget still runs one iteration
    assert_eq!(solver.iterate_for(Duration::ZERO), 1);
    assert_eq!(solver.current_iteration(), count + 1);
}

#[test]
fn momentum_kinetic_energy_decays() {
    let mut solver = Solver::default();
    solver
        .add_goal(LengthGoal::with_length(t(0.0, 0.0, 0.0), t(3.0, 0.0, 0.0), 1.0, 1.0).unwrap())
        .unwrap();

    let report = solver.execute(100, 1e-12);
    assert!(report.converged, "report = {report:?}");
    assert!(report.iterations < 100);

    let p = solver.node_positions();
    assert!(((p[1] - p[0]).norm() - 1.0).abs() < 1e-9);
}

#[test]
fn chain_settles_under_gravity() {
    let mut solver = plain_solver();
    let xs = [0.0, 1.0, 2.0, 3.0];
    solver.add_goal(AnchorGoal::new(t(0.0, 0.0, 0.0), 100.0).unwrap()).unwrap();
    solver.add_goal(AnchorGoal::new(t(3.0, 0.0, 0.0), 100.0).unwrap()).unwrap();
    for w in xs.windows(2) {
        solver.add_goal(LengthGoal::new(t(w[0], 0.0, 0.0), t(w[1], 0.0, 0.0), 10.0).unwrap()).unwrap();
    }
    solver
        .add_goal(ForceGoal::new(vec![t(1.0, 0.0, 0.0), t(2.0, 0.0, 0.0)], t(0.0, 0.0, -0.01), 1.0).unwrap())
        .unwrap();
    assert_eq!(solver.node_count(), 4);

    solver.execute(5000, 1e-16);
    let p = solver.node_positions();
    assert!(p[1].z < 0.0 && p[2].z < 0.0, "chain did not sag: {p:?}");
    assert!(p[0].norm() < 1e-2);
}

#[test]
fn goal_change_through_solver() {
    let mut solver = plain_solver();
    let index = solver.add_goal(AnchorGoal::new(t(0.0, 0.0, 0.0), 1.0).unwrap()).unwrap();
    solver
        .goal_mut::<AnchorGoal>(index)
        .unwrap()
        .change(Some(t(2.0, 0.0, 0.0)), None)
        .unwrap();
    assert!(solver.goal_mut::<LengthGoal>(index).is_none());

    solver.iterate();
    assert!(close(&solver.node_positions()[0], &t(2.0, 0.0, 0.0), 1e-12));
    assert_eq!(solver.goal::<AnchorGoal>(index).unwrap().target, t(2.0, 0.0, 0.0));
}

#[test]
fn reset_and_clear() {
    let mut solver = plain_solver();
    solver
        .add_goal(AnchorGoal::with_target(t(0.0, 0.0, 0.0), t(1.0, 0.0, 0.0), 1.0).unwrap())
        .unwrap();
    solver.iterate_n(3);
    assert!(close(&solver.node_positions()[0], &t(1.0, 0.0, 0.0), 1e-12));

    solver.reset();
    assert_eq!(solver.node_positions()[0], t(0.0, 0.0, 0.0));
    assert_eq!(solver.kinetic_energy(), 0.0);
    assert_eq!(solver.current_iteration(), 0);

    solver.clear();
    assert_eq!(solver.node_count(), 0);
    assert_eq!(solver.goal_count(), 0);
    assert!(matches!(solver.node_position(0), Err(SolverError::UnknownNode(0))));
}

#[test]
fn binders_share_nodes_with_goals() {
    let mut solver = plain_solver();
    solver
        .add_goal(AnchorGoal::with_target(t(0.0, 0.0, 0.0), t(1.0, 1.0, 1.0), 1.0).unwrap())
        .unwrap();
    solver
        .add_geometry_binder(GeometryBinder::polyline(vec![t(0.0, 0.0, 0.0), t(2.0, 0.0, 0.0)], false).unwrap())
        .unwrap();
    assert_eq!(solver.node_count(), 2);

    solver.iterate();
    match solver.bound_geometry().as_slice() {
        [BoundGeometry::Polyline { points, closed: false }] => {
            assert!(close(&points[0], &t(1.0, 1.0, 1.0), 1e-12));
            assert_eq!(points[1], t(2.0, 0.0, 0.0));
        }
        other => panic!("unexpected geometry {other:?}"),
    }
}

#[test]
fn goal_outputs_report_current_values() {
    let mut solver = plain_solver();
    solver
        .add_goal(LengthGoal::with_length(t(0.0, 0.0, 0.0), t(3.0, 0.0, 0.0), 1.0, 1.0).unwrap())
        .unwrap();
    solver.iterate();

    let outputs = solver.goal_outputs();
    assert_eq!(outputs[0].0, "LengthGoal");
    match outputs[0].1.as_slice() {
        [GoalOutput::Scalar(d)] => assert!((d - 1.0).abs() < 1e-12),
        other => panic!("unexpected output {other:?}"),
    }
}

// ==================================================================================
// Interaction tests
// ==================================================================================

#[test]
fn grabbed_node_is_pulled_toward_pointer() {
    let mut solver = Solver::new(SolverParams::default().with_momentum(false).with_mouse_interaction(true));
    solver.add_goal(AnchorGoal::new(t(0.0, 0.0, 0.0), 1.0).unwrap()).unwrap();
    solver.add_goal(AnchorGoal::new(t(5.0, 0.0, 0.0), 1.0).unwrap()).unwrap();

    let handle = solver.interaction_handle();
    let ray = Ray::new(t(1.0, 0.0, 10.0), t(0.0, 0.0, -1.0)).unwrap();
    assert!(handle.pointer_moved(ray));
    assert!(handle.grab());
    solver.iterate();

    assert_eq!(solver.interaction().handle_node(), Some(0));
    let x = solver.node_positions()[0].x;
    assert!((x - 30.0 / 31.0).abs() < 1e-12, "x = {x}");

    handle.release();
    solver.iterate();
    assert_eq!(solver.interaction().handle_node(), None);
    assert!(solver.node_positions()[0].norm() < 1e-12);
}

#[test]
fn pointer_is_ignored_when_interaction_disabled() {
    let mut solver = plain_solver();
    solver.add_goal(AnchorGoal::new(t(0.0, 0.0, 0.0), 1.0).unwrap()).unwrap();

    let handle = solver.interaction_handle();
    handle.pointer_moved(Ray::new(t(1.0, 0.0, 10.0), t(0.0, 0.0, -1.0)).unwrap());
    handle.send(InteractionCommand::SetHandle(Some(0)));
    solver.iterate();

    assert_eq!(solver.node_positions()[0], t(0.0, 0.0, 0.0));
}

// ==================================================================================
// Background execution tests
// ==================================================================================

#[test]
fn background_execution_starts_and_stops() {
    let mut solver = Solver::default();
    solver
        .add_goal(LengthGoal::with_length(t(0.0, 0.0, 0.0), t(3.0, 0.0, 0.0), 1.0, 1.0).unwrap())
        .unwrap();
    let shared = Arc::new(Mutex::new(solver));

    let renders = Arc::new(AtomicUsize::new(0));
    let hook_renders = Arc::clone(&renders);
    let hook: RenderHook = Box::new(move |positions: &[Triple]| {
        assert_eq!(positions.len(), 2);
        hook_renders.fetch_add(1, Ordering::SeqCst);
    });

    let mut background = BackgroundExecution::start(Arc::clone(&shared), Some(hook));
    let deadline = Instant::now() + Duration::from_secs(5);
    while background.ticks() < 2 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }

    background.stop(Duration::from_secs(5)).unwrap();
    assert!(!background.is_running());
    assert!(renders.load(Ordering::SeqCst) >= 2);
    assert_eq!(renders.load(Ordering::SeqCst), background.ticks());
    assert!(shared.lock().current_iteration() >= 20);

    // second stop is a no-op
    background.stop(Duration::from_millis(10)).unwrap();
}


#[test]
fn background_stop_times_out_while_render_blocks() {
    let mut solver = Solver::default();
    solver
        .add_goal(LengthGoal::with_length(t(0.0, 0.0, 0.0), t(3.0, 0.0, 0.0), 1.0, 1.0).unwrap())
        .unwrap();
    let shared = Arc::new(Mutex::new(solver));

    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let hook: RenderHook = Box::new(move |_positions: &[Triple]| {
        let _ = entered_tx.send(());
        let _ = release_rx.recv();
    });

    let mut background = BackgroundExecution::start(Arc::clone(&shared), Some(hook));
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let timeout = Duration::from_millis(20);
    assert!(matches!(background.stop(timeout), Err(SolverError::StopTimeout(d)) if d == timeout));
    assert!(background.is_running());

    // once the render returns, a second stop joins the thread
    release_tx.send(()).unwrap();
    background.stop(Duration::from_secs(5)).unwrap();
    assert!(!background.is_running());
    assert_eq!(background.ticks(), 1);
}

// ==================================================================================
// SVD tests
// ==================================================================================

#[test]
fn fast_svd_matches_generic_on_random_matrices() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..20 {
        let m = Matrix3::from_fn(|_, _| rng.gen_range(-1.0..1.0));
        let fast = fast_svd3(&m);
        let generic = Svd::decompose(&DMatrix::from_column_slice(3, 3, m.as_slice())).unwrap().sorted();

        for i in 0..3 {
            assert!((fast.s[i].abs() - generic.w[i]).abs() < 1e-4, "{:?} vs {:?}", fast.s, generic.w);
        }
        assert!((fast.recompose() - m).abs().max() < 1e-4);
    }
}

// ==================================================================================
// Configuration tests
// ==================================================================================

#[test]
fn scenario_from_yaml() {
    let yaml = r#"
solver:
  enable_momentum: false
execution:
  max_iterations: 50
goals:
  - type: anchor
    position: [0.0, 0.0, 0.0]
    weight: 100.0
  - type: length
    start: [0.0, 0.0, 0.0]
    end: [3.0, 0.0, 0.0]
    length: 1.0
  - type: on_plane
    points: [[3.0, 0.0, 0.0]]
    origin: [0.0, 0.0, 0.0]
    normal: [0.0, 0.0, 1.0]
  - type: cocircular
    points: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]]
binders:
  - type: points
    points: [[3.0, 0.0, 0.0]]
"#;
    let cfg: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.goals.len(), 4);
    assert_eq!(cfg.execution.max_iterations, 50);
    assert!(matches!(cfg.goals[0], GoalConfig::Anchor { weight, .. } if weight == 100.0));

    let mut scenario = Scenario::build_scenario(cfg).unwrap();
    // anchor, length, plane and binder share two nodes; the circle adds four
    assert_eq!(scenario.solver.node_count(), 6);
    assert_eq!(scenario.solver.goal_count(), 4);
    assert!(!scenario.solver.params.enable_momentum);

    let report = scenario.run();
    assert!(report.iterations <= 50);
}

#[test]
fn scenario_rejects_invalid_goal() {
    let yaml = r#"
goals:
  - type: cospherical
    points: [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]
"#;
    let cfg: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
    assert!(matches!(
        Scenario::build_scenario(cfg),
        Err(SolverError::TooFewNodes { required: 5, .. })
    ));
}
