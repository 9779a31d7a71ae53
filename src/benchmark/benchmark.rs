use std::time::Instant;

use nalgebra::{DMatrix, Matrix3};

use crate::error::Result;
use crate::goals::{AnchorGoal, ForceGoal, LengthGoal};
use crate::math::fast_svd::fast_svd3;
use crate::math::svd::Svd;
use crate::math::triple::Triple;
use crate::simulation::engine::Solver;
use crate::simulation::params::SolverParams;

/// Square cloth of `n x n` nodes: edge springs, two pinned corners, gravity
pub fn make_cloth(n: usize) -> Result<Solver> {
    let mut solver = Solver::new(SolverParams::default());
    let at = |i: usize, j: usize| Triple::new(i as f64, j as f64, 0.0);

    let mut all = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            all.push(at(i, j));
            if i + 1 < n {
                solver.add_goal(LengthGoal::new(at(i, j), at(i + 1, j), 1.0)?)?;
            }
            if j + 1 < n {
                solver.add_goal(LengthGoal::new(at(i, j), at(i, j + 1), 1.0)?)?;
            }
        }
    }

    let last = n.saturating_sub(1);
    solver.add_goal(AnchorGoal::new(at(0, last), 100.0)?)?;
    solver.add_goal(AnchorGoal::new(at(last, last), 100.0)?)?;
    solver.add_goal(ForceGoal::new(all, Triple::new(0.0, 0.0, -0.01), 1.0)?)?;
    Ok(solver)
}

/// Time one solver iteration on growing cloth grids
pub fn bench_iterate() -> Result<()> {
    let ns = [10, 20, 40, 80, 160];
    let steps = 20; // iterations per size

    for n in ns {
        let t_build = Instant::now();
        let mut solver = make_cloth(n)?;
        let build = t_build.elapsed().as_secs_f64();

        // Warm up
        solver.iterate();

        let t0 = Instant::now();
        solver.iterate_n(steps);
        let per_iteration = t0.elapsed().as_secs_f64() / steps as f64;

        println!(
            "grid = {n:4}x{n:<4} nodes = {:6}, goals = {:6}, build = {:8.6} s, iteration = {:8.6} s",
            solver.node_count(),
            solver.goal_count(),
            build,
            per_iteration
        );
    }
    Ok(())
}

/// Deterministic 3x3 test matrix, no rand needed
fn make_matrix3(k: usize) -> Matrix3<f64> {
    let k_f = k as f64;
    Matrix3::from_fn(|r, c| {
        let x = k_f * 0.37 + (3 * r + c) as f64 * 1.3;
        x.sin() * 5.0
    })
}

/// Compare the fixed-sweep 3x3 SVD with the generic one
pub fn bench_svd() -> Result<()> {
    let counts = [1_000, 10_000, 100_000];

    for count in counts {
        let matrices: Vec<Matrix3<f64>> = (0..count).map(make_matrix3).collect();

        let t0 = Instant::now();
        let mut checksum_fast = 0.0;
        for m in &matrices {
            checksum_fast += fast_svd3(m).s.x;
        }
        let dt_fast = t0.elapsed().as_secs_f64();

        let t1 = Instant::now();
        let mut checksum_generic = 0.0;
        for m in &matrices {
            let dm = DMatrix::from_column_slice(3, 3, m.as_slice());
            checksum_generic += Svd::decompose(&dm)?.w.max();
        }
        let dt_generic = t1.elapsed().as_secs_f64();

        println!(
            "count = {count:7}, fast = {dt_fast:8.6} s, generic = {dt_generic:8.6} s, max sum diff = {:.3e}",
            (checksum_fast - checksum_generic).abs()
        );
    }
    Ok(())
}
