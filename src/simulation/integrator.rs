//! Per-iteration node updates
//!
//! The solver's iteration is drift, parallel goal compute, then the
//! single-threaded steps here: accumulate every goal's weighted moves per
//! node and apply the weighted average, updating velocity for momentum

use crate::goals::goal::Goal;
use crate::math::triple::Triple;
use crate::simulation::params::SolverParams;
use crate::simulation::states::Node;

/// Forward drift before constraint resolution: x += v
pub fn drift(nodes: &mut [Node]) {
    for n in nodes.iter_mut() {
        n.position += n.velocity;
    }
}

/// Zero the accumulators and sum `move * weight` and `weight` per node over all goals
pub fn accumulate(goals: &[Box<dyn Goal>], move_sums: &mut [Triple], weight_sums: &mut [f64]) {
    move_sums.iter_mut().for_each(|m| *m = Triple::zeros());
    weight_sums.iter_mut().for_each(|w| *w = 0.0);

    for goal in goals {
        let state = goal.state();
        for (i, &idx) in state.node_indices.iter().enumerate() {
            let w = state.weights[i];
            move_sums[idx] += state.moves[i] * w;
            weight_sums[idx] += w;
        }
    }
}

/// Add an extra weighted pull toward `target` on one node
pub fn add_pull(
    nodes: &[Node],
    index: usize,
    target: &Triple,
    weight: f64,
    move_sums: &mut [Triple],
    weight_sums: &mut [f64],
) {
    move_sums[index] += (target - nodes[index].position) * weight;
    weight_sums[index] += weight;
}

/// Move every node with accumulated weight by its weighted-average move.
///
/// With momentum the move is added to the velocity, and the result is damped
/// when the move opposes the velocity the node came in with. Without momentum
/// the velocity is simply the last move.
pub fn apply_moves(nodes: &mut [Node], move_sums: &[Triple], weight_sums: &[f64], params: &SolverParams) {
    for ((node, sum), &w) in nodes.iter_mut().zip(move_sums).zip(weight_sums) {
        if w == 0.0 {
            if !params.enable_momentum {
                node.velocity = Triple::zeros();
            }
            continue;
        }
        let mv = sum / w;
        node.position += mv;

        if params.enable_momentum {
            let opposing = node.velocity.dot(&mv) < 0.0;
            node.velocity += mv;
            if opposing {
                node.velocity *= params.damping_factor;
            }
        } else {
            node.velocity = mv;
        }
    }
}
