//! Spread solved node currents over pipe segments for display.
//!
//! Pipes dissolve into nodes during lowering, so the solver never sees them.
//! After a solve, the editor still wants every pipe segment animated in
//! proportion to the flow it carries. This pass derives a per-pipe figure
//! from the solved circuit:
//!
//! - A node's throughput is half the sum of |current| over the component
//!   flows incident to it. Every unit of current enters through one flow and
//!   leaves through another, so summing both and halving counts it once.
//! - Each pipe belonging to the node gets an equal share of the throughput.
//! - The drawing-wide maximum share rides along on every entry so the caller
//!   can normalize animation speed without a second pass.

use std::collections::HashMap;

use crate::solver::Solution;
use crate::topology::SubCircuit;

/// Display flow through one pipe segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipeFlow {
    /// This pipe's share of its node's throughput, in amps.
    pub amps: f64,
    /// The largest share across all pipes in the drawing. Zero only when
    /// every pipe is idle.
    pub max_amps: f64,
}

/// Compute the display flow of every pipe across a set of solved
/// sub-circuits, keyed by pipe name.
pub fn distribute<'a, I>(solved: I) -> HashMap<String, PipeFlow>
where
    I: IntoIterator<Item = (&'a SubCircuit, &'a Solution)>,
{
    let mut shares: HashMap<String, f64> = HashMap::new();

    for (sub, solution) in solved {
        let mut throughput: HashMap<&str, f64> = HashMap::new();
        let flows = solution
            .resistors
            .values()
            .map(|f| (f.amps, f.from.as_str(), f.to.as_str()))
            .chain(
                solution
                    .sources
                    .values()
                    .map(|f| (f.amps, f.from.as_str(), f.to.as_str())),
            );
        for (amps, from, to) in flows {
            *throughput.entry(from).or_default() += amps.abs();
            *throughput.entry(to).or_default() += amps.abs();
        }

        for (node, pipes) in &sub.pipes_by_node {
            let total = throughput.get(node.as_str()).copied().unwrap_or(0.0) / 2.0;
            let share = total / pipes.len() as f64;
            for pipe in pipes {
                shares.insert(pipe.clone(), share);
            }
        }
    }

    let max_amps = shares.values().fold(0.0_f64, |acc, &s| acc.max(s));
    shares
        .into_iter()
        .map(|(pipe, amps)| (pipe, PipeFlow { amps, max_amps }))
        .collect()
}
