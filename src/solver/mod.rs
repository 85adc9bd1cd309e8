//! Symbolic circuit solver.
//!
//! The solver works in three phases:
//!
//! 1. **Reduction** — rewrite the resistor network with the short-circuit,
//!    dead-end, series, parallel and wye-delta rules until one equivalent
//!    resistor remains, recording every step ([`reduce`]).
//! 2. **Back-substitution** — seed the equivalent resistor with
//!    `I = V / R_eq` and replay the recorded steps in reverse, deriving the
//!    current and voltage drop of every original component ([`backsub`]).
//! 3. **Superposition** — for multi-source circuits, run phases 1 and 2 once
//!    per source with every other source shorted, then sum the per-view
//!    results linearly ([`superpose`]).
//!
//! The whole pipeline is synchronous and CPU-bound: a solve request runs to
//! completion in one call or fails outright, and retrying an identical
//! topology fails identically.

mod backsub;
mod reduce;
mod superpose;

pub use reduce::{delta_resistance, Transformation};

use std::collections::HashMap;

use log::debug;

use crate::circuit::{validate_circuit, Circuit, Current};
use crate::error::{PipeworksError, Result};

use reduce::Reduction;
use superpose::{merge_current, merged_source_current, solve_view};

/// Resistance substituted for a voltage source in the superposition views of
/// the other sources. A near-short rather than ideal removal.
pub const SHORT_RESISTANCE: f64 = 1e-11;

/// Solved current and voltage drop for one resistor.
#[derive(Debug, Clone, PartialEq)]
pub struct ResistorFlow {
    /// Current magnitude in amps, >= 0
    pub amps: f64,
    /// Node the current flows out of
    pub from: String,
    /// Node the current flows into
    pub to: String,
    /// Voltage drop in volts, `amps * resistance`
    pub voltage_drop: f64,
}

/// Solved current for one voltage source. Direction is internal, from the
/// negative to the positive terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFlow {
    pub amps: f64,
    pub from: String,
    pub to: String,
}

/// Complete result of one solve: a voltage per node and a flow per
/// component, keyed by name. The caller copies these onto its own
/// long-lived component objects; the solved circuit itself is discarded.
#[derive(Debug, Clone, Default)]
pub struct Solution {
    pub node_voltages: HashMap<String, f64>,
    pub resistors: HashMap<String, ResistorFlow>,
    pub sources: HashMap<String, SourceFlow>,
}

/// Solve a circuit: validate, reduce, back-substitute, and (for multiple
/// sources) superpose. Pure function of the input snapshot; no partial
/// results on failure.
pub fn solve(circuit: &Circuit) -> Result<Solution> {
    validate_circuit(circuit)?;

    let multi = circuit.sources().len() > 1;
    debug!(
        "solving circuit: {} nodes, {} resistors, {} sources",
        circuit.nodes().len(),
        circuit.resistors().len(),
        circuit.sources().len()
    );

    let views = (0..circuit.sources().len())
        .map(|i| solve_view(circuit, i, multi))
        .collect::<Result<Vec<Reduction>>>()?;

    merge_views(circuit, &views)
}

fn merge_views(circuit: &Circuit, views: &[Reduction]) -> Result<Solution> {
    let mut solution = Solution::default();

    for (i, node) in circuit.nodes().iter().enumerate() {
        // A node left unset by every view sits on a zero-current dead
        // branch and reads as gauge zero, same as an isolated dead end.
        let voltage: f64 = views
            .iter()
            .map(|view| view.voltages[i].unwrap_or(0.0))
            .sum();
        solution.node_voltages.insert(node.name.clone(), voltage);
    }

    for (i, resistor) in circuit.resistors().iter().enumerate() {
        let mut acc: Option<Current> = None;
        for view in views {
            let current = view.resistors[i].current.ok_or_else(|| {
                PipeworksError::inconsistent(format!(
                    "resistor '{}' has no solved current",
                    resistor.name
                ))
            })?;
            acc = Some(match acc {
                None => current,
                Some(prev) => merge_current(prev, current),
            });
        }
        let current = acc.ok_or_else(|| PipeworksError::inconsistent("no views to merge"))?;
        solution.resistors.insert(
            resistor.name.clone(),
            ResistorFlow {
                amps: current.amps,
                from: circuit.node_name(current.from).to_string(),
                to: circuit.node_name(current.to).to_string(),
                voltage_drop: current.amps * resistor.resistance,
            },
        );
    }

    for (k, source) in circuit.sources().iter().enumerate() {
        let current = merged_source_current(views, k, &source.name)?;
        solution.sources.insert(
            source.name.clone(),
            SourceFlow {
                amps: current.amps,
                from: circuit.node_name(current.from).to_string(),
                to: circuit.node_name(current.to).to_string(),
            },
        );
    }

    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn golden_circuit() -> Circuit {
        let mut c = Circuit::new();
        for n in ["a", "b", "c", "d"] {
            c.add_node(n).unwrap();
        }
        c.add_resistor("AB", 6.0, "a", "b").unwrap();
        c.add_resistor("AC", 8.0, "a", "c").unwrap();
        c.add_resistor("BC", 4.0, "b", "c").unwrap();
        c.add_resistor("BD", 8.0, "b", "d").unwrap();
        c.add_resistor("CD", 10.0, "c", "d").unwrap();
        c.add_source("V0", 8.0, "a", "d").unwrap();
        c
    }

    /// Net current into every node, summed over all component flows.
    fn kirchhoff_residuals(solution: &Solution) -> HashMap<String, f64> {
        let mut net: HashMap<String, f64> = HashMap::new();
        let flows = solution
            .resistors
            .values()
            .map(|f| (f.amps, f.from.clone(), f.to.clone()))
            .chain(
                solution
                    .sources
                    .values()
                    .map(|f| (f.amps, f.from.clone(), f.to.clone())),
            );
        for (amps, from, to) in flows {
            *net.entry(from).or_default() -= amps;
            *net.entry(to).or_default() += amps;
        }
        net
    }

    #[test]
    fn test_golden_network_pinned_results() {
        // Regression baseline computed once from a reference run.
        let solution = solve(&golden_circuit()).unwrap();

        assert_relative_eq!(solution.node_voltages["a"], 8.0, max_relative = 1e-9);
        assert_relative_eq!(
            solution.node_voltages["b"],
            848.0 / 187.0,
            max_relative = 1e-9
        );
        assert_relative_eq!(
            solution.node_voltages["c"],
            10920.0 / 2431.0,
            max_relative = 1e-9
        );
        assert_relative_eq!(solution.node_voltages["d"], 0.0, epsilon = 1e-9);

        let expected = [
            ("AB", 108.0 / 187.0, "a", "b"),
            ("AC", 82.0 / 187.0, "a", "c"),
            ("BC", 2.0 / 187.0, "b", "c"),
            ("BD", 106.0 / 187.0, "b", "d"),
            ("CD", 84.0 / 187.0, "c", "d"),
        ];
        for (name, amps, from, to) in expected {
            let flow = &solution.resistors[name];
            assert_relative_eq!(flow.amps, amps, max_relative = 1e-9);
            assert_eq!(flow.from, from, "direction of {name}");
            assert_eq!(flow.to, to, "direction of {name}");
        }

        // Total source current I = V / R_eq = 8 / (748/95)
        let source = &solution.sources["V0"];
        assert_relative_eq!(source.amps, 190.0 / 187.0, max_relative = 1e-9);
        assert_eq!(source.from, "d");
        assert_eq!(source.to, "a");
    }

    #[test]
    fn test_kirchhoff_current_law() {
        let solution = solve(&golden_circuit()).unwrap();
        for (node, residual) in kirchhoff_residuals(&solution) {
            assert!(
                residual.abs() < 1e-9,
                "net current at node '{node}' is {residual}"
            );
        }
    }

    #[test]
    fn test_drop_equals_current_times_resistance() {
        let circuit = golden_circuit();
        let solution = solve(&circuit).unwrap();
        for resistor in circuit.resistors() {
            let flow = &solution.resistors[&resistor.name];
            assert_relative_eq!(
                flow.voltage_drop,
                flow.amps * resistor.resistance,
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn test_superposition_disjoint_sources() {
        // Two sources on disjoint resistor paths sharing one node: merged
        // node voltages must equal the sum of the single-source solves.
        let mut c = Circuit::new();
        for n in ["a", "b", "c"] {
            c.add_node(n).unwrap();
        }
        c.add_resistor("R1", 5.0, "a", "b").unwrap();
        c.add_resistor("R2", 2.0, "c", "b").unwrap();
        c.add_source("V1", 10.0, "a", "b").unwrap();
        c.add_source("V2", 4.0, "c", "b").unwrap();

        let solution = solve(&c).unwrap();
        assert_relative_eq!(solution.node_voltages["a"], 10.0, max_relative = 1e-6);
        assert_relative_eq!(solution.node_voltages["b"], 0.0, epsilon = 1e-6);
        assert_relative_eq!(solution.node_voltages["c"], 4.0, max_relative = 1e-6);

        let r1 = &solution.resistors["R1"];
        assert_relative_eq!(r1.amps, 2.0, max_relative = 1e-6);
        assert_eq!((r1.from.as_str(), r1.to.as_str()), ("a", "b"));

        let r2 = &solution.resistors["R2"];
        assert_relative_eq!(r2.amps, 2.0, max_relative = 1e-6);
        assert_eq!((r2.from.as_str(), r2.to.as_str()), ("c", "b"));

        assert_relative_eq!(solution.sources["V1"].amps, 2.0, max_relative = 1e-6);
        assert_relative_eq!(solution.sources["V2"].amps, 2.0, max_relative = 1e-6);
    }

    #[test]
    fn test_multi_source_shared_path() {
        // Two sources driving a shared resistor chain, checked against
        // Kirchhoff instead of pinned values. The near-short substitution
        // keeps the law within its approximation error.
        let mut c = Circuit::new();
        for n in ["alpha", "beta", "gamma", "delta", "epsilon"] {
            c.add_node(n).unwrap();
        }
        c.add_resistor("A", 8.0, "alpha", "beta").unwrap();
        c.add_resistor("B", 6.0, "beta", "delta").unwrap();
        c.add_resistor("C", 3.0, "beta", "gamma").unwrap();
        c.add_resistor("D", 4.0, "delta", "epsilon").unwrap();
        c.add_source("V0", 6.0, "epsilon", "alpha").unwrap();
        c.add_source("V1", 3.0, "gamma", "delta").unwrap();

        let solution = solve(&c).unwrap();
        for (node, residual) in kirchhoff_residuals(&solution) {
            assert!(
                residual.abs() < 1e-6,
                "net current at node '{node}' is {residual}"
            );
        }
        // Terminal difference reproduces each source voltage
        assert_relative_eq!(
            solution.node_voltages["epsilon"] - solution.node_voltages["alpha"],
            6.0,
            max_relative = 1e-6
        );
        assert_relative_eq!(
            solution.node_voltages["gamma"] - solution.node_voltages["delta"],
            3.0,
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_failure_returns_no_partial_results() {
        let mut c = Circuit::new();
        let names = ["a", "b", "c", "d", "e"];
        for n in names {
            c.add_node(n).unwrap();
        }
        let mut idx = 0;
        for i in 0..names.len() {
            for j in (i + 1)..names.len() {
                c.add_resistor(format!("R{idx}"), 1.0, names[i], names[j])
                    .unwrap();
                idx += 1;
            }
        }
        c.add_source("V0", 5.0, "a", "b").unwrap();

        assert!(matches!(
            solve(&c),
            Err(PipeworksError::UnreducibleTopology { .. })
        ));
    }
}
