//! Circuit reduction engine.
//!
//! Repeatedly rewrites the resistor network with five rules until a single
//! equivalent resistor remains, recording every applied transformation. The
//! rules are tried in a fixed priority order each iteration, first match
//! wins, one transformation per iteration:
//!
//! 1. Short-circuit: remove a resistor whose endpoints are the same node
//! 2. Dead-end: remove the only resistor touching a degree-1 node
//! 3. Series: merge the two resistors meeting at a degree-2 node
//! 4. Parallel: merge resistors sharing the same unordered node pair
//! 5. Wye-Delta: rewrite the three resistors meeting at a degree-3 node
//!
//! The two source terminal nodes are never dead-end, series or wye-center
//! candidates, whatever their degree. Candidate nodes and resistors are
//! ordered lexicographically by name so that rule selection is reproducible.

use std::collections::BTreeMap;

use log::{debug, trace};

use crate::circuit::{Circuit, Node, NodeId, Resistor, ResistorId, VoltageSource};
use crate::error::{PipeworksError, Result};

use super::SHORT_RESISTANCE;

/// One applied rewrite step. The ordered sequence of transformations is the
/// reduction history: an append-only log that losslessly describes how to go
/// from the original resistor set to the single equivalent resistor, and is
/// consulted only in reverse during back-substitution.
#[derive(Debug, Clone)]
pub enum Transformation {
    /// Removal of a resistor whose two endpoints are the same node
    ShortCircuit { removed: ResistorId },
    /// Removal of the only resistor touching a node, isolating that node
    DeadEnd {
        removed: ResistorId,
        dead_node: NodeId,
    },
    /// Two resistors sharing an eliminated middle node merged into one
    Series {
        consumed: [ResistorId; 2],
        merged: ResistorId,
    },
    /// Resistors over the same node pair merged into one
    Parallel {
        consumed: Vec<ResistorId>,
        merged: ResistorId,
    },
    /// Star of three resistors `[a, b, c]` around an eliminated center node
    /// rewritten as the triangle `[ab, ac, bc]` over their outer nodes.
    /// Produced resistors pair positionally with the consumed ones: `a`
    /// combines with `ab` and `ac`, `b` with `ab` and `bc`, `c` with `ac`
    /// and `bc`.
    WyeDelta {
        consumed: [ResistorId; 3],
        produced: [ResistorId; 3],
    },
}

/// Working state for one single-source reduction.
///
/// Resistors live in an arena that only grows: the input resistors first,
/// then every composite created by a rule. A live flag marks the active set,
/// so rules never delete from a collection they are iterating.
#[derive(Debug, Clone)]
pub(crate) struct Reduction {
    pub nodes: Vec<Node>,
    /// Per-node solved voltage, filled during back-substitution
    pub voltages: Vec<Option<f64>>,
    pub resistors: Vec<Resistor>,
    pub live: Vec<bool>,
    pub source: VoltageSource,
    pub history: Vec<Transformation>,
    /// Arena ids of the near-short resistors standing in for other sources,
    /// keyed by source index in the parent circuit
    pub replaced_sources: Vec<(usize, ResistorId)>,
}

impl Reduction {
    /// Build a single-source view of `circuit` driven by `source`.
    pub(crate) fn new(circuit: &Circuit, source: VoltageSource) -> Self {
        let resistors: Vec<Resistor> = circuit.resistors().to_vec();
        let live = vec![true; resistors.len()];
        Self {
            nodes: circuit.nodes().to_vec(),
            voltages: vec![None; circuit.nodes().len()],
            resistors,
            live,
            source,
            history: Vec::new(),
            replaced_sources: Vec::new(),
        }
    }

    /// Substitute another source by a near-zero resistor bridging its
    /// terminals. This is the superposition approximation: a real short, not
    /// source removal.
    pub(crate) fn replace_source(&mut self, source_index: usize, other: &VoltageSource) {
        let id = self.push_resistor(
            other.name.clone(),
            SHORT_RESISTANCE,
            [other.pos, other.neg],
        );
        self.replaced_sources.push((source_index, id));
    }

    /// Reduce the network to a single resistor, returning its arena id.
    pub(crate) fn reduce(&mut self) -> Result<ResistorId> {
        loop {
            let live = self.live_ids();
            match live.len() {
                0 => return Err(PipeworksError::MissingResistor),
                1 => {
                    debug!(
                        "reduced to '{}' ({} ohm) in {} steps",
                        self.resistors[live[0].0].name,
                        self.resistors[live[0].0].resistance,
                        self.history.len()
                    );
                    return Ok(live[0]);
                }
                _ => {}
            }

            if self.apply_short_circuit()
                || self.apply_dead_end()
                || self.apply_series()
                || self.apply_parallel()
                || self.apply_wye_delta()
            {
                continue;
            }

            return Err(self.unreducible());
        }
    }

    // ============ Rules ============

    fn apply_short_circuit(&mut self) -> bool {
        let mut shorts: Vec<ResistorId> = self
            .live_ids()
            .into_iter()
            .filter(|id| {
                let r = &self.resistors[id.0];
                r.nodes[0] == r.nodes[1]
            })
            .collect();
        self.sort_resistors_by_name(&mut shorts);

        if let Some(&id) = shorts.first() {
            trace!("short-circuit: removing '{}'", self.resistors[id.0].name);
            self.live[id.0] = false;
            self.history.push(Transformation::ShortCircuit { removed: id });
            return true;
        }
        false
    }

    fn apply_dead_end(&mut self) -> bool {
        let degrees = self.degrees();
        for node in self.candidate_nodes(&degrees, 1) {
            let touching = self.resistors_at(node);
            if let &[id] = touching.as_slice() {
                trace!(
                    "dead-end: removing '{}' at node '{}'",
                    self.resistors[id.0].name,
                    self.nodes[node.0].name
                );
                self.live[id.0] = false;
                self.history.push(Transformation::DeadEnd {
                    removed: id,
                    dead_node: node,
                });
                return true;
            }
        }
        false
    }

    fn apply_series(&mut self) -> bool {
        let degrees = self.degrees();
        for mid in self.candidate_nodes(&degrees, 2) {
            let touching = self.resistors_at(mid);
            let &[a, b] = touching.as_slice() else { continue };
            // Two resistors over the same node pair are a parallel group,
            // not a series chain; merging them here would produce a resistor
            // with a single endpoint.
            if self.resistors[a.0].same_pair(&self.resistors[b.0]) {
                continue;
            }

            let end_a = self.resistors[a.0].other_end(mid);
            let end_b = self.resistors[b.0].other_end(mid);
            let resistance = self.resistors[a.0].resistance + self.resistors[b.0].resistance;
            let name = format!("{}{}", self.resistors[a.0].name, self.resistors[b.0].name);

            // end_a == end_b is allowed: the merged self-loop is picked up
            // by the short-circuit rule on the next iteration.
            let merged = self.push_resistor(name, resistance, [end_a, end_b]);
            self.live[a.0] = false;
            self.live[b.0] = false;
            trace!(
                "series: '{}' + '{}' -> '{}' ({} ohm)",
                self.resistors[a.0].name,
                self.resistors[b.0].name,
                self.resistors[merged.0].name,
                resistance
            );
            self.history.push(Transformation::Series {
                consumed: [a, b],
                merged,
            });
            return true;
        }
        false
    }

    fn apply_parallel(&mut self) -> bool {
        // Group live resistors by unordered endpoint pair, keyed by node
        // names for deterministic group selection.
        let mut groups: BTreeMap<(String, String), Vec<ResistorId>> = BTreeMap::new();
        for id in self.live_ids() {
            let r = &self.resistors[id.0];
            let mut key = (
                self.nodes[r.nodes[0].0].name.clone(),
                self.nodes[r.nodes[1].0].name.clone(),
            );
            if key.0 > key.1 {
                std::mem::swap(&mut key.0, &mut key.1);
            }
            groups.entry(key).or_default().push(id);
        }

        for (_, group) in groups {
            if group.len() < 2 {
                continue;
            }
            let conductance: f64 = group
                .iter()
                .map(|id| 1.0 / self.resistors[id.0].resistance)
                .sum();
            let resistance = 1.0 / conductance;
            let name: String = group
                .iter()
                .map(|id| self.resistors[id.0].name.as_str())
                .collect();
            let nodes = self.resistors[group[0].0].nodes;

            let merged = self.push_resistor(name, resistance, nodes);
            for &id in &group {
                self.live[id.0] = false;
            }
            trace!(
                "parallel: {} resistors -> '{}' ({} ohm)",
                group.len(),
                self.resistors[merged.0].name,
                resistance
            );
            self.history.push(Transformation::Parallel {
                consumed: group,
                merged,
            });
            return true;
        }
        false
    }

    fn apply_wye_delta(&mut self) -> bool {
        let degrees = self.degrees();
        for center in self.candidate_nodes(&degrees, 3) {
            let mut touching = self.resistors_at(center);
            if touching.len() != 3 {
                continue;
            }
            self.sort_resistors_by_name(&mut touching);
            let [a, b, c] = [touching[0], touching[1], touching[2]];

            let d = self.delta_edge(a, b, c, center);
            let e = self.delta_edge(a, c, b, center);
            let f = self.delta_edge(b, c, a, center);
            self.live[a.0] = false;
            self.live[b.0] = false;
            self.live[c.0] = false;
            trace!(
                "wye-delta at node '{}': '{}', '{}', '{}'",
                self.nodes[center.0].name,
                self.resistors[a.0].name,
                self.resistors[b.0].name,
                self.resistors[c.0].name
            );
            self.history.push(Transformation::WyeDelta {
                consumed: [a, b, c],
                produced: [d, e, f],
            });
            return true;
        }
        false
    }

    /// Create the delta resistor spanning the outer nodes of `a` and `b`.
    fn delta_edge(&mut self, a: ResistorId, b: ResistorId, other: ResistorId, center: NodeId) -> ResistorId {
        let resistance = delta_resistance(
            self.resistors[a.0].resistance,
            self.resistors[b.0].resistance,
            self.resistors[other.0].resistance,
        );
        let nodes = [
            self.resistors[a.0].other_end(center),
            self.resistors[b.0].other_end(center),
        ];
        let name = format!("{}{}", self.resistors[a.0].name, self.resistors[b.0].name);
        self.push_resistor(name, resistance, nodes)
    }

    // ============ Helpers ============

    pub(crate) fn push_resistor(
        &mut self,
        name: String,
        resistance: f64,
        nodes: [NodeId; 2],
    ) -> ResistorId {
        let id = ResistorId(self.resistors.len());
        self.resistors.push(Resistor::new(name, resistance, nodes));
        self.live.push(true);
        id
    }

    pub(crate) fn live_ids(&self) -> Vec<ResistorId> {
        self.live
            .iter()
            .enumerate()
            .filter(|(_, &alive)| alive)
            .map(|(i, _)| ResistorId(i))
            .collect()
    }

    /// Number of live resistor endpoints touching each node. A self-loop
    /// counts twice.
    fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0usize; self.nodes.len()];
        for id in self.live_ids() {
            let r = &self.resistors[id.0];
            degrees[r.nodes[0].0] += 1;
            degrees[r.nodes[1].0] += 1;
        }
        degrees
    }

    fn is_terminal(&self, node: NodeId) -> bool {
        node == self.source.pos || node == self.source.neg
    }

    /// Non-terminal nodes of the given degree, ordered by name.
    fn candidate_nodes(&self, degrees: &[usize], degree: usize) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = (0..self.nodes.len())
            .map(NodeId)
            .filter(|&n| degrees[n.0] == degree && !self.is_terminal(n))
            .collect();
        nodes.sort_by(|a, b| self.nodes[a.0].name.cmp(&self.nodes[b.0].name));
        nodes
    }

    fn resistors_at(&self, node: NodeId) -> Vec<ResistorId> {
        self.live_ids()
            .into_iter()
            .filter(|id| self.resistors[id.0].touches(node))
            .collect()
    }

    fn sort_resistors_by_name(&self, ids: &mut [ResistorId]) {
        ids.sort_by(|a, b| self.resistors[a.0].name.cmp(&self.resistors[b.0].name));
    }

    fn unreducible(&self) -> PipeworksError {
        let live = self.live_ids();
        let resistors: Vec<String> = live
            .iter()
            .map(|id| self.resistors[id.0].name.clone())
            .collect();
        let mut nodes: Vec<String> = live
            .iter()
            .flat_map(|id| self.resistors[id.0].nodes)
            .map(|n| self.nodes[n.0].name.clone())
            .collect();
        nodes.sort();
        nodes.dedup();
        PipeworksError::UnreducibleTopology { resistors, nodes }
    }
}

/// Resistance of the delta edge spanning the outer nodes of `ra` and `rb` in
/// a wye-delta rewrite: `ra + rb + ra*rb/r_other`.
pub fn delta_resistance(ra: f64, rb: f64, r_other: f64) -> f64 {
    ra + rb + ra * rb / r_other
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_source_view(circuit: &Circuit) -> Reduction {
        let mut source = circuit.sources()[0].clone();
        source.current = None;
        Reduction::new(circuit, source)
    }

    #[test]
    fn test_series_rule() {
        let mut c = Circuit::new();
        for n in ["a", "b", "c"] {
            c.add_node(n).unwrap();
        }
        c.add_resistor("A", 6.0, "a", "b").unwrap();
        c.add_resistor("B", 8.0, "b", "c").unwrap();
        c.add_source("V0", 8.0, "a", "c").unwrap();

        let mut red = single_source_view(&c);
        let eq = red.reduce().unwrap();
        assert_eq!(red.resistors[eq.0].resistance, 14.0);
        assert_eq!(red.history.len(), 1);
        assert!(matches!(red.history[0], Transformation::Series { .. }));
    }

    #[test]
    fn test_parallel_rule_halves_equal_resistance() {
        let mut c = Circuit::new();
        c.add_node("a").unwrap();
        c.add_node("b").unwrap();
        c.add_resistor("A", 10.0, "a", "b").unwrap();
        c.add_resistor("B", 10.0, "a", "b").unwrap();
        c.add_source("V0", 5.0, "a", "b").unwrap();

        let mut red = single_source_view(&c);
        let eq = red.reduce().unwrap();
        assert!((red.resistors[eq.0].resistance - 5.0).abs() < 1e-12);
        assert!(matches!(red.history[0], Transformation::Parallel { .. }));
    }

    #[test]
    fn test_delta_resistance_balanced_star() {
        // A balanced star of R each becomes a balanced delta of 3R each
        assert!((delta_resistance(6.0, 6.0, 6.0) - 18.0).abs() < 1e-12);
        assert!((delta_resistance(1.5, 1.5, 1.5) - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_short_circuit_removed_first() {
        let mut c = Circuit::new();
        c.add_node("a").unwrap();
        c.add_node("b").unwrap();
        c.add_resistor("A", 5.0, "a", "b").unwrap();
        c.add_resistor("Loop", 3.0, "b", "b").unwrap();
        c.add_source("V0", 10.0, "a", "b").unwrap();

        let mut red = single_source_view(&c);
        let eq = red.reduce().unwrap();
        assert_eq!(red.resistors[eq.0].name, "A");
        assert!(matches!(
            red.history[0],
            Transformation::ShortCircuit { .. }
        ));
    }

    #[test]
    fn test_dead_end_removed() {
        let mut c = Circuit::new();
        for n in ["a", "b", "c"] {
            c.add_node(n).unwrap();
        }
        c.add_resistor("A", 5.0, "a", "b").unwrap();
        c.add_resistor("Stub", 7.0, "b", "c").unwrap();
        c.add_source("V0", 10.0, "a", "b").unwrap();

        let mut red = single_source_view(&c);
        let eq = red.reduce().unwrap();
        assert_eq!(red.resistors[eq.0].name, "A");
        assert!(matches!(
            red.history[0],
            Transformation::DeadEnd { dead_node, .. } if red.nodes[dead_node.0].name == "c"
        ));
    }

    #[test]
    fn test_terminal_nodes_never_series_candidates() {
        // a - A - b - B - c with the source across a and c: b is the only
        // series candidate even though a and c also have low degree.
        let mut c = Circuit::new();
        for n in ["a", "b", "c"] {
            c.add_node(n).unwrap();
        }
        c.add_resistor("A", 2.0, "a", "b").unwrap();
        c.add_resistor("B", 3.0, "b", "c").unwrap();
        c.add_source("V0", 1.0, "a", "c").unwrap();

        let mut red = single_source_view(&c);
        red.reduce().unwrap();
        let Transformation::Series { merged, .. } = red.history[0] else {
            panic!("expected series");
        };
        let ends = red.resistors[merged.0].nodes;
        let names: Vec<&str> = ends.iter().map(|n| red.nodes[n.0].name.as_str()).collect();
        assert!(names.contains(&"a") && names.contains(&"c"));
    }

    #[test]
    fn test_same_pair_resistors_are_not_series() {
        // Two resistors over the same pair form a loop through a degree-2
        // node; the parallel rule must own that shape.
        let mut c = Circuit::new();
        for n in ["a", "b", "c"] {
            c.add_node(n).unwrap();
        }
        c.add_resistor("A", 2.0, "b", "c").unwrap();
        c.add_resistor("B", 2.0, "b", "c").unwrap();
        c.add_resistor("C", 4.0, "a", "b").unwrap();
        c.add_source("V0", 1.0, "a", "b").unwrap();

        let mut red = single_source_view(&c);
        red.reduce().unwrap();
        assert!(matches!(red.history[0], Transformation::Parallel { .. }));
    }

    #[test]
    fn test_unreducible_k5() {
        // Complete graph on five nodes: every non-terminal node has degree
        // four, so no rule applies.
        let names = ["a", "b", "c", "d", "e"];
        let mut c = Circuit::new();
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

        let mut red = single_source_view(&c);
        let err = red.reduce().unwrap_err();
        match err {
            PipeworksError::UnreducibleTopology { resistors, nodes } => {
                assert_eq!(resistors.len(), 10);
                assert_eq!(nodes.len(), 5);
            }
            other => panic!("expected UnreducibleTopology, got {other:?}"),
        }
    }

    #[test]
    fn test_golden_network_reduces_through_wye_delta() {
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

        let mut red = single_source_view(&c);
        let eq = red.reduce().unwrap();
        assert!(matches!(red.history[0], Transformation::WyeDelta { .. }));
        // R_eq = 748/95
        assert!((red.resistors[eq.0].resistance - 748.0 / 95.0).abs() < 1e-9);
    }
}
