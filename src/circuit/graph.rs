//! Circuit graph structure.

use std::collections::HashMap;

use super::types::{Current, NodeId, ResistorId, SourceId};
use crate::error::{PipeworksError, Result};

/// An electrically equipotential point where components meet.
#[derive(Debug, Clone)]
pub struct Node {
    /// Node name (stable identity)
    pub name: String,
}

/// A resistor; models a valve or any other flow restriction.
#[derive(Debug, Clone)]
pub struct Resistor {
    /// Resistor name (stable identity)
    pub name: String,
    /// Resistance in ohms, always > 0
    pub resistance: f64,
    /// Endpoint nodes. The pair is unordered; both entries may name the
    /// same node, in which case the short-circuit rule removes the resistor
    /// during reduction.
    pub nodes: [NodeId; 2],
    /// Derived current, filled in by the solver
    pub current: Option<Current>,
    /// Derived voltage drop in volts, filled in by the solver
    pub voltage_drop: Option<f64>,
}

impl Resistor {
    pub fn new(name: String, resistance: f64, nodes: [NodeId; 2]) -> Self {
        Self {
            name,
            resistance,
            nodes,
            current: None,
            voltage_drop: None,
        }
    }

    /// Whether `node` is one of this resistor's endpoints.
    pub fn touches(&self, node: NodeId) -> bool {
        self.nodes[0] == node || self.nodes[1] == node
    }

    /// The endpoint opposite `node`. If both endpoints equal `node`, returns
    /// `node` itself.
    pub fn other_end(&self, node: NodeId) -> NodeId {
        if self.nodes[0] == node {
            self.nodes[1]
        } else {
            self.nodes[0]
        }
    }

    /// Whether this resistor connects the same unordered node pair as `other`.
    pub fn same_pair(&self, other: &Resistor) -> bool {
        let (a, b) = (self.nodes[0], self.nodes[1]);
        let (c, d) = (other.nodes[0], other.nodes[1]);
        (a == c && b == d) || (a == d && b == c)
    }
}

/// A voltage source; models a pump that fixes the potential difference
/// between two nodes.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    /// Source name (stable identity)
    pub name: String,
    /// Source voltage in volts; may be signed
    pub voltage: f64,
    /// Positive terminal (pump discharge)
    pub pos: NodeId,
    /// Negative terminal (pump suction)
    pub neg: NodeId,
    /// Derived current through the source, filled in by the solver.
    /// Direction is internal: from the negative to the positive terminal,
    /// the way fluid moves through a pump.
    pub current: Option<Current>,
}

impl VoltageSource {
    pub fn new(name: String, voltage: f64, pos: NodeId, neg: NodeId) -> Self {
        Self {
            name,
            voltage,
            pos,
            neg,
            current: None,
        }
    }
}

/// A complete circuit ready for solving: nodes, resistors and voltage
/// sources, with name-keyed lookup.
///
/// The circuit is built fresh per solve request from a topology snapshot and
/// stays immutable during solving; results are returned separately and copied
/// out by the caller.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    nodes: Vec<Node>,
    node_map: HashMap<String, NodeId>,
    resistors: Vec<Resistor>,
    resistor_map: HashMap<String, ResistorId>,
    sources: Vec<VoltageSource>,
    source_map: HashMap<String, SourceId>,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Names must be unique.
    pub fn add_node(&mut self, name: impl Into<String>) -> Result<NodeId> {
        let name = name.into();
        if self.node_map.contains_key(&name) {
            return Err(PipeworksError::DuplicateNode { name });
        }
        let id = NodeId(self.nodes.len());
        self.node_map.insert(name.clone(), id);
        self.nodes.push(Node { name });
        Ok(id)
    }

    /// Register a node, returning the existing id if the name is taken.
    pub fn ensure_node(&mut self, name: &str) -> NodeId {
        match self.node_map.get(name) {
            Some(&id) => id,
            None => {
                let id = NodeId(self.nodes.len());
                self.node_map.insert(name.to_string(), id);
                self.nodes.push(Node {
                    name: name.to_string(),
                });
                id
            }
        }
    }

    /// Add a resistor between two named nodes.
    ///
    /// Rejects non-positive resistance and unknown node names. An equal node
    /// pair is accepted: the topology builder produces one whenever a valve
    /// is bypassed by pipes, and the short-circuit reduction rule consumes
    /// it.
    pub fn add_resistor(
        &mut self,
        name: impl Into<String>,
        resistance: f64,
        node_a: &str,
        node_b: &str,
    ) -> Result<ResistorId> {
        let name = name.into();
        if self.resistor_map.contains_key(&name) || self.source_map.contains_key(&name) {
            return Err(PipeworksError::DuplicateComponent { name });
        }
        if !(resistance > 0.0) {
            return Err(PipeworksError::invalid_component(
                name,
                format!("resistance must be > 0, got {resistance}"),
            ));
        }
        let a = self.node_id_checked(node_a)?;
        let b = self.node_id_checked(node_b)?;
        let id = ResistorId(self.resistors.len());
        self.resistor_map.insert(name.clone(), id);
        self.resistors.push(Resistor::new(name, resistance, [a, b]));
        Ok(id)
    }

    /// Add a voltage source between two named terminal nodes.
    pub fn add_source(
        &mut self,
        name: impl Into<String>,
        voltage: f64,
        pos: &str,
        neg: &str,
    ) -> Result<SourceId> {
        let name = name.into();
        if self.source_map.contains_key(&name) || self.resistor_map.contains_key(&name) {
            return Err(PipeworksError::DuplicateComponent { name });
        }
        let pos = self.node_id_checked(pos)?;
        let neg = self.node_id_checked(neg)?;
        if pos == neg {
            return Err(PipeworksError::invalid_component(
                name,
                "source terminals must be two distinct nodes",
            ));
        }
        let id = SourceId(self.sources.len());
        self.source_map.insert(name.clone(), id);
        self.sources.push(VoltageSource::new(name, voltage, pos, neg));
        Ok(id)
    }

    /// Find a node id by name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.node_map.get(name).copied()
    }

    /// Get the name of a node.
    pub fn node_name(&self, node: NodeId) -> &str {
        &self.nodes[node.0].name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn resistors(&self) -> &[Resistor] {
        &self.resistors
    }

    pub fn sources(&self) -> &[VoltageSource] {
        &self.sources
    }

    fn node_id_checked(&self, name: &str) -> Result<NodeId> {
        self.node_id(name).ok_or_else(|| PipeworksError::NodeNotFound {
            node: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_node_rejected() {
        let mut c = Circuit::new();
        c.add_node("a").unwrap();
        assert!(matches!(
            c.add_node("a"),
            Err(PipeworksError::DuplicateNode { .. })
        ));
    }

    #[test]
    fn test_ensure_node_reuses_id() {
        let mut c = Circuit::new();
        let a = c.add_node("a").unwrap();
        assert_eq!(c.ensure_node("a"), a);
        assert_ne!(c.ensure_node("b"), a);
    }

    #[test]
    fn test_nonpositive_resistance_rejected() {
        let mut c = Circuit::new();
        c.add_node("a").unwrap();
        c.add_node("b").unwrap();
        assert!(matches!(
            c.add_resistor("r", 0.0, "a", "b"),
            Err(PipeworksError::InvalidComponent { .. })
        ));
        assert!(matches!(
            c.add_resistor("r", -4.0, "a", "b"),
            Err(PipeworksError::InvalidComponent { .. })
        ));
    }

    #[test]
    fn test_unknown_node_rejected() {
        let mut c = Circuit::new();
        c.add_node("a").unwrap();
        assert!(matches!(
            c.add_resistor("r", 1.0, "a", "zz"),
            Err(PipeworksError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn test_equal_node_pair_accepted() {
        let mut c = Circuit::new();
        c.add_node("a").unwrap();
        let id = c.add_resistor("r", 5.0, "a", "a").unwrap();
        assert_eq!(c.resistors()[id.0].nodes[0], c.resistors()[id.0].nodes[1]);
    }

    #[test]
    fn test_source_terminals_must_differ() {
        let mut c = Circuit::new();
        c.add_node("a").unwrap();
        assert!(matches!(
            c.add_source("p", 3.0, "a", "a"),
            Err(PipeworksError::InvalidComponent { .. })
        ));
    }
}
