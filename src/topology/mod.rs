//! Topology builder: from a drawing of linked elements to solvable circuits.
//!
//! The drawing is the editor's view of the world: pumps, valves, three-way
//! valves, pipes and fittings, each exposing numbered ports, with undirected
//! links between ports. This module lowers a drawing into electrical
//! [`Circuit`]s:
//!
//! - Pipes and fittings are pure conductors. A flood fill groups every run of
//!   linked pass-through ports into one electrical node, stopping at solvable
//!   elements (pumps and valves). Every port of a solvable element gets a
//!   node, linked or not.
//! - A three-way valve lowers to two resistors sharing its open port, the
//!   flow split between the blue and red branches by `blue_split`.
//! - Elements that share no node with each other form disjoint groups. A
//!   group without a pump, or without any resistance, cannot be solved and is
//!   dropped from the result.
//!
//! The builder also records which pipes carry each node, so solved currents
//! can later be spread over the pipe segments for display.

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, trace};

use crate::circuit::Circuit;
use crate::error::{PipeworksError, Result};

/// Index of an element within its [`Drawing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub usize);

/// One drawable element and its electrical meaning.
#[derive(Debug, Clone)]
pub enum Element {
    /// Fixes the pressure difference between its ports. Port 0 is the
    /// discharge (positive terminal), port 1 the suction (negative terminal).
    Pump { name: String, pressure: f64 },
    /// A two-port flow restriction. Ports 0 and 1 are interchangeable.
    Valve { name: String, resistance: f64 },
    /// A three-port restriction splitting flow between two branches. Port 0
    /// is the open side, port 1 the blue branch, port 2 the red branch.
    /// `blue_split` is the fraction of the total resistance assigned to the
    /// blue branch, strictly between 0 and 1.
    ThreeWayValve {
        name: String,
        resistance: f64,
        blue_split: f64,
    },
    /// A two-port conductor.
    Pipe { name: String },
    /// An N-port conductor joining every linked port into one node.
    Fitting { name: String, ports: usize },
}

impl Element {
    pub fn name(&self) -> &str {
        match self {
            Element::Pump { name, .. }
            | Element::Valve { name, .. }
            | Element::ThreeWayValve { name, .. }
            | Element::Pipe { name }
            | Element::Fitting { name, .. } => name,
        }
    }

    pub fn port_count(&self) -> usize {
        match self {
            Element::Pump { .. } | Element::Valve { .. } | Element::Pipe { .. } => 2,
            Element::ThreeWayValve { .. } => 3,
            Element::Fitting { ports, .. } => *ports,
        }
    }

    /// Pass-through elements conduct without restriction and dissolve into
    /// the nodes they join. Everything else becomes a circuit component.
    fn is_passthrough(&self) -> bool {
        matches!(self, Element::Pipe { .. } | Element::Fitting { .. })
    }
}

/// A reference to one port of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub element: ElementId,
    pub port: usize,
}

impl PortRef {
    pub fn new(element: ElementId, port: usize) -> Self {
        Self { element, port }
    }
}

/// One solvable group lowered from a drawing.
#[derive(Debug)]
pub struct SubCircuit {
    /// The electrical circuit, ready for [`crate::solver::solve`].
    pub circuit: Circuit,
    /// Names of the solvable elements lowered into this circuit.
    pub members: Vec<String>,
    /// Pipe names carrying each node, keyed by node name. Nodes formed
    /// without pipes (direct port-to-port links) are absent.
    pub pipes_by_node: HashMap<String, Vec<String>>,
}

/// An editor scene: elements plus undirected links between their ports.
#[derive(Debug, Default)]
pub struct Drawing {
    elements: Vec<Element>,
    element_map: HashMap<String, ElementId>,
    links: HashMap<PortRef, PortRef>,
}

impl Drawing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element to the drawing. Names must be unique; element
    /// parameters are checked here so lowering cannot fail on shape.
    pub fn add_element(&mut self, element: Element) -> Result<ElementId> {
        match &element {
            Element::Valve { name, resistance } if !(*resistance > 0.0) => {
                return Err(PipeworksError::invalid_component(
                    name.clone(),
                    format!("resistance must be > 0, got {resistance}"),
                ));
            }
            Element::ThreeWayValve {
                name,
                resistance,
                blue_split,
            } => {
                if !(*resistance > 0.0) {
                    return Err(PipeworksError::invalid_component(
                        name.clone(),
                        format!("resistance must be > 0, got {resistance}"),
                    ));
                }
                if !(*blue_split > 0.0 && *blue_split < 1.0) {
                    return Err(PipeworksError::invalid_component(
                        name.clone(),
                        format!("blue split must be strictly between 0 and 1, got {blue_split}"),
                    ));
                }
            }
            Element::Fitting { name, ports } if *ports < 2 => {
                return Err(PipeworksError::invalid_component(
                    name.clone(),
                    format!("a fitting needs at least 2 ports, got {ports}"),
                ));
            }
            _ => {}
        }
        let name = element.name().to_string();
        if self.element_map.contains_key(&name) {
            return Err(PipeworksError::DuplicateComponent { name });
        }
        let id = ElementId(self.elements.len());
        self.element_map.insert(name, id);
        self.elements.push(element);
        Ok(id)
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    /// Link two ports. Each port carries at most one link.
    pub fn link(&mut self, a: PortRef, b: PortRef) -> Result<()> {
        for port in [a, b] {
            let element = self
                .elements
                .get(port.element.0)
                .ok_or_else(|| PipeworksError::invalid_component("?", "unknown element in link"))?;
            if port.port >= element.port_count() {
                return Err(PipeworksError::invalid_component(
                    element.name(),
                    format!(
                        "port {} out of range, element has {} ports",
                        port.port,
                        element.port_count()
                    ),
                ));
            }
            if self.links.contains_key(&port) {
                return Err(PipeworksError::invalid_component(
                    element.name(),
                    format!("port {} is already linked", port.port),
                ));
            }
        }
        if a == b {
            return Err(PipeworksError::invalid_component(
                self.elements[a.element.0].name(),
                "cannot link a port to itself",
            ));
        }
        self.links.insert(a, b);
        self.links.insert(b, a);
        Ok(())
    }

    /// Lower the drawing into independent solvable circuits.
    ///
    /// Groups without a pump or without any valve are silently dropped:
    /// half-built scenes are normal in the editor and must not fail the
    /// solvable part of the drawing.
    pub fn build_subcircuits(&self) -> Result<Vec<SubCircuit>> {
        let assignment = self.assign_nodes();
        let groups = self.group_elements(&assignment);

        let mut result = Vec::new();
        for members in groups {
            let has_pump = members
                .iter()
                .any(|&i| matches!(self.elements[i], Element::Pump { .. }));
            let has_valve = members.iter().any(|&i| {
                matches!(
                    self.elements[i],
                    Element::Valve { .. } | Element::ThreeWayValve { .. }
                )
            });
            if !has_pump || !has_valve {
                debug!(
                    "dropping unsolvable group [{}]: pump={has_pump}, valve={has_valve}",
                    members
                        .iter()
                        .map(|&i| self.elements[i].name())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                continue;
            }
            result.push(self.lower_group(&members, &assignment)?);
        }
        Ok(result)
    }

    /// Flood-fill node assignment: every port of every solvable element gets
    /// an electrical node, conducting through pipes and fittings.
    fn assign_nodes(&self) -> NodeAssignment {
        let mut assignment = NodeAssignment::default();

        for (i, element) in self.elements.iter().enumerate() {
            if element.is_passthrough() {
                continue;
            }
            for p in 0..element.port_count() {
                let start = PortRef::new(ElementId(i), p);
                if assignment.node_of_port.contains_key(&start) {
                    continue;
                }
                let node = assignment.pipes_of_node.len();
                assignment.pipes_of_node.push(Vec::new());
                self.flood(start, node, &mut assignment);
                trace!(
                    "node n{node} seeded at {}:{p}, {} pipes",
                    element.name(),
                    assignment.pipes_of_node[node].len()
                );
            }
        }
        assignment
    }

    /// Walk the conductor run starting at `start`, tagging every reachable
    /// port with `node`. Pass-through elements spread to all their ports;
    /// solvable elements terminate the walk at the port that reached them.
    fn flood(&self, start: PortRef, node: usize, assignment: &mut NodeAssignment) {
        let mut queue = VecDeque::new();
        queue.push_back(start);

        while let Some(port) = queue.pop_front() {
            if assignment.node_of_port.insert(port, node).is_some() {
                continue;
            }
            let element = &self.elements[port.element.0];
            if element.is_passthrough() {
                if let Element::Pipe { name } = element {
                    let pipes = &mut assignment.pipes_of_node[node];
                    if !pipes.contains(name) {
                        pipes.push(name.clone());
                    }
                }
                for q in 0..element.port_count() {
                    queue.push_back(PortRef::new(port.element, q));
                }
            } else if port != start {
                // Reached another solvable element's port; it shares the
                // node but the walk does not pass through the element.
                continue;
            }
            if let Some(&peer) = self.links.get(&port) {
                queue.push_back(peer);
            }
        }
    }

    /// Partition solvable elements into connected components over shared
    /// nodes.
    fn group_elements(&self, assignment: &NodeAssignment) -> Vec<Vec<usize>> {
        let mut dsu = DisjointSet::new(assignment.pipes_of_node.len());
        for (i, element) in self.elements.iter().enumerate() {
            if element.is_passthrough() {
                continue;
            }
            let first = assignment.node_of_port[&PortRef::new(ElementId(i), 0)];
            for p in 1..element.port_count() {
                let other = assignment.node_of_port[&PortRef::new(ElementId(i), p)];
                dsu.union(first, other);
            }
        }

        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, element) in self.elements.iter().enumerate() {
            if element.is_passthrough() {
                continue;
            }
            let node = assignment.node_of_port[&PortRef::new(ElementId(i), 0)];
            groups.entry(dsu.find(node)).or_default().push(i);
        }
        let mut result: Vec<Vec<usize>> = groups.into_values().collect();
        result.sort_by_key(|members| members[0]);
        result
    }

    fn lower_group(&self, members: &[usize], assignment: &NodeAssignment) -> Result<SubCircuit> {
        let mut circuit = Circuit::new();
        let mut member_names = Vec::new();
        let mut nodes_used: HashSet<usize> = HashSet::new();

        let node_name = |node: usize| format!("n{node}");

        for &i in members {
            let element = &self.elements[i];
            for p in 0..element.port_count() {
                let node = assignment.node_of_port[&PortRef::new(ElementId(i), p)];
                if nodes_used.insert(node) {
                    circuit.add_node(node_name(node))?;
                }
            }
        }

        for &i in members {
            let element = &self.elements[i];
            member_names.push(element.name().to_string());
            let port_node =
                |p: usize| node_name(assignment.node_of_port[&PortRef::new(ElementId(i), p)]);
            match element {
                Element::Pump { name, pressure } => {
                    circuit.add_source(name.clone(), *pressure, &port_node(0), &port_node(1))?;
                }
                Element::Valve { name, resistance } => {
                    circuit.add_resistor(name.clone(), *resistance, &port_node(0), &port_node(1))?;
                }
                Element::ThreeWayValve {
                    name,
                    resistance,
                    blue_split,
                } => {
                    circuit.add_resistor(
                        format!("{name}.b"),
                        resistance * blue_split,
                        &port_node(0),
                        &port_node(1),
                    )?;
                    circuit.add_resistor(
                        format!("{name}.r"),
                        resistance * (1.0 - blue_split),
                        &port_node(0),
                        &port_node(2),
                    )?;
                }
                Element::Pipe { .. } | Element::Fitting { .. } => {}
            }
        }

        let pipes_by_node = nodes_used
            .iter()
            .filter(|&&node| !assignment.pipes_of_node[node].is_empty())
            .map(|&node| {
                let mut pipes = assignment.pipes_of_node[node].clone();
                pipes.sort();
                (node_name(node), pipes)
            })
            .collect();

        Ok(SubCircuit {
            circuit,
            members: member_names,
            pipes_by_node,
        })
    }
}

#[derive(Debug, Default)]
struct NodeAssignment {
    node_of_port: HashMap<PortRef, usize>,
    pipes_of_node: Vec<Vec<String>>,
}

/// Union-find over node indices, for splitting the drawing into groups.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}
