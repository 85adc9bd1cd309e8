//! Circuit graph representation and validation.
//!
//! This module provides the electrical network model the solver consumes:
//! nodes, resistors (valves) and voltage sources (pumps), with stable
//! name-based identity and deterministic lookup.

mod graph;
mod types;
mod validate;

pub use graph::{Circuit, Node, Resistor, VoltageSource};
pub use types::{Current, NodeId, ResistorId, SourceId};
pub use validate::validate_circuit;
