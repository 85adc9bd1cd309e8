//! Core types for circuit representation.

use std::fmt;

/// A unique identifier for a node in the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// A unique identifier for a resistor.
///
/// Ids index into an arena that also holds the composite resistors created
/// during reduction, so an id stays valid after the resistor it names has
/// been consumed by a transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResistorId(pub usize);

impl fmt::Display for ResistorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// A unique identifier for a voltage source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub usize);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0)
    }
}

/// A directed current: a non-negative magnitude in amps plus the node pair
/// it flows between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Current {
    /// Magnitude in amps, always >= 0
    pub amps: f64,
    /// Node the current flows out of
    pub from: NodeId,
    /// Node the current flows into
    pub to: NodeId,
}

impl Current {
    pub fn new(amps: f64, from: NodeId, to: NodeId) -> Self {
        Self { amps, from, to }
    }
}
