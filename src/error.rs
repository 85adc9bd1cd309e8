//! Error types for the Pipeworks circuit solver.
//!
//! This module provides a unified error type [`PipeworksError`] that covers
//! all error conditions that can occur during circuit construction,
//! validation, reduction, and netlist parsing.

use thiserror::Error;

/// Result type alias using [`PipeworksError`].
pub type Result<T> = std::result::Result<T, PipeworksError>;

/// Unified error type for all Pipeworks operations.
#[derive(Error, Debug)]
pub enum PipeworksError {
    // ============ Circuit Construction Errors ============
    /// Invalid component parameters (non-positive resistance, bad ports, ...)
    #[error("Invalid component '{name}': {message}")]
    InvalidComponent { name: String, message: String },

    /// Node not found in circuit
    #[error("Node '{node}' not found in circuit")]
    NodeNotFound { node: String },

    /// Duplicate node name
    #[error("Duplicate node name '{name}'")]
    DuplicateNode { name: String },

    /// Duplicate resistor or source name
    #[error("Duplicate component name '{name}'")]
    DuplicateComponent { name: String },

    // ============ Validation Errors ============
    /// Circuit has no voltage source
    #[error("Circuit has no voltage source")]
    MissingSource,

    /// Circuit has no resistor
    #[error("Circuit has no resistor")]
    MissingResistor,

    // ============ Solver Errors ============
    /// No reduction rule applies while more than one resistor remains.
    /// Carries the names of the surviving resistors and their nodes so the
    /// caller can highlight the offending sub-circuit.
    #[error("Unreducible topology: no rule applies to resistors [{}]", resistors.join(", "))]
    UnreducibleTopology {
        resistors: Vec<String>,
        nodes: Vec<String>,
    },

    /// The transformation history contradicts itself during back-substitution
    #[error("Inconsistent reduction history: {message}")]
    InconsistentHistory { message: String },

    // ============ Netlist Errors ============
    /// Error parsing a netlist line
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Error reading a netlist file
    #[error("Failed to read netlist file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipeworksError {
    /// Create an invalid component error
    pub fn invalid_component(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidComponent {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn inconsistent(message: impl Into<String>) -> Self {
        Self::InconsistentHistory {
            message: message.into(),
        }
    }
}
