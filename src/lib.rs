//! # Pipeworks Core
//!
//! A symbolic DC circuit solver for pipe-network puzzles: valves are
//! resistors, pumps are voltage sources, pipes and fittings are wires.
//!
//! This library provides:
//! - A circuit graph model with name-keyed components
//! - Symbolic reduction to a single equivalent resistor (short-circuit,
//!   dead-end, series, parallel and wye-delta rules)
//! - Back-substitution of per-component currents and voltage drops
//! - Multi-pump solving by superposition
//! - A topology builder lowering an editor drawing into solvable circuits
//!
//! ## Architecture
//!
//! - [`topology`] - Drawing of elements and port links, lowered to circuits
//! - [`circuit`] - Circuit graph representation and validation
//! - [`solver`] - Symbolic reduction, back-substitution, superposition
//! - [`distribute`] - Spread solved currents over pipe segments for display
//! - [`netlist`] - Line-oriented description format (CLI and tests)
//!
//! ## Solving Method
//!
//! Instead of assembling a linear system, the solver rewrites the network
//! one rule application at a time until a single equivalent resistor faces
//! the pump, recording each rewrite. `I = V / R_eq` seeds a reverse replay
//! of the record, splitting currents and voltages back onto every original
//! component. Circuits with several pumps are solved once per pump with the
//! others replaced by near-short resistors, and the per-pump results are
//! summed.

pub mod circuit;
pub mod distribute;
pub mod error;
pub mod netlist;
pub mod solver;
pub mod topology;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use error::{PipeworksError, Result};
pub use solver::{solve, Solution, SHORT_RESISTANCE};
pub use topology::{Drawing, Element, PortRef, SubCircuit};
