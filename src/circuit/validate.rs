//! Circuit validation.

use crate::error::{PipeworksError, Result};

use super::Circuit;

/// Validate a circuit before solving.
///
/// Checks:
/// - At least one resistor and one voltage source are present
/// - Source terminal nodes exist in the node set
///
/// Per-component shape checks (positive resistance, valid node references,
/// distinct source terminals) are enforced when the circuit is built.
pub fn validate_circuit(circuit: &Circuit) -> Result<()> {
    if circuit.sources().is_empty() {
        return Err(PipeworksError::MissingSource);
    }

    if circuit.resistors().is_empty() {
        return Err(PipeworksError::MissingResistor);
    }

    Ok(())
}
