//! Line-oriented circuit description format for the CLI and tests.
//!
//! The in-process contract is plain Rust types; this format exists only so a
//! circuit can be written down in a file. One directive per line:
//!
//! ```text
//! # comment
//! node in             # optional, nodes register on first mention
//! pump  P1 8.0  in out
//! valve V1 6.0  in mid
//! valve V2 4.0  mid out
//! ```
//!
//! `pump NAME VOLTS POS NEG` adds a voltage source, `valve NAME OHMS A B` a
//! resistor. Blank lines and `#` comments are ignored. Errors carry the
//! 1-based line number.

use std::path::Path;

use crate::circuit::Circuit;
use crate::error::{PipeworksError, Result};

/// Parse a netlist from a string.
pub fn parse_str(input: &str) -> Result<Circuit> {
    let mut circuit = Circuit::new();

    for (index, raw) in input.lines().enumerate() {
        let line = index + 1;
        let text = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }

        match fields[0] {
            "node" => {
                let [name] = expect_fields(line, "node", &fields[1..], ["NAME"])?;
                circuit.ensure_node(name);
            }
            "valve" => {
                let [name, ohms, a, b] =
                    expect_fields(line, "valve", &fields[1..], ["NAME", "OHMS", "A", "B"])?;
                let resistance = parse_number(line, "OHMS", ohms)?;
                circuit.ensure_node(a);
                circuit.ensure_node(b);
                circuit
                    .add_resistor(name, resistance, a, b)
                    .map_err(|e| at_line(line, e))?;
            }
            "pump" => {
                let [name, volts, pos, neg] =
                    expect_fields(line, "pump", &fields[1..], ["NAME", "VOLTS", "POS", "NEG"])?;
                let voltage = parse_number(line, "VOLTS", volts)?;
                circuit.ensure_node(pos);
                circuit.ensure_node(neg);
                circuit
                    .add_source(name, voltage, pos, neg)
                    .map_err(|e| at_line(line, e))?;
            }
            other => {
                return Err(PipeworksError::parse(
                    line,
                    format!("unknown directive '{other}', expected node, valve or pump"),
                ));
            }
        }
    }
    Ok(circuit)
}

/// Parse a netlist file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Circuit> {
    let path = path.as_ref();
    let input = std::fs::read_to_string(path).map_err(|source| PipeworksError::FileReadError {
        path: path.display().to_string(),
        source,
    })?;
    parse_str(&input)
}

fn expect_fields<'a, const N: usize>(
    line: usize,
    directive: &str,
    fields: &[&'a str],
    names: [&str; N],
) -> Result<[&'a str; N]> {
    <[&str; N]>::try_from(fields).map_err(|_| {
        PipeworksError::parse(
            line,
            format!(
                "'{directive}' takes {} arguments ({}), got {}",
                N,
                names.join(" "),
                fields.len()
            ),
        )
    })
}

fn parse_number(line: usize, what: &str, text: &str) -> Result<f64> {
    text.parse::<f64>()
        .map_err(|_| PipeworksError::parse(line, format!("invalid {what} value '{text}'")))
}

/// Wrap a construction error with the netlist line it came from.
fn at_line(line: usize, error: PipeworksError) -> PipeworksError {
    match error {
        e @ PipeworksError::ParseError { .. } => e,
        e => PipeworksError::parse(line, e.to_string()),
    }
}
