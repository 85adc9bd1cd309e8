//! Multi-source solving by superposition.
//!
//! Each voltage source gets its own single-source view of the circuit in
//! which every other source is substituted by a near-zero resistor bridging
//! its terminals. The views are solved independently and merged linearly:
//! node voltages add, currents add as directed quantities.
//!
//! The substitution is a real short of [`super::SHORT_RESISTANCE`] ohms, not
//! ideal source removal. The approximation is acceptable because the
//! replacement resistance sits many orders of magnitude below any realistic
//! valve resistance.

use log::debug;

use crate::circuit::{Circuit, Current};
use crate::error::{PipeworksError, Result};

use super::backsub::back_substitute;
use super::reduce::Reduction;

/// Build, reduce and back-substitute the single-source view for the source
/// at `source_index`. With `short_others`, every other source becomes a
/// near-short resistor; views are independent and share no mutable state.
pub(crate) fn solve_view(
    circuit: &Circuit,
    source_index: usize,
    short_others: bool,
) -> Result<Reduction> {
    let mut source = circuit.sources()[source_index].clone();
    source.current = None;
    let mut red = Reduction::new(circuit, source);

    if short_others {
        for (i, other) in circuit.sources().iter().enumerate() {
            if i != source_index {
                red.replace_source(i, other);
            }
        }
        debug!(
            "single-source view for '{}': {} sources shorted",
            red.source.name,
            red.replaced_sources.len()
        );
    }

    let equivalent = red.reduce()?;
    back_substitute(&mut red, equivalent)?;
    Ok(red)
}

/// Vector-sum of two directed currents over the same node pair: same
/// direction adds magnitudes, opposing directions subtract with the result
/// following the larger.
pub(crate) fn merge_current(acc: Current, other: Current) -> Current {
    if other.from == acc.from {
        Current::new(acc.amps + other.amps, acc.from, acc.to)
    } else if acc.amps >= other.amps {
        Current::new(acc.amps - other.amps, acc.from, acc.to)
    } else {
        Current::new(other.amps - acc.amps, other.from, other.to)
    }
}

/// The merged current of the source at `source_index` across all views: in
/// its own view a source carries the equivalent-resistor current, in every
/// other view the current through its replacement resistor.
pub(crate) fn merged_source_current(
    views: &[Reduction],
    source_index: usize,
    source_name: &str,
) -> Result<Current> {
    let mut acc: Option<Current> = None;
    for (view_index, view) in views.iter().enumerate() {
        let current = if view_index == source_index {
            view.source.current
        } else {
            let replacement = view
                .replaced_sources
                .iter()
                .find(|(i, _)| *i == source_index)
                .map(|(_, id)| *id)
                .ok_or_else(|| {
                    PipeworksError::inconsistent(format!(
                        "source '{source_name}' has no replacement in view {view_index}"
                    ))
                })?;
            view.resistors[replacement.0].current
        };
        let current = current.ok_or_else(|| {
            PipeworksError::inconsistent(format!(
                "source '{source_name}' has no current in view {view_index}"
            ))
        })?;
        acc = Some(match acc {
            None => current,
            Some(prev) => merge_current(prev, current),
        });
    }
    acc.ok_or_else(|| PipeworksError::inconsistent("no views to merge"))
}
