//! Back-substitution engine.
//!
//! Replays the reduction history in reverse, deriving the current and
//! voltage drop of every consumed resistor from the results of the
//! composite that replaced it, and propagating node voltages as eliminated
//! nodes reappear.

use log::trace;

use crate::circuit::{Current, NodeId, ResistorId};
use crate::error::{PipeworksError, Result};

use super::reduce::{Reduction, Transformation};

/// Seed the equivalent resistor from the source and replay the history in
/// reverse. On return every resistor in the arena carries a current and a
/// voltage drop, and every node revealed by the replay carries a voltage.
pub(crate) fn back_substitute(red: &mut Reduction, equivalent: ResistorId) -> Result<()> {
    let voltage = red.source.voltage;
    let pos = red.source.pos;
    let neg = red.source.neg;

    // The positive terminal sits at the source voltage, the negative at 0.
    red.voltages[pos.0] = Some(voltage);
    red.voltages[neg.0] = Some(0.0);

    // I = V / R_eq through the one remaining resistor, flowing from the
    // higher-voltage terminal to the lower one.
    let amps = voltage.abs() / red.resistors[equivalent.0].resistance;
    let (from, to) = if voltage >= 0.0 { (pos, neg) } else { (neg, pos) };
    red.resistors[equivalent.0].current = Some(Current::new(amps, from, to));
    red.resistors[equivalent.0].voltage_drop = Some(voltage.abs());

    // The source carries the same current; its direction is internal, the
    // way fluid moves through a pump: negative terminal to positive.
    red.source.current = Some(Current::new(amps, to, from));

    let history = std::mem::take(&mut red.history);
    for step in history.iter().rev() {
        match step {
            Transformation::ShortCircuit { removed } => {
                let nodes = red.resistors[removed.0].nodes;
                red.resistors[removed.0].current = Some(Current::new(0.0, nodes[0], nodes[1]));
                red.resistors[removed.0].voltage_drop = Some(0.0);
            }

            Transformation::DeadEnd { removed, dead_node } => {
                let nodes = red.resistors[removed.0].nodes;
                red.resistors[removed.0].current = Some(Current::new(0.0, nodes[0], nodes[1]));
                red.resistors[removed.0].voltage_drop = Some(0.0);
                // Assumption carried over from the reference behavior: a
                // dead branch is an open circuit at gauge zero.
                if red.voltages[dead_node.0].is_none() {
                    red.voltages[dead_node.0] = Some(0.0);
                }
            }

            Transformation::Series { consumed, merged } => {
                undo_series(red, *consumed, *merged)?;
            }

            Transformation::Parallel { consumed, merged } => {
                let mc = current_of(red, *merged)?;
                let md = drop_of(red, *merged)?;
                for &id in consumed {
                    // Same drop and direction as the merged resistor; only
                    // the magnitude differs, by I = V / R.
                    let amps = md / red.resistors[id.0].resistance;
                    red.resistors[id.0].current = Some(Current::new(amps, mc.from, mc.to));
                    red.resistors[id.0].voltage_drop = Some(md);
                }
            }

            Transformation::WyeDelta { consumed, produced } => {
                undo_wye_delta(red, *consumed, *produced)?;
            }
        }
    }

    trace!(
        "back-substitution complete for source '{}': {} steps",
        red.source.name,
        history.len()
    );
    red.history = history;
    Ok(())
}

fn undo_series(red: &mut Reduction, consumed: [ResistorId; 2], merged: ResistorId) -> Result<()> {
    let [a, b] = consumed;
    let mc = current_of(red, merged)?;

    // The downstream resistor shares the merged target node; the upstream
    // one borders the known-voltage side and shares the merged source node.
    let (downstream, upstream) = if red.resistors[a.0].touches(mc.to) {
        (a, b)
    } else {
        (b, a)
    };
    let mid = red.resistors[upstream.0].other_end(mc.from);

    red.resistors[upstream.0].current = Some(Current::new(mc.amps, mc.from, mid));
    red.resistors[downstream.0].current = Some(Current::new(mc.amps, mid, mc.to));
    for id in [upstream, downstream] {
        let drop = mc.amps * red.resistors[id.0].resistance;
        red.resistors[id.0].voltage_drop = Some(drop);
        propagate_voltage(red, id)?;
    }
    Ok(())
}

fn undo_wye_delta(
    red: &mut Reduction,
    consumed: [ResistorId; 3],
    produced: [ResistorId; 3],
) -> Result<()> {
    let [a, b, c] = consumed;
    let [d, e, f] = produced;
    let center = center_node(red, a, b, c)?;

    // Positional pairing from the forward rewrite: a combines the currents
    // of d and e, b of d and f, c of e and f.
    for (original, first, second) in [(a, d, e), (b, d, f), (c, e, f)] {
        let outer = red.resistors[original.0].other_end(center);
        let c1 = current_of(red, first)?;
        let c2 = current_of(red, second)?;

        let current = if c1.from == outer && c2.from == outer {
            // Both delta currents leave the outer node: in the star they
            // left it through the center.
            Current::new(c1.amps + c2.amps, outer, center)
        } else if c1.to == outer && c2.to == outer {
            Current::new(c1.amps + c2.amps, center, outer)
        } else {
            // Opposing directions: the difference flows the way of the
            // stronger one.
            let (weak, strong) = if c1.amps <= c2.amps { (c1, c2) } else { (c2, c1) };
            if strong.to == outer {
                Current::new(strong.amps - weak.amps, center, outer)
            } else {
                Current::new(strong.amps - weak.amps, outer, center)
            }
        };

        let drop = current.amps * red.resistors[original.0].resistance;
        red.resistors[original.0].current = Some(current);
        red.resistors[original.0].voltage_drop = Some(drop);
        propagate_voltage(red, original)?;
    }
    Ok(())
}

/// The node shared by all three resistors of a star. Unique: the parallel
/// rule fires before wye-delta, so no two of the three can span the same
/// node pair.
fn center_node(red: &Reduction, a: ResistorId, b: ResistorId, c: ResistorId) -> Result<NodeId> {
    for node in red.resistors[a.0].nodes {
        if red.resistors[b.0].touches(node) && red.resistors[c.0].touches(node) {
            return Ok(node);
        }
    }
    Err(PipeworksError::inconsistent(format!(
        "wye resistors '{}', '{}', '{}' share no center node",
        red.resistors[a.0].name, red.resistors[b.0].name, red.resistors[c.0].name
    )))
}

/// Fill in whichever endpoint voltage of a solved resistor is still unknown,
/// using V_from - V_to = drop along the current direction.
fn propagate_voltage(red: &mut Reduction, id: ResistorId) -> Result<()> {
    let current = current_of(red, id)?;
    let drop = drop_of(red, id)?;
    match (
        red.voltages[current.from.0],
        red.voltages[current.to.0],
    ) {
        (Some(v_from), None) => red.voltages[current.to.0] = Some(v_from - drop),
        (None, Some(v_to)) => red.voltages[current.from.0] = Some(v_to + drop),
        _ => {}
    }
    Ok(())
}

fn current_of(red: &Reduction, id: ResistorId) -> Result<Current> {
    red.resistors[id.0].current.ok_or_else(|| {
        PipeworksError::inconsistent(format!(
            "resistor '{}' has no current during replay",
            red.resistors[id.0].name
        ))
    })
}

fn drop_of(red: &Reduction, id: ResistorId) -> Result<f64> {
    red.resistors[id.0].voltage_drop.ok_or_else(|| {
        PipeworksError::inconsistent(format!(
            "resistor '{}' has no voltage drop during replay",
            red.resistors[id.0].name
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Circuit;

    fn solved_view(circuit: &Circuit) -> Reduction {
        let source = circuit.sources()[0].clone();
        let mut red = Reduction::new(circuit, source);
        let eq = red.reduce().unwrap();
        back_substitute(&mut red, eq).unwrap();
        red
    }

    #[test]
    fn test_series_currents_and_mid_voltage() {
        let mut c = Circuit::new();
        for n in ["a", "b", "c"] {
            c.add_node(n).unwrap();
        }
        c.add_resistor("A", 6.0, "a", "b").unwrap();
        c.add_resistor("B", 8.0, "b", "c").unwrap();
        c.add_source("V0", 8.0, "a", "c").unwrap();

        let red = solved_view(&c);
        let i = 8.0 / 14.0;
        for id in [0, 1] {
            let cur = red.resistors[id].current.unwrap();
            assert!((cur.amps - i).abs() < 1e-12);
        }
        // Direction runs a -> b -> c
        assert_eq!(red.resistors[0].current.unwrap().from, NodeId(0));
        assert_eq!(red.resistors[0].current.unwrap().to, NodeId(1));
        assert_eq!(red.resistors[1].current.unwrap().from, NodeId(1));
        assert_eq!(red.resistors[1].current.unwrap().to, NodeId(2));
        // V_b = 8 - 6 * I = 32/7
        assert!((red.voltages[1].unwrap() - 32.0 / 7.0).abs() < 1e-12);
        // Drops obey V = I * R
        assert!((red.resistors[0].voltage_drop.unwrap() - 6.0 * i).abs() < 1e-12);
        assert!((red.resistors[1].voltage_drop.unwrap() - 8.0 * i).abs() < 1e-12);
    }

    #[test]
    fn test_parallel_branch_currents() {
        let mut c = Circuit::new();
        c.add_node("a").unwrap();
        c.add_node("b").unwrap();
        c.add_resistor("A", 10.0, "a", "b").unwrap();
        c.add_resistor("B", 10.0, "a", "b").unwrap();
        c.add_source("V0", 5.0, "a", "b").unwrap();

        let red = solved_view(&c);
        for id in [0, 1] {
            let cur = red.resistors[id].current.unwrap();
            assert!((cur.amps - 0.5).abs() < 1e-12);
            assert_eq!(cur.from, NodeId(0));
            assert_eq!(cur.to, NodeId(1));
            assert!((red.resistors[id].voltage_drop.unwrap() - 5.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_negative_source_flips_direction() {
        let mut c = Circuit::new();
        c.add_node("a").unwrap();
        c.add_node("b").unwrap();
        c.add_resistor("A", 4.0, "a", "b").unwrap();
        c.add_source("V0", -8.0, "a", "b").unwrap();

        let red = solved_view(&c);
        let cur = red.resistors[0].current.unwrap();
        assert!((cur.amps - 2.0).abs() < 1e-12);
        // Positive terminal sits below the negative one, so current runs
        // b -> a through the resistor.
        assert_eq!(cur.from, NodeId(1));
        assert_eq!(cur.to, NodeId(0));
        assert!((red.voltages[0].unwrap() - (-8.0)).abs() < 1e-12);
        assert!((red.voltages[1].unwrap() - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_dead_end_gets_zero_current_and_gauge_zero() {
        let mut c = Circuit::new();
        for n in ["a", "b", "c"] {
            c.add_node(n).unwrap();
        }
        c.add_resistor("A", 5.0, "a", "b").unwrap();
        c.add_resistor("Stub", 7.0, "b", "c").unwrap();
        c.add_source("V0", 10.0, "a", "b").unwrap();

        let red = solved_view(&c);
        let stub = red.resistors[1].current.unwrap();
        assert_eq!(stub.amps, 0.0);
        assert_eq!(red.resistors[1].voltage_drop.unwrap(), 0.0);
        assert_eq!(red.voltages[2], Some(0.0));
    }

    #[test]
    fn test_source_terminal_round_trip() {
        // V_pos - V_neg must reproduce the source voltage exactly
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

        let red = solved_view(&c);
        let v_pos = red.voltages[red.source.pos.0].unwrap();
        let v_neg = red.voltages[red.source.neg.0].unwrap();
        assert!((v_pos - v_neg - 8.0).abs() < 1e-9);
    }
}
