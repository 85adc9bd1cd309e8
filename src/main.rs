//! Pipeworks - symbolic DC circuit solver
//!
//! Reads a netlist of pumps and valves, solves it, and prints node voltages
//! and per-component flows.
//!
//! # Usage
//!
//! ```bash
//! pipeworks circuit.net
//! ```

use std::path::PathBuf;

use clap::Parser;
use pipeworks_core::{error::Result, netlist, solver};

/// Symbolic pipe-network circuit solver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the netlist file
    #[arg(value_name = "NETLIST_FILE")]
    netlist_file: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let circuit = netlist::parse_file(&args.netlist_file)?;
    let solution = solver::solve(&circuit)?;

    let mut nodes: Vec<_> = solution.node_voltages.iter().collect();
    nodes.sort_by(|a, b| a.0.cmp(b.0));
    println!("nodes:");
    for (name, voltage) in nodes {
        println!("  {name:<12} {voltage:>12.6} V");
    }

    let mut resistors: Vec<_> = solution.resistors.iter().collect();
    resistors.sort_by(|a, b| a.0.cmp(b.0));
    println!("valves:");
    for (name, flow) in resistors {
        println!(
            "  {name:<12} {:>12.6} A  {} -> {}  (drop {:.6} V)",
            flow.amps, flow.from, flow.to, flow.voltage_drop
        );
    }

    let mut sources: Vec<_> = solution.sources.iter().collect();
    sources.sort_by(|a, b| a.0.cmp(b.0));
    println!("pumps:");
    for (name, flow) in sources {
        println!(
            "  {name:<12} {:>12.6} A  {} -> {}",
            flow.amps, flow.from, flow.to
        );
    }

    Ok(())
}
