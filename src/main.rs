//! circuit-sim - run a circuit for a number of ticks and print the result.
//!
//! # Usage
//!
//! ```bash
//! circuit-sim --example voltage_divider --ticks 10
//! circuit-sim circuit.json --ticks 1000 --time-step 0.0001 --save out.json
//! ```

use std::path::PathBuf;

use clap::Parser;
use circuit_core::{
    circuits,
    error::{CircuitError, Result},
    events::LogSubscriber,
    CircuitDocument, SimulationConfig, Simulator,
};

/// Tick-driven analog circuit simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a circuit document (.json)
    #[arg(value_name = "CIRCUIT_FILE", conflicts_with = "example")]
    circuit_file: Option<PathBuf>,

    /// Run a built-in example circuit instead of a file
    #[arg(short, long)]
    example: Option<String>,

    /// Number of ticks to run
    #[arg(short = 'n', long, default_value_t = 100)]
    ticks: usize,

    /// Time step in seconds (overrides the configuration)
    #[arg(short, long)]
    time_step: Option<f64>,

    /// Simulation configuration file (.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Linearization passes per tick (overrides the configuration)
    #[arg(long)]
    passes: Option<usize>,

    /// Write the final circuit document here
    #[arg(short, long)]
    save: Option<PathBuf>,

    /// List the built-in examples and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list {
        for name in circuits::NAMES {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(passes) = args.passes {
        config = config.with_max_linearization_passes(passes);
    }

    let mut sim = match (&args.circuit_file, &args.example) {
        (Some(path), _) => Simulator::from_document(CircuitDocument::load(path)?, config)?,
        (None, Some(name)) => Simulator::with_config(circuits::by_name(name)?, config)?,
        (None, None) => {
            return Err(CircuitError::invalid_param(
                "either a circuit file or --example is required (see --list)",
            ))
        }
    };
    // Applied after loading so it also overrides a document's time step
    if let Some(dt) = args.time_step {
        let config = sim.config().clone().with_time_step(dt);
        sim.set_config(config)?;
    }

    sim.subscribe(LogSubscriber);
    sim.start();
    let stats = sim.run_for(args.ticks);

    println!("{}", sim.topology());
    println!(
        "t = {:.6}s after {} ticks ({:?}, {} conservation violation(s) on the last tick)",
        sim.time(),
        stats.tick_count,
        stats.status,
        stats.conservation_violations
    );
    for component in sim.circuit().components() {
        let state = component.state();
        let terminals: Vec<String> = component
            .terminals()
            .zip(state.voltages().iter().zip(state.currents()))
            .map(|(t, (v, i))| format!("{}={:.4}V/{:.4e}A", t, v, i))
            .collect();
        let scalars: Vec<String> = state
            .scalars()
            .iter()
            .map(|(name, value)| format!("{}={:.4e}", name, value))
            .collect();
        println!(
            "{} {:<18} {}  {}",
            component.id,
            component.kind().name(),
            terminals.join(" "),
            scalars.join(" ")
        );
    }

    if let Some(path) = &args.save {
        sim.document().save(path)?;
        println!("Saved circuit to {}", path.display());
    }

    Ok(())
}
