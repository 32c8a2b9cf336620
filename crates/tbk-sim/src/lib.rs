//! # tbk-sim
//!
//! Continuous-time Markov simulation of a two-state (active/inactive) gene
//! with Poisson-timed synthesis and exponential product decay. Produces the
//! molecule counts that the inference crates fit.

#![warn(missing_docs)]

pub mod event;
pub mod gene;

pub use gene::{GeneSimulator, GeneState, GeneTrace, KineticRates};

use rand::Rng;
use tbk_core::{Error, Result};

/// Products alive after simulating one gene for `duration`.
pub fn generate_counts<R: Rng + ?Sized>(
    k_on: f64,
    k_off: f64,
    k_syn: f64,
    k_deg: f64,
    duration: f64,
    rng: &mut R,
) -> Result<u64> {
    let sim = GeneSimulator::new(KineticRates { k_on, k_off, k_syn, k_deg })?;
    Ok(sim.run(duration, rng)?.alive)
}

/// One independent run per cell; returns the alive counts in cell order.
pub fn simulate_cells<R: Rng + ?Sized>(
    rates: KineticRates,
    duration: f64,
    cells: usize,
    rng: &mut R,
) -> Result<Vec<u64>> {
    if cells == 0 {
        return Err(Error::Validation("cells must be >= 1".to_string()));
    }
    let sim = GeneSimulator::new(rates)?;
    (0..cells).map(|_| sim.run(duration, rng).map(|t| t.alive)).collect()
}
