//! Two-state gene: switches on at `k_on`, off at `k_off`; while on it
//! synthesizes products at `k_syn`; each product decays at `k_deg`.

use rand::Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};
use tbk_core::{Error, Result};

use crate::event::{EventKind, EventQueue};

/// Rate constants of the two-state model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KineticRates {
    /// Activation rate (inactive → active).
    pub k_on: f64,
    /// Deactivation rate (active → inactive).
    pub k_off: f64,
    /// Synthesis rate while active.
    pub k_syn: f64,
    /// Per-product degradation rate.
    pub k_deg: f64,
}

impl KineticRates {
    /// Reject non-finite or non-positive rates.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in
            [("k_on", self.k_on), ("k_off", self.k_off), ("k_syn", self.k_syn), ("k_deg", self.k_deg)]
        {
            if !v.is_finite() || v <= 0.0 {
                return Err(Error::Validation(format!("{name} must be finite and > 0, got {v}")));
            }
        }
        Ok(())
    }

    /// Long-run mean product count `k_on k_syn / ((k_on + k_off) k_deg)`.
    pub fn steady_state_mean(&self) -> f64 {
        self.k_on * self.k_syn / ((self.k_on + self.k_off) * self.k_deg)
    }
}

/// Transcriptional state of the gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneState {
    /// No synthesis.
    Inactive,
    /// Synthesizing.
    Active,
}

/// What happened during one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneTrace {
    /// Simulated time span.
    pub duration: f64,
    /// State at the end of the run.
    pub state: GeneState,
    /// Products alive at the end of the run.
    pub alive: u64,
    /// Total time spent active.
    pub time_active: f64,
    /// Number of state switches.
    pub switches: u64,
    /// Products synthesized.
    pub synthesized: u64,
    /// Products degraded.
    pub degraded: u64,
    /// Lifetimes of the degraded products.
    pub lifetimes: Vec<f64>,
}

impl GeneTrace {
    /// Fraction of the run spent active.
    pub fn active_fraction(&self) -> f64 {
        self.time_active / self.duration
    }

    /// Mean lifetime of degraded products, if any degraded.
    pub fn mean_lifetime(&self) -> Option<f64> {
        if self.lifetimes.is_empty() {
            return None;
        }
        Some(self.lifetimes.iter().sum::<f64>() / self.lifetimes.len() as f64)
    }
}

/// Next-event simulator of one gene.
#[derive(Debug, Clone)]
pub struct GeneSimulator {
    rates: KineticRates,
    activation: Exp<f64>,
    deactivation: Exp<f64>,
    synthesis: Exp<f64>,
    degradation: Exp<f64>,
}

fn exp(rate: f64) -> Result<Exp<f64>> {
    Exp::new(rate).map_err(|e| Error::Validation(format!("invalid rate {rate}: {e}")))
}

impl GeneSimulator {
    /// Simulator for `rates`.
    pub fn new(rates: KineticRates) -> Result<Self> {
        rates.validate()?;
        Ok(Self {
            rates,
            activation: exp(rates.k_on)?,
            deactivation: exp(rates.k_off)?,
            synthesis: exp(rates.k_syn)?,
            degradation: exp(rates.k_deg)?,
        })
    }

    /// Rate constants.
    pub fn rates(&self) -> &KineticRates {
        &self.rates
    }

    /// Run from an inactive gene with no products for `duration` time units.
    pub fn run<R: Rng + ?Sized>(&self, duration: f64, rng: &mut R) -> Result<GeneTrace> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(Error::Validation(format!("duration must be finite and > 0, got {duration}")));
        }

        let mut queue = EventQueue::new();
        let mut state = GeneState::Inactive;
        let mut generation = 0u64;
        let mut activated_at = 0.0;

        let mut trace = GeneTrace {
            duration,
            state,
            alive: 0,
            time_active: 0.0,
            switches: 0,
            synthesized: 0,
            degraded: 0,
            lifetimes: Vec::new(),
        };

        queue.push(self.activation.sample(rng), EventKind::Switch);

        while let Some(event) = queue.pop() {
            let t = event.time;
            if t > duration {
                break;
            }

            match event.kind {
                EventKind::Switch => {
                    trace.switches += 1;
                    match state {
                        GeneState::Inactive => {
                            state = GeneState::Active;
                            generation += 1;
                            activated_at = t;
                            queue.push(t + self.deactivation.sample(rng), EventKind::Switch);
                            queue.push(t + self.synthesis.sample(rng), EventKind::Synthesis { generation });
                        }
                        GeneState::Active => {
                            state = GeneState::Inactive;
                            trace.time_active += t - activated_at;
                            queue.push(t + self.activation.sample(rng), EventKind::Switch);
                        }
                    }
                }
                EventKind::Synthesis { generation: scheduled_in } => {
                    // Left over from an earlier active period.
                    if state != GeneState::Active || scheduled_in != generation {
                        continue;
                    }
                    trace.alive += 1;
                    trace.synthesized += 1;
                    queue.push(t + self.degradation.sample(rng), EventKind::Degradation { born: t });
                    queue.push(t + self.synthesis.sample(rng), EventKind::Synthesis { generation });
                }
                EventKind::Degradation { born } => {
                    trace.alive -= 1;
                    trace.degraded += 1;
                    trace.lifetimes.push(t - born);
                }
            }
        }

        if state == GeneState::Active {
            trace.time_active += duration - activated_at;
        }
        trace.state = state;
        log::trace!(
            "gene run: {} switches, {} synthesized, {} alive",
            trace.switches,
            trace.synthesized,
            trace.alive
        );
        Ok(trace)
    }
}
