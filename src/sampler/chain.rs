//! Fixed-length Metropolis-Hastings chain over hypotheses.
//!
//! Lifecycle: `Running` while steps remain, `Terminated` after the last step.
//! No convergence detection; termination is guaranteed by the step budget.

use super::{MoveKind, PosteriorModel, Proposer};
use crate::models::{BoundTrial, ChainRecord, ExperimentConfig, FeatureSpace, Hypothesis, ResponseType, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Mutable state of one chain. Owned exclusively by its chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainState {
    pub hypothesis: Hypothesis,
    pub log_posterior: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    Running,
    Terminated,
}

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No move was possible; nothing was evaluated
    Skipped,
    Accepted(MoveKind),
    Rejected(MoveKind),
}

/// `min(1, exp((proposal - current) / temperature))`
pub fn acceptance_probability(current: f64, proposal: f64, temperature: f64) -> f64 {
    ((proposal - current) / temperature).exp().min(1.0)
}

/// One MCMC walk from a trial's initial hypothesis.
pub struct Chain<'a> {
    posterior: PosteriorModel<'a>,
    proposer: Proposer<'a>,
    trial: &'a BoundTrial,
    config: ExperimentConfig,
    state: ChainState,
    remaining: usize,
    proposals: usize,
    additive_moves: usize,
    subtractive_moves: usize,
}

impl<'a> Chain<'a> {
    /// Start a chain at the trial's initial hypothesis.
    pub fn new(
        posterior: PosteriorModel<'a>,
        proposer: Proposer<'a>,
        trial: &'a BoundTrial,
        config: ExperimentConfig,
    ) -> Result<Self> {
        config.validate()?;
        let hypothesis = trial.initial.clone();
        let log_posterior = posterior.log_posterior(&hypothesis, &trial.examples);
        Ok(Self {
            posterior,
            proposer,
            trial,
            config,
            state: ChainState {
                hypothesis,
                log_posterior,
            },
            remaining: config.steps,
            proposals: 0,
            additive_moves: 0,
            subtractive_moves: 0,
        })
    }

    pub fn status(&self) -> ChainStatus {
        if self.remaining > 0 {
            ChainStatus::Running
        } else {
            ChainStatus::Terminated
        }
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    /// Advance one step. A terminated chain is left untouched and reports `Skipped`.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> StepOutcome {
        if self.remaining == 0 {
            return StepOutcome::Skipped;
        }
        self.remaining -= 1;

        let proposal = self
            .proposer
            .propose(&self.state.hypothesis, self.config.p_add, rng);
        if proposal.kind == MoveKind::None {
            return StepOutcome::Skipped;
        }

        self.proposals += 1;
        let proposal_lp = self
            .posterior
            .log_posterior(&proposal.hypothesis, &self.trial.examples);
        let accept = acceptance_probability(
            self.state.log_posterior,
            proposal_lp,
            self.config.temperature,
        );

        if rng.gen_range(0.0..1.0) < accept {
            self.state = ChainState {
                hypothesis: proposal.hypothesis,
                log_posterior: proposal_lp,
            };
            match proposal.kind {
                MoveKind::Additive => self.additive_moves += 1,
                MoveKind::Subtractive => self.subtractive_moves += 1,
                MoveKind::None => {}
            }
            StepOutcome::Accepted(proposal.kind)
        } else {
            StepOutcome::Rejected(proposal.kind)
        }
    }

    /// Run the remaining steps and classify the net edit.
    pub fn run<R: Rng + ?Sized>(mut self, rng: &mut R, condition: &str, chain_index: usize) -> ChainRecord {
        while self.status() == ChainStatus::Running {
            self.step(rng);
        }
        self.finish(condition, chain_index)
    }

    /// Consume the chain into its record.
    pub fn finish(self, condition: &str, chain_index: usize) -> ChainRecord {
        let initial = &self.trial.initial;
        let final_h = self.state.hypothesis;
        ChainRecord {
            trial_id: self.trial.id.clone(),
            trial_type: self.trial.trial_type.clone(),
            condition: condition.to_string(),
            chain_index,
            initial_hypothesis: initial.clone(),
            final_length: final_h.len(),
            response_type: ResponseType::classify(initial, &final_h),
            additive_moves: self.additive_moves,
            subtractive_moves: self.subtractive_moves,
            proposals: self.proposals,
            accepted: self.additive_moves + self.subtractive_moves,
            final_log_posterior: self.state.log_posterior,
            accuracy: self.trial.accuracy(&final_h),
            final_hypothesis: final_h,
        }
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed for one chain, derived only from its coordinates.
pub fn chain_seed(base: u64, stream: u64, trial_index: usize, chain_index: usize) -> u64 {
    let mut z = splitmix64(base);
    z = splitmix64(z ^ stream);
    z = splitmix64(z ^ trial_index as u64);
    splitmix64(z ^ chain_index as u64)
}

/// Posterior model and proposal generator sharing one registry.
#[derive(Debug, Clone, Copy)]
pub struct Sampler<'a> {
    pub posterior: PosteriorModel<'a>,
    pub proposer: Proposer<'a>,
}

impl<'a> Sampler<'a> {
    pub fn new(space: &'a FeatureSpace) -> Self {
        Self {
            posterior: PosteriorModel::new(space),
            proposer: Proposer::new(space),
        }
    }

    pub fn chain(&self, trial: &'a BoundTrial, config: ExperimentConfig) -> Result<Chain<'a>> {
        Chain::new(self.posterior, self.proposer, trial, config)
    }

    /// All chains of one trial under one condition, each on its own seeded stream.
    pub fn run_trial(
        &self,
        trial: &'a BoundTrial,
        trial_index: usize,
        config: ExperimentConfig,
        seed: u64,
        stream: u64,
    ) -> Result<Vec<ChainRecord>> {
        let condition = config.label();
        (0..config.num_chains)
            .map(|chain_index| {
                let mut rng =
                    StdRng::seed_from_u64(chain_seed(seed, stream, trial_index, chain_index));
                Ok(self.chain(trial, config)?.run(&mut rng, &condition, chain_index))
            })
            .collect()
    }
}

/// Serial reference runner: every trial, every chain, in (trial, chain) order.
pub fn run_condition_sync(
    space: &FeatureSpace,
    trials: &[BoundTrial],
    config: ExperimentConfig,
    seed: u64,
    stream: u64,
) -> Result<Vec<ChainRecord>> {
    config.validate()?;
    let sampler = Sampler::new(space);
    let mut records = Vec::with_capacity(trials.len() * config.num_chains);
    for (trial_index, trial) in trials.iter().enumerate() {
        records.extend(sampler.run_trial(trial, trial_index, config, seed, stream)?);
    }
    Ok(records)
}
