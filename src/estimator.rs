//! Bayesian winner estimation
//!
//! Each alternative's conversion rate is modelled as
//! `Beta(1 + completions, 1 + participants - completions)`. A Monte-Carlo
//! run draws one sample per alternative per trial; the share of trials an
//! alternative wins is its probability of being the best, stored as
//! `p_winner` on the alternative.
//!
//! Estimation is never run on the assignment path. Hosts call
//! [`WinnerEstimator::calc_winning_alternatives`] (or
//! [`Experiment::calc_winning_alternatives`]) from reporting code; the
//! work is done at most once per recalculation interval.
//!
//! ```rust
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use split_engine::estimator::simulate_win_probabilities;
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! // 10/100 versus 30/100 conversions
//! let p = simulate_win_probabilities(&[(11.0, 91.0), (31.0, 71.0)], 2_000, &mut rng)?;
//! assert!(p[1] > 0.95);
//! # Ok::<(), split_engine::Error>(())
//! ```

use crate::config::Configuration;
use crate::experiment::Experiment;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand_distr::{Beta, Distribution};
use tracing::{debug, info};

/// Monte-Carlo estimator of each alternative's probability of winning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinnerEstimator {
    simulations: usize,
    recalculation_interval: u64,
}

impl WinnerEstimator {
    /// Estimator running `simulations` trials, recomputing at most once per
    /// `recalculation_interval` seconds. Zero values are raised to 1.
    #[must_use]
    pub fn new(simulations: usize, recalculation_interval: u64) -> Self {
        Self {
            simulations: simulations.max(1),
            recalculation_interval: recalculation_interval.max(1),
        }
    }

    /// Estimator using `beta_probability_simulations` and
    /// `winning_alternative_recalculation_interval`.
    #[must_use]
    pub fn from_config(config: &Configuration) -> Self {
        Self::new(
            config.beta_probability_simulations,
            config.winning_alternative_recalculation_interval,
        )
    }

    /// Trials per estimate.
    #[must_use]
    pub const fn simulations(&self) -> usize {
        self.simulations
    }

    /// Recompute interval width in seconds.
    #[must_use]
    pub const fn recalculation_interval(&self) -> u64 {
        self.recalculation_interval
    }

    /// Recompute win probabilities for every goal (or the no-goal slot)
    /// unless the current interval was already computed.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn calc_winning_alternatives(&self, experiment: &Experiment) -> Result<()> {
        self.calc_winning_alternatives_at(experiment, Utc::now())
    }

    /// [`Self::calc_winning_alternatives`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn calc_winning_alternatives_at(
        &self,
        experiment: &Experiment,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !experiment.can_calculate_winning_alternatives()? {
            debug!(experiment = experiment.name(), "counters inconsistent, keeping calc time");
            return Ok(());
        }
        let interval = self.interval_at(now);
        if experiment.calc_time()? == interval {
            debug!(experiment = experiment.name(), interval, "winner estimate is current");
            return Ok(());
        }

        if experiment.goals().is_empty() {
            self.estimate_winning_alternative(experiment, None)?;
        } else {
            for goal in experiment.goals() {
                self.estimate_winning_alternative(experiment, Some(goal.as_str()))?;
            }
        }
        experiment.set_calc_time(interval)?;
        info!(experiment = experiment.name(), interval, "winner estimates recomputed");
        Ok(())
    }

    /// Interval number containing `now`.
    #[must_use]
    pub fn interval_at(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp()
            .div_euclid(i64::try_from(self.recalculation_interval).unwrap_or(i64::MAX))
    }

    /// Simulate and store `p_winner` for `goal` on every alternative.
    ///
    /// Does nothing when counters are inconsistent (see
    /// [`Experiment::can_calculate_winning_alternatives`]).
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn estimate_winning_alternative(
        &self,
        experiment: &Experiment,
        goal: Option<&str>,
    ) -> Result<()> {
        if !experiment.can_calculate_winning_alternatives()? {
            debug!(experiment = experiment.name(), "counters inconsistent, skipping estimate");
            return Ok(());
        }

        let mut params = Vec::with_capacity(experiment.alternatives().len());
        for alternative in experiment.alternatives() {
            let participants = alternative.participant_count()?;
            let completions = alternative.completed_count(goal)?;
            params.push(beta_params(participants, completions));
        }

        let probabilities =
            simulate_win_probabilities(&params, self.simulations, &mut rand::thread_rng())?;
        for (alternative, probability) in experiment.alternatives().iter().zip(probabilities) {
            alternative.set_p_winner(probability, goal)?;
        }
        Ok(())
    }
}

/// `(alpha, beta)` of the posterior for the given counters.
#[must_use]
pub fn beta_params(participants: i64, completions: i64) -> (f64, f64) {
    let completions = completions.max(0);
    let failures = (participants - completions).max(0);
    (1.0 + completions as f64, 1.0 + failures as f64)
}

/// Share of `simulations` trials in which each `(alpha, beta)` arm drew the
/// largest sample. The result has one entry per arm and sums to 1 (empty
/// input yields an empty result).
///
/// # Errors
///
/// [`Error::Validation`] for non-positive or non-finite parameters.
pub fn simulate_win_probabilities<R: Rng + ?Sized>(
    params: &[(f64, f64)],
    simulations: usize,
    rng: &mut R,
) -> Result<Vec<f64>> {
    let distributions = params
        .iter()
        .map(|&(alpha, beta)| {
            Beta::new(alpha, beta).map_err(|err| {
                Error::Validation(format!("invalid beta parameters ({alpha}, {beta}): {err}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    if distributions.is_empty() || simulations == 0 {
        return Ok(vec![0.0; distributions.len()]);
    }

    let mut wins = vec![0usize; distributions.len()];
    for _ in 0..simulations {
        let mut best = 0;
        let mut best_sample = f64::NEG_INFINITY;
        for (i, dist) in distributions.iter().enumerate() {
            let sample = dist.sample(rng);
            if sample > best_sample {
                best = i;
                best_sample = sample;
            }
        }
        wins[best] += 1;
    }

    Ok(wins
        .into_iter()
        .map(|w| w as f64 / simulations as f64)
        .collect())
}
