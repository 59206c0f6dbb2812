//! Bucketing algorithms
//!
//! Each algorithm picks the alternative a new participant is assigned to.
//! They are only consulted when an experiment has at least two
//! alternatives, no winner and cohorting enabled; the
//! [`Experiment`](crate::experiment::Experiment) handles the other cases.
//!
//! | Algorithm | Strategy |
//! |---|---|
//! | [`Algorithm::WeightedSample`] | independent draw proportional to weight |
//! | [`Algorithm::SystematicSampling`] | shuffled fixed-size blocks, exact balance per block |
//! | [`Algorithm::Whiplash`] | Thompson sampling over conversion rates |

pub mod systematic_sampling;
pub mod weighted_sample;
pub mod whiplash;

use crate::experiment::{Alternative, Experiment};
use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bucketing strategy of an experiment, persisted by its snake_case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Random draw proportional to alternative weight.
    #[default]
    WeightedSample,
    /// Deterministic shuffled blocks with exact per-block balance.
    SystematicSampling,
    /// Multi-armed bandit using Thompson sampling.
    Whiplash,
}

impl Algorithm {
    /// Persisted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WeightedSample => "weighted_sample",
            Self::SystematicSampling => "systematic_sampling",
            Self::Whiplash => "whiplash",
        }
    }

    /// Pick an alternative of `experiment` for a new participant.
    ///
    /// Systematic sampling draws its randomness from the block seed and
    /// ignores `rng`.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the experiment has no alternatives;
    /// store errors.
    pub fn choose_alternative<'e, R: Rng + ?Sized>(
        self,
        experiment: &'e Experiment,
        rng: &mut R,
    ) -> Result<&'e Alternative> {
        match self {
            Self::WeightedSample => weighted_sample::choose_alternative(experiment, rng),
            Self::SystematicSampling => systematic_sampling::choose_alternative(experiment),
            Self::Whiplash => whiplash::choose_alternative(experiment, rng),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "weighted_sample" => Ok(Self::WeightedSample),
            "systematic_sampling" => Ok(Self::SystematicSampling),
            "whiplash" => Ok(Self::Whiplash),
            other => Err(Error::Config(format!("unknown algorithm '{other}'"))),
        }
    }
}

fn no_alternatives(experiment: &Experiment) -> Error {
    Error::Validation(format!(
        "experiment '{}' has no alternatives",
        experiment.name()
    ))
}
