//! Engine configuration.
//!
//! A [`Configuration`] is built once (from code, or deserialized from TOML)
//! and shared immutably by every component through the
//! [`Engine`](crate::Engine). Every field has a default, so an empty
//! document is a valid configuration.
//!
//! ```rust
//! use split_engine::config::{Configuration, MultipleExperiments};
//!
//! let config = Configuration::from_toml_str(
//!     r#"
//!     allow_multiple_experiments = "control"
//!     beta_probability_simulations = 5000
//!
//!     [experiments.link_color]
//!     alternatives = ["red", { blue = 2.0 }]
//!     goals = ["signup"]
//!     window_of_time_for_conversion = 60
//!     "#,
//! )?;
//!
//! assert_eq!(config.allow_multiple_experiments, MultipleExperiments::Control);
//! assert_eq!(config.experiment_for("link_color").unwrap().alternatives.len(), 2);
//! # Ok::<(), split_engine::Error>(())
//! ```

use crate::algorithms::Algorithm;
use crate::experiment::AlternativeSpec;
use crate::hooks::{ExperimentHooks, Hooks};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Policy for users taking part in several experiments at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultipleExperiments {
    /// A user in one live experiment is excluded from every other.
    #[default]
    Disallow,
    /// No limit.
    Allow,
    /// Concurrency is allowed while the user sees the control alternative
    /// in all but one experiment.
    Control,
}

/// Static definition of one experiment, used when nothing is persisted yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Alternatives, control first.
    pub alternatives: Vec<AlternativeSpec>,
    /// Goal names.
    pub goals: Vec<String>,
    /// Per-alternative annotations.
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
    /// Whether finishing resets the user (defaults to `true`).
    pub resettable: Option<bool>,
    /// Bucketing algorithm (defaults to [`Configuration::algorithm`]).
    pub algorithm: Option<Algorithm>,
    /// Display name.
    pub friendly_name: Option<String>,
    /// Keep pre-reset assignments valid after a version bump.
    pub retain_user_alternatives_after_reset: Option<bool>,
    /// Conversion window in minutes; `None` means conversions always count.
    #[serde(alias = "window_of_time_for_conversion_in_minutes")]
    pub window_of_time_for_conversion: Option<u64>,
    /// Systematic sampling block magnitude.
    pub cohorting_block_magnitude: Option<usize>,
    /// Systematic sampling seed.
    pub cohorting_block_seed: Option<u64>,
}

/// Root engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    /// Global switch; when `false` every trial resolves to the control.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Require an explicit `start()` instead of starting on first save.
    #[serde(default)]
    pub start_manually: bool,
    /// Do not reset when a saved experiment's definition changes.
    #[serde(default)]
    pub reset_manually: bool,
    /// Persist overridden choices into user state.
    #[serde(default)]
    pub store_override: bool,
    /// Concurrent experiment policy.
    #[serde(default)]
    pub allow_multiple_experiments: MultipleExperiments,
    /// Monte-Carlo trials per winner estimate.
    #[serde(default = "default_beta_probability_simulations")]
    pub beta_probability_simulations: usize,
    /// Width, in seconds, of the winner recompute interval.
    #[serde(default = "default_recalculation_interval")]
    pub winning_alternative_recalculation_interval: u64,
    /// Default bucketing algorithm.
    #[serde(default)]
    pub algorithm: Algorithm,
    /// Hash key prefix used by store-backed user adapters.
    #[serde(default = "default_persistence_namespace")]
    pub persistence_namespace: String,
    /// Trial callback fired on every resolved trial.
    #[serde(default)]
    pub on_trial: Option<String>,
    /// Trial callback fired when a new participant is bucketed.
    #[serde(default)]
    pub on_trial_choose: Option<String>,
    /// Trial callback fired when a conversion is recorded.
    #[serde(default)]
    pub on_trial_complete: Option<String>,
    /// Static experiment definitions by name.
    #[serde(default)]
    pub experiments: BTreeMap<String, ExperimentConfig>,
    /// Experiment lifecycle hooks (code only).
    #[serde(skip)]
    pub hooks: Hooks,
}

impl Configuration {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) on malformed input.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Install experiment lifecycle hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl ExperimentHooks + 'static) -> Self {
        self.hooks = Hooks::new(hooks);
        self
    }

    /// Add (or replace) a static experiment definition.
    #[must_use]
    pub fn with_experiment(mut self, name: impl Into<String>, config: ExperimentConfig) -> Self {
        self.experiments.insert(name.into(), config);
        self
    }

    /// Static definition for `name`, if any.
    #[must_use]
    pub fn experiment_for(&self, name: &str) -> Option<&ExperimentConfig> {
        self.experiments.get(name)
    }

    /// Inverse of [`Self::enabled`].
    #[must_use]
    pub const fn disabled(&self) -> bool {
        !self.enabled
    }

    /// Conversion window (minutes) configured for `name`.
    #[must_use]
    pub fn conversion_window_minutes(&self, name: &str) -> Option<u64> {
        self.experiment_for(name)
            .and_then(|e| e.window_of_time_for_conversion)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            start_manually: false,
            reset_manually: false,
            store_override: false,
            allow_multiple_experiments: MultipleExperiments::default(),
            beta_probability_simulations: default_beta_probability_simulations(),
            winning_alternative_recalculation_interval: default_recalculation_interval(),
            algorithm: Algorithm::default(),
            persistence_namespace: default_persistence_namespace(),
            on_trial: None,
            on_trial_choose: None,
            on_trial_complete: None,
            experiments: BTreeMap::new(),
            hooks: Hooks::default(),
        }
    }
}

// Default functions
const fn default_enabled() -> bool {
    true
}
const fn default_beta_probability_simulations() -> usize {
    10_000
}
const fn default_recalculation_interval() -> u64 {
    60 * 60 * 24
}
fn default_persistence_namespace() -> String {
    "persistence".to_string()
}
