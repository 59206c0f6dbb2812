//! Request-level entry points.
//!
//! ```rust
//! use split_engine::config::Configuration;
//! use split_engine::helper::{AbTestOptions, FinishOptions};
//! use split_engine::user::User;
//! use split_engine::Engine;
//!
//! let engine = Engine::in_memory(Configuration::default());
//! let mut user = User::in_session();
//!
//! let options = AbTestOptions::with_alternatives(["blue", "red"]);
//! let color = engine.ab_test(&mut user, "link_color", options, None)?;
//! assert!(color == "blue" || color == "red");
//!
//! assert!(engine.ab_finished(&mut user, "link_color", FinishOptions::default(), None)?);
//! # Ok::<(), split_engine::Error>(())
//! ```

use crate::engine::Engine;
use crate::experiment::{AlternativeSpec, Experiment, ExperimentCatalog, ExperimentOptions};
use crate::hooks::TrialHost;
use crate::trial::{Trial, TrialOptions};
use crate::user::User;
use crate::Result;
use std::collections::BTreeMap;
use tracing::debug;

/// Options for [`Engine::ab_test`].
#[derive(Debug, Clone, Default)]
pub struct AbTestOptions {
    /// Experiment definition; empty alternatives fall back to the
    /// configured or saved definition.
    pub experiment: ExperimentOptions,
    /// Per-call trial options.
    pub trial: TrialOptions,
}

impl AbTestOptions {
    /// Options declaring `alternatives`, control first.
    pub fn with_alternatives<I, A>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AlternativeSpec>,
    {
        Self {
            experiment: ExperimentOptions::new().alternatives(alternatives),
            trial: TrialOptions::default(),
        }
    }
}

/// Options for [`Engine::ab_finished`].
#[derive(Debug, Clone)]
pub struct FinishOptions {
    /// Remove the user's assignment afterwards when the experiment is
    /// resettable.
    pub reset: bool,
    /// Goals to credit; empty credits the no-goal slot.
    pub goals: Vec<String>,
}

impl Default for FinishOptions {
    fn default() -> Self {
        Self {
            reset: true,
            goals: Vec::new(),
        }
    }
}

impl Engine {
    /// Save (or load) experiment `name`, run a trial for `user` and return
    /// the alternative shown.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`](crate::Error::Validation) when no definition is
    /// available; store and adapter errors.
    pub fn ab_test(
        &self,
        user: &mut User,
        name: &str,
        options: AbTestOptions,
        host: Option<&mut dyn TrialHost>,
    ) -> Result<String> {
        let experiment = ExperimentCatalog::new(self).find_or_create(name, options.experiment)?;
        let mut trial = Trial::new(experiment, user, options.trial);
        Ok(trial.choose(host)?.name().to_string())
    }

    /// Record a conversion for `user` in experiment `name`.
    ///
    /// Nothing happens when the experiment is missing, has a winner or the
    /// user holds no assignment. Returns whether a conversion was counted.
    ///
    /// # Errors
    ///
    /// Propagates store and adapter errors.
    pub fn ab_finished(
        &self,
        user: &mut User,
        name: &str,
        options: FinishOptions,
        host: Option<&mut dyn TrialHost>,
    ) -> Result<bool> {
        let Some(experiment) = Experiment::find(self, name)? else {
            debug!(experiment = name, "finish for unknown experiment");
            return Ok(false);
        };
        if experiment.has_winner()? {
            return Ok(false);
        }
        let should_reset = experiment.resettable() && options.reset;

        let trial_options = TrialOptions {
            goals: options.goals,
            ..TrialOptions::default()
        };
        let (key, counted) = {
            let mut trial = Trial::resume(experiment, user, trial_options)?;
            let Some(key) = trial.user_key().cloned() else {
                return Ok(false);
            };
            (key, trial.complete(host)?)
        };

        if should_reset {
            user.delete(&key.to_string())?;
            user.delete(&key.finished().to_string())?;
            user.delete(&key.time_of_assignment().to_string())?;
        }
        Ok(counted)
    }

    /// Experiment name to assigned alternative for `user`'s running
    /// experiments.
    ///
    /// # Errors
    ///
    /// Propagates store and adapter errors.
    pub fn ab_active_experiments(&self, user: &User) -> Result<BTreeMap<String, String>> {
        user.active_experiments(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, ExperimentConfig};

    #[test]
    fn test_ab_test_creates_and_is_sticky() {
        let engine = Engine::in_memory(Configuration::default());
        let mut user = User::in_session();
        let options = AbTestOptions::with_alternatives(["a", "b", "c"]);

        let first = engine.ab_test(&mut user, "layout", options.clone(), None).unwrap();
        for _ in 0..5 {
            assert_eq!(engine.ab_test(&mut user, "layout", options.clone(), None).unwrap(), first);
        }
        let experiment = Experiment::find(&engine, "layout").unwrap().unwrap();
        assert_eq!(experiment.participant_count().unwrap(), 1);
    }

    #[test]
    fn test_ab_test_rejects_colon_in_name() {
        let engine = Engine::in_memory(Configuration::default());
        let mut user = User::in_session();
        let options = AbTestOptions::with_alternatives(["control", "one_page"]);

        assert!(matches!(
            engine.ab_test(&mut user, "checkout:v2", options.clone(), None),
            Err(crate::Error::Validation(_))
        ));
        assert!(user.keys().unwrap().is_empty());

        let first = engine.ab_test(&mut user, "checkout_v2", options.clone(), None).unwrap();
        for _ in 0..5 {
            let again = engine.ab_test(&mut user, "checkout_v2", options.clone(), None).unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_ab_test_uses_configured_definition() {
        let engine = Engine::in_memory(Configuration::default().with_experiment(
            "layout",
            ExperimentConfig {
                alternatives: vec!["only".into()],
                ..ExperimentConfig::default()
            },
        ));
        let mut user = User::in_session();
        assert_eq!(
            engine.ab_test(&mut user, "layout", AbTestOptions::default(), None).unwrap(),
            "only"
        );
    }

    #[test]
    fn test_ab_finished_resets_user() {
        let engine = Engine::in_memory(Configuration::default());
        let mut user = User::in_session();
        let name = engine
            .ab_test(&mut user, "layout", AbTestOptions::with_alternatives(["a", "b"]), None)
            .unwrap();

        assert!(engine.ab_finished(&mut user, "layout", FinishOptions::default(), None).unwrap());
        assert!(user.keys().unwrap().is_empty());
        assert!(!engine.ab_finished(&mut user, "layout", FinishOptions::default(), None).unwrap());

        let experiment = Experiment::find(&engine, "layout").unwrap().unwrap();
        assert_eq!(experiment.alternative(&name).unwrap().completed_count(None).unwrap(), 1);
    }

    #[test]
    fn test_ab_finished_without_reset_marks_finished() {
        let engine = Engine::in_memory(Configuration::default());
        let mut user = User::in_session();
        engine
            .ab_test(&mut user, "layout", AbTestOptions::with_alternatives(["a", "b"]), None)
            .unwrap();
        let options = FinishOptions {
            reset: false,
            ..FinishOptions::default()
        };

        assert!(engine.ab_finished(&mut user, "layout", options.clone(), None).unwrap());
        assert!(!engine.ab_finished(&mut user, "layout", options, None).unwrap());
        assert_eq!(user.get("layout:finished").unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn test_ab_finished_ignores_unknown_and_won() {
        let engine = Engine::in_memory(Configuration::default());
        let mut user = User::in_session();
        assert!(!engine.ab_finished(&mut user, "ghost", FinishOptions::default(), None).unwrap());

        engine
            .ab_test(&mut user, "layout", AbTestOptions::with_alternatives(["a", "b"]), None)
            .unwrap();
        Experiment::find(&engine, "layout").unwrap().unwrap().set_winner("b").unwrap();
        assert!(!engine.ab_finished(&mut user, "layout", FinishOptions::default(), None).unwrap());
    }

    #[test]
    fn test_active_experiments() {
        let engine = Engine::in_memory(Configuration {
            allow_multiple_experiments: crate::config::MultipleExperiments::Allow,
            ..Configuration::default()
        });
        let mut user = User::in_session();
        let a = engine
            .ab_test(&mut user, "one", AbTestOptions::with_alternatives(["x", "y"]), None)
            .unwrap();
        let b = engine
            .ab_test(&mut user, "two", AbTestOptions::with_alternatives(["x", "y"]), None)
            .unwrap();

        let active = engine.ab_active_experiments(&user).unwrap();
        assert_eq!(active.get("one"), Some(&a));
        assert_eq!(active.get("two"), Some(&b));
    }
}
