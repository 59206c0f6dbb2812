//! User state resolver: version reconciliation and multi-experiment policy.

use super::adapter::{KvUserAdapter, SessionAdapter, UserStore};
use crate::config::MultipleExperiments;
use crate::engine::Engine;
use crate::experiment::{Experiment, UserKey};
use crate::Result;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// One user's assignment state over a [`UserStore`].
pub struct User {
    store: Box<dyn UserStore>,
    cleaned_up: bool,
}

impl User {
    /// Wrap an adapter.
    pub fn new(store: impl UserStore + 'static) -> Self {
        Self::from_boxed(Box::new(store))
    }

    /// Wrap an already boxed adapter.
    #[must_use]
    pub fn from_boxed(store: Box<dyn UserStore>) -> Self {
        Self {
            store,
            cleaned_up: false,
        }
    }

    /// User backed by a fresh [`SessionAdapter`].
    #[must_use]
    pub fn in_session() -> Self {
        Self::new(SessionAdapter::new())
    }

    /// Store-backed state of `user_id` in `engine`'s store, under the
    /// configured `persistence_namespace`.
    #[must_use]
    pub fn find(user_id: &str, engine: &Engine) -> Self {
        Self::new(KvUserAdapter::new(
            engine.store().clone(),
            &engine.config().persistence_namespace,
            user_id,
        ))
    }

    // ---------------------------------------------------------------
    // Delegation
    // ---------------------------------------------------------------

    /// Every key held, sorted.
    ///
    /// # Errors
    ///
    /// Propagates adapter errors.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.store.keys()
    }

    /// Value of `key`.
    ///
    /// # Errors
    ///
    /// Propagates adapter errors.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.get(key)
    }

    /// Store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Propagates adapter errors.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.store.set(key, value)
    }

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Propagates adapter errors.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.store.delete(key)
    }

    /// Every held key, decoded.
    ///
    /// # Errors
    ///
    /// Propagates adapter errors.
    pub fn user_keys(&self) -> Result<Vec<UserKey>> {
        Ok(self.keys()?.iter().map(|k| UserKey::parse(k)).collect())
    }

    /// Value stored under a structured key.
    ///
    /// # Errors
    ///
    /// Propagates adapter errors.
    pub fn get_key(&self, key: &UserKey) -> Result<Option<String>> {
        self.get(&key.to_string())
    }

    // ---------------------------------------------------------------
    // Reconciliation
    // ---------------------------------------------------------------

    /// Key under which this user's assignment for `experiment` lives.
    ///
    /// At version 0 this is the bare name. Later versions prefer a held
    /// bare-name key, then the first held `name:v` for `v` in
    /// `1..=version`, else the current versioned key.
    ///
    /// # Errors
    ///
    /// Propagates store and adapter errors.
    pub fn alternative_key_for_experiment(&self, experiment: &Experiment) -> Result<UserKey> {
        let current = experiment.user_key()?;
        let version = current.version().unwrap_or(0);
        if version == 0 {
            return Ok(current);
        }

        let held: Vec<UserKey> = self
            .user_keys()?
            .into_iter()
            .filter(|k| k.is_assignment() && k.experiment_name() == experiment.name())
            .collect();
        let bare = UserKey::assignment(experiment.name(), 0);
        if held.contains(&bare) {
            return Ok(bare);
        }
        Ok((1..=version)
            .map(|v| UserKey::assignment(experiment.name(), v))
            .find(|candidate| held.contains(candidate))
            .unwrap_or(current))
    }

    /// Delete every key of `experiment` (any kind) whose version differs
    /// from the current one.
    ///
    /// # Errors
    ///
    /// Propagates store and adapter errors.
    pub fn cleanup_old_versions(&mut self, experiment: &Experiment) -> Result<()> {
        let current = experiment.user_key()?;
        for key in self.user_keys()? {
            if key.experiment_name() == experiment.name() && !key.same_assignment(&current) {
                debug!(experiment = experiment.name(), key = %key, "removing stale version key");
                self.delete(&key.to_string())?;
            }
        }
        Ok(())
    }

    /// Drop assignments (and all their companions) for experiments that are
    /// missing, have a winner or were never started. Runs once per `User`.
    ///
    /// # Errors
    ///
    /// Propagates store and adapter errors.
    pub fn cleanup_old_experiments(&mut self, engine: &Engine) -> Result<()> {
        if self.cleaned_up {
            return Ok(());
        }
        let keys = self.user_keys()?;
        for assignment in keys.iter().filter(|k| k.is_assignment()) {
            let stale = match Experiment::find(engine, assignment.experiment_name())? {
                None => true,
                Some(experiment) => {
                    experiment.has_winner()? || experiment.start_time()?.is_none()
                }
            };
            if !stale {
                continue;
            }
            debug!(key = %assignment, "removing assignment of finished experiment");
            for key in keys.iter().filter(|k| k.same_assignment(assignment)) {
                self.delete(&key.to_string())?;
            }
        }
        self.cleaned_up = true;
        Ok(())
    }

    /// Experiment name to assigned alternative, for every held assignment
    /// of a saved experiment without a winner.
    ///
    /// # Errors
    ///
    /// Propagates store and adapter errors.
    pub fn active_experiments(&self, engine: &Engine) -> Result<BTreeMap<String, String>> {
        let mut active = BTreeMap::new();
        for key in self.user_keys()?.into_iter().filter(UserKey::is_assignment) {
            let Some(experiment) = Experiment::find(engine, key.experiment_name())? else {
                continue;
            };
            if experiment.has_winner()? {
                continue;
            }
            if let Some(alternative) = self.get_key(&key)? {
                active.insert(key.experiment_name().to_string(), alternative);
            }
        }
        Ok(active)
    }

    /// Whether the multi-experiment policy keeps this user out of the
    /// experiment whose assignment key is `experiment_key`.
    ///
    /// - `Disallow`: any key of another experiment, or of another version
    ///   of this one, blocks.
    /// - `Allow`: never.
    /// - `Control`: blocks while more experiments are active than those that
    ///   are this one or where the user sees the control.
    ///
    /// # Errors
    ///
    /// Propagates store and adapter errors.
    pub fn max_experiments_reached(
        &self,
        engine: &Engine,
        experiment_key: &UserKey,
    ) -> Result<bool> {
        match engine.config().allow_multiple_experiments {
            MultipleExperiments::Allow => Ok(false),
            MultipleExperiments::Disallow => Ok(self
                .user_keys()?
                .iter()
                .any(|k| !k.same_assignment(experiment_key))),
            MultipleExperiments::Control => {
                let active = self.active_experiments(engine)?;
                let mut compatible = 0;
                for (name, alternative) in &active {
                    if name == experiment_key.experiment_name() {
                        compatible += 1;
                        continue;
                    }
                    let Some(experiment) = Experiment::find(engine, name)? else {
                        continue;
                    };
                    if experiment.control().is_ok_and(|c| c.name() == alternative) {
                        compatible += 1;
                    }
                }
                Ok(active.len() > compatible)
            }
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("cleaned_up", &self.cleaned_up)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::experiment::ExperimentOptions;

    fn engine_with(policy: MultipleExperiments) -> Engine {
        Engine::in_memory(Configuration {
            allow_multiple_experiments: policy,
            ..Configuration::default()
        })
    }

    fn saved(engine: &Engine, name: &str) -> Experiment {
        let experiment = Experiment::new(
            engine,
            name,
            ExperimentOptions::new().alternatives(["control", "treatment"]),
        );
        experiment.save().unwrap();
        experiment
    }

    fn user_with(entries: &[(&str, &str)]) -> User {
        User::new(SessionAdapter::from_entries(entries.iter().copied()))
    }

    #[test]
    fn test_alternative_key_version_zero() {
        let engine = engine_with(MultipleExperiments::Allow);
        let experiment = saved(&engine, "link_color");
        let user = user_with(&[("link_color:3", "red")]);

        assert_eq!(
            user.alternative_key_for_experiment(&experiment)
                .unwrap()
                .to_string(),
            "link_color"
        );
    }

    #[test]
    fn test_alternative_key_prefers_bare_then_oldest() {
        let engine = engine_with(MultipleExperiments::Allow);
        let experiment = saved(&engine, "link_color");
        for _ in 0..3 {
            experiment.increment_version().unwrap();
        }

        let bare = user_with(&[("link_color", "red"), ("link_color:2", "blue")]);
        assert_eq!(
            bare.alternative_key_for_experiment(&experiment).unwrap().to_string(),
            "link_color"
        );

        let versioned = user_with(&[("link_color:2", "blue"), ("link_color:3", "red")]);
        assert_eq!(
            versioned
                .alternative_key_for_experiment(&experiment)
                .unwrap()
                .to_string(),
            "link_color:2"
        );

        let none = user_with(&[("link_color:finished", "true")]);
        assert_eq!(
            none.alternative_key_for_experiment(&experiment).unwrap().to_string(),
            "link_color:3"
        );
    }

    #[test]
    fn test_cleanup_old_versions_keeps_current_and_others() {
        let engine = engine_with(MultipleExperiments::Allow);
        let experiment = saved(&engine, "link_color");
        experiment.increment_version().unwrap();
        experiment.increment_version().unwrap();

        let mut user = user_with(&[
            ("link_color", "red"),
            ("link_color:finished", "true"),
            ("link_color:1", "blue"),
            ("link_color:2", "red"),
            ("link_color:2:time_of_assignment", "2024-01-01T00:00:00Z"),
            ("link_color_v2", "x"),
            ("button", "big"),
        ]);
        user.cleanup_old_versions(&experiment).unwrap();

        assert_eq!(
            user.keys().unwrap(),
            [
                "button",
                "link_color:2",
                "link_color:2:time_of_assignment",
                "link_color_v2",
            ]
        );
    }

    #[test]
    fn test_cleanup_old_experiments_removes_companions() {
        let engine = engine_with(MultipleExperiments::Allow);
        saved(&engine, "live");
        saved(&engine, "won").set_winner("treatment").unwrap();

        let mut user = user_with(&[
            ("live", "control"),
            ("won", "treatment"),
            ("won:finished", "true"),
            ("won:time_of_assignment", "2024-01-01T00:00:00Z"),
            ("won:external_key", "abc"),
            ("gone:1", "control"),
            ("gone:1:finished", "true"),
        ]);
        user.cleanup_old_experiments(&engine).unwrap();

        assert_eq!(user.keys().unwrap(), ["live"]);
    }

    #[test]
    fn test_cleanup_old_experiments_runs_once() {
        let engine = engine_with(MultipleExperiments::Allow);
        let mut user = user_with(&[]);
        user.cleanup_old_experiments(&engine).unwrap();

        user.set("gone", "control").unwrap();
        user.cleanup_old_experiments(&engine).unwrap();
        assert_eq!(user.keys().unwrap(), ["gone"]);
    }

    #[test]
    fn test_unstarted_experiment_is_cleaned_up() {
        let engine = Engine::in_memory(Configuration {
            start_manually: true,
            ..Configuration::default()
        });
        saved(&engine, "pending");
        let mut user = user_with(&[("pending", "control")]);

        user.cleanup_old_experiments(&engine).unwrap();
        assert!(user.keys().unwrap().is_empty());
    }

    #[test]
    fn test_active_experiments_skips_winners_and_unknown() {
        let engine = engine_with(MultipleExperiments::Allow);
        saved(&engine, "a");
        saved(&engine, "b").set_winner("control").unwrap();
        let user = user_with(&[
            ("a", "treatment"),
            ("a:finished", "true"),
            ("b", "control"),
            ("c", "control"),
        ]);

        let active = user.active_experiments(&engine).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active["a"], "treatment");
    }

    #[test]
    fn test_disallow_blocks_other_experiments() {
        let engine = engine_with(MultipleExperiments::Disallow);
        saved(&engine, "a");
        let user = user_with(&[("b", "control")]);

        assert!(user
            .max_experiments_reached(&engine, &UserKey::assignment("a", 0))
            .unwrap());
        assert!(!user
            .max_experiments_reached(&engine, &UserKey::assignment("b", 0))
            .unwrap());
    }

    #[test]
    fn test_disallow_blocks_other_versions_but_not_companions() {
        let engine = engine_with(MultipleExperiments::Disallow);
        let user = user_with(&[("a:2", "control"), ("a:2:finished", "true")]);

        assert!(!user
            .max_experiments_reached(&engine, &UserKey::assignment("a", 2))
            .unwrap());
        assert!(user
            .max_experiments_reached(&engine, &UserKey::assignment("a", 3))
            .unwrap());
    }

    #[test]
    fn test_allow_never_blocks() {
        let engine = engine_with(MultipleExperiments::Allow);
        let user = user_with(&[("a", "control"), ("b", "treatment")]);
        assert!(!user
            .max_experiments_reached(&engine, &UserKey::assignment("c", 0))
            .unwrap());
    }

    #[test]
    fn test_control_mode() {
        let engine = engine_with(MultipleExperiments::Control);
        saved(&engine, "a");
        saved(&engine, "b");
        saved(&engine, "c");

        let on_control = user_with(&[("a", "control"), ("b", "control")]);
        assert!(!on_control
            .max_experiments_reached(&engine, &UserKey::assignment("c", 0))
            .unwrap());

        let on_treatment = user_with(&[("a", "treatment")]);
        assert!(on_treatment
            .max_experiments_reached(&engine, &UserKey::assignment("c", 0))
            .unwrap());
        assert!(!on_treatment
            .max_experiments_reached(&engine, &UserKey::assignment("a", 0))
            .unwrap());
    }
}
