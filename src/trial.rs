//! Trial: one resolution of the alternative a user sees, plus its conversion.
//!
//! [`Trial::choose`] evaluates, in order:
//!
//! 1. a caller override naming a real alternative;
//! 2. global disable, per-call `disabled`/`exclude`, or cohorting disabled
//!    on the experiment, all of which yield the control silently;
//! 3. a recorded winner;
//! 4. the user's live assignment, when it names a real alternative;
//! 5. a fresh pick from the bucketing algorithm.
//!
//! Before (4), stale versions of the user's keys are removed (unless the
//! experiment retains assignments across resets) and the user is excluded
//! when the experiment has not started or the multi-experiment policy
//! forbids it. Only (5) counts a new participant.
//!
//! ```rust
//! use split_engine::config::Configuration;
//! use split_engine::experiment::{Experiment, ExperimentOptions};
//! use split_engine::trial::{Trial, TrialOptions};
//! use split_engine::user::User;
//! use split_engine::Engine;
//!
//! let engine = Engine::in_memory(Configuration::default());
//! let experiment = Experiment::new(
//!     &engine,
//!     "link_color",
//!     ExperimentOptions::new().alternatives(["blue", "red"]),
//! );
//! experiment.save()?;
//!
//! let mut user = User::in_session();
//! let mut trial = Trial::new(experiment, &mut user, TrialOptions::default());
//! let shown = trial.choose(None)?.name().to_string();
//! assert!(trial.complete(None)?);
//!
//! // The same user keeps seeing the same alternative.
//! let experiment = Experiment::find(&engine, "link_color")?.unwrap();
//! let mut again = Trial::new(experiment, &mut user, TrialOptions::default());
//! assert_eq!(again.choose(None)?.name(), shown);
//! # Ok::<(), split_engine::Error>(())
//! ```

use crate::experiment::{Alternative, Experiment, UserKey};
use crate::hooks::{run_callback, TrialHost};
use crate::timestamp::parse_timestamp;
use crate::user::User;
use crate::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Per-call trial options.
#[derive(Debug, Clone, Default)]
pub struct TrialOptions {
    /// Force this alternative when it exists.
    pub override_alternative: Option<String>,
    /// Show the control and record nothing.
    pub exclude: bool,
    /// Show the control and record nothing.
    pub disabled: bool,
    /// Goals credited on completion; empty credits the no-goal slot.
    pub goals: Vec<String>,
    /// Metadata returned by [`Trial::metadata`] instead of the experiment's.
    pub metadata: Option<serde_json::Value>,
}

/// How a trial reached its alternative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Caller override.
    Override,
    /// Control shown without participation.
    Excluded,
    /// Experiment winner.
    Winner,
    /// Assignment the user already held.
    Existing,
    /// Newly bucketed participant.
    NewParticipant,
}

/// One user's trial of one experiment.
#[derive(Debug)]
pub struct Trial<'a> {
    experiment: Experiment,
    user: &'a mut User,
    options: TrialOptions,
    alternative: Option<Alternative>,
    key: Option<UserKey>,
    resolution: Option<Resolution>,
}

impl<'a> Trial<'a> {
    /// Unresolved trial of `experiment` for `user`.
    pub fn new(experiment: Experiment, user: &'a mut User, options: TrialOptions) -> Self {
        Self {
            experiment,
            user,
            options,
            alternative: None,
            key: None,
            resolution: None,
        }
    }

    /// Trial bound to the assignment `user` already holds, without
    /// bucketing. The alternative stays unset when there is none.
    ///
    /// # Errors
    ///
    /// Propagates store and adapter errors.
    pub fn resume(
        experiment: Experiment,
        user: &'a mut User,
        options: TrialOptions,
    ) -> Result<Self> {
        let mut trial = Self::new(experiment, user, options);
        let key = trial.lookup_key()?;
        if let Some(alternative) = trial.held_alternative(&key)? {
            trial.alternative = Some(alternative);
            trial.key = Some(key);
            trial.resolution = Some(Resolution::Existing);
        }
        Ok(trial)
    }

    /// The experiment under trial.
    #[must_use]
    pub const fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    /// The resolved alternative, if any.
    #[must_use]
    pub const fn alternative(&self) -> Option<&Alternative> {
        self.alternative.as_ref()
    }

    /// How the alternative was resolved.
    #[must_use]
    pub const fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    /// Where the user's assignment lives, when the user participates.
    #[must_use]
    pub const fn user_key(&self) -> Option<&UserKey> {
        self.key.as_ref()
    }

    /// Goals credited on completion.
    #[must_use]
    pub fn goals(&self) -> &[String] {
        &self.options.goals
    }

    /// Per-call metadata, else the experiment's metadata for the resolved
    /// alternative.
    #[must_use]
    pub fn metadata(&self) -> Option<serde_json::Value> {
        if let Some(metadata) = &self.options.metadata {
            return Some(metadata.clone());
        }
        let alternative = self.alternative.as_ref()?;
        self.experiment
            .metadata()?
            .get(alternative.name())
            .cloned()
    }

    /// Resolve the alternative (once per trial) and fire trial callbacks
    /// on `host`.
    ///
    /// # Errors
    ///
    /// Propagates store and adapter errors; [`Error::Validation`](crate::Error::Validation)
    /// when the experiment has no alternatives.
    pub fn choose(&mut self, mut host: Option<&mut dyn TrialHost>) -> Result<&Alternative> {
        if self.alternative.is_none() {
            self.resolve()?;
            let config = self.experiment.engine().config();
            let resolution = self.resolution;
            if resolution == Some(Resolution::NewParticipant) {
                run_callback(&mut host, config.on_trial_choose.as_deref(), self);
            }
            if resolution != Some(Resolution::Excluded) {
                run_callback(&mut host, config.on_trial.as_deref(), self);
            }
        }
        match &self.alternative {
            Some(alternative) => Ok(alternative),
            None => self.experiment.control(),
        }
    }

    fn resolve(&mut self) -> Result<()> {
        let engine = self.experiment.engine().clone();
        let config = engine.config();
        self.user.cleanup_old_experiments(&engine)?;

        if let Some(alternative) = self.override_alternative() {
            if config.store_override {
                let key = self.experiment.user_key()?;
                if self.user.get_key(&key)?.is_none() {
                    alternative.increment_participation()?;
                    self.persist_assignment(&key, &alternative, Utc::now())?;
                } else {
                    self.user.set(&key.to_string(), alternative.name())?;
                }
                self.key = Some(key);
            }
            return self.resolved(alternative, Resolution::Override);
        }

        if config.disabled()
            || self.options.disabled
            || self.options.exclude
            || self.experiment.cohorting_disabled()?
        {
            let control = self.experiment.control()?.clone();
            return self.resolved(control, Resolution::Excluded);
        }

        if let Some(winner) = self.experiment.winner()? {
            return self.resolved(winner, Resolution::Winner);
        }

        if self.experiment.version()? > 0
            && !self.experiment.retain_user_alternatives_after_reset()
        {
            self.user.cleanup_old_versions(&self.experiment)?;
        }
        let key = self.lookup_key()?;

        if self.experiment.start_time()?.is_none()
            || self.user.max_experiments_reached(&engine, &key)?
        {
            let control = self.experiment.control()?.clone();
            return self.resolved(control, Resolution::Excluded);
        }

        if let Some(alternative) = self.held_alternative(&key)? {
            self.key = Some(key);
            return self.resolved(alternative, Resolution::Existing);
        }

        let alternative = self.experiment.next_alternative()?;
        alternative.increment_participation()?;
        self.persist_assignment(&key, &alternative, Utc::now())?;
        self.key = Some(key);
        self.resolved(alternative, Resolution::NewParticipant)
    }

    fn resolved(&mut self, alternative: Alternative, resolution: Resolution) -> Result<()> {
        debug!(
            experiment = self.experiment.name(),
            alternative = alternative.name(),
            ?resolution,
            "trial resolved"
        );
        self.alternative = Some(alternative);
        self.resolution = Some(resolution);
        Ok(())
    }

    fn override_alternative(&self) -> Option<Alternative> {
        let name = self.options.override_alternative.as_deref()?;
        self.experiment.alternative(name).cloned()
    }

    fn lookup_key(&self) -> Result<UserKey> {
        if self.experiment.retain_user_alternatives_after_reset() {
            self.user.alternative_key_for_experiment(&self.experiment)
        } else {
            self.experiment.user_key()
        }
    }

    fn held_alternative(&self, key: &UserKey) -> Result<Option<Alternative>> {
        Ok(self
            .user
            .get_key(key)?
            .and_then(|name| self.experiment.alternative(&name).cloned()))
    }

    fn persist_assignment(
        &mut self,
        key: &UserKey,
        alternative: &Alternative,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.user.set(&key.to_string(), alternative.name())?;
        self.user
            .set(&key.time_of_assignment().to_string(), &now.to_rfc3339())
    }

    /// Record a conversion now. See [`Self::complete_at`].
    ///
    /// # Errors
    ///
    /// Propagates store and adapter errors.
    pub fn complete(&mut self, host: Option<&mut dyn TrialHost>) -> Result<bool> {
        self.complete_at(host, Utc::now())
    }

    /// Credit the trial's goals (or the no-goal slot) to the resolved
    /// alternative, at most once per assignment.
    ///
    /// Returns `false` without recording when the user does not
    /// participate, has already converted, or is outside the experiment's
    /// conversion window at `now`.
    ///
    /// # Errors
    ///
    /// Propagates store and adapter errors.
    pub fn complete_at(
        &mut self,
        mut host: Option<&mut dyn TrialHost>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let (Some(alternative), Some(key)) = (&self.alternative, &self.key) else {
            return Ok(false);
        };
        let finished = key.finished();
        if self.user.get_key(&finished)?.is_some() {
            return Ok(false);
        }
        if !self.within_conversion_window(key, now)? {
            debug!(experiment = self.experiment.name(), key = %key, "conversion outside window");
            return Ok(false);
        }

        if self.options.goals.is_empty() {
            alternative.increment_completion(None)?;
        } else {
            for goal in &self.options.goals {
                alternative.increment_completion(Some(goal))?;
            }
        }
        self.user.set(&finished.to_string(), "true")?;
        debug!(
            experiment = self.experiment.name(),
            alternative = alternative.name(),
            "conversion recorded"
        );

        let config = self.experiment.engine().config();
        run_callback(&mut host, config.on_trial_complete.as_deref(), self);
        Ok(true)
    }

    fn within_conversion_window(&self, key: &UserKey, now: DateTime<Utc>) -> Result<bool> {
        let config = self.experiment.engine().config();
        let Some(window) = config.conversion_window_minutes(self.experiment.name()) else {
            return Ok(true);
        };
        let assigned = self
            .user
            .get_key(&key.time_of_assignment())?
            .and_then(|raw| parse_timestamp(&raw));
        let Some(assigned) = assigned else {
            return Ok(false);
        };
        let window_secs = i64::try_from(window.saturating_mul(60)).unwrap_or(i64::MAX);
        Ok((now - assigned).num_seconds() <= window_secs)
    }
}
