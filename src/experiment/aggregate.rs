//! Experiment - the aggregate owning alternatives, goals, version and winner

use super::alternative::{Alternative, AlternativeSpec};
use super::goals::{goals_key, GoalsCollection};
use super::key::UserKey;
use crate::algorithms::Algorithm;
use crate::engine::Engine;
use crate::estimator::WinnerEstimator;
use crate::timestamp::parse_timestamp;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Per-alternative annotations.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Default number of times each alternative appears in a systematic
/// sampling block.
pub const DEFAULT_COHORTING_BLOCK_MAGNITUDE: usize = 100;

/// Default seed for systematic sampling blocks.
pub const DEFAULT_COHORTING_BLOCK_SEED: u64 = 0;

const EXPERIMENTS_SET: &str = "experiments";
const WINNERS_HASH: &str = "experiment_winner";
const START_TIMES_HASH: &str = "experiment_start_times";

const FIELD_RESETTABLE: &str = "resettable";
const FIELD_ALGORITHM: &str = "algorithm";
const FIELD_RETAIN: &str = "retain_user_alternatives_after_reset";
const FIELD_COHORTING: &str = "cohorting";
const FIELD_CALC_TIME: &str = "calc_time";
const FIELD_BLOCK_INDEX: &str = "cohorting_block_index";
const FIELD_BLOCK_MAGNITUDE: &str = "cohorting_block_magnitude";
const FIELD_BLOCK_SEED: &str = "cohorting_block_seed";

/// Declared shape of an experiment. Unset fields fall back to the
/// configured experiment definition, then to engine defaults.
#[derive(Debug, Clone, Default)]
pub struct ExperimentOptions {
    alternatives: Vec<AlternativeSpec>,
    goals: Option<Vec<String>>,
    metadata: Option<Metadata>,
    resettable: Option<bool>,
    algorithm: Option<Algorithm>,
    friendly_name: Option<String>,
    retain_user_alternatives_after_reset: Option<bool>,
    cohorting_block_magnitude: Option<usize>,
    cohorting_block_seed: Option<u64>,
}

impl ExperimentOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the alternatives, control first.
    #[must_use]
    pub fn alternatives<I, A>(mut self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AlternativeSpec>,
    {
        self.alternatives = alternatives.into_iter().map(Into::into).collect();
        self
    }

    /// Set the goal names.
    #[must_use]
    pub fn goals<I, G>(mut self, goals: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        self.goals = Some(goals.into_iter().map(Into::into).collect());
        self
    }

    /// Set per-alternative metadata.
    #[must_use]
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set whether finishing resets the user.
    #[must_use]
    pub const fn resettable(mut self, resettable: bool) -> Self {
        self.resettable = Some(resettable);
        self
    }

    /// Set the bucketing algorithm.
    #[must_use]
    pub const fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn friendly_name(mut self, friendly_name: impl Into<String>) -> Self {
        self.friendly_name = Some(friendly_name.into());
        self
    }

    /// Keep pre-reset assignments valid after a version bump.
    #[must_use]
    pub const fn retain_user_alternatives_after_reset(mut self, retain: bool) -> Self {
        self.retain_user_alternatives_after_reset = Some(retain);
        self
    }

    /// Set the systematic sampling block magnitude.
    #[must_use]
    pub const fn cohorting_block_magnitude(mut self, magnitude: usize) -> Self {
        self.cohorting_block_magnitude = Some(magnitude);
        self
    }

    /// Set the systematic sampling seed.
    #[must_use]
    pub const fn cohorting_block_seed(mut self, seed: u64) -> Self {
        self.cohorting_block_seed = Some(seed);
        self
    }

    /// Whether any alternatives were declared.
    #[must_use]
    pub fn has_alternatives(&self) -> bool {
        !self.alternatives.is_empty()
    }
}

/// An A/B experiment and its persisted state.
///
/// In-memory fields hold the declared definition; counters, version,
/// winner, start time and cohorting flag are always read from the store.
#[derive(Debug, Clone)]
pub struct Experiment {
    name: String,
    alternatives: Vec<Alternative>,
    goals: Vec<String>,
    metadata: Option<Metadata>,
    friendly_name: String,
    resettable: bool,
    retain_user_alternatives_after_reset: bool,
    algorithm: Algorithm,
    cohorting_block_magnitude: usize,
    cohorting_block_seed: u64,
    engine: Engine,
}

impl Experiment {
    /// Declare an experiment. Nothing is written until [`Self::save`].
    ///
    /// When `options` has no alternatives, the configured definition for
    /// `name` (if any) supplies alternatives, goals, metadata and flags.
    #[must_use]
    pub fn new(engine: &Engine, name: impl Into<String>, mut options: ExperimentOptions) -> Self {
        let name = name.into();

        if options.alternatives.is_empty() {
            if let Some(cfg) = engine.config().experiment_for(&name) {
                options.alternatives.clone_from(&cfg.alternatives);
                options.goals = Some(cfg.goals.clone());
                options.metadata.clone_from(&cfg.metadata);
                options.resettable = options.resettable.or(cfg.resettable);
                options.algorithm = options.algorithm.or(cfg.algorithm);
                options.friendly_name = options.friendly_name.or_else(|| cfg.friendly_name.clone());
                options.retain_user_alternatives_after_reset = options
                    .retain_user_alternatives_after_reset
                    .or(cfg.retain_user_alternatives_after_reset);
                options.cohorting_block_magnitude = options
                    .cohorting_block_magnitude
                    .or(cfg.cohorting_block_magnitude);
                options.cohorting_block_seed =
                    options.cohorting_block_seed.or(cfg.cohorting_block_seed);
            }
        }

        let store = engine.store();
        let alternatives = options
            .alternatives
            .into_iter()
            .map(|spec| Alternative::new(spec, name.clone(), store.clone()))
            .collect();
        let goals =
            GoalsCollection::new(name.clone(), options.goals.unwrap_or_default(), store.clone())
                .into_goals();

        Self {
            friendly_name: options.friendly_name.unwrap_or_else(|| name.clone()),
            alternatives,
            goals,
            metadata: options.metadata,
            resettable: options.resettable.unwrap_or(true),
            retain_user_alternatives_after_reset: options
                .retain_user_alternatives_after_reset
                .unwrap_or(false),
            algorithm: options.algorithm.unwrap_or(engine.config().algorithm),
            cohorting_block_magnitude: options
                .cohorting_block_magnitude
                .unwrap_or(DEFAULT_COHORTING_BLOCK_MAGNITUDE),
            cohorting_block_seed: options
                .cohorting_block_seed
                .unwrap_or(DEFAULT_COHORTING_BLOCK_SEED),
            engine: engine.clone(),
            name,
        }
    }

    /// Load a persisted experiment. `Ok(None)` when `name` was never saved
    /// (or has been deleted).
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn find(engine: &Engine, name: &str) -> Result<Option<Self>> {
        if !engine.store().exists(name)? {
            return Ok(None);
        }
        let mut experiment = Self::new(
            engine,
            name,
            ExperimentOptions::new().alternatives([AlternativeSpec::from(name)]),
        );
        experiment.load_from_store()?;
        Ok(Some(experiment))
    }

    /// Replace the in-memory definition with the persisted one.
    ///
    /// Malformed persisted fields fall back to defaults with a warning.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn load_from_store(&mut self) -> Result<()> {
        let store = self.engine.store().clone();
        let config = store.hgetall(&self.config_key())?;

        self.resettable = config.get(FIELD_RESETTABLE).map_or(true, |v| v == "true");
        self.retain_user_alternatives_after_reset =
            config.get(FIELD_RETAIN).is_some_and(|v| v == "true");
        self.algorithm = match config.get(FIELD_ALGORITHM) {
            None => self.engine.config().algorithm,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(
                    experiment = %self.name,
                    algorithm = %raw,
                    "unknown algorithm, using default"
                );
                self.engine.config().algorithm
            }),
        };
        self.cohorting_block_magnitude = config
            .get(FIELD_BLOCK_MAGNITUDE)
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_COHORTING_BLOCK_MAGNITUDE);
        self.cohorting_block_seed = config
            .get(FIELD_BLOCK_SEED)
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_COHORTING_BLOCK_SEED);

        self.friendly_name = store
            .get(&self.friendly_name_key())?
            .unwrap_or_else(|| self.name.clone());
        self.alternatives = self
            .load_alternative_specs()?
            .into_iter()
            .map(|spec| Alternative::new(spec, self.name.clone(), store.clone()))
            .collect();
        self.goals = GoalsCollection::load_from_store(&self.name, store)?.into_goals();
        self.metadata = self.load_metadata()?;
        Ok(())
    }

    /// Validate and persist.
    ///
    /// An unseen experiment is started (unless `start_manually`) and its
    /// definition written. A seen experiment whose alternatives, goals or
    /// metadata changed is reset (unless `reset_manually`) and rewritten.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] before any write; store errors otherwise.
    pub fn save(&self) -> Result<()> {
        self.validate()?;
        let config = self.engine.config();

        if self.is_new_record()? {
            if !config.start_manually {
                self.start()?;
            }
            self.persist_configuration()?;
            info!(
                experiment = %self.name,
                alternatives = self.alternatives.len(),
                "experiment created"
            );
        } else if self.configuration_has_changed()? {
            if !config.reset_manually {
                self.reset()?;
            }
            self.persist_configuration()?;
            info!(experiment = %self.name, "experiment definition changed");
        }

        let store = self.engine.store();
        let key = self.config_key();
        store.hset(&key, FIELD_RESETTABLE, bool_str(self.resettable))?;
        store.hset(&key, FIELD_ALGORITHM, self.algorithm.as_str())?;
        store.hset(&key, FIELD_RETAIN, bool_str(self.retain_user_alternatives_after_reset))?;
        store.hset(&key, FIELD_BLOCK_MAGNITUDE, &self.cohorting_block_magnitude.to_string())?;
        store.hset(&key, FIELD_BLOCK_SEED, &self.cohorting_block_seed.to_string())?;
        Ok(())
    }

    /// Check the definition without touching the store.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for a blank name or one containing `:`, no
    /// alternatives, an invalid or duplicated alternative, or a blank goal.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains(':') {
            return Err(Error::Validation(format!(
                "experiment name '{}' must be non-empty and free of ':'",
                self.name
            )));
        }
        if self.alternatives.is_empty() {
            return Err(Error::Validation(format!(
                "experiment '{}' has no alternatives",
                self.name
            )));
        }
        for (i, alternative) in self.alternatives.iter().enumerate() {
            alternative.validate()?;
            if self.alternatives[..i]
                .iter()
                .any(|a| a.name() == alternative.name())
            {
                return Err(Error::Validation(format!(
                    "experiment '{}' lists alternative '{}' twice",
                    self.name,
                    alternative.name()
                )));
            }
        }
        GoalsCollection::new(self.name.clone(), self.goals.clone(), self.engine.store().clone())
            .validate()
    }

    /// Whether nothing has been persisted under this name.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn is_new_record(&self) -> Result<bool> {
        Ok(!self.engine.store().exists(&self.name)?)
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    /// Experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alternatives, control first.
    #[must_use]
    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    /// Alternative called `name`.
    #[must_use]
    pub fn alternative(&self, name: &str) -> Option<&Alternative> {
        self.alternatives.iter().find(|a| a.name() == name)
    }

    /// The first alternative.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the experiment has no alternatives.
    pub fn control(&self) -> Result<&Alternative> {
        self.alternatives.first().ok_or_else(|| {
            Error::Validation(format!("experiment '{}' has no alternatives", self.name))
        })
    }

    /// Goal names in insertion order.
    #[must_use]
    pub fn goals(&self) -> &[String] {
        &self.goals
    }

    /// Per-alternative metadata.
    #[must_use]
    pub const fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Display name.
    #[must_use]
    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// Whether finishing resets the user.
    #[must_use]
    pub const fn resettable(&self) -> bool {
        self.resettable
    }

    /// Set whether finishing resets the user (persisted on save).
    pub fn set_resettable(&mut self, resettable: bool) {
        self.resettable = resettable;
    }

    /// Whether pre-reset assignments stay valid after a version bump.
    #[must_use]
    pub const fn retain_user_alternatives_after_reset(&self) -> bool {
        self.retain_user_alternatives_after_reset
    }

    /// Set the retention flag (persisted on save).
    pub fn set_retain_user_alternatives_after_reset(&mut self, retain: bool) {
        self.retain_user_alternatives_after_reset = retain;
    }

    /// Bucketing algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Change the bucketing algorithm (persisted on save).
    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.algorithm = algorithm;
    }

    /// Times each alternative appears in a systematic sampling block.
    #[must_use]
    pub const fn cohorting_block_magnitude(&self) -> usize {
        self.cohorting_block_magnitude
    }

    /// Seed for systematic sampling blocks.
    #[must_use]
    pub const fn cohorting_block_seed(&self) -> u64 {
        self.cohorting_block_seed
    }

    /// Engine this experiment is bound to.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Participants across all alternatives.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn participant_count(&self) -> Result<i64> {
        self.alternatives
            .iter()
            .try_fold(0, |sum, a| Ok(sum + a.participant_count()?))
    }

    // ---------------------------------------------------------------
    // Versioning and keys
    // ---------------------------------------------------------------

    /// Current version (0 until the first reset or delete).
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn version(&self) -> Result<u64> {
        let raw = self.engine.store().get(&self.version_key())?;
        Ok(raw.map_or(0, |v| {
            v.parse().unwrap_or_else(|_| {
                warn!(experiment = %self.name, version = %v, "unparsable version, using 0");
                0
            })
        }))
    }

    /// Bump the version, making every existing user assignment stale.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn increment_version(&self) -> Result<u64> {
        let version = self.engine.store().incr(&self.version_key())?;
        debug!(experiment = %self.name, version, "experiment version incremented");
        Ok(u64::try_from(version).unwrap_or(0))
    }

    /// Structured user-state key for the current version.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn user_key(&self) -> Result<UserKey> {
        Ok(UserKey::assignment(self.name.clone(), self.version()?))
    }

    /// `"name"` at version 0, otherwise `"name:version"`.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn key(&self) -> Result<String> {
        Ok(self.user_key()?.to_string())
    }

    /// `"<key>:finished"`.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn finished_key(&self) -> Result<String> {
        Ok(self.user_key()?.finished().to_string())
    }

    // ---------------------------------------------------------------
    // Winner
    // ---------------------------------------------------------------

    /// The recorded winner, if any.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn winner(&self) -> Result<Option<Alternative>> {
        let Some(name) = self.engine.store().hget(WINNERS_HASH, &self.name)? else {
            return Ok(None);
        };
        Ok(Some(self.alternative(&name).cloned().unwrap_or_else(|| {
            Alternative::new(
                AlternativeSpec::from(name),
                self.name.clone(),
                self.engine.store().clone(),
            )
        })))
    }

    /// Whether a winner is recorded.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn has_winner(&self) -> Result<bool> {
        Ok(self.engine.store().hget(WINNERS_HASH, &self.name)?.is_some())
    }

    /// Record `alternative` as the winner and notify the host.
    ///
    /// # Errors
    ///
    /// [`Error::AlternativeNotFound`] for unknown names; store errors.
    pub fn set_winner(&self, alternative: &str) -> Result<()> {
        if self.alternative(alternative).is_none() {
            return Err(Error::AlternativeNotFound {
                experiment: self.name.clone(),
                alternative: alternative.to_string(),
            });
        }
        self.engine
            .store()
            .hset(WINNERS_HASH, &self.name, alternative)?;
        info!(experiment = %self.name, winner = alternative, "winner chosen");
        self.engine.config().hooks.on_experiment_winner_choose(self);
        Ok(())
    }

    /// Clear the winner.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn reset_winner(&self) -> Result<()> {
        self.engine.store().hdel(WINNERS_HASH, &self.name)
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Record the start time as now.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn start(&self) -> Result<()> {
        self.engine.store().hset(
            START_TIMES_HASH,
            &self.name,
            &Utc::now().timestamp().to_string(),
        )
    }

    /// When the experiment started; `None` if not yet started or the
    /// stored value is unreadable.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn start_time(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.engine.store().hget(START_TIMES_HASH, &self.name)? else {
            return Ok(None);
        };
        let parsed = parse_timestamp(&raw);
        if parsed.is_none() {
            warn!(experiment = %self.name, start_time = %raw, "unparsable start time");
        }
        Ok(parsed)
    }

    /// Zero all counters, clear the winner and bump the version.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn reset(&self) -> Result<()> {
        let hooks = &self.engine.config().hooks;
        hooks.on_before_experiment_reset(self);
        for alternative in &self.alternatives {
            alternative.reset(&self.goals)?;
        }
        self.reset_winner()?;
        hooks.on_experiment_reset(self);
        let version = self.increment_version()?;
        info!(experiment = %self.name, version, "experiment reset");
        Ok(())
    }

    /// Remove the experiment's definition, counters and winner, and bump
    /// the version so lingering user state is stale.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn delete(&self) -> Result<()> {
        let hooks = &self.engine.config().hooks;
        let store = self.engine.store();
        hooks.on_before_experiment_delete(self);
        if self.engine.config().start_manually {
            store.hdel(START_TIMES_HASH, &self.name)?;
        }
        self.reset_winner()?;
        store.srem(EXPERIMENTS_SET, &self.name)?;
        store.hdel(&self.config_key(), FIELD_COHORTING)?;
        self.remove_configuration()?;
        hooks.on_experiment_delete(self);
        self.increment_version()?;
        info!(experiment = %self.name, "experiment deleted");
        Ok(())
    }

    /// Remove persisted metadata.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn delete_metadata(&self) -> Result<()> {
        self.engine.store().delete(&self.metadata_key())
    }

    // ---------------------------------------------------------------
    // Bucketing
    // ---------------------------------------------------------------

    /// The winner if set; else the sole alternative; else the algorithm's pick.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] without alternatives; store errors.
    pub fn next_alternative(&self) -> Result<Alternative> {
        if let Some(winner) = self.winner()? {
            return Ok(winner);
        }
        self.random_alternative()
    }

    /// Bucket without consulting the winner.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] without alternatives; store errors.
    pub fn random_alternative(&self) -> Result<Alternative> {
        if self.alternatives.len() > 1 {
            self.algorithm
                .choose_alternative(self, &mut rand::thread_rng())
                .cloned()
        } else {
            self.control().cloned()
        }
    }

    /// Atomically claim the next systematic sampling slot (first call yields 0).
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn next_cohorting_block_index(&self) -> Result<u64> {
        let next = self
            .engine
            .store()
            .hincr_by(&self.config_key(), FIELD_BLOCK_INDEX, 1)?;
        Ok(u64::try_from(next - 1).unwrap_or(0))
    }

    /// Whether new participants are kept out of the experiment.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn cohorting_disabled(&self) -> Result<bool> {
        let raw = self
            .engine
            .store()
            .hget(&self.config_key(), FIELD_COHORTING)?;
        Ok(raw.is_some_and(|v| v.eq_ignore_ascii_case("true")))
    }

    /// Stop bucketing new participants.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn disable_cohorting(&self) -> Result<()> {
        self.engine
            .store()
            .hset(&self.config_key(), FIELD_COHORTING, "true")
    }

    /// Resume bucketing new participants.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn enable_cohorting(&self) -> Result<()> {
        self.engine
            .store()
            .hset(&self.config_key(), FIELD_COHORTING, "false")
    }

    // ---------------------------------------------------------------
    // Winner estimation
    // ---------------------------------------------------------------

    /// Every alternative has `0 <= completions <= participants`.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn can_calculate_winning_alternatives(&self) -> Result<bool> {
        for alternative in &self.alternatives {
            let participants = alternative.participant_count()?;
            if participants < 0 || participants < alternative.completed_count(None)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Recompute win probabilities if the current interval has not been
    /// computed yet. See [`WinnerEstimator::calc_winning_alternatives`].
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn calc_winning_alternatives(&self) -> Result<()> {
        WinnerEstimator::from_config(self.engine.config()).calc_winning_alternatives(self)
    }

    /// Last recompute interval.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn calc_time(&self) -> Result<i64> {
        let raw = self
            .engine
            .store()
            .hget(&self.config_key(), FIELD_CALC_TIME)?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Record the last recompute interval.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn set_calc_time(&self, interval: i64) -> Result<()> {
        self.engine
            .store()
            .hset(&self.config_key(), FIELD_CALC_TIME, &interval.to_string())
    }

    // ---------------------------------------------------------------
    // Persistence helpers
    // ---------------------------------------------------------------

    fn config_key(&self) -> String {
        format!("experiment_configurations/{}", self.name)
    }

    fn version_key(&self) -> String {
        format!("{}:version", self.name)
    }

    fn metadata_key(&self) -> String {
        format!("{}:metadata", self.name)
    }

    fn friendly_name_key(&self) -> String {
        format!("{}:friendly_name", self.name)
    }

    fn load_alternative_specs(&self) -> Result<Vec<AlternativeSpec>> {
        Ok(self
            .engine
            .store()
            .lrange(&self.name, 0, -1)?
            .iter()
            .map(|raw| AlternativeSpec::from_persisted(raw))
            .collect())
    }

    fn load_metadata(&self) -> Result<Option<Metadata>> {
        let Some(raw) = self.engine.store().get(&self.metadata_key())? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(err) => {
                warn!(experiment = %self.name, error = %err, "unparsable metadata ignored");
                Ok(None)
            }
        }
    }

    fn configuration_has_changed(&self) -> Result<bool> {
        let existing_alternatives = self.load_alternative_specs()?;
        let current: Vec<AlternativeSpec> =
            self.alternatives.iter().map(Alternative::spec).collect();
        let existing_goals =
            GoalsCollection::load_from_store(&self.name, self.engine.store().clone())?;
        Ok(existing_alternatives != current
            || existing_goals.goals() != self.goals.as_slice()
            || self.load_metadata()? != self.metadata)
    }

    fn persist_configuration(&self) -> Result<()> {
        let store = self.engine.store();
        store.sadd(EXPERIMENTS_SET, &self.name)?;
        let encoded: Vec<String> = self
            .alternatives
            .iter()
            .map(|a| a.spec().to_persisted())
            .collect();
        store.persist_list(&self.name, &encoded)?;
        GoalsCollection::new(self.name.clone(), self.goals.clone(), store.clone()).save()?;

        match &self.metadata {
            Some(metadata) => store.set(&self.metadata_key(), &serde_json::to_string(metadata)?)?,
            None => self.delete_metadata()?,
        }
        store.set(&self.friendly_name_key(), &self.friendly_name)
    }

    fn remove_configuration(&self) -> Result<()> {
        let store = self.engine.store();
        for alternative in &self.alternatives {
            alternative.delete()?;
        }
        store.delete(&goals_key(&self.name))?;
        self.delete_metadata()?;
        store.delete(&self.friendly_name_key())?;
        store.delete(&self.name)
    }
}

impl PartialEq for Experiment {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

const fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
