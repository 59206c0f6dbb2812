//! Experiment catalog: lookups over the set of persisted experiments.

use super::aggregate::{Experiment, ExperimentOptions};
use crate::engine::Engine;
use crate::{Error, Result};

const EXPERIMENTS_SET: &str = "experiments";

/// Catalog of experiments saved through one [`Engine`].
#[derive(Debug, Clone)]
pub struct ExperimentCatalog {
    engine: Engine,
}

impl ExperimentCatalog {
    /// Catalog over `engine`'s store.
    #[must_use]
    pub fn new(engine: &Engine) -> Self {
        Self {
            engine: engine.clone(),
        }
    }

    /// Names of every saved experiment, sorted.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn names(&self) -> Result<Vec<String>> {
        self.engine.store().smembers(EXPERIMENTS_SET)
    }

    /// Every saved experiment, sorted by name.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn all(&self) -> Result<Vec<Experiment>> {
        let mut experiments = Vec::new();
        for name in self.names()? {
            if let Some(experiment) = Experiment::find(&self.engine, &name)? {
                experiments.push(experiment);
            }
        }
        Ok(experiments)
    }

    /// Experiments without a winner first, then finished ones; each group
    /// sorted by name.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn all_active_first(&self) -> Result<Vec<Experiment>> {
        let mut active = Vec::new();
        let mut finished = Vec::new();
        for experiment in self.all()? {
            if experiment.has_winner()? {
                finished.push(experiment);
            } else {
                active.push(experiment);
            }
        }
        active.extend(finished);
        Ok(active)
    }

    /// Load `name`, if saved.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn find(&self, name: &str) -> Result<Option<Experiment>> {
        Experiment::find(&self.engine, name)
    }

    /// Load `name`, failing when it was never saved.
    ///
    /// # Errors
    ///
    /// [`Error::ExperimentNotFound`]; store errors.
    pub fn get(&self, name: &str) -> Result<Experiment> {
        self.find(name)?
            .ok_or_else(|| Error::ExperimentNotFound(name.to_string()))
    }

    /// Load `name`, or declare it from `options` without saving.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn find_or_initialize(&self, name: &str, options: ExperimentOptions) -> Result<Experiment> {
        match self.find(name)? {
            Some(experiment) => Ok(experiment),
            None => Ok(Experiment::new(&self.engine, name, options)),
        }
    }

    /// Declare `name` from `options` (or its configured definition) and
    /// save it, resetting a saved copy whose definition changed.
    ///
    /// With neither options nor configuration, an already saved experiment
    /// is returned as is.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for an invalid definition; store errors.
    pub fn find_or_create(&self, name: &str, options: ExperimentOptions) -> Result<Experiment> {
        if !options.has_alternatives() && self.engine.config().experiment_for(name).is_none() {
            if let Some(existing) = self.find(name)? {
                return Ok(existing);
            }
        }
        let experiment = Experiment::new(&self.engine, name, options);
        experiment.save()?;
        Ok(experiment)
    }
}
