//! Goals - named conversion events tracked per alternative

use crate::kv::SharedStore;
use crate::{Error, Result};

/// The goal set of one experiment, persisted as the list `"<experiment>:goals"`.
#[derive(Clone)]
pub struct GoalsCollection {
    experiment_name: String,
    goals: Vec<String>,
    store: SharedStore,
}

impl GoalsCollection {
    /// Goal set for `experiment_name`. Duplicates are dropped, first
    /// occurrence wins.
    #[must_use]
    pub fn new(experiment_name: impl Into<String>, goals: Vec<String>, store: SharedStore) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(goals.len());
        for goal in goals {
            if !unique.contains(&goal) {
                unique.push(goal);
            }
        }
        Self {
            experiment_name: experiment_name.into(),
            goals: unique,
            store,
        }
    }

    /// Load the persisted goal list (empty when none was saved).
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn load_from_store(experiment_name: &str, store: SharedStore) -> Result<Self> {
        let goals = store.lrange(&goals_key(experiment_name), 0, -1)?;
        Ok(Self::new(experiment_name, goals, store))
    }

    /// Goal names in insertion order.
    #[must_use]
    pub fn goals(&self) -> &[String] {
        &self.goals
    }

    /// Consume into the goal names.
    #[must_use]
    pub fn into_goals(self) -> Vec<String> {
        self.goals
    }

    /// Reject blank goal names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`].
    pub fn validate(&self) -> Result<()> {
        if self.goals.iter().any(|g| g.trim().is_empty()) {
            return Err(Error::Validation(format!(
                "experiment '{}' has a blank goal name",
                self.experiment_name
            )));
        }
        Ok(())
    }

    /// Replace the persisted goal list. An empty set removes the list.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn save(&self) -> Result<()> {
        self.store
            .persist_list(&goals_key(&self.experiment_name), &self.goals)
    }

    /// Remove the persisted goal list.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn delete(&self) -> Result<()> {
        self.store.delete(&goals_key(&self.experiment_name))
    }
}

/// Store key of an experiment's goal list.
#[must_use]
pub fn goals_key(experiment_name: &str) -> String {
    format!("{experiment_name}:goals")
}
