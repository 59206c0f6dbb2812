//! Alternative - one variant of an experiment and its counters

use crate::kv::SharedStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const PARTICIPANT_COUNT: &str = "participant_count";
const COMPLETED_COUNT: &str = "completed_count";
const P_WINNER: &str = "p_winner";

/// Name and weight of an alternative, as declared in code or configuration.
///
/// Deserializes from either a bare name (`"red"`, weight 1.0) or a
/// single-entry map (`{ "red": 2.0 }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAlternative", into = "RawAlternative")]
pub struct AlternativeSpec {
    /// Alternative name.
    pub name: String,
    /// Relative selection weight.
    pub weight: f64,
}

impl AlternativeSpec {
    /// A named alternative with the given weight.
    #[must_use]
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }

    /// Best-effort decode of a persisted list entry. Anything that is not a
    /// `{"name": weight}` object is taken as a bare name.
    #[must_use]
    pub fn from_persisted(raw: &str) -> Self {
        serde_json::from_str::<Self>(raw).unwrap_or_else(|_| Self::from(raw))
    }

    /// Encoding used for the persisted alternative list.
    #[must_use]
    pub fn to_persisted(&self) -> String {
        let mut entry = serde_json::Map::new();
        entry.insert(self.name.clone(), serde_json::Value::from(self.weight));
        serde_json::Value::Object(entry).to_string()
    }
}

impl From<&str> for AlternativeSpec {
    fn from(name: &str) -> Self {
        Self::new(name, 1.0)
    }
}

impl From<String> for AlternativeSpec {
    fn from(name: String) -> Self {
        Self::new(name, 1.0)
    }
}

impl From<(&str, f64)> for AlternativeSpec {
    fn from((name, weight): (&str, f64)) -> Self {
        Self::new(name, weight)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawAlternative {
    Name(String),
    Weighted(BTreeMap<String, f64>),
}

impl TryFrom<RawAlternative> for AlternativeSpec {
    type Error = String;

    fn try_from(raw: RawAlternative) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawAlternative::Name(name) => Ok(Self::from(name)),
            RawAlternative::Weighted(map) => {
                let mut entries = map.into_iter();
                match (entries.next(), entries.next()) {
                    (Some((name, weight)), None) => Ok(Self::new(name, weight)),
                    _ => Err("weighted alternative must have exactly one entry".to_string()),
                }
            }
        }
    }
}

impl From<AlternativeSpec> for RawAlternative {
    fn from(spec: AlternativeSpec) -> Self {
        Self::Weighted(BTreeMap::from([(spec.name, spec.weight)]))
    }
}

/// An experiment alternative bound to the store holding its counters.
///
/// Counters live in the hash `"<experiment>:<alternative>"`:
/// `participant_count`, `completed_count`, `completed_count:<goal>`,
/// `p_winner` and `p_winner:<goal>`.
#[derive(Clone)]
pub struct Alternative {
    name: String,
    experiment_name: String,
    weight: f64,
    store: SharedStore,
}

impl Alternative {
    /// Bind a declared alternative to its experiment and store.
    #[must_use]
    pub fn new(
        spec: AlternativeSpec,
        experiment_name: impl Into<String>,
        store: SharedStore,
    ) -> Self {
        Self {
            name: spec.name,
            experiment_name: experiment_name.into(),
            weight: spec.weight,
            store,
        }
    }

    /// Alternative name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning experiment name.
    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    /// Relative selection weight.
    #[must_use]
    pub const fn weight(&self) -> f64 {
        self.weight
    }

    /// Name and weight.
    #[must_use]
    pub fn spec(&self) -> AlternativeSpec {
        AlternativeSpec::new(self.name.clone(), self.weight)
    }

    /// Store key of the counter hash.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.experiment_name, self.name)
    }

    /// Reject empty names and non-positive or non-finite weights.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`].
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation(format!(
                "experiment '{}' has an alternative with an empty name",
                self.experiment_name
            )));
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(Error::Validation(format!(
                "alternative '{}' of '{}' has invalid weight {}",
                self.name, self.experiment_name, self.weight
            )));
        }
        Ok(())
    }

    /// Users bucketed into this alternative.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn participant_count(&self) -> Result<i64> {
        self.counter(PARTICIPANT_COUNT)
    }

    /// Conversions for `goal` (or the no-goal slot).
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn completed_count(&self, goal: Option<&str>) -> Result<i64> {
        self.counter(&scoped(COMPLETED_COUNT, goal))
    }

    /// Conversions summed over `goals`, plus the no-goal slot.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn all_completed_count(&self, goals: &[String]) -> Result<i64> {
        goals.iter().try_fold(self.completed_count(None)?, |sum, goal| {
            Ok(sum + self.completed_count(Some(goal.as_str()))?)
        })
    }

    /// Conversions divided by participants (0 with no participants).
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    #[allow(clippy::cast_precision_loss)]
    pub fn conversion_rate(&self, goal: Option<&str>) -> Result<f64> {
        let participants = self.participant_count()?;
        if participants <= 0 {
            return Ok(0.0);
        }
        Ok(self.completed_count(goal)? as f64 / participants as f64)
    }

    /// Atomically add one participant.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn increment_participation(&self) -> Result<i64> {
        self.store.hincr_by(&self.key(), PARTICIPANT_COUNT, 1)
    }

    /// Atomically add one conversion for `goal` (or the no-goal slot).
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn increment_completion(&self, goal: Option<&str>) -> Result<i64> {
        self.store
            .hincr_by(&self.key(), &scoped(COMPLETED_COUNT, goal), 1)
    }

    /// Estimated probability of being the best alternative for `goal`.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn p_winner(&self, goal: Option<&str>) -> Result<f64> {
        let raw = self.store.hget(&self.key(), &scoped(P_WINNER, goal))?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0.0))
    }

    /// Record the estimated win probability for `goal`.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn set_p_winner(&self, probability: f64, goal: Option<&str>) -> Result<()> {
        self.store
            .hset(&self.key(), &scoped(P_WINNER, goal), &probability.to_string())
    }

    /// Zero every counter, including per-goal completions.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn reset(&self, goals: &[String]) -> Result<()> {
        let key = self.key();
        self.store.hset(&key, PARTICIPANT_COUNT, "0")?;
        self.store.hset(&key, COMPLETED_COUNT, "0")?;
        for goal in goals {
            self.store
                .hset(&key, &scoped(COMPLETED_COUNT, Some(goal.as_str())), "0")?;
        }
        Ok(())
    }

    /// Remove the counter hash.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn delete(&self) -> Result<()> {
        self.store.delete(&self.key())
    }

    fn counter(&self, field: &str) -> Result<i64> {
        match self.store.hget(&self.key(), field)? {
            None => Ok(0),
            Some(raw) => raw.parse().map_err(|_| Error::InvalidValue {
                key: format!("{}.{field}", self.key()),
                value: raw,
            }),
        }
    }
}

fn scoped(field: &str, goal: Option<&str>) -> String {
    goal.map_or_else(|| field.to_string(), |g| format!("{field}:{g}"))
}

impl PartialEq for Alternative {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.experiment_name == other.experiment_name
    }
}

impl fmt::Debug for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alternative")
            .field("name", &self.name)
            .field("experiment_name", &self.experiment_name)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
