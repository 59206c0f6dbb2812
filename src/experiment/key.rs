//! Structured user-state keys.
//!
//! User state is a flat string map. Each entry belongs to one experiment
//! version and has one kind:
//!
//! ```text
//! link_color                        assignment, version 0
//! link_color:finished               conversion recorded, version 0
//! link_color:2                      assignment, version 2
//! link_color:2:time_of_assignment   assignment timestamp, version 2
//! link_color:2:external_key         host-defined companion, version 2
//! ```
//!
//! [`UserKey`] is the only place these strings are built or parsed.

use std::fmt;

const FINISHED: &str = "finished";
const TIME_OF_ASSIGNMENT: &str = "time_of_assignment";

/// What a user-state entry records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// The assigned alternative name.
    Assignment,
    /// Conversion already recorded.
    Finished,
    /// When the assignment was made (RFC 3339).
    TimeOfAssignment,
    /// Any other companion written by the host.
    Extra(String),
}

/// A decoded user-state key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserKey {
    experiment_name: String,
    version: Option<u64>,
    kind: KeyKind,
}

impl UserKey {
    /// Assignment key for `experiment_name` at `version` (0 encodes as the bare name).
    #[must_use]
    pub fn assignment(experiment_name: impl Into<String>, version: u64) -> Self {
        Self {
            experiment_name: experiment_name.into(),
            version: (version > 0).then_some(version),
            kind: KeyKind::Assignment,
        }
    }

    /// Decode a flat key. The experiment name runs up to the first colon.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let Some((name, rest)) = raw.split_once(':') else {
            return Self {
                experiment_name: raw.to_string(),
                version: None,
                kind: KeyKind::Assignment,
            };
        };

        let (version, suffix) = match rest.split_once(':') {
            Some((first, tail)) => match parse_version(first) {
                Some(v) => (Some(v), Some(tail)),
                None => (None, Some(rest)),
            },
            None => match parse_version(rest) {
                Some(v) => (Some(v), None),
                None => (None, Some(rest)),
            },
        };

        let kind = match suffix {
            None => KeyKind::Assignment,
            Some(FINISHED) => KeyKind::Finished,
            Some(TIME_OF_ASSIGNMENT) => KeyKind::TimeOfAssignment,
            Some(other) => KeyKind::Extra(other.to_string()),
        };

        Self {
            experiment_name: name.to_string(),
            version,
            kind,
        }
    }

    /// Experiment name with any version stripped.
    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    /// Version suffix, if any.
    #[must_use]
    pub const fn version(&self) -> Option<u64> {
        self.version
    }

    /// Entry kind.
    #[must_use]
    pub const fn kind(&self) -> &KeyKind {
        &self.kind
    }

    /// Whether this is an assignment entry.
    #[must_use]
    pub const fn is_assignment(&self) -> bool {
        matches!(self.kind, KeyKind::Assignment)
    }

    /// Same experiment and version, different kind.
    #[must_use]
    pub fn with_kind(&self, kind: KeyKind) -> Self {
        Self {
            experiment_name: self.experiment_name.clone(),
            version: self.version,
            kind,
        }
    }

    /// Same experiment and version as `other` (any kind).
    #[must_use]
    pub fn same_assignment(&self, other: &Self) -> bool {
        self.experiment_name == other.experiment_name && self.version == other.version
    }

    /// The `:finished` companion of this key.
    #[must_use]
    pub fn finished(&self) -> Self {
        self.with_kind(KeyKind::Finished)
    }

    /// The `:time_of_assignment` companion of this key.
    #[must_use]
    pub fn time_of_assignment(&self) -> Self {
        self.with_kind(KeyKind::TimeOfAssignment)
    }
}

fn parse_version(segment: &str) -> Option<u64> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.experiment_name)?;
        if let Some(version) = self.version {
            write!(f, ":{version}")?;
        }
        match &self.kind {
            KeyKind::Assignment => Ok(()),
            KeyKind::Finished => write!(f, ":{FINISHED}"),
            KeyKind::TimeOfAssignment => write!(f, ":{TIME_OF_ASSIGNMENT}"),
            KeyKind::Extra(label) => write!(f, ":{label}"),
        }
    }
}

impl From<&str> for UserKey {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}
