//! Experiment model
//!
//! ```text
//! Experiment (1) ──< Alternative (N)    counters per goal, p_winner per goal
//!      │
//!      ├── GoalsCollection               ordered, de-duplicated goal names
//!      └── version                       user keys: UserKey { name, version, kind }
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use split_engine::config::Configuration;
//! use split_engine::experiment::{Experiment, ExperimentOptions};
//! use split_engine::Engine;
//!
//! let engine = Engine::in_memory(Configuration::default());
//! let experiment = Experiment::new(
//!     &engine,
//!     "link_color",
//!     ExperimentOptions::new()
//!         .alternatives(["blue", "red"])
//!         .goals(["signup"]),
//! );
//! experiment.save()?;
//!
//! assert_eq!(experiment.control()?.name(), "blue");
//! assert_eq!(experiment.key()?, "link_color");
//!
//! experiment.reset()?;
//! assert_eq!(experiment.key()?, "link_color:1");
//! # Ok::<(), split_engine::Error>(())
//! ```

mod aggregate;
mod alternative;
mod catalog;
mod goals;
mod key;

pub use aggregate::{
    Experiment, ExperimentOptions, Metadata, DEFAULT_COHORTING_BLOCK_MAGNITUDE,
    DEFAULT_COHORTING_BLOCK_SEED,
};
pub use alternative::{Alternative, AlternativeSpec};
pub use catalog::ExperimentCatalog;
pub use goals::{goals_key, GoalsCollection};
pub use key::{KeyKind, UserKey};
