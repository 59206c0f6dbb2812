//! # split-engine: A/B Experiment Assignment and Evaluation
//!
//! **Version**: 0.1.0
//!
//! split-engine buckets users into the alternatives of running experiments,
//! keeps every user on the same alternative across requests and experiment
//! resets, records conversions, and estimates which alternative is winning.
//!
//! ## Design Principles
//!
//! - **Sticky assignment**: user state is reconciled against versioned
//!   experiment keys, so a reset never silently reshuffles users
//! - **Atomic counters**: participation and conversions only move through
//!   store increments
//! - **Pluggable bucketing**: weighted random, systematic block sampling and
//!   a Thompson-sampling bandit share one dispatch point
//! - **Off-path estimation**: the Monte-Carlo winner estimate never runs
//!   while assigning users
//!
//! ## Example Usage
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
//! let shown = engine.ab_test(
//!     &mut user,
//!     "signup_button",
//!     AbTestOptions::with_alternatives(["green", "orange"]),
//!     None,
//! )?;
//! println!("showing {shown}");
//!
//! engine.ab_finished(&mut user, "signup_button", FinishOptions::default(), None)?;
//! # Ok::<(), split_engine::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod algorithms;
pub mod config;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod experiment;
pub mod helper;
pub mod hooks;
pub mod kv;
pub mod timestamp;
pub mod trial;
pub mod user;

pub use engine::Engine;
pub use error::{Error, Result};
