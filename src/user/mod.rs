//! Per-user assignment state.
//!
//! [`User`] wraps a [`UserStore`] adapter and reconciles the keys it holds
//! against the current experiment versions.

mod adapter;
mod state;

pub use adapter::{KvUserAdapter, SessionAdapter, UserStore};
pub use state::User;
