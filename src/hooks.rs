//! Host notification hooks.
//!
//! Two seams let the host application observe the engine:
//!
//! - [`ExperimentHooks`]: lifecycle notifications for experiments (reset,
//!   delete, winner chosen). Installed once on the
//!   [`Configuration`](crate::config::Configuration).
//! - [`TrialHost`]: the per-request object (controller, request context)
//!   that receives trial callbacks. The callback *names* come from the
//!   configuration; a host that does not recognise a name returns `false`
//!   and nothing happens.
//!
//! Every method defaults to a no-op. Errors inside hooks are the host's
//! concern; the engine neither catches nor reports them.

use crate::experiment::Experiment;
use crate::trial::Trial;
use std::fmt;
use std::sync::Arc;

/// Experiment lifecycle notifications.
pub trait ExperimentHooks: Send + Sync {
    /// Called before an experiment's counters are zeroed.
    fn on_before_experiment_reset(&self, _experiment: &Experiment) {}

    /// Called after counters are zeroed and the winner cleared, before the
    /// version is bumped.
    fn on_experiment_reset(&self, _experiment: &Experiment) {}

    /// Called before an experiment's configuration is removed.
    fn on_before_experiment_delete(&self, _experiment: &Experiment) {}

    /// Called after an experiment's configuration is removed.
    fn on_experiment_delete(&self, _experiment: &Experiment) {}

    /// Called when a winner is recorded.
    fn on_experiment_winner_choose(&self, _experiment: &Experiment) {}
}

/// Hooks that ignore every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl ExperimentHooks for NoopHooks {}

/// Shared, cloneable handle to the installed [`ExperimentHooks`].
#[derive(Clone)]
pub struct Hooks(Arc<dyn ExperimentHooks>);

impl Hooks {
    /// Wrap a hooks implementation.
    pub fn new(hooks: impl ExperimentHooks + 'static) -> Self {
        Self(Arc::new(hooks))
    }

    /// Wrap an already shared implementation (handy for test spies).
    #[must_use]
    pub fn from_arc(hooks: Arc<dyn ExperimentHooks>) -> Self {
        Self(hooks)
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self::new(NoopHooks)
    }
}

impl std::ops::Deref for Hooks {
    type Target = dyn ExperimentHooks;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hooks(..)")
    }
}

/// Receiver of trial callbacks (`on_trial`, `on_trial_choose`,
/// `on_trial_complete`), dispatched by configured name.
pub trait TrialHost {
    /// Invoke the callback called `callback`.
    ///
    /// Returns `false` when the host has no such callback, which the
    /// engine treats as a silent no-op.
    fn call(&mut self, callback: &str, trial: &Trial<'_>) -> bool;
}

/// Invoke `callback` on `host` if both are present.
pub(crate) fn run_callback(
    host: &mut Option<&mut dyn TrialHost>,
    callback: Option<&str>,
    trial: &Trial<'_>,
) {
    let (Some(host), Some(callback)) = (host.as_mut(), callback) else {
        return;
    };
    if !host.call(callback, trial) {
        tracing::trace!(callback, "trial host does not handle callback");
    }
}
