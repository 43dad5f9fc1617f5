use crate::command::{Outcome, Request};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Hooks the dispatcher fires around every handler call.
pub trait ActionLogger: Send + Sync {
    fn on_start(&self, action_type: &str, request: &dyn Request);

    fn on_success(&self, action_type: &str, request: &dyn Request, outcome: &Outcome, elapsed: Duration);

    fn on_failure(
        &self,
        action_type: &str,
        request: &dyn Request,
        error: &anyhow::Error,
        elapsed: Duration,
    );

    fn on_unknown_action(&self, _action_type: &str, _request: &dyn Request) {}
}

/// Emits structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingActionLogger;

impl ActionLogger for TracingActionLogger {
    fn on_start(&self, action_type: &str, request: &dyn Request) {
        debug!(action_type, ?request, "starting action");
    }

    fn on_success(&self, action_type: &str, _request: &dyn Request, outcome: &Outcome, elapsed: Duration) {
        info!(
            action_type,
            success = outcome.success,
            elapsed_us = elapsed.as_micros() as u64,
            "action completed"
        );
    }

    fn on_failure(
        &self,
        action_type: &str,
        request: &dyn Request,
        error: &anyhow::Error,
        elapsed: Duration,
    ) {
        error!(
            action_type,
            ?request,
            elapsed_us = elapsed.as_micros() as u64,
            "action failed: {:#}",
            error
        );
    }

    fn on_unknown_action(&self, action_type: &str, _request: &dyn Request) {
        warn!(action_type, "no handler registered");
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopActionLogger;

impl ActionLogger for NoopActionLogger {
    fn on_start(&self, _action_type: &str, _request: &dyn Request) {}

    fn on_success(&self, _action_type: &str, _request: &dyn Request, _outcome: &Outcome, _elapsed: Duration) {}

    fn on_failure(
        &self,
        _action_type: &str,
        _request: &dyn Request,
        _error: &anyhow::Error,
        _elapsed: Duration,
    ) {
    }
}
