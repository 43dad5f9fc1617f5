use crate::command::{Outcome, Request};
use crate::logger::{ActionLogger, TracingActionLogger};
use crate::registry::{ApiPath, MetricsRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub type Handler<R> = Arc<dyn Fn(&R) -> anyhow::Result<Outcome> + Send + Sync>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler found for action type: {action_type}")]
    UnknownAction { action_type: String },
    #[error("handler for {action_type} failed")]
    Handler {
        action_type: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// The error raised by the handler, if this was a handler failure.
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            DispatchError::Handler { source, .. } => Some(source),
            DispatchError::UnknownAction { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("a handler is already registered for action type: {action_type}")]
    Duplicate { action_type: String },
}

/// Collects handlers before the dispatcher is sealed.
pub struct DispatcherBuilder<R: Request> {
    handlers: HashMap<String, Handler<R>>,
    logger: Arc<dyn ActionLogger>,
}

impl<R: Request> DispatcherBuilder<R> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            logger: Arc::new(TracingActionLogger),
        }
    }

    pub fn logger(mut self, logger: Arc<dyn ActionLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Registering the same action type twice is rejected.
    pub fn register<F>(&mut self, action_type: impl Into<String>, handler: F) -> Result<(), RegistrationError>
    where
        F: Fn(&R) -> anyhow::Result<Outcome> + Send + Sync + 'static,
    {
        let action_type = action_type.into();
        if self.handlers.contains_key(&action_type) {
            return Err(RegistrationError::Duplicate { action_type });
        }
        self.handlers.insert(action_type, Arc::new(handler));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn build(self, metrics: Arc<MetricsRegistry>) -> Dispatcher<R> {
        Dispatcher {
            handlers: self.handlers,
            logger: self.logger,
            metrics,
        }
    }
}

impl<R: Request> Default for DispatcherBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes requests to their handlers and times every call into path B.
///
/// The handler table is fixed at build time, so dispatch takes no locks
/// beyond the metrics registry's.
pub struct Dispatcher<R: Request> {
    handlers: HashMap<String, Handler<R>>,
    logger: Arc<dyn ActionLogger>,
    metrics: Arc<MetricsRegistry>,
}

impl<R: Request> Dispatcher<R> {
    pub fn builder() -> DispatcherBuilder<R> {
        DispatcherBuilder::new()
    }

    pub fn has_handler(&self, action_type: &str) -> bool {
        self.handlers.contains_key(action_type)
    }

    pub fn action_types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn dispatch(&self, request: &R) -> Result<Outcome, DispatchError> {
        let action_type = request.action_type();
        let Some(handler) = self.handlers.get(action_type) else {
            self.logger.on_unknown_action(action_type, request);
            return Err(DispatchError::UnknownAction {
                action_type: action_type.to_string(),
            });
        };

        self.logger.on_start(action_type, request);
        let start = Instant::now();

        match handler(request) {
            Ok(outcome) => {
                let elapsed = start.elapsed();
                self.logger.on_success(action_type, request, &outcome, elapsed);
                self.metrics.record(ApiPath::B, elapsed, outcome.success);
                Ok(outcome)
            }
            Err(source) => {
                let elapsed = start.elapsed();
                self.logger.on_failure(action_type, request, &source, elapsed);
                self.metrics.record(ApiPath::B, elapsed, false);
                Err(DispatchError::Handler {
                    action_type: action_type.to_string(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug)]
    struct Cmd(&'static str);

    impl Request for Cmd {
        fn action_type(&self) -> &str {
            self.0
        }
    }

    #[derive(Debug, Error, PartialEq)]
    #[error("storage offline")]
    struct StorageOffline;

    #[derive(Default)]
    struct RecordingLogger {
        events: Mutex<Vec<String>>,
    }

    impl RecordingLogger {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ActionLogger for RecordingLogger {
        fn on_start(&self, action_type: &str, _request: &dyn Request) {
            self.events.lock().unwrap().push(format!("start:{action_type}"));
        }

        fn on_success(&self, action_type: &str, _request: &dyn Request, _outcome: &Outcome, _elapsed: Duration) {
            self.events.lock().unwrap().push(format!("success:{action_type}"));
        }

        fn on_failure(
            &self,
            action_type: &str,
            _request: &dyn Request,
            error: &anyhow::Error,
            _elapsed: Duration,
        ) {
            self.events
                .lock()
                .unwrap()
                .push(format!("failure:{action_type}:{error}"));
        }
    }

    fn dispatcher_with(
        logger: Arc<RecordingLogger>,
        metrics: Arc<MetricsRegistry>,
    ) -> Dispatcher<Cmd> {
        let mut builder = Dispatcher::<Cmd>::builder().logger(logger);
        builder.register("PING", |_: &Cmd| Ok(Outcome::ok())).unwrap();
        builder
            .register("SOFT_FAIL", |_: &Cmd| Ok(Outcome::failed("not found")))
            .unwrap();
        builder
            .register("BOOM", |_: &Cmd| Err(StorageOffline.into()))
            .unwrap();
        builder.build(metrics)
    }

    #[test]
    fn test_sequential_pings_are_recorded() {
        let metrics = Arc::new(MetricsRegistry::new());
        let dispatcher = dispatcher_with(Arc::default(), metrics.clone());

        for _ in 0..100 {
            let outcome = dispatcher.dispatch(&Cmd("PING")).unwrap();
            assert!(outcome.success);
        }

        let b = metrics.metrics(ApiPath::B);
        assert_eq!(b.total_requests, 100);
        assert_eq!(b.success_rate, 100.0);
        assert_eq!(metrics.metrics(ApiPath::A).total_requests, 0);
    }

    #[test]
    fn test_unknown_action_records_nothing() {
        let metrics = Arc::new(MetricsRegistry::new());
        let logger = Arc::new(RecordingLogger::default());
        let dispatcher = dispatcher_with(logger.clone(), metrics.clone());

        let err = dispatcher.dispatch(&Cmd("MISSING")).unwrap_err();
        match &err {
            DispatchError::UnknownAction { action_type } => assert_eq!(action_type, "MISSING"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("MISSING"));
        assert_eq!(metrics.metrics(ApiPath::A).total_requests, 0);
        assert_eq!(metrics.metrics(ApiPath::B).total_requests, 0);
        assert!(logger.events().is_empty());
    }

    #[test]
    fn test_handler_error_is_recorded_and_propagated() {
        let metrics = Arc::new(MetricsRegistry::new());
        let logger = Arc::new(RecordingLogger::default());
        let dispatcher = dispatcher_with(logger.clone(), metrics.clone());

        let err = dispatcher.dispatch(&Cmd("BOOM")).unwrap_err();
        let source = err.handler_error().expect("handler failure");
        assert_eq!(source.downcast_ref::<StorageOffline>(), Some(&StorageOffline));

        let b = metrics.metrics(ApiPath::B);
        assert_eq!(b.total_requests, 1);
        assert_eq!(b.failure_count, 1);
        assert_eq!(
            logger.events(),
            vec!["start:BOOM".to_string(), "failure:BOOM:storage offline".to_string()]
        );
    }

    #[test]
    fn test_unsuccessful_outcome_counts_as_failure() {
        let metrics = Arc::new(MetricsRegistry::new());
        let dispatcher = dispatcher_with(Arc::default(), metrics.clone());

        let outcome = dispatcher.dispatch(&Cmd("SOFT_FAIL")).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("not found"));
        assert_eq!(metrics.metrics(ApiPath::B).failure_count, 1);
    }

    #[test]
    fn test_each_dispatch_emits_one_event_pair() {
        let logger = Arc::new(RecordingLogger::default());
        let dispatcher = dispatcher_with(logger.clone(), Arc::default());

        dispatcher.dispatch(&Cmd("PING")).unwrap();
        dispatcher.dispatch(&Cmd("SOFT_FAIL")).unwrap();

        assert_eq!(
            logger.events(),
            vec!["start:PING", "success:PING", "start:SOFT_FAIL", "success:SOFT_FAIL"]
        );
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut builder: DispatcherBuilder<Cmd> = Dispatcher::builder();
        builder.register("PING", |_: &Cmd| Ok(Outcome::ok())).unwrap();
        let err = builder
            .register("PING", |_: &Cmd| Ok(Outcome::failed("second")))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Duplicate { ref action_type } if action_type == "PING"));
        assert_eq!(builder.len(), 1);

        let metrics = Arc::new(MetricsRegistry::new());
        let dispatcher = builder.build(metrics);
        assert!(dispatcher.dispatch(&Cmd("PING")).unwrap().success);
    }

    #[test]
    fn test_has_handler() {
        let dispatcher = dispatcher_with(Arc::default(), Arc::default());
        assert!(dispatcher.has_handler("PING"));
        assert!(!dispatcher.has_handler("ping"));
        assert_eq!(dispatcher.action_types().count(), 3);
    }
}
