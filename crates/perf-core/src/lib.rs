pub mod catalog;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod invoker;
pub mod logger;
pub mod metrics;
pub mod orchestrator;
pub mod registry;

pub use catalog::*;
pub use command::*;
pub use config::*;
pub use dispatcher::*;
pub use invoker::*;
pub use logger::*;
pub use metrics::*;
pub use orchestrator::*;
pub use registry::*;
