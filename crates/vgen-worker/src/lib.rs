//! Generation job orchestrator.

pub mod config;
pub mod decompose;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod script;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use orchestrator::Orchestrator;
pub use script::ScriptClient;
