//! apicheck common library
//!
//! Configuration, JSON documents and path mutation, placeholder resolution,
//! per-scenario state, logging and HAR capture shared by the transports and
//! the step definitions.

pub mod config;
pub mod error;
pub mod har;
pub mod json;
pub mod logger;
pub mod mutation;
pub mod resolver;
pub mod scenario;
pub mod session;

pub use config::{ConfigKey, ConfigurationManager, PropertyFile, PropertyHandler};
pub use error::{Error, Result};
pub use har::{Exchange, Har, HarEntry, HarRecorder};
pub use json::{display_value, JsonDocument, JsonPath};
pub use logger::{init_tracing, ScenarioLogger};
pub use mutation::{transform, JsonPathOperation, MutationRow};
pub use resolver::{ResolvedString, ValueResolver};
pub use scenario::{ScenarioContext, ScenarioIdentity};
pub use session::{ScenarioArtifacts, ScenarioSession};

/// apicheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
