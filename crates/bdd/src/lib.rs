//! apicheck step logic
//!
//! The parts of the API step definitions that do not depend on the test
//! runner: body construction, datatable handling and response assertions.
//! `tests/bdd.rs` wires them to cucumber.

pub mod steps;
pub mod table;

pub use steps::{transform, ApiSteps};
pub use table::{resolve_table, validate_datatable};

/// Folder of request body files, next to the config folder
pub const REQUESTS_DIR: &str = "requests";
