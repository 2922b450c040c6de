pub mod cli;
pub mod domain;
pub mod infra;
pub mod services;

// Make test_support available for integration tests
pub mod test_support;

pub use domain::{BuildError, BuildRequest, ConfigOverrides, ImageRef, ImageTool, LayerSet};
pub use infra::{CraneAdapter, RegistrySettings};
pub use services::{BuildReport, ImageBuilder, Orchestrator};
