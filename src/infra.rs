pub mod config;
pub mod crane_adapter;
pub mod registry;

pub use config::AppSettings;
pub use crane_adapter::CraneAdapter;
pub use registry::{RegistryGuard, RegistrySettings};
