mod builder;
mod orchestrator;
mod reconciler;

pub use builder::{BuildReport, BuildStage, ImageBuilder};
pub use orchestrator::Orchestrator;
pub use reconciler::{ConfigReconciler, ResolvedConfig};
