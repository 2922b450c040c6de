use super::{ImageConfig, ImageRef, LayerSet, MutateArg, PullFormat};
use anyhow::Result;
use std::fmt::Debug;
use std::path::Path;

/// Result of removing an image from the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing was stored under the reference
    NotFound,
    /// Any other failure, with the tool's output
    Failed { output: String },
}

/// How stale-delete failures affect the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleDeletePolicy {
    /// Every delete failure is advisory
    #[default]
    Lenient,
    /// Only "not found" is advisory; anything else aborts the build
    Strict,
}

impl StaleDeletePolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "lenient" => Some(Self::Lenient),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

/// Trait for registry-level image operations
pub trait ImageTool: Send + Sync + Debug {
    /// Push a local image to the registry
    fn push(&self, local: &Path, reference: &ImageRef) -> Result<()>;

    /// Remove an image from the registry
    fn delete(&self, reference: &ImageRef) -> Result<DeleteOutcome>;

    /// Append layers (in order) onto `base`, storing the result under `target`
    fn append(&self, target: &ImageRef, layers: &LayerSet, base: &ImageRef) -> Result<()>;

    /// Read the runtime config of an image
    fn get_config(&self, reference: &ImageRef) -> Result<ImageConfig>;

    /// Rewrite the image metadata in place
    fn mutate(&self, reference: &ImageRef, args: &[MutateArg]) -> Result<()>;

    /// Write the image to `output` in the given on-disk format
    fn pull(&self, reference: &ImageRef, output: &Path, format: PullFormat) -> Result<()>;

    /// Check if the tool binary can be executed
    fn is_available(&self) -> bool;
}
