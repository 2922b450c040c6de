mod error;
mod image;
pub mod traits;

pub use error::BuildError;
pub use image::{
    BuildRequest, ConfigFile, ConfigOverrides, ImageConfig, ImageRef, LIST_SEPARATOR, LayerSet,
    MutateArg, PullFormat, base_name,
};
pub use traits::{DeleteOutcome, ImageTool, StaleDeletePolicy};
