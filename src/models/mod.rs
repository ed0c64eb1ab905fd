pub mod asset;
pub mod step;

pub use asset::{AssetRecord, AssetStatus, FileType};
pub use step::{Artifact, StepOutcome, StepResult};
