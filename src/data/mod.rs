mod file_artifact;
mod generation;
mod line_range;
mod plan_item;

pub use file_artifact::FileArtifact;
pub use generation::{
    GenerateBody, GenerationOptions, GenerationRequest, ListedModel, ModelTags,
};
pub use line_range::{LineRange, LineRangeError};
pub use plan_item::{PathRejection, PlanItem, validate_relative_path};
