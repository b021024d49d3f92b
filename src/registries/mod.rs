mod model_registry;

pub use model_registry::{
    FilePropertiesRegistry, ModelListing, ModelResolution, ModelSource, OracleProperties,
    resolve_model,
};
