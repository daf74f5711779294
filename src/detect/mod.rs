pub mod model;
pub mod overlay;
pub mod stage;

pub use model::{BoundingBox, Detection, DetectionError, DetectionModel, NullModel};
pub use stage::DetectionStage;
