pub mod error;
pub mod frame;
pub mod registry;
pub mod scaled;
pub mod scaling;
pub mod swap;

pub use error::{Result, TabularErr};
pub use frame::{Column, DType, Frame, Value};
pub use registry::{
    Feature, FeatureRegistry, FeatureSpec, NumericPreset, NumericScaling, OTHER, RegistryBuilder,
};
pub use scaled::ScaledFrame;
pub use scaling::{Scaler, ScalerKind};
pub use swap::SwapNoise;
