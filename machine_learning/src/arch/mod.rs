pub mod activations;
mod autoencoder;
pub mod layers;
mod layout;
pub mod loss;
mod model;

pub use autoencoder::{AutoEncoderShape, FeedForwardAutoEncoder, embedding_dim};
pub use layout::{FeatureLayout, ModelOutput, ParamGroup};
pub use model::Model;
