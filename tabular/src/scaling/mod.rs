//! Fitted one-dimensional transforms.
//!
//! The same scalers serve two purposes: normalizing numeric input columns (which needs
//! `inverse_transform` to decode predictions) and calibrating per-feature reconstruction losses
//! into comparable z-scores.

mod gauss_rank;
mod kind;
mod scaler;
pub(crate) mod stats;

pub use gauss_rank::erfinv;
pub use kind::ScalerKind;
pub use scaler::Scaler;
