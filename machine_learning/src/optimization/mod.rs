mod adam;
mod optimizer;
mod schedule;
mod sgd;

pub use adam::Adam;
pub use optimizer::Optimizer;
pub use schedule::ExponentialDecay;
pub use sgd::Sgd;
