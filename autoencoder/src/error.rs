use std::{error::Error, fmt, io};

use machine_learning::MlErr;
use tabular::TabularErr;

/// The autoencoder module's result type.
pub type Result<T> = std::result::Result<T, AutoEncoderErr>;

/// Failures of the training and scoring engine.
#[derive(Debug)]
pub enum AutoEncoderErr {
    /// The engine was constructed with an inconsistent configuration.
    Configuration(String),
    /// A call received arguments that contradict the engine's mode or each other.
    InvalidArgument(String),
    /// Scoring was requested before the loss statistics were collected.
    NotFitted,
    NonFiniteLoss {
        epoch: usize,
        loss: f32,
    },
    /// A peer left the process group or a collective was misused.
    Collective(String),
    Tabular(TabularErr),
    Ml(MlErr),
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for AutoEncoderErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutoEncoderErr::Configuration(msg) => write!(f, "configuration error: {msg}"),
            AutoEncoderErr::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            AutoEncoderErr::NotFitted => {
                write!(f, "the loss statistics were not collected, call fit first")
            }
            AutoEncoderErr::NonFiniteLoss { epoch, loss } => {
                write!(f, "non finite loss {loss} at epoch {epoch}")
            }
            AutoEncoderErr::Collective(msg) => write!(f, "collective error: {msg}"),
            AutoEncoderErr::Tabular(e) => write!(f, "tabular error: {e}"),
            AutoEncoderErr::Ml(e) => write!(f, "model error: {e}"),
            AutoEncoderErr::Io(e) => write!(f, "io error: {e}"),
            AutoEncoderErr::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl Error for AutoEncoderErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AutoEncoderErr::Tabular(e) => Some(e),
            AutoEncoderErr::Ml(e) => Some(e),
            AutoEncoderErr::Io(e) => Some(e),
            AutoEncoderErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TabularErr> for AutoEncoderErr {
    fn from(value: TabularErr) -> Self {
        Self::Tabular(value)
    }
}

impl From<MlErr> for AutoEncoderErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

impl From<io::Error> for AutoEncoderErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for AutoEncoderErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
