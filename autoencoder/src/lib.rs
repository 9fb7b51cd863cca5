pub mod config;
pub mod data;
pub mod distributed;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod logging;
pub mod loss;
pub mod preprocessing;

pub use config::AutoEncoderConfig;
pub use data::{FrameDataset, ShardSpec, ShardedLoader, TrainData};
pub use distributed::{Collective, LocalGroup, ThreadGroup};
pub use engine::{AutoEncoder, FitOptions, LossStats, Phase};
pub use error::{AutoEncoderErr, Result};
