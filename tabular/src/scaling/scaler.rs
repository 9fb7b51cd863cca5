use serde::{Deserialize, Serialize};

use super::{ScalerKind, gauss_rank, stats};
use crate::{Result, TabularErr};

const MAD_FACTOR: f64 = 1.486;
const MEAN_AD_FACTOR: f64 = 1.253_314;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Fitted {
    Standard {
        mean: f64,
        std: f64,
    },
    GaussRank {
        xs: Vec<f64>,
        zs: Vec<f64>,
    },
    Modified {
        median: f64,
        mad: f64,
        mean_ad: f64,
    },
    None,
}

/// A one-dimensional transform that must be fit exactly once before use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    kind: ScalerKind,
    fitted: Option<Fitted>,
}

impl Scaler {
    /// Creates a new unfitted `Scaler` of the given family.
    pub fn new(kind: ScalerKind) -> Self {
        Self { kind, fitted: None }
    }

    /// Creates an already fitted standard scaler.
    pub fn standard(mean: f64, std: f64) -> Self {
        Self {
            kind: ScalerKind::Standard,
            fitted: Some(Fitted::Standard {
                mean,
                std: nonzero(std),
            }),
        }
    }

    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Learns the transform's statistics from `sample`, ignoring non-finite values.
    ///
    /// # Returns
    /// `AlreadyFitted` on a second call and `EmptySample` when there are no finite values.
    pub fn fit(&mut self, sample: &[f64]) -> Result<()> {
        if self.fitted.is_some() {
            return Err(TabularErr::AlreadyFitted);
        }

        let sample: Vec<f64> = sample.iter().copied().filter(|x| x.is_finite()).collect();
        if sample.is_empty() {
            return Err(TabularErr::EmptySample);
        }

        let fitted = match self.kind {
            ScalerKind::Standard => Fitted::Standard {
                mean: stats::mean(&sample),
                std: nonzero(stats::std(&sample)),
            },
            ScalerKind::GaussRank => {
                let (xs, zs) = gauss_rank::fit(&sample);
                Fitted::GaussRank { xs, zs }
            }
            ScalerKind::Modified => {
                let median = stats::median(&sample);
                let abs_dev: Vec<f64> = sample.iter().map(|x| (x - median).abs()).collect();
                let mean = stats::mean(&sample);
                let mean_dev: Vec<f64> = sample.iter().map(|x| (x - mean).abs()).collect();

                Fitted::Modified {
                    median,
                    mad: stats::median(&abs_dev),
                    mean_ad: stats::mean(&mean_dev),
                }
            }
            ScalerKind::None => Fitted::None,
        };

        self.fitted = Some(fitted);
        Ok(())
    }

    /// Maps `x` into the scaled space.
    pub fn transform(&self, x: f64) -> Result<f64> {
        let z = match self.fitted.as_ref().ok_or(TabularErr::NotFitted)? {
            Fitted::Standard { mean, std } => (x - mean) / std,
            Fitted::GaussRank { xs, zs } => gauss_rank::interpolate(xs, zs, x),
            Fitted::Modified {
                median,
                mad,
                mean_ad,
            } => (x - median) / robust_scale(*mad, *mean_ad),
            Fitted::None => x,
        };

        Ok(z)
    }

    /// Maps `z` from the scaled space back to the original one.
    pub fn inverse_transform(&self, z: f64) -> Result<f64> {
        let x = match self.fitted.as_ref().ok_or(TabularErr::NotFitted)? {
            Fitted::Standard { mean, std } => z * std + mean,
            Fitted::GaussRank { xs, zs } => gauss_rank::interpolate(zs, xs, z),
            Fitted::Modified {
                median,
                mad,
                mean_ad,
            } => z * robust_scale(*mad, *mean_ad) + median,
            Fitted::None => z,
        };

        Ok(x)
    }

    /// Applies `transform` to every value.
    pub fn transform_all(&self, xs: &[f64]) -> Result<Vec<f64>> {
        xs.iter().map(|&x| self.transform(x)).collect()
    }
}

fn nonzero(std: f64) -> f64 {
    if std == 0. || !std.is_finite() { 1. } else { std }
}

fn robust_scale(mad: f64, mean_ad: f64) -> f64 {
    if mad != 0. {
        MAD_FACTOR * mad
    } else if mean_ad != 0. {
        MEAN_AD_FACTOR * mean_ad
    } else {
        1.
    }
}
