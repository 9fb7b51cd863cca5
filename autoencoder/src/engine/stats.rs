use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tabular::{FeatureRegistry, Scaler, ScalerKind};

use crate::{AutoEncoderErr, Result, loss::FeatureLosses};

/// One fitted loss scaler per feature, turning raw reconstruction losses into z-scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossStats {
    kind: ScalerKind,
    scalers: BTreeMap<String, Scaler>,
}

impl LossStats {
    /// Fits one scaler per feature on the losses of a calibration pass.
    ///
    /// # Arguments
    /// * `kind` - The scaler family.
    /// * `registry` - The features, whose order matches the columns of `losses`.
    /// * `losses` - The losses of every row of the calibration data.
    pub fn fit(kind: ScalerKind, registry: &FeatureRegistry, losses: &FeatureLosses) -> Result<Self> {
        let combined = losses.combined();

        let scalers = registry
            .features()
            .iter()
            .zip(combined.columns())
            .map(|(feature, column)| -> Result<(String, Scaler)> {
                let sample: Vec<f64> = column.iter().map(|&l| l as f64).collect();
                let mut scaler = Scaler::new(kind);
                scaler.fit(&sample)?;
                Ok((feature.name.clone(), scaler))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Self { kind, scalers })
    }

    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    pub fn get(&self, feature: &str) -> Option<&Scaler> {
        self.scalers.get(feature)
    }

    /// Scales every loss with its feature's scaler.
    ///
    /// # Returns
    /// A `NotFitted` error if a feature of the registry has no scaler.
    pub fn scale(&self, registry: &FeatureRegistry, losses: &FeatureLosses) -> Result<FeatureLosses> {
        let scale_head = |names: Vec<&str>, head: &Array2<f32>| -> Result<Array2<f32>> {
            let mut scaled = head.clone();
            for (name, mut column) in names.into_iter().zip(scaled.columns_mut()) {
                let scaler = self.get(name).ok_or(AutoEncoderErr::NotFitted)?;
                for l in column.iter_mut() {
                    *l = scaler.transform(*l as f64)? as f32;
                }
            }
            Ok(scaled)
        };

        Ok(FeatureLosses {
            numeric: scale_head(registry.numeric().map(|f| f.name.as_str()).collect(), &losses.numeric)?,
            binary: scale_head(registry.binary().map(|f| f.name.as_str()).collect(), &losses.binary)?,
            categorical: scale_head(
                registry.categorical().map(|f| f.name.as_str()).collect(),
                &losses.categorical,
            )?,
        })
    }
}
