use serde::{Deserialize, Serialize};

use crate::{Result, Scaler, Value};

/// The reserved category absorbing rare and unseen values, always the last class of a
/// categorical column.
pub const OTHER: &str = "_other";

/// What the registry knows about a column, tagged by kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureSpec {
    /// A real valued column, missing values are filled with `mean` before scaling.
    Numeric { mean: f64, std: f64, scaler: Scaler },
    /// A two valued column, `categories` is `[false_label, true_label]`.
    Binary { categories: [Value; 2] },
    /// A discrete column. `categories` holds the retained values, in code order, without the
    /// trailing `_other` class.
    Categorical {
        categories: Vec<String>,
        min_count: usize,
    },
}

impl FeatureSpec {
    pub fn is_numeric(&self) -> bool {
        matches!(self, FeatureSpec::Numeric { .. })
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, FeatureSpec::Binary { .. })
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, FeatureSpec::Categorical { .. })
    }

    /// Scales a numeric cell, `None` is replaced by the column mean.
    ///
    /// Non-numeric specs return the value unchanged.
    pub fn scale(&self, x: Option<f64>) -> Result<f64> {
        match self {
            FeatureSpec::Numeric { mean, scaler, .. } => scaler.transform(x.unwrap_or(*mean)),
            _ => Ok(x.unwrap_or_default()),
        }
    }

    /// Maps a scaled numeric value back to the original scale.
    pub fn unscale(&self, z: f64) -> Result<f64> {
        match self {
            FeatureSpec::Numeric { scaler, .. } => scaler.inverse_transform(z),
            _ => Ok(z),
        }
    }

    /// Whether `value` is the true label of a binary spec. Unseen values are `false`.
    pub fn is_true(&self, value: &Value) -> bool {
        match self {
            FeatureSpec::Binary { categories } => same_label(&categories[1], value),
            _ => false,
        }
    }

    /// Maps a boolean back to the binary spec's label.
    pub fn binary_label(&self, flag: bool) -> Value {
        match self {
            FeatureSpec::Binary { categories } => categories[flag as usize].clone(),
            _ => Value::Bool(flag),
        }
    }

    /// The amount of classes of a categorical spec, `_other` included. Zero for other kinds.
    pub fn cardinality(&self) -> usize {
        match self {
            FeatureSpec::Categorical { categories, .. } => categories.len() + 1,
            _ => 0,
        }
    }

    /// The label of a categorical class code, codes past the retained categories are `_other`.
    pub fn category_label(&self, code: usize) -> Value {
        match self {
            FeatureSpec::Categorical { categories, .. } => Value::Str(
                categories
                    .get(code)
                    .cloned()
                    .unwrap_or_else(|| OTHER.to_string()),
            ),
            _ => Value::Null,
        }
    }
}

/// Label equality that ignores the integer/real distinction, so a binary column fit on `0`/`1`
/// still matches `1.0`.
fn same_label(label: &Value, value: &Value) -> bool {
    match (label.as_f64(), value.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => label == value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_labels() {
        let spec = FeatureSpec::Binary {
            categories: [Value::from("no"), Value::from("yes")],
        };

        assert!(spec.is_true(&Value::from("yes")));
        assert!(!spec.is_true(&Value::from("no")));
        assert!(!spec.is_true(&Value::from("maybe")));
        assert!(!spec.is_true(&Value::Null));
        assert_eq!(spec.binary_label(true), Value::from("yes"));
    }

    #[test]
    fn numeric_binary_labels_ignore_representation() {
        let spec = FeatureSpec::Binary {
            categories: [Value::Int(0), Value::Int(1)],
        };

        assert!(spec.is_true(&Value::Float(1.)));
    }

    #[test]
    fn other_is_the_last_class() {
        let spec = FeatureSpec::Categorical {
            categories: vec!["a".into(), "b".into()],
            min_count: 1,
        };

        assert_eq!(spec.cardinality(), 3);
        assert_eq!(spec.category_label(1), Value::from("b"));
        assert_eq!(spec.category_label(2), Value::from(OTHER));
    }
}
