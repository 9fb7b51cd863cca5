use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::TabularErr;

/// The family of a `Scaler`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    /// `(x - mean) / std`.
    #[default]
    Standard,
    /// Rank based mapping onto a standard normal.
    GaussRank,
    /// `(x - median) / (1.486 * MAD)`, robust to outliers.
    Modified,
    /// Identity.
    None,
}

impl ScalerKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalerKind::Standard => "standard",
            ScalerKind::GaussRank => "gauss_rank",
            ScalerKind::Modified => "modified",
            ScalerKind::None => "none",
        }
    }

    /// The tag written next to z-losses produced by this family.
    pub fn tag(self) -> String {
        match self {
            ScalerKind::Standard => "z".to_string(),
            ScalerKind::Modified => "modz".to_string(),
            other => format!("{}_scaled", other.name()),
        }
    }
}

impl fmt::Display for ScalerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalerKind {
    type Err = TabularErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(ScalerKind::Standard),
            "gauss_rank" => Ok(ScalerKind::GaussRank),
            "modified" => Ok(ScalerKind::Modified),
            "none" => Ok(ScalerKind::None),
            other => Err(TabularErr::UnknownScaler(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags() {
        assert_eq!(ScalerKind::Standard.tag(), "z");
        assert_eq!(ScalerKind::Modified.tag(), "modz");
        assert_eq!(ScalerKind::GaussRank.tag(), "gauss_rank_scaled");
        assert_eq!(ScalerKind::None.tag(), "none_scaled");
    }

    #[test]
    fn parses_names() {
        assert_eq!("gauss_rank".parse::<ScalerKind>(), Ok(ScalerKind::GaussRank));
        assert!(matches!(
            "robust".parse::<ScalerKind>(),
            Err(TabularErr::UnknownScaler(_))
        ));
    }
}
