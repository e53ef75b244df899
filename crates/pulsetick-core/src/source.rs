use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers used in chain metadata and reports.
///
/// `Synthetic` is the deterministic last-resort generator; it never appears
/// in a chain without the degraded flag set on the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Schwab,
    Alphavantage,
    Synthetic,
}

impl ProviderId {
    pub const ALL: [Self; 3] = [Self::Schwab, Self::Alphavantage, Self::Synthetic];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Schwab => "schwab",
            Self::Alphavantage => "alphavantage",
            Self::Synthetic => "synthetic",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "schwab" => Ok(Self::Schwab),
            "alphavantage" => Ok(Self::Alphavantage),
            "synthetic" => Ok(Self::Synthetic),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_id() {
        let parsed = ProviderId::from_str("Schwab").expect("must parse");
        assert_eq!(parsed, ProviderId::Schwab);
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = ProviderId::from_str("polygon").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidSource { .. }));
    }
}
