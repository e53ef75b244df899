use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A computed indicator reading.
///
/// `Unavailable` means the input series was too short or a denominator was
/// zero. It must propagate into dependent factor scores as a zero
/// contribution and is never silently coerced to a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Value(f64),
    Unavailable,
}

impl IndicatorValue {
    /// Wrap a computation result, trapping non-finite values.
    pub fn from_computed(value: f64) -> Self {
        if value.is_finite() {
            Self::Value(value)
        } else {
            Self::Unavailable
        }
    }

    pub fn from_option(value: Option<f64>) -> Self {
        match value {
            Some(v) => Self::from_computed(v),
            None => Self::Unavailable,
        }
    }

    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unavailable => None,
        }
    }

    pub const fn is_available(self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// The reading, or zero when unavailable. Only scoring accumulation may
    /// use this; indicator math must branch on availability instead.
    pub const fn or_zero(self) -> f64 {
        match self {
            Self::Value(v) => v,
            Self::Unavailable => 0.0,
        }
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            Self::Value(v) => Self::from_computed(f(v)),
            Self::Unavailable => Self::Unavailable,
        }
    }
}

impl Serialize for IndicatorValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IndicatorValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(Self::from_option(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traps_non_finite_values() {
        assert_eq!(
            IndicatorValue::from_computed(f64::NAN),
            IndicatorValue::Unavailable
        );
        assert_eq!(
            IndicatorValue::from_computed(f64::INFINITY),
            IndicatorValue::Unavailable
        );
        assert_eq!(
            IndicatorValue::from_computed(42.0),
            IndicatorValue::Value(42.0)
        );
    }

    #[test]
    fn serializes_unavailable_as_null() {
        let json = serde_json::to_string(&IndicatorValue::Unavailable).expect("serialize");
        assert_eq!(json, "null");

        let json = serde_json::to_string(&IndicatorValue::Value(1.5)).expect("serialize");
        assert_eq!(json, "1.5");
    }
}
