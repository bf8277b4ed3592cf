use serde::{Deserialize, Serialize};
use std::fmt;

/// A JSON-compatible number that remembers whether it arrived as an integer
/// or a float, so that integer-only arithmetic (subject weight × subject
/// partial) can stay integral instead of always promoting to `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub const ONE: Number = Number::Int(1);

    /// Finite iff it isn't NaN/±inf. Integers are always finite.
    pub fn is_finite(&self) -> bool {
        match self {
            Number::Int(_) => true,
            Number::Float(f) => f.is_finite(),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(i) => *i as f64,
            Number::Float(f) => *f,
        }
    }

    /// Multiply two numbers. Int × Int stays Int; any Float operand
    /// promotes the result to Float. No rounding is applied either way.
    pub fn mul(&self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a * b),
            _ => Number::Float(self.as_f64() * other.as_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Int(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_times_int_stays_int() {
        assert_eq!(Number::Int(3).mul(Number::Int(2)), Number::Int(6));
    }

    #[test]
    fn float_weight_promotes() {
        assert_eq!(Number::Int(4).mul(Number::Float(0.5)), Number::Float(2.0));
    }

    #[test]
    fn identity_weight() {
        assert_eq!(Number::Int(7).mul(Number::ONE), Number::Int(7));
    }

    #[test]
    fn nan_is_not_finite() {
        assert!(!Number::Float(f64::NAN).is_finite());
        assert!(!Number::Float(f64::INFINITY).is_finite());
    }
}
