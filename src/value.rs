use std::fmt::{Display, Formatter};

use num_bigint::BigInt;

/// What the graph knows about a symbolic value.
///
/// Values are opaque: two graphs never compare values by handle. Whether a
/// value is an address is not recorded here but by the presence of a
/// points-to edge for it.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SymbolicValue {
    /// Some fixed but unknown scalar.
    Unknown,
    /// A known scalar.
    Explicit(BigInt),
}

impl SymbolicValue {
    pub fn explicit(value: impl Into<BigInt>) -> Self {
        SymbolicValue::Explicit(value.into())
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, SymbolicValue::Explicit(_))
    }

    pub fn as_explicit(&self) -> Option<&BigInt> {
        match self {
            SymbolicValue::Explicit(v) => Some(v),
            SymbolicValue::Unknown => None,
        }
    }

    /// Least general value covering both `self` and `other`.
    pub fn generalize(&self, other: &SymbolicValue) -> SymbolicValue {
        match (self, other) {
            (SymbolicValue::Explicit(a), SymbolicValue::Explicit(b)) if a == b => self.clone(),
            _ => SymbolicValue::Unknown,
        }
    }

    /// Whether every scalar described by `self` is also described by `other`.
    pub fn is_covered_by(&self, other: &SymbolicValue) -> bool {
        match (self, other) {
            (_, SymbolicValue::Unknown) => true,
            (SymbolicValue::Explicit(a), SymbolicValue::Explicit(b)) => a == b,
            (SymbolicValue::Unknown, SymbolicValue::Explicit(_)) => false,
        }
    }
}

impl Display for SymbolicValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolicValue::Unknown => write!(f, "?"),
            SymbolicValue::Explicit(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generalize() {
        let five = SymbolicValue::explicit(5);
        let six = SymbolicValue::explicit(6);
        assert_eq!(five.generalize(&five), five);
        assert_eq!(five.generalize(&six), SymbolicValue::Unknown);
        assert_eq!(five.generalize(&SymbolicValue::Unknown), SymbolicValue::Unknown);
    }

    #[test]
    fn test_covered_by() {
        let five = SymbolicValue::explicit(5);
        assert!(five.is_covered_by(&SymbolicValue::Unknown));
        assert!(five.is_covered_by(&five));
        assert!(!SymbolicValue::Unknown.is_covered_by(&five));
        assert!(!five.is_covered_by(&SymbolicValue::explicit(-5)));
    }

    #[test]
    fn test_display() {
        assert_eq!(SymbolicValue::Unknown.to_string(), "?");
        assert_eq!(SymbolicValue::explicit(-3).to_string(), "-3");
    }
}
