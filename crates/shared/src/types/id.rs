//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `TransactionId` where an
//! `AccountId` is expected. Both are monotonic sequences assigned by the store.

use serde::{Deserialize, Serialize};

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Creates an ID from a raw sequence value.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the inner sequence value.
            #[must_use]
            pub const fn into_inner(self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

typed_id!(AccountId, "Internal identifier of a ledger account.");
typed_id!(TransactionId, "Internal identifier of a ledger transaction record.");

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[test]
    fn test_typed_id_roundtrips_through_display() {
        let id = AccountId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(AccountId::from_str("42").unwrap(), id);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_typed_id_ordering_follows_sequence() {
        assert!(TransactionId::new(1) < TransactionId::new(2));
    }

    #[rstest]
    #[case::letters("abc")]
    #[case::empty("")]
    #[case::decimal("1.5")]
    #[case::overflow("9223372036854775808")]
    fn test_typed_id_rejects_garbage(#[case] input: &str) {
        assert!(TransactionId::from_str(input).is_err());
    }

    #[test]
    fn test_typed_id_serializes_transparently() {
        let json = serde_json::to_string(&TransactionId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
