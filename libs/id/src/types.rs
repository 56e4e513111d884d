//! Typed ID definitions for schedule records.
//!
//! Each ID type has a unique prefix that identifies the record type.

use crate::define_id;

// =============================================================================
// People and Bookings
// =============================================================================

define_id!(
    /// An instructor; one queue per instructor per day.
    InstructorId,
    "ins"
);
define_id!(
    /// A customer booking; engagements are derived from bookings.
    BookingId,
    "bkg"
);

// =============================================================================
// Schedule Records
// =============================================================================

define_id!(
    /// A lesson groups the engagements sold under one package purchase.
    LessonId,
    "les"
);
define_id!(
    /// One time-boxed engagement in an instructor's queue.
    EngagementId,
    "eng"
);
define_id!(
    /// A piece of rental equipment attached to an engagement.
    EquipmentId,
    "eqp"
);

// =============================================================================
// Change Feed
// =============================================================================

/// Monotonic sequence number of a change notice or confirmation message.
///
/// Unlike the record IDs above this is a plain counter, not a ULID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Seq(u64);

impl Seq {
    /// The sequence before any message has been seen.
    pub const ZERO: Self = Self(0);

    /// Creates a sequence number from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the following sequence number.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Seq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Seq {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl serde::Serialize for Seq {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Seq {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u64::deserialize(deserializer)?;
        Ok(Self(value))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_instructor_id_roundtrip() {
        let id = InstructorId::new();
        let parsed: InstructorId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_engagement_id_prefix() {
        let id = EngagementId::new();
        assert!(id.to_string().starts_with("eng_"));
    }

    #[test]
    fn test_wrong_prefix_rejected() {
        let result: Result<InstructorId, _> = "eng_01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        let err = result.unwrap_err();
        assert!(err.is_prefix_error());
        assert!(matches!(
            err,
            crate::IdError::InvalidPrefix {
                expected: "ins",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_separator() {
        let result: Result<LessonId, _> = "les01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert!(matches!(
            result.unwrap_err(),
            crate::IdError::MissingSeparator
        ));
    }

    #[test]
    fn test_empty() {
        let result: Result<BookingId, _> = "".parse();
        assert!(result.unwrap_err().is_empty());
    }

    #[test]
    fn test_invalid_ulid() {
        let result: Result<EquipmentId, _> = "eqp_not-a-ulid".parse();
        assert!(matches!(result.unwrap_err(), crate::IdError::InvalidUlid(_)));
    }

    #[test]
    fn test_json_is_prefixed_string() {
        let id: InstructorId = "ins_01HV4Z2WQXKJNM8GPQY6VBKC3D".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ins_01HV4Z2WQXKJNM8GPQY6VBKC3D\"");
        let parsed: InstructorId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_short_is_ulid_tail() {
        let id: EngagementId = "eng_01HV4Z2WQXKJNM8GPQY6VBKC3D".parse().unwrap();
        assert_eq!(id.short(), "VBKC3D");
    }

    #[test]
    fn test_seq_next() {
        assert_eq!(Seq::ZERO.next(), Seq::new(1));
        assert_eq!(Seq::new(41).next().value(), 42);
        assert_eq!(serde_json::to_string(&Seq::new(7)).unwrap(), "7");
    }

    #[test]
    fn test_all_id_prefixes_unique() {
        let prefixes = [
            InstructorId::PREFIX,
            BookingId::PREFIX,
            LessonId::PREFIX,
            EngagementId::PREFIX,
            EquipmentId::PREFIX,
        ];

        let unique: std::collections::HashSet<_> = prefixes.iter().collect();
        assert_eq!(prefixes.len(), unique.len(), "Duplicate ID prefixes found!");
    }

    proptest! {
        #[test]
        fn prop_any_ulid_roundtrips(raw in any::<u128>()) {
            let id = EngagementId::from_ulid(crate::Ulid::from(raw));
            let parsed = EngagementId::parse(&id.to_string()).unwrap();
            prop_assert_eq!(id, parsed);
        }
    }
}
