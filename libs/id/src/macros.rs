//! The `define_id!` macro behind every typed identity.

/// Defines a ULID-backed identity type with a fixed string prefix.
///
/// The generated type:
/// - exposes its `PREFIX`
/// - generates fresh values with `new()` (used by fixtures and the CLI)
/// - parses strictly from `{prefix}_{ulid}` via `parse()` / `FromStr`
/// - serializes as that same string
/// - orders by ULID, i.e. by issue time
///
/// ```ignore
/// define_id!(InstructorId, "ins");
///
/// let id = InstructorId::new();
/// let parsed: InstructorId = id.to_string().parse()?;
/// ```
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name($crate::Ulid);

        impl $name {
            /// The prefix for this ID type.
            pub const PREFIX: &'static str = $prefix;

            /// Creates a new ID with a fresh ULID.
            #[must_use]
            pub fn new() -> Self {
                Self($crate::Ulid::new())
            }

            /// Creates an ID from a raw ULID.
            #[must_use]
            pub const fn from_ulid(ulid: $crate::Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn ulid(&self) -> $crate::Ulid {
                self.0
            }

            /// Last six characters of the ULID, for compact tables and log lines.
            #[must_use]
            pub fn short(&self) -> String {
                let ulid = self.0.to_string();
                ulid[ulid.len() - 6..].to_string()
            }

            /// Parses an ID from a `{prefix}_{ulid}` string.
            pub fn parse(s: &str) -> Result<Self, $crate::IdError> {
                if s.is_empty() {
                    return Err($crate::IdError::Empty);
                }

                let Some((prefix, ulid_str)) = s.split_once('_') else {
                    return Err($crate::IdError::MissingSeparator);
                };

                if prefix != Self::PREFIX {
                    return Err($crate::IdError::InvalidPrefix {
                        expected: Self::PREFIX,
                        actual: prefix.to_string(),
                    });
                }

                let ulid = ulid_str
                    .parse::<$crate::Ulid>()
                    .map_err(|e| $crate::IdError::InvalidUlid(e.to_string()))?;

                Ok(Self(ulid))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}_{}", Self::PREFIX, self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}
