//! String tags for persisted enums.
//!
//! Stage identifiers and outcome values travel through the save channel as
//! plain strings. Every tagged enum round-trips through `as_str`/`FromStr`
//! and serializes with the same snake_case spelling.

use std::fmt;

/// Error returned when a persisted tag does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTagError {
    /// Name of the enum the tag was parsed as.
    pub kind: &'static str,
    /// The offending value.
    pub value: String,
}

impl ParseTagError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl fmt::Display for ParseTagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognised {} tag: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for ParseTagError {}

/// Declares a fieldless enum with a stable snake_case tag per variant.
///
/// Generates `ALL`, `as_str`, `Display`, `FromStr` and serde impls that all
/// agree on the tag. The invoking crate must depend on `serde`.
#[macro_export]
macro_rules! tag_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $tag:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant
            ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the stable tag for this variant.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::ParseTagError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok($name::$variant),)+
                    _ => Err($crate::ParseTagError::new(stringify!($name), s)),
                }
            }
        }
    };
}
