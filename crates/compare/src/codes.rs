//! Enums encoded either as integers or as names
//!
//! One broker carries enum fields as their ordinal code, the other as the
//! variant name. [`Coded`] enums accept both when deserializing so that the
//! comparators only ever see the decoded variant.

use serde::de::{Deserialize, Deserializer, Error as _};
use std::fmt;

/// An enum with a stable integer code and a stable name per variant
pub trait Coded: Sized + Copy + fmt::Debug + 'static {
    /// Every variant with its code and canonical name
    const VARIANTS: &'static [(Self, i64, &'static str)];

    /// Look a variant up by code
    fn from_code(code: i64) -> Option<Self> {
        Self::VARIANTS
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(v, _, _)| *v)
    }

    /// Look a variant up by name, ignoring ASCII case
    fn from_name(name: &str) -> Option<Self> {
        Self::VARIANTS
            .iter()
            .find(|(_, _, n)| n.eq_ignore_ascii_case(name))
            .map(|(v, _, _)| *v)
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum CodeOrName {
    Code(i64),
    Name(String),
}

/// Deserialize a [`Coded`] enum from either an integer or a name
pub fn deserialize_coded<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Coded,
{
    match CodeOrName::deserialize(deserializer)? {
        CodeOrName::Code(code) => T::from_code(code).ok_or_else(|| {
            D::Error::custom(format!(
                "unknown code {code} for {}",
                std::any::type_name::<T>()
            ))
        }),
        CodeOrName::Name(name) => T::from_name(&name).ok_or_else(|| {
            D::Error::custom(format!(
                "unknown name '{name}' for {}",
                std::any::type_name::<T>()
            ))
        }),
    }
}

/// Declare a [`Coded`] enum that deserializes from code or name and
/// serializes as its name
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = ($code:expr, $text:expr) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $crate::codes::Coded for $name {
            const VARIANTS: &'static [(Self, i64, &'static str)] =
                &[ $( ($name::$variant, $code, $text) ),+ ];
        }

        impl $name {
            /// Canonical name
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                $crate::codes::deserialize_coded(deserializer)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.name())
            }
        }
    };
}

pub(crate) use coded_enum;

#[cfg(test)]
mod tests {
    coded_enum! {
        /// Test enum
        pub enum Colour {
            /// Red
            Red = (0, "RED"),
            /// Green
            Green = (1, "GREEN"),
        }
    }

    #[test]
    fn test_decodes_code_and_name() {
        let by_code: Colour = serde_json::from_str("1").unwrap();
        let by_name: Colour = serde_json::from_str("\"green\"").unwrap();
        assert_eq!(by_code, Colour::Green);
        assert_eq!(by_name, Colour::Green);
        assert_eq!(serde_json::to_string(&Colour::Red).unwrap(), "\"RED\"");
    }

    #[test]
    fn test_unknown_values_fail() {
        assert!(serde_json::from_str::<Colour>("7").is_err());
        assert!(serde_json::from_str::<Colour>("\"BLUE\"").is_err());
        assert!(serde_json::from_str::<Colour>("true").is_err());
    }
}
