use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field} value: {value:?}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Gender {
    Male => "M",
    Female => "F",
});

str_enum!(MissingValuePolicy {
    Placeholder => "placeholder",
    Skip => "skip",
});

str_enum!(DegradedReason {
    ValueMissing => "value_missing",
    ValueUnparseable => "value_unparseable",
    SchemaMismatch => "schema_mismatch",
    PredictionFailure => "prediction_failure",
});

str_enum!(ResponseStatus {
    Completed => "completed",
    Error => "error",
});

impl Gender {
    /// Binary encoding used by the training pipeline (`F` = 0, `M` = 1).
    pub fn encoded(&self) -> f32 {
        match self {
            Self::Male => 1.0,
            Self::Female => 0.0,
        }
    }
}

impl Default for MissingValuePolicy {
    fn default() -> Self {
        Self::Placeholder
    }
}
