use serde::{Deserialize, Serialize, Serializer};

use super::enums::{DegradedReason, Gender};

/// Status string emitted when classification was skipped.
pub const UNKNOWN_STATUS: &str = "-";

/// Value string emitted when no token was found.
pub const MISSING_VALUE: &str = "-";

/// Optional patient context fed into the Age / Gender feature slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Option<u32>,
    pub gender: Option<Gender>,
}

impl Demographics {
    pub fn new(age: Option<u32>, gender: Option<Gender>) -> Self {
        Self { age, gender }
    }

    /// Fill absent fields from `defaults`.
    pub fn or(self, defaults: Demographics) -> Self {
        Self {
            age: self.age.or(defaults.age),
            gender: self.gender.or(defaults.gender),
        }
    }
}

/// How a located parameter ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingOutcome {
    /// The classifier produced a decoded status (e.g. "Low").
    Classified { status: String },
    /// Classification was skipped; the reading is still reported.
    Degraded { reason: DegradedReason },
}

/// One reported parameter of a lab document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterReading {
    pub parameter: String,
    /// Normalized numeric value, when the token parsed.
    pub value: Option<f64>,
    /// Token as found in the text, when one was found.
    pub raw_token: Option<String>,
    pub outcome: ReadingOutcome,
}

impl ParameterReading {
    pub fn classified(parameter: &str, value: f64, raw_token: &str, status: String) -> Self {
        Self {
            parameter: parameter.to_string(),
            value: Some(value),
            raw_token: Some(raw_token.to_string()),
            outcome: ReadingOutcome::Classified { status },
        }
    }

    pub fn degraded(
        parameter: &str,
        value: Option<f64>,
        raw_token: Option<&str>,
        reason: DegradedReason,
    ) -> Self {
        Self {
            parameter: parameter.to_string(),
            value,
            raw_token: raw_token.map(str::to_string),
            outcome: ReadingOutcome::Degraded { reason },
        }
    }

    /// Reading for a parameter that was mentioned but had no value nearby.
    pub fn placeholder(parameter: &str) -> Self {
        Self::degraded(parameter, None, None, DegradedReason::ValueMissing)
    }

    pub fn status(&self) -> &str {
        match &self.outcome {
            ReadingOutcome::Classified { status } => status,
            ReadingOutcome::Degraded { .. } => UNKNOWN_STATUS,
        }
    }

    pub fn reason(&self) -> Option<DegradedReason> {
        match &self.outcome {
            ReadingOutcome::Classified { .. } => None,
            ReadingOutcome::Degraded { reason } => Some(*reason),
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self.outcome, ReadingOutcome::Classified { .. })
    }

    /// Value as shown to clients: the normalized number, else the raw
    /// token, else "-".
    pub fn display_value(&self) -> String {
        match (self.value, self.raw_token.as_deref()) {
            (Some(v), _) => format_value(v),
            (None, Some(raw)) => raw.to_string(),
            (None, None) => MISSING_VALUE.to_string(),
        }
    }
}

/// `f64` Display already drops a trailing ".0" (11200.0 -> "11200").
pub fn format_value(value: f64) -> String {
    format!("{value}")
}

#[derive(Serialize)]
struct ReadingWire<'a> {
    parameter: &'a str,
    value: String,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<DegradedReason>,
}

impl Serialize for ParameterReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ReadingWire {
            parameter: &self.parameter,
            value: self.display_value(),
            status: self.status(),
            reason: self.reason(),
        }
        .serialize(serializer)
    }
}
