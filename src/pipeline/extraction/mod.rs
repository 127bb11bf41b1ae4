//! Parameter extraction: acquired text -> located, normalized values.
//!
//! Lines are segmented lazily, scanned for registered parameter names, and
//! each hit yields at most one candidate token (same line, else the next
//! line). Normalization failures stay local to their parameter.

pub mod registry;
pub mod segment;
pub mod locate;
pub mod normalize;

pub use registry::{ParameterRegistry, ParameterSpec, ParameterSpecDef};
pub use segment::{segment_lines, LineSegments, RawLine};
pub use locate::{locate_parameters, Candidate, Detection};
pub use normalize::{normalize_value, ValueUnparseable};

use std::path::PathBuf;

use thiserror::Error;

/// Registry problems. Raised while loading, never per request.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid value pattern for {name}: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("Parameter name must not be empty")]
    EmptyName,

    #[error("Parameter {0} is registered twice")]
    DuplicateName(String),

    #[error("Parameter registry is empty")]
    Empty,

    #[error("Cannot read registry file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse registry file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
