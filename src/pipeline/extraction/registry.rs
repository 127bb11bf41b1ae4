use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::RegistryError;

/// Blood-count parameters the bundled classifier was trained on, with the
/// token shapes accepted for each. Counts may carry thousands separators.
const BLOOD_PANEL: &[(&str, &str)] = &[
    ("Hemoglobin", r"[\d.]+"),
    ("Platelet Count", r"[\d.,]+"),
    ("WBC", r"[\d.,]+"),
    ("RBC", r"[\d.,]+"),
    ("PCV", r"[\d.]+"),
    ("MCH", r"[\d.]+"),
    ("MCV", r"[\d.]+"),
    ("MCHC", r"[\d.]+"),
];

/// Serialized form of a parameter definition (registry JSON files).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpecDef {
    pub name: String,
    pub value_pattern: String,
}

/// A known parameter and the regex its value tokens must match.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    name: String,
    name_lower: String,
    value_pattern: Regex,
}

impl ParameterSpec {
    pub fn new(name: &str, value_pattern: &str) -> Result<Self, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let value_pattern = Regex::new(value_pattern).map_err(|source| {
            RegistryError::InvalidPattern {
                name: name.to_string(),
                source,
            }
        })?;

        Ok(Self {
            name: name.to_string(),
            name_lower: name.to_lowercase(),
            value_pattern,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_pattern(&self) -> &Regex {
        &self.value_pattern
    }

    /// Case-insensitive substring test; `line_lower` must already be lowercased.
    pub fn is_mentioned_in(&self, line_lower: &str) -> bool {
        line_lower.contains(&self.name_lower)
    }

    /// First token in `text` matching the value pattern.
    pub fn find_token<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.value_pattern.find(text).map(|m| m.as_str())
    }
}

impl PartialEq for ParameterSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value_pattern.as_str() == other.value_pattern.as_str()
    }
}

/// The immutable set of parameters scanned for, in registration order.
#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    specs: Vec<ParameterSpec>,
}

impl ParameterRegistry {
    pub fn from_defs(defs: &[ParameterSpecDef]) -> Result<Self, RegistryError> {
        if defs.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::new();
        let mut specs = Vec::with_capacity(defs.len());
        for def in defs {
            let spec = ParameterSpec::new(&def.name, &def.value_pattern)?;
            if !seen.insert(spec.name_lower.clone()) {
                return Err(RegistryError::DuplicateName(spec.name.clone()));
            }
            specs.push(spec);
        }

        Ok(Self { specs })
    }

    /// The eight-parameter complete blood count panel.
    pub fn blood_panel() -> Self {
        let specs = BLOOD_PANEL
            .iter()
            .filter_map(|(name, pattern)| ParameterSpec::new(name, pattern).ok())
            .collect();
        Self { specs }
    }

    /// Load a JSON array of `{ "name", "value_pattern" }` objects.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let defs: Vec<ParameterSpecDef> =
            serde_json::from_str(&raw).map_err(|source| RegistryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let registry = Self::from_defs(&defs)?;
        tracing::info!(path = %path.display(), parameters = registry.len(), "Loaded parameter registry");
        Ok(registry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.specs.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        let lower = name.to_lowercase();
        self.specs.iter().find(|s| s.name_lower == lower)
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self::blood_panel()
    }
}
