use std::collections::{HashMap, HashSet};

use crate::models::Demographics;
use crate::pipeline::extraction::ParameterRegistry;

use super::types::{
    parameter_slot_name, FeatureVector, AGE_SLOT, GENDER_SLOTS, PARAMETER_SLOT_PREFIX, VALUE_SLOT,
};
use super::ClassifierError;

/// Slot indices resolved once from the model's declared layout.
///
/// Every registered parameter must have a `Parameter_<name>` slot and the
/// layout must carry a `Value` slot.
#[derive(Debug, Clone)]
pub struct SchemaBinding {
    layout: Vec<String>,
    value_slot: usize,
    age_slot: Option<usize>,
    gender_slot: Option<usize>,
    parameter_slots: HashMap<String, usize>,
}

impl SchemaBinding {
    pub fn negotiate(
        layout: &[String],
        registry: &ParameterRegistry,
    ) -> Result<Self, ClassifierError> {
        let mut seen = HashSet::new();
        for name in layout {
            if !seen.insert(name.as_str()) {
                return Err(ClassifierError::SchemaMismatch(format!(
                    "slot {name:?} is declared twice"
                )));
            }
        }

        let position = |slot: &str| layout.iter().position(|name| name == slot);

        let value_slot = position(VALUE_SLOT).ok_or_else(|| {
            ClassifierError::SchemaMismatch(format!("model has no {VALUE_SLOT:?} slot"))
        })?;
        let age_slot = position(AGE_SLOT);
        let gender_slot = GENDER_SLOTS.iter().find_map(|slot| position(slot));

        let mut parameter_slots = HashMap::with_capacity(registry.len());
        let mut unbound = Vec::new();
        for spec in registry.iter() {
            match find_parameter_slot(layout, spec.name()) {
                Some(index) => {
                    parameter_slots.insert(spec.name().to_string(), index);
                }
                None => unbound.push(spec.name().to_string()),
            }
        }
        if !unbound.is_empty() {
            return Err(ClassifierError::SchemaMismatch(format!(
                "registered parameters without a {PARAMETER_SLOT_PREFIX}* slot: {}",
                unbound.join(", ")
            )));
        }

        let unregistered = layout
            .iter()
            .filter(|name| name.starts_with(PARAMETER_SLOT_PREFIX))
            .count()
            .saturating_sub(parameter_slots.len());
        tracing::info!(
            slots = layout.len(),
            parameters = parameter_slots.len(),
            unregistered_parameter_slots = unregistered,
            has_age = age_slot.is_some(),
            has_gender = gender_slot.is_some(),
            "Feature schema negotiated"
        );

        Ok(Self {
            layout: layout.to_vec(),
            value_slot,
            age_slot,
            gender_slot,
            parameter_slots,
        })
    }

    pub fn layout_len(&self) -> usize {
        self.layout.len()
    }

    pub fn is_bound(&self, parameter: &str) -> bool {
        self.parameter_slots.contains_key(parameter)
    }

    /// Build the vector for one reading against the layout the model
    /// declares right now.
    pub fn build<'a>(
        &self,
        layout: &'a [String],
        parameter: &str,
        value: f64,
        demographics: Demographics,
    ) -> Result<FeatureVector<'a>, ClassifierError> {
        if layout.len() != self.layout.len() {
            return Err(ClassifierError::SchemaMismatch(format!(
                "model declares {} slots, binding expects {}",
                layout.len(),
                self.layout.len()
            )));
        }
        if let Some(slot) = layout.iter().zip(&self.layout).position(|(now, bound)| now != bound) {
            return Err(ClassifierError::SchemaMismatch(format!(
                "slot {slot} is {:?} now, was {:?} at negotiation",
                layout[slot], self.layout[slot]
            )));
        }

        let parameter_slot = self.parameter_slots.get(parameter).copied().ok_or_else(|| {
            ClassifierError::SchemaMismatch(format!("parameter {parameter:?} is not bound"))
        })?;

        let mut vector = FeatureVector::zeroed(layout);
        vector.set(parameter_slot, 1.0);
        vector.set(self.value_slot, value);
        if let (Some(slot), Some(age)) = (self.age_slot, demographics.age) {
            vector.set(slot, f64::from(age));
        }
        if let (Some(slot), Some(gender)) = (self.gender_slot, demographics.gender) {
            vector.set(slot, f64::from(gender.encoded()));
        }

        Ok(vector)
    }
}

/// Exact `Parameter_<name>` first, then a case-insensitive match.
fn find_parameter_slot(layout: &[String], parameter: &str) -> Option<usize> {
    let wanted = parameter_slot_name(parameter);
    layout.iter().position(|name| *name == wanted).or_else(|| {
        let wanted_lower = wanted.to_lowercase();
        layout
            .iter()
            .position(|name| name.to_lowercase() == wanted_lower)
    })
}
