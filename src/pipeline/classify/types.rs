use super::ClassifierError;

/// Slot holding the normalized value.
pub const VALUE_SLOT: &str = "Value";
/// Slot holding the patient's age in years.
pub const AGE_SLOT: &str = "Age";
/// Slot names accepted for the binary gender encoding.
pub const GENDER_SLOTS: &[&str] = &["GenderEncoded", "Gender"];
/// Prefix of the one-hot parameter columns (`Parameter_Hemoglobin`).
pub const PARAMETER_SLOT_PREFIX: &str = "Parameter_";

pub fn parameter_slot_name(parameter: &str) -> String {
    format!("{PARAMETER_SLOT_PREFIX}{parameter}")
}

/// Raw class id as emitted by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodedLabel(pub usize);

/// Numeric input row aligned 1:1 with the model's declared layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector<'a> {
    layout: &'a [String],
    values: Vec<f64>,
}

impl<'a> FeatureVector<'a> {
    /// All slots zero-initialized.
    pub fn zeroed(layout: &'a [String]) -> Self {
        Self {
            layout,
            values: vec![0.0; layout.len()],
        }
    }

    pub fn layout(&self) -> &'a [String] {
        self.layout
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a named slot.
    pub fn get(&self, slot: &str) -> Option<f64> {
        self.layout
            .iter()
            .position(|name| name == slot)
            .map(|i| self.values[i])
    }

    pub(crate) fn set(&mut self, index: usize, value: f64) {
        self.values[index] = value;
    }
}

/// A pre-trained classifier, loaded once and only read afterwards.
pub trait ClassifierModel {
    /// Ordered slot names the model was trained on.
    fn expected_feature_layout(&self) -> &[String];

    /// Number of classes the model can emit, when the model knows it.
    fn class_count(&self) -> Option<usize> {
        None
    }

    fn predict(&self, features: &FeatureVector<'_>) -> Result<EncodedLabel, ClassifierError>;
}

/// Maps encoded labels back to human-readable statuses.
pub trait LabelDecoder {
    fn decode(&self, label: EncodedLabel) -> Result<String, ClassifierError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_vector_matches_layout_length() {
        let layout: Vec<String> = vec!["Value".into(), "Age".into(), "Parameter_WBC".into()];
        let v = FeatureVector::zeroed(&layout);
        assert_eq!(v.len(), 3);
        assert!(v.values().iter().all(|x| *x == 0.0));
    }

    #[test]
    fn get_reads_named_slot() {
        let layout: Vec<String> = vec!["Value".into(), "Parameter_WBC".into()];
        let mut v = FeatureVector::zeroed(&layout);
        v.set(0, 11200.0);
        assert_eq!(v.get("Value"), Some(11200.0));
        assert_eq!(v.get("Parameter_WBC"), Some(0.0));
        assert_eq!(v.get("Age"), None);
    }

    #[test]
    fn parameter_slot_names_use_training_prefix() {
        assert_eq!(parameter_slot_name("Platelet Count"), "Parameter_Platelet Count");
    }

    #[test]
    fn traits_are_object_safe() {
        fn _assert_model(_: &dyn ClassifierModel) {}
        fn _assert_decoder(_: &dyn LabelDecoder) {}
    }
}
