use crate::models::Demographics;
use crate::pipeline::extraction::ParameterRegistry;

use super::artifacts::ModelArtifacts;
use super::schema::SchemaBinding;
use super::types::{ClassifierModel, EncodedLabel, FeatureVector, LabelDecoder};
use super::ClassifierError;

/// A loaded model, its label decoder and the schema binding negotiated
/// against the parameter registry. Read-only once built; share via `Arc`.
pub struct Classifier {
    model: Box<dyn ClassifierModel + Send + Sync>,
    decoder: Box<dyn LabelDecoder + Send + Sync>,
    binding: SchemaBinding,
}

impl Classifier {
    /// Negotiate the feature schema; fails if the model cannot serve every
    /// registered parameter.
    pub fn bind(
        model: Box<dyn ClassifierModel + Send + Sync>,
        decoder: Box<dyn LabelDecoder + Send + Sync>,
        registry: &ParameterRegistry,
    ) -> Result<Self, ClassifierError> {
        let binding = SchemaBinding::negotiate(model.expected_feature_layout(), registry)?;
        Ok(Self {
            model,
            decoder,
            binding,
        })
    }

    pub fn from_artifacts(
        artifacts: ModelArtifacts,
        registry: &ParameterRegistry,
    ) -> Result<Self, ClassifierError> {
        tracing::debug!(source = %artifacts.source.display(), "Binding classifier artifacts");
        Self::bind(artifacts.model, Box::new(artifacts.labels), registry)
    }

    /// Classify one normalized value into a decoded status.
    pub fn classify(
        &self,
        parameter: &str,
        value: f64,
        demographics: Demographics,
    ) -> Result<String, ClassifierError> {
        let layout = self.model.expected_feature_layout();
        let features = self.binding.build(layout, parameter, value, demographics)?;
        let label = self.model.predict(&features)?;
        self.decoder.decode(label)
    }

    pub fn layout(&self) -> &[String] {
        self.model.expected_feature_layout()
    }

    pub fn binding(&self) -> &SchemaBinding {
        &self.binding
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

type PredictFn = dyn Fn(&FeatureVector<'_>) -> Result<EncodedLabel, ClassifierError> + Send + Sync;

/// Model driven by a closure, for tests and dry runs.
pub struct StubModel {
    layout: Vec<String>,
    class_count: Option<usize>,
    predict: Box<PredictFn>,
}

impl StubModel {
    pub fn new<F>(layout: &[&str], predict: F) -> Self
    where
        F: Fn(&FeatureVector<'_>) -> Result<EncodedLabel, ClassifierError> + Send + Sync + 'static,
    {
        Self {
            layout: layout.iter().map(|s| s.to_string()).collect(),
            class_count: None,
            predict: Box::new(predict),
        }
    }

    pub fn with_class_count(mut self, n: usize) -> Self {
        self.class_count = Some(n);
        self
    }

    /// Always predicts `label`.
    pub fn fixed(layout: &[&str], label: usize) -> Self {
        Self::new(layout, move |_| Ok(EncodedLabel(label)))
    }

    /// Layout of the bundled blood-panel training run.
    pub fn blood_panel_layout() -> Vec<&'static str> {
        vec![
            "Value",
            "Age",
            "GenderEncoded",
            "Parameter_Hemoglobin",
            "Parameter_MCH",
            "Parameter_MCHC",
            "Parameter_MCV",
            "Parameter_PCV",
            "Parameter_Platelet Count",
            "Parameter_RBC",
            "Parameter_WBC",
        ]
    }
}

impl ClassifierModel for StubModel {
    fn expected_feature_layout(&self) -> &[String] {
        &self.layout
    }

    fn class_count(&self) -> Option<usize> {
        self.class_count
    }

    fn predict(&self, features: &FeatureVector<'_>) -> Result<EncodedLabel, ClassifierError> {
        (self.predict)(features)
    }
}
