use std::path::Path;
use std::sync::Arc;

use labscan::config::LabscanConfig;
use labscan::models::{Demographics, DegradedReason, Gender, MissingValuePolicy, ParameterReading};
use labscan::pipeline::acquisition::{AcquisitionOptions, TextAcquirer};
use labscan::pipeline::classify::{
    Classifier, EncodedLabel, LabelEncoder, SchemaBinding, StubModel, VALUE_SLOT,
};
use labscan::pipeline::extraction::{ParameterRegistry, ParameterSpecDef};
use labscan::{ExtractionResponse, ReportProcessor};
use serde_json::json;

const HIGH: usize = 0;
const LOW: usize = 1;
const NORMAL: usize = 2;

/// One tree over the blood-panel layout: Hemoglobin <= 12 Low, <= 17 Normal,
/// else High; other parameters <= 4000 Low, <= 12000 Normal, else High.
const FOREST: &str = r#"{
    "feature_names_in": [
        "Value", "Age", "GenderEncoded",
        "Parameter_Hemoglobin", "Parameter_MCH", "Parameter_MCHC", "Parameter_MCV",
        "Parameter_PCV", "Parameter_Platelet Count", "Parameter_RBC", "Parameter_WBC"
    ],
    "n_classes": 3,
    "trees": [{ "nodes": [
        { "feature": 3, "threshold": 0.5, "left": 1, "right": 2 },
        { "feature": 0, "threshold": 4000.0, "left": 3, "right": 4 },
        { "feature": 0, "threshold": 12.0, "left": 7, "right": 8 },
        { "feature": -1, "value": [0, 1, 0] },
        { "feature": 0, "threshold": 12000.0, "left": 5, "right": 6 },
        { "feature": -1, "value": [0, 0, 1] },
        { "feature": -1, "value": [1, 0, 0] },
        { "feature": -1, "value": [0, 4, 0] },
        { "feature": 0, "threshold": 17.0, "left": 9, "right": 10 },
        { "feature": -1, "value": [0, 0, 9] },
        { "feature": -1, "value": [2, 0, 0] }
    ] }]
}"#;

fn labels() -> Box<LabelEncoder> {
    Box::new(LabelEncoder::new(vec!["High".into(), "Low".into(), "Normal".into()]).unwrap())
}

fn two_parameter_registry() -> ParameterRegistry {
    ParameterRegistry::from_defs(&[
        ParameterSpecDef {
            name: "Hemoglobin".into(),
            value_pattern: r"[\d.]+".into(),
        },
        ParameterSpecDef {
            name: "WBC".into(),
            value_pattern: r"[\d.,]+".into(),
        },
    ])
    .unwrap()
}

/// Low Hemoglobin is Low, everything else Normal.
fn stub_processor(registry: ParameterRegistry) -> ReportProcessor {
    let model = StubModel::new(&StubModel::blood_panel_layout(), |v| {
        let low_hb =
            v.get("Parameter_Hemoglobin") == Some(1.0) && v.get(VALUE_SLOT).unwrap_or(0.0) < 12.0;
        Ok(EncodedLabel(if low_hb { LOW } else { NORMAL }))
    });
    let registry = Arc::new(registry);
    let classifier = Classifier::bind(Box::new(model), labels(), &registry).unwrap();
    ReportProcessor::new(
        TextAcquirer::new(AcquisitionOptions::default()),
        registry,
        Arc::new(classifier),
    )
}

fn as_json(readings: Vec<ParameterReading>) -> serde_json::Value {
    serde_json::to_value(ExtractionResponse::completed(readings)).unwrap()
}

fn write_artifacts(dir: &Path) {
    std::fs::write(dir.join("classifier.json"), FOREST).unwrap();
    std::fs::write(
        dir.join("label_encoder.json"),
        r#"{"classes": ["High", "Low", "Normal"]}"#,
    )
    .unwrap();
}

#[test]
fn two_parameter_report_matches_expected_results() {
    let processor = stub_processor(two_parameter_registry());
    let readings = processor
        .process(b"Hemoglobin 9.8\nWBC: 11200\n", None, Demographics::default())
        .unwrap();

    assert_eq!(
        as_json(readings),
        json!({
            "status": "completed",
            "results": [
                {"parameter": "Hemoglobin", "value": "9.8", "status": "Low"},
                {"parameter": "WBC", "value": "11200", "status": "Normal"}
            ]
        })
    );
}

#[test]
fn exported_forest_classifies_from_model_dir() {
    let dir = tempfile::tempdir().unwrap();
    write_artifacts(dir.path());
    let config = LabscanConfig {
        model_dir: dir.path().to_path_buf(),
        ..LabscanConfig::default()
    };

    let processor = ReportProcessor::from_config(&config).unwrap();
    let readings = processor
        .process(
            b"CBC REPORT\nHemoglobin 9.8 g/dL\nWBC: 11200 /cumm\nPlatelet Count 4,50,000\n",
            None,
            Demographics::new(Some(34), Some(Gender::Female)),
        )
        .unwrap();

    assert_eq!(
        as_json(readings)["results"],
        json!([
            {"parameter": "Hemoglobin", "value": "9.8", "status": "Low"},
            {"parameter": "WBC", "value": "11200", "status": "Normal"},
            {"parameter": "Platelet Count", "value": "450000", "status": "High"}
        ])
    );
}

#[test]
fn registry_file_narrows_scanned_parameters() {
    let dir = tempfile::tempdir().unwrap();
    write_artifacts(dir.path());
    let registry_path = dir.path().join("registry.json");
    std::fs::write(
        &registry_path,
        r#"[{"name": "WBC", "value_pattern": "[\\d.,]+"}]"#,
    )
    .unwrap();
    let config = LabscanConfig {
        model_dir: dir.path().to_path_buf(),
        registry_path: Some(registry_path),
        ..LabscanConfig::default()
    };

    let processor = ReportProcessor::from_config(&config).unwrap();
    let readings = processor.process_text("Hemoglobin 9.8\nWBC 3,900", Demographics::default());
    assert_eq!(
        as_json(readings)["results"],
        json!([{"parameter": "WBC", "value": "3900", "status": "Low"}])
    );
}

#[test]
fn unreadable_document_yields_error_without_results() {
    let processor = stub_processor(two_parameter_registry());
    for bytes in [&b""[..], &[0x00, 0xFF, 0xFE, 0x01, 0x02, 0x03][..]] {
        let response: ExtractionResponse =
            processor.process(bytes, None, Demographics::default()).into();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json.get("results").is_none());
        assert!(json["error"].is_string());
    }
}

#[test]
fn every_parameter_reads_inline_and_with_lookahead() {
    let processor = stub_processor(ParameterRegistry::blood_panel());
    for spec in processor.registry().iter() {
        let name = spec.name();
        let inline = processor.process_text(&format!("{name}: 13.5"), Demographics::default());
        let split = processor.process_text(&format!("{name}\n13.5 g/dL"), Demographics::default());

        // "MCHC" also mentions "MCH"; look the parameter up by name.
        let find = |readings: &[ParameterReading]| {
            readings
                .iter()
                .find(|r| r.parameter == name)
                .map(|r| (r.display_value(), r.status().to_string()))
        };
        let expected = Some(("13.5".to_string(), "Normal".to_string()));
        assert_eq!(find(&inline), expected, "inline {name}");
        assert_eq!(find(&split), expected, "lookahead {name}");
    }
}

#[test]
fn lookahead_never_reaches_two_lines_down() {
    let processor = stub_processor(two_parameter_registry());
    let readings = processor.process_text("Hemoglobin\nsee note\n13.5", Demographics::default());
    assert_eq!(
        as_json(readings)["results"],
        json!([{"parameter": "Hemoglobin", "value": "-", "status": "-", "reason": "value_missing"}])
    );
}

#[test]
fn duplicate_mentions_keep_first_match() {
    let processor = stub_processor(two_parameter_registry());
    let readings = processor.process_text(
        "Hemoglobin 9.8\nWBC 7000\nHemoglobin 14.0\nWBC 9000",
        Demographics::default(),
    );
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].value, Some(9.8));
    assert_eq!(readings[1].value, Some(7000.0));
}

#[test]
fn malformed_tokens_do_not_block_other_parameters() {
    let processor = stub_processor(two_parameter_registry());
    for token in [",", "."] {
        let readings = processor.process_text(
            &format!("WBC {token}\nnotes\nHemoglobin 9.8"),
            Demographics::default(),
        );
        assert_eq!(readings.len(), 2, "token {token:?}");
        assert_eq!(readings[0].status(), "-");
        assert_eq!(readings[0].reason(), Some(DegradedReason::ValueUnparseable));
        assert_eq!(readings[1].status(), "Low");
    }
}

#[test]
fn missing_value_policies_are_consistent() {
    let text = "Hemoglobin pending\nrepeat sample\nWBC 7000";

    let placeholder = stub_processor(two_parameter_registry()).process_text(text, Demographics::default());
    assert_eq!(
        as_json(placeholder)["results"],
        json!([
            {"parameter": "Hemoglobin", "value": "-", "status": "-", "reason": "value_missing"},
            {"parameter": "WBC", "value": "7000", "status": "Normal"}
        ])
    );

    let skip = stub_processor(two_parameter_registry())
        .with_policy(MissingValuePolicy::Skip)
        .process_text(text, Demographics::default());
    assert_eq!(
        as_json(skip)["results"],
        json!([{"parameter": "WBC", "value": "7000", "status": "Normal"}])
    );
}

#[test]
fn vector_length_matches_declared_layout_for_all_inputs() {
    let layout: Vec<String> = StubModel::blood_panel_layout()
        .into_iter()
        .map(String::from)
        .collect();
    let registry = ParameterRegistry::blood_panel();
    let binding = SchemaBinding::negotiate(&layout, &registry).unwrap();

    let ages = [None, Some(0), Some(45), Some(120)];
    let genders = [None, Some(Gender::Male), Some(Gender::Female)];
    for spec in registry.iter() {
        for age in ages {
            for gender in genders {
                let v = binding
                    .build(&layout, spec.name(), 42.0, Demographics::new(age, gender))
                    .unwrap();
                assert_eq!(v.len(), layout.len());
            }
        }
    }
}

#[test]
fn model_missing_a_registered_parameter_fails_at_startup() {
    let model = StubModel::fixed(&["Value", "Age", "GenderEncoded", "Parameter_WBC"], HIGH);
    let err = Classifier::bind(Box::new(model), labels(), &two_parameter_registry()).unwrap_err();
    assert!(err.is_schema_mismatch());
}
