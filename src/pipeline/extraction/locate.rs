use std::collections::HashMap;

use super::registry::{ParameterRegistry, ParameterSpec};
use super::segment::{LineSegments, RawLine};

/// A value token found for a parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'r> {
    pub spec: &'r ParameterSpec,
    pub raw_token: String,
    pub source_line: usize,
    pub used_lookahead: bool,
}

/// Outcome of scanning for one parameter, in order of first mention.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection<'r> {
    /// First mention with a usable token (same line or the next one).
    Found(Candidate<'r>),
    /// Mentioned, but no token on any mention's line or the line after it.
    Missing {
        spec: &'r ParameterSpec,
        first_line: usize,
    },
}

impl<'r> Detection<'r> {
    pub fn spec(&self) -> &'r ParameterSpec {
        match self {
            Self::Found(c) => c.spec,
            Self::Missing { spec, .. } => spec,
        }
    }
}

/// Scan lines for registered parameter names.
///
/// Each parameter resolves at most once: the first mention that yields a
/// token wins and later mentions are ignored. A mention without a token
/// leaves the parameter open for a later mention, keeping its position.
pub fn locate_parameters<'r>(
    lines: LineSegments<'_>,
    registry: &'r ParameterRegistry,
) -> Vec<Detection<'r>> {
    let mut detections: Vec<Detection<'r>> = Vec::new();
    let mut slot_by_name: HashMap<&'r str, usize> = HashMap::new();

    let mut iter = lines.iter().peekable();
    while let Some(line) = iter.next() {
        let next = iter.peek().copied();
        let line_lower = line.text.to_lowercase();

        for spec in registry.iter() {
            if !spec.is_mentioned_in(&line_lower) {
                continue;
            }

            let slot = slot_by_name.get(spec.name()).copied();
            if let Some(i) = slot {
                if matches!(detections[i], Detection::Found(_)) {
                    continue;
                }
            }

            match extract_token(spec, line, next) {
                Some(candidate) => {
                    tracing::trace!(
                        parameter = spec.name(),
                        line = candidate.source_line,
                        lookahead = candidate.used_lookahead,
                        "Located value token"
                    );
                    match slot {
                        Some(i) => detections[i] = Detection::Found(candidate),
                        None => {
                            slot_by_name.insert(spec.name(), detections.len());
                            detections.push(Detection::Found(candidate));
                        }
                    }
                }
                None if slot.is_none() => {
                    slot_by_name.insert(spec.name(), detections.len());
                    detections.push(Detection::Missing {
                        spec,
                        first_line: line.index,
                    });
                }
                None => {}
            }
        }
    }

    detections
}

/// Same line first, then exactly one line of lookahead.
fn extract_token<'r>(
    spec: &'r ParameterSpec,
    line: RawLine<'_>,
    next: Option<RawLine<'_>>,
) -> Option<Candidate<'r>> {
    if let Some(token) = spec.find_token(line.text) {
        return Some(Candidate {
            spec,
            raw_token: token.to_string(),
            source_line: line.index,
            used_lookahead: false,
        });
    }

    let next = next?;
    spec.find_token(next.text).map(|token| Candidate {
        spec,
        raw_token: token.to_string(),
        source_line: next.index,
        used_lookahead: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::registry::ParameterSpecDef;
    use crate::pipeline::extraction::segment::segment_lines;

    fn registry(names: &[(&str, &str)]) -> ParameterRegistry {
        let defs: Vec<ParameterSpecDef> = names
            .iter()
            .map(|(n, p)| ParameterSpecDef {
                name: n.to_string(),
                value_pattern: p.to_string(),
            })
            .collect();
        ParameterRegistry::from_defs(&defs).unwrap()
    }

    fn found<'a>(d: &'a Detection<'_>) -> &'a Candidate<'a> {
        match d {
            Detection::Found(c) => c,
            Detection::Missing { spec, .. } => panic!("{} was not resolved", spec.name()),
        }
    }

    #[test]
    fn inline_value_is_found_for_every_blood_panel_parameter() {
        let registry = ParameterRegistry::blood_panel();
        for spec in registry.iter() {
            let single = registry_with(spec);
            let text = format!("{}: 13.5", spec.name());
            let detections = locate_parameters(segment_lines(&text), &single);
            assert_eq!(detections.len(), 1, "{}", spec.name());
            let c = found(&detections[0]);
            assert_eq!(c.raw_token, "13.5");
            assert!(!c.used_lookahead);
        }
    }

    fn registry_with(spec: &ParameterSpec) -> ParameterRegistry {
        registry(&[(spec.name(), spec.value_pattern().as_str())])
    }

    #[test]
    fn value_on_next_line_is_found_by_lookahead() {
        let reg = registry(&[("Hemoglobin", r"[\d.]+")]);
        let detections = locate_parameters(segment_lines("Hemoglobin\n13.5 g/dL"), &reg);
        let c = found(&detections[0]);
        assert_eq!(c.raw_token, "13.5");
        assert_eq!(c.source_line, 1);
        assert!(c.used_lookahead);
    }

    #[test]
    fn lookahead_skips_blank_lines() {
        let reg = registry(&[("Hemoglobin", r"[\d.]+")]);
        let detections = locate_parameters(segment_lines("Hemoglobin\n\n   \n13.5"), &reg);
        assert_eq!(found(&detections[0]).raw_token, "13.5");
    }

    #[test]
    fn lookahead_is_a_single_line() {
        let reg = registry(&[("Hemoglobin", r"[\d.]+")]);
        let detections =
            locate_parameters(segment_lines("Hemoglobin\ng/dL\n13.5"), &reg);
        assert!(matches!(detections[0], Detection::Missing { first_line: 0, .. }));
    }

    #[test]
    fn name_on_last_line_without_value_is_missing() {
        let reg = registry(&[("WBC", r"[\d.,]+")]);
        let detections = locate_parameters(segment_lines("Report\nWBC"), &reg);
        assert_eq!(detections.len(), 1);
        assert!(matches!(detections[0], Detection::Missing { first_line: 1, .. }));
    }

    #[test]
    fn first_match_wins_per_parameter() {
        let reg = registry(&[("Hemoglobin", r"[\d.]+")]);
        let detections =
            locate_parameters(segment_lines("Hemoglobin 9.8\nHemoglobin 14.2"), &reg);
        assert_eq!(detections.len(), 1);
        assert_eq!(found(&detections[0]).raw_token, "9.8");
    }

    #[test]
    fn later_mention_resolves_earlier_missing_in_place() {
        let reg = registry(&[("Hemoglobin", r"[\d.]+"), ("WBC", r"[\d.,]+")]);
        let text = "HEMOGLOBIN\nunits\nWBC: 11,200\nHemoglobin 9.8";
        let detections = locate_parameters(segment_lines(text), &reg);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].spec().name(), "Hemoglobin");
        assert_eq!(found(&detections[0]).raw_token, "9.8");
        assert_eq!(found(&detections[1]).raw_token, "11,200");
    }

    #[test]
    fn order_follows_first_mention_not_registry() {
        let reg = registry(&[("Hemoglobin", r"[\d.]+"), ("WBC", r"[\d.,]+")]);
        let detections =
            locate_parameters(segment_lines("WBC 7,400\nHemoglobin 13.1"), &reg);
        let names: Vec<&str> = detections.iter().map(|d| d.spec().name()).collect();
        assert_eq!(names, vec!["WBC", "Hemoglobin"]);
    }

    #[test]
    fn malformed_token_is_still_a_candidate() {
        let reg = registry(&[("RBC", r"[\d.,]+")]);
        let detections = locate_parameters(segment_lines("RBC , million/uL"), &reg);
        assert_eq!(found(&detections[0]).raw_token, ",");
    }

    #[test]
    fn unrelated_text_yields_nothing() {
        let reg = ParameterRegistry::blood_panel();
        assert!(locate_parameters(segment_lines("Patient: Jane Doe\nAge: 42"), &reg).is_empty());
        assert!(locate_parameters(segment_lines(""), &reg).is_empty());
    }
}
