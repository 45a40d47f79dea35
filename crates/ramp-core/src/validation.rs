//! Admission validation for rollout policies.
//!
//! `validate_policy` is pure: it accumulates every violation it finds
//! into one structured error, except that an empty stage list
//! short-circuits the per-stage checks and the first violation inside
//! the stage scan stops that scan.

use std::fmt;

use crate::types::{PolicyMode, PolicySpec};

/// A single field-level violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Dotted path of the offending field, e.g. `spec.stages[2]`.
    pub field: String,
    pub message: String,
}

/// Accumulated validation failure for a policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldError {
    pub violations: Vec<FieldViolation>,
}

impl FieldError {
    fn add(&mut self, field: &str, message: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn into_result(self) -> Result<(), FieldError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", v.field, v.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldError {}

/// Validate a policy spec at admission time.
pub fn validate_policy(spec: &PolicySpec) -> Result<(), FieldError> {
    let mut err = FieldError::default();

    if spec.mode != PolicyMode::Time {
        err.add(
            "spec.mode",
            format!("invalid value \"{}\": only \"time\" is implemented", spec.mode),
        );
    }

    if spec.default_threshold <= 0 {
        err.add(
            "spec.default_threshold",
            "a positive default threshold is mandatory",
        );
    }

    if spec.stages.is_empty() {
        err.add("spec.stages", "a policy must declare at least one rollout stage");
        return err.into_result();
    }

    let mut prev = 0;
    for (i, stage) in spec.stages.iter().enumerate() {
        let field = format!("spec.stages[{i}]");
        if stage.percent < prev {
            err.add(&field, "stage percents must be non-decreasing");
            break;
        }
        if !(1..=99).contains(&stage.percent) {
            err.add(
                &field,
                format!("percent {} out of range [1, 99]", stage.percent),
            );
            break;
        }
        if let Some(threshold) = stage.threshold {
            if threshold <= 0 {
                err.add(
                    &field,
                    format!("threshold {threshold} must be a positive integer"),
                );
                break;
            }
        }
        prev = stage.percent;
    }

    err.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stage;

    fn stage(percent: i32) -> Stage {
        Stage {
            percent,
            threshold: None,
        }
    }

    fn valid_spec() -> PolicySpec {
        PolicySpec {
            mode: PolicyMode::Time,
            default_threshold: 60,
            stages: vec![stage(10), stage(50), stage(90)],
        }
    }

    fn fields_of(err: FieldError) -> Vec<String> {
        err.violations.into_iter().map(|v| v.field).collect()
    }

    #[test]
    fn valid_policy_passes() {
        assert!(validate_policy(&valid_spec()).is_ok());
    }

    #[test]
    fn equal_adjacent_percents_are_allowed() {
        let mut spec = valid_spec();
        spec.stages = vec![stage(10), stage(10), stage(50)];
        assert!(validate_policy(&spec).is_ok());
    }

    #[test]
    fn reserved_modes_are_rejected() {
        for mode in [PolicyMode::Request, PolicyMode::Error] {
            let mut spec = valid_spec();
            spec.mode = mode;
            let err = validate_policy(&spec).unwrap_err();
            assert_eq!(fields_of(err), vec!["spec.mode"]);
        }
    }

    #[test]
    fn default_threshold_must_be_positive() {
        for threshold in [0, -5] {
            let mut spec = valid_spec();
            spec.default_threshold = threshold;
            let err = validate_policy(&spec).unwrap_err();
            assert_eq!(fields_of(err), vec!["spec.default_threshold"]);
        }
    }

    #[test]
    fn empty_stages_short_circuits_stage_checks() {
        let mut spec = valid_spec();
        spec.mode = PolicyMode::Request;
        spec.stages = vec![];
        let err = validate_policy(&spec).unwrap_err();
        // Mode violation is still accumulated; nothing stage-indexed is.
        assert_eq!(fields_of(err), vec!["spec.mode", "spec.stages"]);
    }

    #[test]
    fn percent_bounds_are_one_to_ninety_nine() {
        for bad in [0, 100, -3] {
            let mut spec = valid_spec();
            spec.stages = vec![stage(bad)];
            let err = validate_policy(&spec).unwrap_err();
            let v = &err.violations[0];
            assert_eq!(v.field, "spec.stages[0]");
            assert!(v.message.contains("[1, 99]"), "message: {}", v.message);
            assert!(v.message.contains(&bad.to_string()));
        }
    }

    #[test]
    fn decreasing_percents_reported_at_first_offender_only() {
        let mut spec = valid_spec();
        spec.stages = vec![stage(10), stage(50), stage(40), stage(1)];
        let err = validate_policy(&spec).unwrap_err();
        assert_eq!(fields_of(err), vec!["spec.stages[2]"]);
    }

    #[test]
    fn explicit_threshold_must_be_positive() {
        let mut spec = valid_spec();
        spec.stages[1].threshold = Some(0);
        let err = validate_policy(&spec).unwrap_err();
        assert_eq!(fields_of(err), vec!["spec.stages[1]"]);
    }

    #[test]
    fn violations_accumulate_across_fields() {
        let spec = PolicySpec {
            mode: PolicyMode::Error,
            default_threshold: 0,
            stages: vec![stage(10), stage(120)],
        };
        let err = validate_policy(&spec).unwrap_err();
        assert_eq!(
            fields_of(err),
            vec!["spec.mode", "spec.default_threshold", "spec.stages[1]"]
        );
    }

    #[test]
    fn error_display_joins_violations() {
        let mut spec = valid_spec();
        spec.mode = PolicyMode::Request;
        spec.default_threshold = -1;
        let err = validate_policy(&spec).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("spec.mode"));
        assert!(text.contains("; spec.default_threshold"));
    }
}
