//! Declarative parameter checks from `parameters[].validation`.

use crate::config::{CheckKind, ToolConfig, ValidationCheck};
use crate::error::RuntimeError;
use crate::runtime::{NULL_VALUE, ParameterValue};
use regex::Regex;
use serde_json::Value;

/// Run every configured check, looking values up by parameter index.
/// Missing values count as null.
pub fn validate_all_parameters(
    config: &ToolConfig,
    values: &[ParameterValue],
) -> Result<(), RuntimeError> {
    for param in config.ordered_parameters() {
        let Some(checks) = &param.validation else {
            continue;
        };
        let value = values.get(param.index as usize).unwrap_or(&NULL_VALUE);
        for check in checks {
            run_check(&param.name, value, check)?;
        }
    }
    Ok(())
}

/// Run the checks of one named parameter.
pub fn validate_parameter(
    config: &ToolConfig,
    name: &str,
    value: &ParameterValue,
) -> Result<(), RuntimeError> {
    let param = config
        .parameter(name)
        .ok_or_else(|| RuntimeError::UnknownParameter {
            tool: config.tool.name.clone(),
            name: name.to_string(),
        })?;
    for check in param.validation.iter().flatten() {
        run_check(name, value, check)?;
    }
    Ok(())
}

pub fn run_check(
    name: &str,
    value: &ParameterValue,
    check: &ValidationCheck,
) -> Result<(), RuntimeError> {
    let prefix = check
        .message
        .clone()
        .unwrap_or_else(|| format!("Validation failed for {name}"));
    let fail = |detail: String| -> Result<(), RuntimeError> {
        Err(RuntimeError::Validation(format!("{prefix} ({detail})")))
    };

    match check.kind {
        CheckKind::GreaterThan | CheckKind::LessThan | CheckKind::MinValue | CheckKind::MaxValue => {
            let Some(bound) = check.value.as_ref().and_then(Value::as_f64) else {
                return Err(RuntimeError::Validation(format!(
                    "check on {name} has no numeric value"
                )));
            };
            let (ok, op) = match (value.as_f64(), check.kind) {
                (Some(v), CheckKind::GreaterThan) => (v > bound, ">"),
                (Some(v), CheckKind::LessThan) => (v < bound, "<"),
                (Some(v), CheckKind::MinValue) => (v >= bound, ">="),
                (Some(v), _) => (v <= bound, "<="),
                (None, CheckKind::GreaterThan) => (false, ">"),
                (None, CheckKind::LessThan) => (false, "<"),
                (None, CheckKind::MinValue) => (false, ">="),
                (None, _) => (false, "<="),
            };
            if ok {
                Ok(())
            } else {
                fail(format!("must be {op} {bound}, got {value}"))
            }
        }
        CheckKind::OneOf => {
            let allowed = check.values.as_deref().unwrap_or_default();
            if allowed.iter().any(|candidate| value.matches(candidate)) {
                Ok(())
            } else {
                let listed: Vec<String> = allowed.iter().map(Value::to_string).collect();
                fail(format!(
                    "must be one of [{}], got {value}",
                    listed.join(", ")
                ))
            }
        }
        CheckKind::NotEmpty => {
            if value.is_empty() {
                fail("value cannot be empty".to_string())
            } else {
                Ok(())
            }
        }
        CheckKind::Regex => {
            let pattern = check.pattern.as_deref().unwrap_or_default();
            let matched = match (value, pattern.is_empty()) {
                (ParameterValue::Text(text), false) => {
                    // Anchored at the start only, like a prefix match.
                    let re = Regex::new(&format!("^(?:{pattern})")).map_err(|err| {
                        RuntimeError::Validation(format!("invalid pattern for {name}: {err}"))
                    })?;
                    re.is_match(text)
                }
                _ => false,
            };
            if matched {
                Ok(())
            } else {
                fail(format!("must match pattern {pattern}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(value: Value) -> ValidationCheck {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn numeric_bounds() {
        let gt = check(json!({"type": "greater_than", "value": 0}));
        assert!(run_check("d", &ParameterValue::Number(5.0), &gt).is_ok());
        let err = run_check("d", &ParameterValue::Number(0.0), &gt).unwrap_err();
        assert_eq!(err.to_string(), "Validation failed for d (must be > 0, got 0)");
        assert!(run_check("d", &ParameterValue::Null, &gt).is_err());

        let max = check(json!({"type": "max_value", "value": 10, "message": "Too far"}));
        assert!(run_check("d", &ParameterValue::Number(10.0), &max).is_ok());
        let err = run_check("d", &ParameterValue::Number(10.5), &max).unwrap_err();
        assert!(err.to_string().starts_with("Too far (must be <= 10"));
    }

    #[test]
    fn one_of_compares_numbers_and_text() {
        let units = check(json!({"type": "one_of", "values": ["Meters", "Feet"]}));
        assert!(run_check("u", &ParameterValue::Text("Feet".into()), &units).is_ok());
        assert!(run_check("u", &ParameterValue::Text("Miles".into()), &units).is_err());

        let sizes = check(json!({"type": "one_of", "values": [1, 2.5]}));
        assert!(run_check("s", &ParameterValue::Number(1.0), &sizes).is_ok());
        assert!(run_check("s", &ParameterValue::Number(2.0), &sizes).is_err());
    }

    #[test]
    fn not_empty_and_regex() {
        let not_empty = check(json!({"type": "not_empty"}));
        assert!(run_check("n", &ParameterValue::Text("  ".into()), &not_empty).is_err());
        assert!(run_check("n", &ParameterValue::Text("x".into()), &not_empty).is_ok());

        let re = check(json!({"type": "regex", "pattern": "[A-Z]{2}\\d+"}));
        assert!(run_check("r", &ParameterValue::Text("AB12-rest".into()), &re).is_ok());
        assert!(run_check("r", &ParameterValue::Text("xAB12".into()), &re).is_err());
        assert!(run_check("r", &ParameterValue::Number(12.0), &re).is_err());
    }

    #[test]
    fn all_parameters_are_checked_by_index() {
        let config = ToolConfig::from_value(json!({
            "tool": {"name": "buf", "label": "Buffer", "description": "d"},
            "implementation": {"executeFunction": "buf.execute"},
            "parameters": [
                {"name": "input", "displayName": "Input", "datatype": "GPFeatureLayer",
                 "parameterType": "Required", "direction": "Input", "index": 0,
                 "validation": [{"type": "not_empty"}]},
                {"name": "distance", "displayName": "Distance", "datatype": "GPDouble",
                 "parameterType": "Required", "direction": "Input", "index": 1,
                 "validation": [{"type": "greater_than", "value": 0}]}
            ]
        }))
        .unwrap();

        let good = [ParameterValue::Text("roads".into()), ParameterValue::Number(5.0)];
        assert!(validate_all_parameters(&config, &good).is_ok());

        let bad = [ParameterValue::Text("roads".into()), ParameterValue::Number(-1.0)];
        let err = validate_all_parameters(&config, &bad).unwrap_err();
        assert!(err.to_string().contains("distance"));

        assert!(validate_all_parameters(&config, &good[..1]).is_err());
        assert!(validate_parameter(&config, "missing", &ParameterValue::Null).is_err());
    }
}
