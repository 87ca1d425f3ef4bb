/// Validation of decoded model output against the [`IdeaEvaluation`] shape.
///
/// Works on a `serde_json::Value` rather than going through `Deserialize` so
/// that a rejection names the offending field path (`competitors[1].name`)
/// and the constraint it broke.
use serde_json::{Map, Value};

use crate::model::{Competitor, IdeaEvaluation, RiskLevel};

pub const COMPETITOR_COUNT: usize = 3;
pub const TECH_STACK_MIN: usize = 4;
pub const TECH_STACK_MAX: usize = 6;
pub const SCORE_MAX: u8 = 100;

const EVALUATION_FIELDS: [&str; 8] = [
    "problem",
    "customer",
    "market",
    "competitors",
    "techStack",
    "riskLevel",
    "profitabilityScore",
    "justification",
];

const COMPETITOR_FIELDS: [&str; 2] = ["name", "differentiation"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field `{field}`: expected {expected}")]
pub struct SchemaViolation {
    /// Path of the first offending field, `$` for the root value.
    pub field: String,
    pub expected: String,
}

impl SchemaViolation {
    fn new(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
        }
    }
}

pub fn validate(value: &Value) -> Result<IdeaEvaluation, SchemaViolation> {
    let obj = value
        .as_object()
        .ok_or_else(|| SchemaViolation::new("$", "a JSON object"))?;
    reject_unknown_fields(obj, &EVALUATION_FIELDS, "")?;

    Ok(IdeaEvaluation {
        problem: non_empty_string(obj, "problem", "problem")?,
        customer: non_empty_string(obj, "customer", "customer")?,
        market: non_empty_string(obj, "market", "market")?,
        competitors: competitors(obj)?,
        tech_stack: tech_stack(obj)?,
        risk_level: risk_level(obj)?,
        profitability_score: profitability_score(obj)?,
        justification: non_empty_string(obj, "justification", "justification")?,
    })
}

fn reject_unknown_fields(
    obj: &Map<String, Value>,
    allowed: &[&str],
    prefix: &str,
) -> Result<(), SchemaViolation> {
    match obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(extra) => Err(SchemaViolation::new(
            format!("{prefix}{extra}"),
            "no additional fields",
        )),
        None => Ok(()),
    }
}

fn required<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Value, SchemaViolation> {
    obj.get(key)
        .ok_or_else(|| SchemaViolation::new(path, "a required field"))
}

fn string(obj: &Map<String, Value>, key: &str, path: &str) -> Result<String, SchemaViolation> {
    required(obj, key, path)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SchemaViolation::new(path, "a string"))
}

fn non_empty_string(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<String, SchemaViolation> {
    let s = string(obj, key, path)?;
    if s.trim().is_empty() {
        return Err(SchemaViolation::new(path, "a non-empty string"));
    }
    Ok(s)
}

fn competitors(obj: &Map<String, Value>) -> Result<Vec<Competitor>, SchemaViolation> {
    let items = required(obj, "competitors", "competitors")?
        .as_array()
        .ok_or_else(|| SchemaViolation::new("competitors", "an array of competitors"))?;
    if items.len() != COMPETITOR_COUNT {
        return Err(SchemaViolation::new(
            "competitors",
            format!("exactly {COMPETITOR_COUNT} competitors, got {}", items.len()),
        ));
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| -> Result<Competitor, SchemaViolation> {
            let prefix = format!("competitors[{i}].");
            let c = item
                .as_object()
                .ok_or_else(|| SchemaViolation::new(format!("competitors[{i}]"), "an object"))?;
            reject_unknown_fields(c, &COMPETITOR_FIELDS, &prefix)?;
            Ok(Competitor {
                name: string(c, "name", &format!("{prefix}name"))?,
                differentiation: string(c, "differentiation", &format!("{prefix}differentiation"))?,
            })
        })
        .collect()
}

fn tech_stack(obj: &Map<String, Value>) -> Result<Vec<String>, SchemaViolation> {
    let items = required(obj, "techStack", "techStack")?
        .as_array()
        .ok_or_else(|| SchemaViolation::new("techStack", "an array of strings"))?;
    if !(TECH_STACK_MIN..=TECH_STACK_MAX).contains(&items.len()) {
        return Err(SchemaViolation::new(
            "techStack",
            format!(
                "between {TECH_STACK_MIN} and {TECH_STACK_MAX} items, got {}",
                items.len()
            ),
        ));
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| SchemaViolation::new(format!("techStack[{i}]"), "a string"))
        })
        .collect()
}

fn risk_level(obj: &Map<String, Value>) -> Result<RiskLevel, SchemaViolation> {
    let raw = string(obj, "riskLevel", "riskLevel")?;
    RiskLevel::parse(&raw)
        .ok_or_else(|| SchemaViolation::new("riskLevel", "one of \"LOW\", \"MEDIUM\", \"HIGH\""))
}

fn profitability_score(obj: &Map<String, Value>) -> Result<u8, SchemaViolation> {
    let expected = format!("an integer between 0 and {SCORE_MAX}");
    let Value::Number(n) = required(obj, "profitabilityScore", "profitabilityScore")? else {
        return Err(SchemaViolation::new("profitabilityScore", expected));
    };

    // 72.0 is an integer; 72.5 and "72" are not.
    let whole = match (n.as_i64(), n.as_f64()) {
        (Some(i), _) => Some(i),
        (None, Some(f)) if f.fract() == 0.0 && f.abs() <= i64::MAX as f64 => Some(f as i64),
        _ => None,
    };

    match whole {
        Some(i) if (0..=i64::from(SCORE_MAX)).contains(&i) => Ok(i as u8),
        _ => Err(SchemaViolation::new("profitabilityScore", expected)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::houseplant_json;
    use serde_json::json;

    fn violation(value: Value) -> SchemaViolation {
        validate(&value).expect_err("value should be rejected")
    }

    fn with(field: &str, replacement: Value) -> Value {
        let mut v = houseplant_json();
        v[field] = replacement;
        v
    }

    fn without(field: &str) -> Value {
        let mut v = houseplant_json();
        v.as_object_mut().unwrap().remove(field);
        v
    }

    #[test]
    fn accepts_exact_schema() {
        let evaluation = validate(&houseplant_json()).unwrap();
        assert_eq!(evaluation.competitors.len(), 3);
        assert_eq!(evaluation.tech_stack.len(), 5);
        assert_eq!(evaluation.risk_level, RiskLevel::Medium);
        assert_eq!(evaluation.profitability_score, 72);
    }

    #[test]
    fn accepts_tech_stack_bounds_and_score_bounds() {
        for n in [TECH_STACK_MIN, TECH_STACK_MAX] {
            let items: Vec<String> = (0..n).map(|i| format!("tech{i}")).collect();
            assert!(validate(&with("techStack", json!(items))).is_ok(), "n={n}");
        }
        for score in [json!(0), json!(100), json!(72.0)] {
            assert!(validate(&with("profitabilityScore", score.clone())).is_ok(), "{score}");
        }
    }

    #[test]
    fn rejects_every_missing_field() {
        for field in EVALUATION_FIELDS {
            let v = violation(without(field));
            assert_eq!(v.field, field);
            assert_eq!(v.expected, "a required field");
        }
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(validate(&with("problem", json!(42))).is_err());
        assert!(validate(&with("customer", Value::Null)).is_err());
        assert!(validate(&with("competitors", json!("three"))).is_err());
        assert!(validate(&with("techStack", json!("rust, axum, redis, docker"))).is_err());
        assert!(validate(&with("techStack", json!(["a", "b", 3, "d"]))).is_err());
        assert!(validate(&with("riskLevel", json!(2))).is_err());
        assert!(validate(&json!([houseplant_json()])).is_err());
        assert!(validate(&json!("not an object")).is_err());
    }

    #[test]
    fn rejects_empty_required_strings() {
        for field in ["problem", "customer", "market", "justification"] {
            assert!(validate(&with(field, json!("   "))).is_err(), "{field}");
        }
    }

    #[test]
    fn rejects_unknown_enum_value() {
        for risk in ["medium", "EXTREME", ""] {
            let v = violation(with("riskLevel", json!(risk)));
            assert_eq!(v.field, "riskLevel");
        }
    }

    #[test]
    fn rejects_bad_scores() {
        for score in [json!(-1), json!(101), json!(9999), json!(72.5), json!("72"), json!("9999")] {
            let v = violation(with("profitabilityScore", score.clone()));
            assert_eq!(v.field, "profitabilityScore", "{score}");
        }
    }

    #[test]
    fn rejects_wrong_competitor_count() {
        let mut v = houseplant_json();
        v["competitors"].as_array_mut().unwrap().pop();
        let err = violation(v);
        assert_eq!(err.field, "competitors");
        assert!(err.expected.contains("exactly 3"), "{}", err.expected);

        let mut v = houseplant_json();
        let first = v["competitors"][0].clone();
        v["competitors"].as_array_mut().unwrap().push(first);
        assert_eq!(violation(v).field, "competitors");
    }

    #[test]
    fn rejects_tech_stack_out_of_range() {
        assert_eq!(violation(with("techStack", json!(["a", "b", "c"]))).field, "techStack");
        assert_eq!(
            violation(with("techStack", json!(["a", "b", "c", "d", "e", "f", "g"]))).field,
            "techStack"
        );
    }

    #[test]
    fn rejects_extra_fields() {
        let mut v = houseplant_json();
        v["confidence"] = json!(0.9);
        let err = violation(v);
        assert_eq!(err.field, "confidence");

        let mut v = houseplant_json();
        v["competitors"][1]["url"] = json!("https://example.com");
        assert_eq!(violation(v).field, "competitors[1].url");
    }

    #[test]
    fn names_nested_competitor_field() {
        let mut v = houseplant_json();
        v["competitors"][2]
            .as_object_mut()
            .unwrap()
            .remove("differentiation");
        assert_eq!(violation(v).field, "competitors[2].differentiation");
    }

    #[test]
    fn original_snake_case_shape_is_rejected() {
        let v = json!({
            "problem": "p", "customer": "c", "market": "m",
            "competitor": [], "tech_stack": [], "risk_level": "LOW",
            "profitability_score": 10, "justification": "j"
        });
        assert!(validate(&v).is_err());
    }
}
