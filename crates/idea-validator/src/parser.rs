use serde_json::Value;

use crate::error::EvaluationError;
use crate::model::IdeaEvaluation;
use crate::schema;

const EXCERPT_CHARS: usize = 200;

/// Parse raw completion text into a validated [`IdeaEvaluation`].
///
/// A reply wrapped in a single Markdown code fence is unwrapped first; any
/// other surrounding prose makes the reply malformed.
pub fn parse(raw: &str) -> Result<IdeaEvaluation, EvaluationError> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body).map_err(|e| EvaluationError::MalformedOutput {
        message: e.to_string(),
        excerpt: excerpt(raw),
    })?;
    Ok(schema::validate(&value)?)
}

fn strip_code_fence(raw: &str) -> &str {
    let t = raw.trim().trim_start_matches('\u{feff}');
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return t;
    };
    // Drop an info string such as `json` on the opening line.
    match inner.split_once('\n') {
        Some((info, body)) if !info.trim_start().starts_with('{') => body.trim(),
        _ => inner.trim(),
    }
}

fn excerpt(raw: &str) -> String {
    raw.chars().take(EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::model::fixtures::houseplant_json;
    use crate::model::{Competitor, RiskLevel};
    use crate::schema::{COMPETITOR_COUNT, SCORE_MAX, TECH_STACK_MAX, TECH_STACK_MIN};

    fn non_blank() -> impl Strategy<Value = String> {
        "[A-Za-z0-9][A-Za-z0-9 ,.'/-]{0,40}"
    }

    fn competitor() -> impl Strategy<Value = Competitor> {
        (any::<String>(), any::<String>())
            .prop_map(|(name, differentiation)| Competitor { name, differentiation })
    }

    prop_compose! {
        fn valid_evaluation()(
            problem in non_blank(),
            customer in non_blank(),
            market in non_blank(),
            competitors in prop::collection::vec(competitor(), COMPETITOR_COUNT),
            tech_stack in prop::collection::vec(any::<String>(), TECH_STACK_MIN..=TECH_STACK_MAX),
            risk_level in prop::sample::select(RiskLevel::ALL.to_vec()),
            profitability_score in 0..=SCORE_MAX,
            justification in non_blank(),
        ) -> IdeaEvaluation {
            IdeaEvaluation {
                problem,
                customer,
                market,
                competitors,
                tech_stack,
                risk_level,
                profitability_score,
                justification,
            }
        }
    }

    proptest! {
        #[test]
        fn any_valid_evaluation_round_trips(evaluation in valid_evaluation()) {
            let encoded = serde_json::to_string(&evaluation).unwrap();
            prop_assert_eq!(parse(&encoded).unwrap(), evaluation.clone());

            let fenced = format!("```json\n{}\n```", serde_json::to_string_pretty(&evaluation).unwrap());
            prop_assert_eq!(parse(&fenced).unwrap(), evaluation);
        }
    }

    #[test]
    fn round_trip_of_valid_evaluation() {
        let evaluation = schema::validate(&houseplant_json()).unwrap();
        let encoded = serde_json::to_string(&evaluation).unwrap();
        assert_eq!(parse(&encoded).unwrap(), evaluation);

        let pretty = serde_json::to_string_pretty(&evaluation).unwrap();
        assert_eq!(parse(&pretty).unwrap(), evaluation);
    }

    #[test]
    fn refusal_text_is_malformed() {
        let err = parse("Sorry, I can't help with that.").unwrap_err();
        match err {
            EvaluationError::MalformedOutput { excerpt, .. } => {
                assert_eq!(excerpt, "Sorry, I can't help with that.");
            }
            other => panic!("expected MalformedOutput, got {other:?}"),
        }
    }

    #[test]
    fn empty_and_truncated_replies_are_malformed() {
        for raw in ["", "   ", "{\"problem\": \"x\"", "```json\n```"] {
            assert!(
                matches!(parse(raw), Err(EvaluationError::MalformedOutput { .. })),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn two_competitors_is_a_schema_violation_naming_competitors() {
        let mut v = houseplant_json();
        v["competitors"].as_array_mut().unwrap().truncate(2);
        let err = parse(&v.to_string()).unwrap_err();
        match err {
            EvaluationError::SchemaViolation(violation) => {
                assert_eq!(violation.field, "competitors");
            }
            other => panic!("expected SchemaViolation, got {other:?}"),
        }
    }

    #[test]
    fn stringly_typed_score_is_a_schema_violation() {
        let mut v = houseplant_json();
        v["profitabilityScore"] = serde_json::json!("9999");
        assert!(matches!(
            parse(&v.to_string()),
            Err(EvaluationError::SchemaViolation(_))
        ));
    }

    #[test]
    fn accepts_fenced_json() {
        let body = houseplant_json().to_string();
        for raw in [
            format!("```json\n{body}\n```"),
            format!("```\n{body}\n```"),
            format!("  ```JSON\n{body}\n```  \n"),
            format!("```{body}```"),
        ] {
            let evaluation = parse(&raw).unwrap_or_else(|e| panic!("{raw:?}: {e}"));
            assert_eq!(evaluation.risk_level, RiskLevel::Medium);
        }
    }

    #[test]
    fn prose_around_json_is_malformed() {
        let raw = format!("Here is your evaluation:\n{}", houseplant_json());
        assert!(matches!(
            parse(&raw),
            Err(EvaluationError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn excerpt_is_bounded_on_char_boundaries() {
        let raw = "é".repeat(500);
        let Err(EvaluationError::MalformedOutput { excerpt, .. }) = parse(&raw) else {
            panic!("expected MalformedOutput");
        };
        assert_eq!(excerpt.chars().count(), EXCERPT_CHARS);
    }
}
