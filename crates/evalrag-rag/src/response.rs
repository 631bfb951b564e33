//! Parsing of the completion model's grading reply
//!
//! Models wrap the requested JSON in prose. The first balanced `{...}` is
//! taken, tracking nesting and string literals so braces inside feedback
//! text do not end the object early.

use serde_json::{Map, Value};

/// Grade and feedback as reported by the model, before clamping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedGrade {
    pub grade: Option<f64>,
    pub feedback: Option<String>,
}

/// The reply contained an object that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unparseable(pub String);

impl std::fmt::Display for Unparseable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unparseable grading response: {}", self.0)
    }
}

/// First balanced brace-delimited substring of `text`
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Numeric value of a grade field; numbers and numeric strings are accepted
pub fn coerce_grade(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|g| g.is_finite())
}

/// Saturate a grade into `[0, max_marks]`; non-finite grades have no value
pub fn clamp_grade(raw: f64, max_marks: f64) -> Option<f64> {
    if !raw.is_finite() {
        return None;
    }
    Some(raw.min(max_marks).max(0.0))
}

/// Decode the model reply.
///
/// A reply without any object yields an empty result. A reply whose object
/// does not decode is [`Unparseable`].
pub fn parse_grading_response(text: &str) -> Result<ParsedGrade, Unparseable> {
    let Some(raw) = extract_json_object(text) else {
        return Ok(ParsedGrade::default());
    };

    let object: Map<String, Value> =
        serde_json::from_str(raw).map_err(|e| Unparseable(e.to_string()))?;

    let feedback = object
        .get("feedback")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string);

    Ok(ParsedGrade {
        grade: object.get("grade").and_then(coerce_grade),
        feedback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_extract_from_prose() {
        let reply = "Here is my evaluation:\n{\"grade\": 8, \"feedback\": \"Good\"}\nThanks!";
        assert_eq!(
            extract_json_object(reply),
            Some("{\"grade\": 8, \"feedback\": \"Good\"}")
        );
    }

    #[test]
    fn test_braces_inside_feedback() {
        let reply = r#"{"grade": 5, "feedback": "Use {braces} and \"quotes}\" carefully"} trailing {junk}"#;
        let object = extract_json_object(reply).unwrap();
        assert!(object.ends_with("carefully\"}"));

        let parsed = parse_grading_response(reply).unwrap();
        assert_eq!(parsed.grade, Some(5.0));
        assert_eq!(
            parsed.feedback.as_deref(),
            Some("Use {braces} and \"quotes}\" carefully")
        );
    }

    #[test]
    fn test_nested_object() {
        let reply = r#"{"grade": 4, "detail": {"a": 1}, "feedback": "ok"}"#;
        assert_eq!(extract_json_object(reply), Some(reply));
    }

    #[test]
    fn test_no_object_is_empty() {
        assert_eq!(
            parse_grading_response("I cannot grade this."),
            Ok(ParsedGrade::default())
        );
        assert_eq!(extract_json_object("{ never closed"), None);
    }

    #[test]
    fn test_invalid_object_is_unparseable() {
        assert!(parse_grading_response("{grade: eight}").is_err());
    }

    #[test]
    fn test_coerce_grade() {
        assert_eq!(coerce_grade(&json!(7.5)), Some(7.5));
        assert_eq!(coerce_grade(&json!(" 42 ")), Some(42.0));
        assert_eq!(coerce_grade(&json!("eight")), None);
        assert_eq!(coerce_grade(&json!(null)), None);
        assert_eq!(coerce_grade(&json!([1])), None);
        assert_eq!(coerce_grade(&json!("inf")), None);
    }

    #[test]
    fn test_clamp_grade() {
        assert_eq!(clamp_grade(-5.0, 100.0), Some(0.0));
        assert_eq!(clamp_grade(150.0, 100.0), Some(100.0));
        assert_eq!(clamp_grade(42.5, 100.0), Some(42.5));
        assert_eq!(clamp_grade(f64::NAN, 100.0), None);
        assert_eq!(clamp_grade(f64::INFINITY, 100.0), None);
    }

    proptest! {
        #[test]
        fn clamped_grade_within_bounds(g in -1.0e6f64..1.0e6, max in 0.1f64..1000.0) {
            let clamped = clamp_grade(g, max).unwrap();
            prop_assert!((0.0..=max).contains(&clamped));
            prop_assert_eq!(clamped, g.min(max).max(0.0));
        }

        #[test]
        fn extraction_never_panics(s in ".*") {
            let _ = parse_grading_response(&s);
        }
    }
}
