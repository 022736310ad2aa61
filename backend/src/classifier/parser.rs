use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::ClassificationVerdict;

pub const DEFAULT_DESCRIPTION: &str = "No description";
pub const DEFAULT_POSITIVE_CONFIDENCE: f64 = 0.85;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty model response")]
    Empty,
    #[error("Malformed JSON in model response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Model response is not a JSON object")]
    NotAnObject,
}

#[derive(Debug, Default, Deserialize)]
struct RawVerdict {
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    is_trash: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    confidence: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_text")]
    description: Option<String>,
}

// Models sometimes quote booleans and numbers.
fn deserialize_lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(serde::de::Error::custom(format!(
                "Invalid boolean string: {}",
                s
            ))),
        },
        _ => Err(serde::de::Error::custom("Expected boolean or string")),
    }
}

fn deserialize_lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(serde::de::Error::custom("Expected a finite number")),
    }
}

// Lists of strings are joined; any other value keeps its JSON rendering.
fn deserialize_lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Array(items) if items.iter().all(Value::is_string) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    })
}

/// Removes markdown code fences and any prose around the outermost JSON object.
pub fn strip_wrapping(raw: &str) -> &str {
    let trimmed = raw.trim();
    let unfenced = match trimmed.strip_prefix("```") {
        Some(rest) => {
            // an info string (`json`, `JSON`, ...) is letters only; anything else is payload
            let body = match rest.split_once('\n') {
                Some((head, tail)) if head.trim().chars().all(|c| c.is_ascii_alphabetic()) => tail,
                _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
            };
            body.trim_end().strip_suffix("```").unwrap_or(body).trim()
        }
        None => trimmed,
    };

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced,
    }
}

/// Parses model output into a verdict, filling absent fields with the documented defaults.
pub fn parse_verdict(raw: &str) -> Result<ClassificationVerdict, ParseError> {
    let cleaned = strip_wrapping(raw);
    if cleaned.is_empty() {
        return Err(ParseError::Empty);
    }

    let value: Value = serde_json::from_str(cleaned)?;
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }
    let raw_verdict: RawVerdict = serde_json::from_value(value)?;

    let is_trash = raw_verdict.is_trash.unwrap_or(false);
    let confidence = raw_verdict
        .confidence
        .unwrap_or(if is_trash { DEFAULT_POSITIVE_CONFIDENCE } else { 0.0 })
        .clamp(0.0, 1.0);
    let description = raw_verdict
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

    Ok(ClassificationVerdict {
        is_trash,
        confidence,
        description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str =
        r#"{"is_trash": true, "confidence": 0.95, "description": "A pile of plastic bags"}"#;

    #[test]
    fn parses_plain_payload() {
        let verdict = parse_verdict(PAYLOAD).unwrap();
        assert!(verdict.is_trash);
        assert_eq!(verdict.confidence, 0.95);
        assert_eq!(verdict.description, "A pile of plastic bags");
    }

    #[test]
    fn fenced_payload_parses_like_plain() {
        let plain = parse_verdict(PAYLOAD).unwrap();
        for wrapped in [
            format!("```json\n{}\n```", PAYLOAD),
            format!("```JSON\n{}\n```\n", PAYLOAD),
            format!("```\n{}\n```", PAYLOAD),
            format!("```json{}```", PAYLOAD),
            format!("```json {}\n```", PAYLOAD),
            "```{\"is_trash\": true,\n\"confidence\": 0.95, \"description\": \"A pile of plastic bags\"}\n```"
                .to_string(),
            format!("  \n{}\n  ", PAYLOAD),
        ] {
            assert_eq!(parse_verdict(&wrapped).unwrap(), plain, "input: {:?}", wrapped);
        }
    }

    #[test]
    fn surrounding_prose_is_ignored() {
        let raw = format!("Sure! Here is the analysis:\n{}\nLet me know.", PAYLOAD);
        assert_eq!(parse_verdict(&raw).unwrap(), parse_verdict(PAYLOAD).unwrap());
    }

    #[test]
    fn positive_without_confidence_defaults_high() {
        let verdict = parse_verdict(r#"{"is_trash": true}"#).unwrap();
        assert_eq!(verdict.confidence, DEFAULT_POSITIVE_CONFIDENCE);
        assert_eq!(verdict.description, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn negative_without_confidence_defaults_zero() {
        let verdict = parse_verdict(r#"{"is_trash": false, "description": "Clean park"}"#).unwrap();
        assert!(!verdict.is_trash);
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(verdict.description, "Clean park");
    }

    #[test]
    fn empty_object_is_a_clean_negative() {
        let verdict = parse_verdict("{}").unwrap();
        assert!(!verdict.is_trash);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn nulls_count_as_absent() {
        let verdict =
            parse_verdict(r#"{"is_trash": true, "confidence": null, "description": null}"#).unwrap();
        assert_eq!(verdict.confidence, DEFAULT_POSITIVE_CONFIDENCE);
        assert_eq!(verdict.description, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn quoted_values_are_accepted() {
        let verdict = parse_verdict(r#"{"is_trash": "True", "confidence": "0.7"}"#).unwrap();
        assert!(verdict.is_trash);
        assert_eq!(verdict.confidence, 0.7);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(
            parse_verdict(r#"{"is_trash": true, "confidence": 95}"#).unwrap().confidence,
            1.0
        );
        assert_eq!(
            parse_verdict(r#"{"is_trash": false, "confidence": -0.2}"#).unwrap().confidence,
            0.0
        );
    }

    #[test]
    fn non_string_description_keeps_positive_verdict() {
        let verdict = parse_verdict(
            r#"{"is_trash": true, "confidence": 0.9, "description": ["plastic bags", "tyres"]}"#,
        )
        .unwrap();
        assert!(verdict.is_trash);
        assert_eq!(verdict.confidence, 0.9);
        assert_eq!(verdict.description, "plastic bags, tyres");

        let verdict = parse_verdict(r#"{"is_trash": true, "description": {"items": 3}}"#).unwrap();
        assert!(verdict.is_trash);
        assert_eq!(verdict.description, r#"{"items":3}"#);
    }

    #[test]
    fn unparseable_output_is_an_error() {
        assert!(matches!(parse_verdict(""), Err(ParseError::Empty)));
        assert!(matches!(parse_verdict("```json\n```"), Err(ParseError::Empty)));
        assert!(matches!(
            parse_verdict("I cannot analyse this image."),
            Err(ParseError::Json(_))
        ));
        assert!(matches!(parse_verdict("[true, 0.9]"), Err(ParseError::NotAnObject)));
        assert!(matches!(
            parse_verdict(r#"{"is_trash": "maybe"}"#),
            Err(ParseError::Json(_))
        ));
    }
}
