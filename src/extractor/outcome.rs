use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::SnapshotMeta;

/// Marker the fine-tuned model emits before its answer
const RESPONSE_MARKER: &str = "### Response:";

/// End-of-sequence tokens some inference servers leave in the text
const END_TOKENS: &[&str] = &["<|end_of_text|>", "<|eot_id|>", "</s>"];

/// A job record as the model produced it. Nothing here is validated.
///
/// Field names follow the output table; the labels the tuned model was
/// trained on (`Job Title`, `Job Link`, ...) are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawJobRecord {
    #[serde(default, alias = "Job ID", alias = "id", skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Value>,

    #[serde(default, alias = "Job Title", alias = "title", skip_serializing_if = "Option::is_none")]
    pub job_title: Option<Value>,

    #[serde(default, alias = "Job Location", skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,

    #[serde(default, alias = "Company", alias = "company", skip_serializing_if = "Option::is_none")]
    pub company_name: Option<Value>,

    #[serde(default, alias = "Job Link", alias = "link", alias = "url", skip_serializing_if = "Option::is_none")]
    pub job_link: Option<Value>,
}

/// Result of asking the model about one chunk of HTML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Parsed {
        records: Vec<RawJobRecord>,
    },
    /// Kept verbatim so nothing the model said is lost
    Unparsed {
        raw_text: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub index: usize,
    pub outcome: ExtractionOutcome,
}

/// Everything the extractor learned about one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub snapshot: SnapshotMeta,
    /// Base for resolving relative job links
    pub link_base: String,
    pub extracted_at: DateTime<Utc>,
    pub chunks: Vec<ChunkResult>,
}

/// Render a JSON scalar as trimmed text. Objects, arrays and booleans are not text.
pub fn value_text(value: &Option<Value>) -> Option<String> {
    let text = match value.as_ref()? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Interpret the model's free-form answer
pub fn parse_model_output(text: &str) -> ExtractionOutcome {
    let cleaned = clean_response(text);
    if cleaned.is_empty() {
        return ExtractionOutcome::Unparsed {
            raw_text: text.to_string(),
            reason: "empty response".to_string(),
        };
    }

    match parse_records(&cleaned) {
        Ok(records) => ExtractionOutcome::Parsed { records },
        // Small models often answer with Python-style quoting
        Err(first_error) => match parse_records(&cleaned.replace('\'', "\"")) {
            Ok(records) => ExtractionOutcome::Parsed { records },
            Err(_) => ExtractionOutcome::Unparsed {
                raw_text: text.to_string(),
                reason: first_error,
            },
        },
    }
}

fn clean_response(text: &str) -> String {
    let mut body = match text.find(RESPONSE_MARKER) {
        Some(pos) => &text[pos + RESPONSE_MARKER.len()..],
        None => text,
    }
    .to_string();

    for token in END_TOKENS {
        body = body.replace(token, "");
    }

    let trimmed = body.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    unfenced.trim().to_string()
}

fn parse_records(text: &str) -> Result<Vec<RawJobRecord>, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("jobs") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err("'jobs' is not an array".to_string()),
            // The prompt asks for an empty object when a page has no jobs
            None if map.is_empty() => return Ok(vec![]),
            None => vec![Value::Object(map)],
        },
        _ => return Err("expected a JSON array or object".to_string()),
    };

    items
        .into_iter()
        .map(|item| {
            if !item.is_object() {
                return Err("array element is not an object".to_string());
            }
            serde_json::from_value(item).map_err(|e| format!("unexpected record shape: {}", e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(outcome: ExtractionOutcome) -> Vec<RawJobRecord> {
        match outcome {
            ExtractionOutcome::Parsed { records } => records,
            other => panic!("expected parsed outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_parses_model_labels() {
        let text = r#"### Response:
[{"Job Title": "Senior Data Scientist", "Job Location": "New York, NY", "Job ID": "R157984", "Job Link": "/jobs/R157984"}]<|end_of_text|>"#;
        let parsed = records(parse_model_output(text));
        assert_eq!(parsed.len(), 1);
        assert_eq!(value_text(&parsed[0].job_title).as_deref(), Some("Senior Data Scientist"));
        assert_eq!(value_text(&parsed[0].location).as_deref(), Some("New York, NY"));
        assert_eq!(value_text(&parsed[0].job_id).as_deref(), Some("R157984"));
        assert_eq!(value_text(&parsed[0].job_link).as_deref(), Some("/jobs/R157984"));
        assert_eq!(parsed[0].company_name, None);
    }

    #[test]
    fn test_accepts_object_shapes() {
        let single = records(parse_model_output(r#"{"job_title": "Analyst", "job_link": "https://a.example/1"}"#));
        assert_eq!(single.len(), 1);

        let wrapped = records(parse_model_output(r#"{"jobs": [{"job_title": "A"}, {"job_title": "B"}]}"#));
        assert_eq!(wrapped.len(), 2);

        assert!(records(parse_model_output("{}")).is_empty());
    }

    #[test]
    fn test_strips_code_fences() {
        let text = "```json\n[{\"job_title\": \"Engineer\"}]\n```";
        assert_eq!(records(parse_model_output(text)).len(), 1);
    }

    #[test]
    fn test_single_quotes_fallback() {
        let text = "[{'Job Title': 'Engineer', 'Job ID': 42}]";
        let parsed = records(parse_model_output(text));
        assert_eq!(value_text(&parsed[0].job_id).as_deref(), Some("42"));
    }

    #[test]
    fn test_truncated_output_is_kept_raw() {
        let text = r#"### Response:
[{"Job Title": "Senior Data Scien"#;
        match parse_model_output(text) {
            ExtractionOutcome::Unparsed { raw_text, reason } => {
                assert_eq!(raw_text, text);
                assert!(reason.starts_with("invalid JSON"));
            }
            other => panic!("expected unparsed outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_and_scalar_answers() {
        assert!(matches!(parse_model_output("  <|end_of_text|> "), ExtractionOutcome::Unparsed { .. }));
        assert!(matches!(parse_model_output("42"), ExtractionOutcome::Unparsed { .. }));
        assert!(matches!(parse_model_output("[1, 2]"), ExtractionOutcome::Unparsed { .. }));
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&Some(json!("  x  "))), Some("x".to_string()));
        assert_eq!(value_text(&Some(json!(7))), Some("7".to_string()));
        assert_eq!(value_text(&Some(json!("   "))), None);
        assert_eq!(value_text(&Some(json!(true))), None);
        assert_eq!(value_text(&Some(json!(null))), None);
        assert_eq!(value_text(&None), None);
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let outcome = ExtractionOutcome::Unparsed {
            raw_text: "oops".to_string(),
            reason: "invalid JSON".to_string(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "unparsed");
        let back: ExtractionOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(back, outcome);
    }
}
