//! Structured extraction of the panel narrative into a `Feedback` record
//!
//! One schema-constrained model call re-encodes the narrative. The backend's
//! schema guarantee is not trusted: every field is type-checked here, scores
//! are range-checked, and each score is cross-checked against the `x/4`
//! token the narrative itself carries for that judge.

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::backend::SharedBackend;
use crate::error::{Error, Result};
use crate::types::{
    ChatContent, ChatMessage, ChatRequest, Feedback, GenerationParams, Opinion, ResponseSchema,
};
use crate::workforce::narrative;

/// Label the extractor uses towards the backend
pub const EXTRACTOR_LABEL: &str = "Feedback Extractor";

const INSTRUCTIONS: &str = "Extract the feedback information.";

const RULES: &str = "Return one opinion per listed judge, in the listed order. Copy each \
judge's score and words from the text; do not add, drop or change any judgment. The \
summary is the closing summary of the text.";

/// JSON schema of the Feedback record
pub fn feedback_schema() -> ResponseSchema {
    ResponseSchema {
        name: "feedback".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "opinions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "judge_name": { "type": "string" },
                            "score": { "type": "integer", "minimum": 1, "maximum": 4 },
                            "comment": { "type": "string" }
                        },
                        "required": ["judge_name", "score", "comment"],
                        "additionalProperties": false
                    }
                },
                "summary": { "type": "string" }
            },
            "required": ["opinions", "summary"],
            "additionalProperties": false
        }),
    }
}

pub struct StructuredExtractor {
    backend: SharedBackend,
}

impl StructuredExtractor {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Extract the Feedback record from `narrative`
    ///
    /// `expected_judges` are the judges whose verdicts made it into the
    /// narrative, in registration order; the result carries exactly one
    /// opinion for each of them, in that order.
    pub async fn extract(&self, narrative_text: &str, expected_judges: &[&str]) -> Result<Feedback> {
        if !self.backend.capabilities().supports_response_schema {
            return Err(Error::BackendUnsupported {
                backend: self.backend.name().to_string(),
                feature: "schema-constrained output".to_string(),
            });
        }
        if narrative_text.trim().is_empty() {
            return Err(Error::schema_extraction("narrative is empty"));
        }

        let system = format!(
            "{}\n{}\n{}",
            INSTRUCTIONS,
            RULES,
            narrative::judges_line(expected_judges)
        );
        let request = ChatRequest::new(EXTRACTOR_LABEL)
            .with_system(system)
            .with_messages(vec![ChatMessage::user(narrative_text)])
            .with_response_schema(feedback_schema())
            .with_params(GenerationParams {
                temperature: Some(0.0),
                ..Default::default()
            });

        let response = self.backend.complete(request).await?;
        let value = match response.content {
            ChatContent::Structured(value) => value,
            // Some endpoints return the object as plain JSON text
            ChatContent::Text(text) => serde_json::from_str(text.trim()).map_err(|e| {
                Error::schema_extraction(format!("response is not a JSON object: {}", e))
            })?,
            ChatContent::ToolCalls(_) => {
                return Err(Error::schema_extraction("model answered with tool calls"));
            }
        };

        let feedback = parse_feedback(&value)?;
        debug!(opinions = feedback.opinions.len(), "Extractor output parsed");

        let feedback = reconcile(feedback, narrative_text, expected_judges)?;
        info!(
            judges = feedback.opinions.len(),
            average = feedback.average_score().unwrap_or_default(),
            "Feedback extracted"
        );
        Ok(feedback)
    }
}

/// Type-check a raw extractor object into a Feedback record
pub fn parse_feedback(value: &Value) -> Result<Feedback> {
    let object = value
        .as_object()
        .ok_or_else(|| Error::schema_extraction("top level is not an object"))?;

    let opinions = object
        .get("opinions")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::schema_extraction("'opinions' is missing or not an array"))?
        .iter()
        .enumerate()
        .map(|(i, item)| parse_opinion(i, item))
        .collect::<Result<Vec<_>>>()?;

    let summary = object
        .get("summary")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::schema_extraction("'summary' is missing or not a string"))?
        .to_string();

    Ok(Feedback { opinions, summary })
}

fn parse_opinion(index: usize, item: &Value) -> Result<Opinion> {
    let object = item
        .as_object()
        .ok_or_else(|| Error::schema_extraction(format!("opinion {} is not an object", index)))?;

    let judge_name = string_field(object, index, "judge_name")?;
    let comment = string_field(object, index, "comment")?;
    let score = object
        .get("score")
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            Error::schema_extraction(format!("opinion {} has a missing or non-integer score", index))
        })?;

    Opinion::new(judge_name.trim(), score, comment)
}

fn string_field(object: &Map<String, Value>, index: usize, field: &str) -> Result<String> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::schema_extraction(format!("opinion {} has a missing or non-string '{}'", index, field))
        })
}

/// Check the extracted opinions against the narrative and order them
///
/// Every expected judge must appear exactly once with the score the
/// narrative gives them; anything else fails the extraction.
fn reconcile(feedback: Feedback, narrative_text: &str, expected: &[&str]) -> Result<Feedback> {
    let Feedback { mut opinions, summary } = feedback;

    if !expected.is_empty() {
        if let Some(extra) = opinions.iter().find(|o| {
            !expected
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&o.judge_name))
        }) {
            return Err(Error::schema_extraction(format!(
                "opinion for unknown judge '{}'",
                extra.judge_name
            )));
        }

        let narrated = narrative::scan_scores(narrative_text, expected);
        let mut ordered = Vec::with_capacity(expected.len());
        for (name, narrated_score) in narrated {
            let position = opinions
                .iter()
                .position(|o| o.judge_name.eq_ignore_ascii_case(&name))
                .ok_or_else(|| Error::schema_extraction(format!("no opinion for judge '{}'", name)))?;
            let mut opinion = opinions.remove(position);

            match narrated_score {
                Some(score) if score == opinion.score => {}
                Some(score) => {
                    return Err(Error::schema_extraction(format!(
                        "score for '{}' is {}/4 but the narrative gives {}/4",
                        name, opinion.score, score
                    )));
                }
                None => {
                    return Err(Error::schema_extraction(format!(
                        "the narrative has no parseable score for '{}'",
                        name
                    )));
                }
            }

            opinion.judge_name = name;
            ordered.push(opinion);
        }

        // Leftovers are duplicates of an expected judge
        if let Some(duplicate) = opinions.first() {
            return Err(Error::schema_extraction(format!(
                "judge '{}' appears more than once",
                duplicate.judge_name
            )));
        }
        opinions = ordered;
    }

    let feedback = Feedback {
        opinions,
        summary: summary.trim().to_string(),
    };
    feedback.validate()?;
    Ok(feedback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::types::ChatResponse;
    use std::sync::Arc;

    const JUDGES: [&str; 4] = [
        "Visionary Veronica",
        "Critical John",
        "Innovator Iris",
        "Friendly Frankie",
    ];

    const NARRATIVE: &str = "Hackathon Judges verdicts for task 0\n\n\
        Visionary Veronica was thrilled: this marketplace is disruptive and scalable. 3/4\n\
        Critical John found the architecture shaky and the tests thin, 2/4.\n\
        Innovator Iris called it groundbreaking. Score: 4/4\n\
        Friendly Frankie loved the CAMEL-AI integration, 3/4!\n\n\
        ## Summary\nA promising project with uneven technical depth.\n";

    fn extractor() -> (StructuredExtractor, Arc<MockBackend>) {
        let backend = Arc::new(MockBackend::new());
        (StructuredExtractor::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn test_scores_in_judge_order() {
        let (extractor, _) = extractor();
        let feedback = extractor.extract(NARRATIVE, &JUDGES).await.unwrap();

        assert_eq!(feedback.opinions.len(), 4);
        assert_eq!(feedback.scores(), vec![3, 2, 4, 3]);
        assert_eq!(feedback.judge_names(), JUDGES.to_vec());
        assert_eq!(feedback.summary, "A promising project with uneven technical depth.");
        assert!(feedback.opinions[1].comment.contains("architecture shaky"));
    }

    #[tokio::test]
    async fn test_extraction_is_idempotent() {
        let (extractor, backend) = extractor();
        let first = extractor.extract(NARRATIVE, &JUDGES).await.unwrap();
        let second = extractor.extract(NARRATIVE, &JUDGES).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.call_count(EXTRACTOR_LABEL), 2);
    }

    #[tokio::test]
    async fn test_missing_judge_fails() {
        let (extractor, _) = extractor();
        let narrative = NARRATIVE.replace("Critical John found the architecture shaky and the tests thin, 2/4.\n", "");
        let err = extractor.extract(&narrative, &JUDGES).await.unwrap_err();
        assert!(matches!(err, Error::SchemaExtraction { .. }));
        assert!(err.to_string().contains("Critical John"));
    }

    #[tokio::test]
    async fn test_disagreeing_score_fails() {
        let (extractor, backend) = extractor();
        backend.set_responder(|_| {
            Some(Ok(ChatResponse::structured(json!({
                "opinions": [
                    { "judge_name": "Visionary Veronica", "score": 3, "comment": "a" },
                    { "judge_name": "Critical John", "score": 4, "comment": "b" },
                    { "judge_name": "Innovator Iris", "score": 4, "comment": "c" },
                    { "judge_name": "Friendly Frankie", "score": 3, "comment": "d" }
                ],
                "summary": "s"
            }))))
        });
        let err = extractor.extract(NARRATIVE, &JUDGES).await.unwrap_err();
        assert!(err.to_string().contains("narrative gives 2/4"));
    }

    #[tokio::test]
    async fn test_out_of_range_score_rejected() {
        let (extractor, backend) = extractor();
        backend.set_responder(|_| {
            Some(Ok(ChatResponse::structured(json!({
                "opinions": [{ "judge_name": "Critical John", "score": 5, "comment": "x" }],
                "summary": "s"
            }))))
        });
        let err = extractor.extract(NARRATIVE, &["Critical John"]).await.unwrap_err();
        assert!(matches!(err, Error::ScoreOutOfRange { score: 5, .. }));
    }

    #[tokio::test]
    async fn test_reorders_and_accepts_json_text() {
        let (extractor, backend) = extractor();
        backend.set_responder(|_| {
            Some(Ok(ChatResponse::text(
                r#"{"opinions": [
                    {"judge_name": "critical john", "score": 2, "comment": "harsh"},
                    {"judge_name": "Visionary Veronica", "score": 3, "comment": "bold"}
                ], "summary": " ok "}"#,
            )))
        });
        let feedback = extractor
            .extract(NARRATIVE, &["Visionary Veronica", "Critical John"])
            .await
            .unwrap();
        assert_eq!(feedback.judge_names(), vec!["Visionary Veronica", "Critical John"]);
        assert_eq!(feedback.summary, "ok");
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate_judges_rejected() {
        let (extractor, backend) = extractor();
        backend.set_responder(|_| {
            Some(Ok(ChatResponse::structured(json!({
                "opinions": [
                    { "judge_name": "Critical John", "score": 2, "comment": "b" },
                    { "judge_name": "Researcher Rachel", "score": 3, "comment": "r" }
                ],
                "summary": "s"
            }))))
        });
        let err = extractor.extract(NARRATIVE, &["Critical John"]).await.unwrap_err();
        assert!(err.to_string().contains("unknown judge 'Researcher Rachel'"));

        backend.set_responder(|_| {
            Some(Ok(ChatResponse::structured(json!({
                "opinions": [
                    { "judge_name": "Critical John", "score": 2, "comment": "b" },
                    { "judge_name": "Critical John", "score": 2, "comment": "again" }
                ],
                "summary": "s"
            }))))
        });
        let err = extractor.extract(NARRATIVE, &["Critical John"]).await.unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_parse_feedback_type_checks() {
        assert!(parse_feedback(&json!([])).is_err());
        assert!(parse_feedback(&json!({ "opinions": [], "summary": 3 })).is_err());
        let err = parse_feedback(&json!({
            "opinions": [{ "judge_name": "A", "score": 2.5, "comment": "x" }],
            "summary": "s"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("non-integer"));
        let err = parse_feedback(&json!({
            "opinions": [{ "judge_name": "A", "score": 2 }],
            "summary": "s"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("comment"));
    }

    #[test]
    fn test_schema_shape() {
        let schema = feedback_schema();
        assert_eq!(schema.name, "feedback");
        assert_eq!(schema.schema["required"], json!(["opinions", "summary"]));
        assert_eq!(
            schema.schema["properties"]["opinions"]["items"]["required"],
            json!(["judge_name", "score", "comment"])
        );
    }
}
