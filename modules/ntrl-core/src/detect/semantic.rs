use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ai_client::{parse_json_response, schema_json, truncate_to_char_boundary, ChatModel};
use ntrl_common::{Action, DetectorSource, ScanResult, Segment, Taxonomy};

use crate::detect::detection;
use crate::traits::Detector;

/// The context-dependent types only an LLM can judge. Everything else is
/// cheaper to catch lexically or structurally, so the model is constrained
/// to this whitelist and anything off-list is dropped.
pub const SEMANTIC_TYPE_IDS: [&str; 9] = [
    "C.1.1", // false balance
    "C.3.2", // presupposition
    "D.3.1", // motive certainty
    "D.3.2", // mind reading
    "E.2.1", // false dichotomy
    "E.4.1", // strawman attribution
    "E.5.1", // tribal priming
    "E.5.2", // us-versus-them framing
    "F.3.1", // headline-body mismatch
];

/// What the LLM returns for each flagged span.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SemanticDetectionDto {
    /// One of the whitelisted type IDs.
    pub type_id: String,
    /// Half-open character offsets into the scanned text.
    pub span_start: usize,
    pub span_end: usize,
    /// The exact flagged text.
    pub text: String,
    /// 0.0 to 1.0.
    pub confidence: f64,
    /// Short justification for the flag.
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SemanticResponse {
    #[serde(default)]
    pub detections: Vec<SemanticDetectionDto>,
}

/// LLM-backed matcher for manipulation that has no fixed surface form:
/// motive certainty, tribal priming, false balance. Best-effort by design;
/// any transport or parse failure degrades to an empty result.
pub struct SemanticDetector {
    model: Arc<dyn ChatModel>,
    taxonomy: Arc<Taxonomy>,
    char_budget: usize,
}

impl SemanticDetector {
    pub fn new(model: Arc<dyn ChatModel>, taxonomy: Arc<Taxonomy>, char_budget: usize) -> Self {
        Self {
            model,
            taxonomy,
            char_budget,
        }
    }

    fn system_prompt(&self) -> String {
        let mut catalog = String::new();
        for id in SEMANTIC_TYPE_IDS {
            if let Some(mt) = self.taxonomy.get(id) {
                catalog.push_str(&format!(
                    "- {}: {} (severity {})\n",
                    mt.type_id, mt.name, mt.severity
                ));
            }
        }
        format!(
            r#"You are a manipulation detector for news text. Flag ONLY these context-dependent manipulation types:

{catalog}
Rules:
- span_start/span_end are half-open character offsets into the text exactly as given.
- text must be the exact substring at those offsets.
- Flag manipulation by the article's author, not manipulation quoted from a source.
- When in doubt, do not flag. Precision over recall.

Respond with a single JSON object matching this schema, and nothing else:

{schema}"#,
            schema = schema_json::<SemanticResponse>()
        )
    }

    /// Drop off-whitelist types and repair spans the model got wrong.
    /// A span that neither matches its text nor can be re-anchored by
    /// substring search is discarded.
    fn convert(&self, dto: SemanticDetectionDto, scanned: &str, segment: Segment) -> Option<ntrl_common::DetectionInstance> {
        if !SEMANTIC_TYPE_IDS.contains(&dto.type_id.as_str()) {
            warn!(type_id = %dto.type_id, "Semantic detector returned off-whitelist type");
            return None;
        }
        if dto.text.is_empty() {
            return None;
        }

        let span = if scanned.get(dto.span_start..dto.span_end) == Some(dto.text.as_str()) {
            (dto.span_start, dto.span_end)
        } else {
            // Model miscounted; re-anchor on the quoted text.
            let start = scanned.find(&dto.text)?;
            (start, start + dto.text.len())
        };

        let (severity, action) = match self.taxonomy.get(&dto.type_id) {
            Some(mt) => (mt.severity, mt.action),
            None => (3, Action::Annotate),
        };

        Some(detection(
            &dto.type_id,
            segment,
            span,
            &scanned[span.0..span.1],
            dto.confidence,
            severity,
            DetectorSource::Semantic,
            action,
        ))
    }
}

#[async_trait]
impl Detector for SemanticDetector {
    fn source(&self) -> DetectorSource {
        DetectorSource::Semantic
    }

    async fn detect(&self, text: &str, segment: Segment) -> Result<ScanResult> {
        let started = Instant::now();
        let truncated = truncate_to_char_boundary(text, self.char_budget);
        let user = format!("Segment: {segment}\n\n{truncated}");

        let raw = match self.model.complete(&self.system_prompt(), &user).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Semantic detector transport failure, returning empty");
                return Ok(ScanResult::empty(segment, DetectorSource::Semantic));
            }
        };

        let response: SemanticResponse = match parse_json_response(&raw) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Semantic detector returned unparseable output");
                return Ok(ScanResult::empty(segment, DetectorSource::Semantic));
            }
        };

        let mut detections: Vec<_> = response
            .detections
            .into_iter()
            .filter_map(|dto| self.convert(dto, truncated, segment))
            .collect();
        detections.sort_by_key(|d| (d.span_start, d.span_end));

        info!(
            segment = %segment,
            detections = detections.len(),
            model = self.model.model_id(),
            "Semantic scan complete"
        );

        Ok(ScanResult {
            segment,
            detector: DetectorSource::Semantic,
            detections,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_client::StaticModel;

    fn detector(model: StaticModel) -> SemanticDetector {
        SemanticDetector::new(Arc::new(model), Arc::new(Taxonomy::builtin()), 12_000)
    }

    #[tokio::test]
    async fn parses_fenced_detections() {
        let text = "Officials clearly wanted to bury the report.";
        let response = format!(
            "```json\n{}\n```",
            serde_json::json!({
                "detections": [{
                    "type_id": "D.3.1",
                    "span_start": 10,
                    "span_end": 24,
                    "text": "clearly wanted",
                    "confidence": 0.82,
                    "rationale": "asserts motive as fact"
                }]
            })
        );
        let result = detector(StaticModel::always(response))
            .detect(text, Segment::Body)
            .await
            .unwrap();

        assert_eq!(result.detections.len(), 1);
        let det = &result.detections[0];
        assert_eq!(det.type_id, "D.3.1");
        assert!(det.span_is_valid(text));
        assert_eq!(det.source, DetectorSource::Semantic);
    }

    #[tokio::test]
    async fn reanchors_bad_offsets_by_substring() {
        let text = "The senator, they insist, secretly hopes the talks collapse.";
        let response = serde_json::json!({
            "detections": [{
                "type_id": "D.3.2",
                "span_start": 0,
                "span_end": 5,
                "text": "secretly hopes",
                "confidence": 0.7,
                "rationale": null
            }]
        })
        .to_string();
        let result = detector(StaticModel::always(response))
            .detect(text, Segment::Body)
            .await
            .unwrap();

        assert_eq!(result.detections.len(), 1);
        let det = &result.detections[0];
        assert_eq!(det.text, "secretly hopes");
        assert!(det.span_is_valid(text));
    }

    #[tokio::test]
    async fn drops_off_whitelist_and_unanchorable_spans() {
        let text = "Plain report about a council vote.";
        let response = serde_json::json!({
            "detections": [
                {"type_id": "B.2.2", "span_start": 0, "span_end": 5, "text": "Plain",
                 "confidence": 0.9, "rationale": null},
                {"type_id": "E.2.1", "span_start": 0, "span_end": 4, "text": "not in the text",
                 "confidence": 0.9, "rationale": null}
            ]
        })
        .to_string();
        let result = detector(StaticModel::always(response))
            .detect(text, Segment::Body)
            .await
            .unwrap();
        assert!(result.detections.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_degrades_to_empty() {
        let result = detector(StaticModel::failing())
            .detect("anything", Segment::Body)
            .await
            .unwrap();
        assert!(result.detections.is_empty());
    }

    #[tokio::test]
    async fn garbage_output_degrades_to_empty() {
        let result = detector(StaticModel::always("I cannot help with that."))
            .detect("anything", Segment::Body)
            .await
            .unwrap();
        assert!(result.detections.is_empty());
    }
}
