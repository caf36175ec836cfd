//! Deterministic fixtures for unit tests: no network, no API keys.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use ntrl_common::{Action, ArticleInput, DetectionInstance, DetectorSource, Segment, Taxonomy};

use crate::detect::LexicalDetector;
use crate::pipeline::Pipeline;
use crate::scan::Scanner;
use crate::traits::Detector;

/// A classic manipulative wire-story body for fixture articles.
pub const SAMPLE_BODY: &str = "BREAKING: The mayor SLAMS critics of the devastating budget cuts. \
Experts say the plan is a ticking time bomb. Many say mistakes were made.";

/// Detection with synthetic text sized to its span. Good enough for merge
/// and weighting tests, which never look at the content.
pub fn make_detection(
    type_id: &str,
    segment: Segment,
    span: (usize, usize),
    confidence: f64,
    severity: u8,
    source: DetectorSource,
    action: Action,
) -> DetectionInstance {
    DetectionInstance {
        detection_id: Uuid::new_v4(),
        type_id: type_id.to_string(),
        secondary_type_ids: Vec::new(),
        segment,
        span_start: span.0,
        span_end: span.1,
        text: "x".repeat(span.1.saturating_sub(span.0)),
        confidence,
        severity,
        severity_weighted: severity as f64,
        source,
        action,
        exemptions: Vec::new(),
    }
}

/// Lexical-only, scan-only pipeline: fully deterministic, no LLM calls.
pub fn scan_only_pipeline() -> Pipeline {
    let detector: Arc<dyn Detector> = Arc::new(LexicalDetector::new(&Taxonomy::builtin()));
    let scanner = Scanner::new(vec![detector], Duration::from_secs(5));
    Pipeline::new(scanner, None, Vec::new())
}

/// Fixture article keyed by the given ID.
pub fn article(article_id: &str) -> ArticleInput {
    ArticleInput::builder()
        .article_id(article_id)
        .title("BREAKING: Council meeting erupts")
        .body(SAMPLE_BODY)
        .build()
}
