use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use ntrl_common::{Action, DetectorSource, ScanResult, Segment, Taxonomy};

use crate::detect::detection;
use crate::traits::Detector;

/// Straight and curly double-quote pairs. Located in a single pass before
/// pattern matching so quoted manipulation is annotated, not rewritten:
/// we neutralize the reporter's framing, never the speaker's words.
static QUOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""[^"\n]{2,}"|“[^”\n]{2,}”"#).expect("quote regex is valid")
});

const MATCH_CONFIDENCE: f64 = 0.95;
/// Confidence scale for matches inside quotes: 0.15 x severity.
const QUOTED_CONFIDENCE_PER_SEVERITY: f64 = 0.15;

struct CompiledPattern {
    type_id: &'static str,
    severity: u8,
    action: Action,
    regex: Regex,
}

struct Inner {
    patterns: Vec<CompiledPattern>,
}

/// Regex matcher over the taxonomy's lexical patterns. All patterns are
/// compiled once, case-insensitively, at construction; a malformed pattern is
/// logged and skipped rather than failing the detector.
pub struct LexicalDetector {
    inner: Arc<Inner>,
}

impl LexicalDetector {
    pub fn new(taxonomy: &Taxonomy) -> Self {
        let mut patterns = Vec::new();
        for mt in taxonomy.lexical_types() {
            for source in mt.patterns {
                match RegexBuilder::new(source).case_insensitive(true).build() {
                    Ok(regex) => patterns.push(CompiledPattern {
                        type_id: mt.type_id,
                        severity: mt.severity,
                        action: mt.action,
                        regex,
                    }),
                    Err(e) => {
                        warn!(type_id = mt.type_id, pattern = source, error = %e,
                            "Skipping malformed lexical pattern");
                    }
                }
            }
        }
        debug!(patterns = patterns.len(), "Lexical detector compiled");
        Self {
            inner: Arc::new(Inner { patterns }),
        }
    }
}

impl Inner {
    fn scan(&self, text: &str, segment: Segment) -> ScanResult {
        let started = Instant::now();
        let quotes = quoted_regions(text);

        let mut seen: HashSet<(usize, usize, &'static str)> = HashSet::new();
        let mut detections = Vec::new();

        for cp in &self.patterns {
            for m in cp.regex.find_iter(text) {
                // Overlapping alternatives within one type collapse to one hit.
                if !seen.insert((m.start(), m.end(), cp.type_id)) {
                    continue;
                }
                let inside_quote = quotes
                    .iter()
                    .any(|&(qs, qe)| m.start() >= qs && m.end() <= qe);

                let mut det = if inside_quote {
                    detection(
                        cp.type_id,
                        segment,
                        (m.start(), m.end()),
                        m.as_str(),
                        QUOTED_CONFIDENCE_PER_SEVERITY * cp.severity as f64,
                        cp.severity,
                        DetectorSource::Lexical,
                        Action::Annotate,
                    )
                } else {
                    detection(
                        cp.type_id,
                        segment,
                        (m.start(), m.end()),
                        m.as_str(),
                        MATCH_CONFIDENCE,
                        cp.severity,
                        DetectorSource::Lexical,
                        cp.action,
                    )
                };
                if inside_quote {
                    det.exemptions.push("inside_quote".to_string());
                }
                detections.push(det);
            }
        }

        detections.sort_by_key(|d| (d.span_start, d.span_end));

        ScanResult {
            segment,
            detector: DetectorSource::Lexical,
            detections,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Byte ranges of quoted spans, including the quote marks.
fn quoted_regions(text: &str) -> Vec<(usize, usize)> {
    QUOTE_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect()
}

#[async_trait]
impl Detector for LexicalDetector {
    fn source(&self) -> DetectorSource {
        DetectorSource::Lexical
    }

    async fn detect(&self, text: &str, segment: Segment) -> Result<ScanResult> {
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();
        let result = tokio::task::spawn_blocking(move || inner.scan(&text, segment)).await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> LexicalDetector {
        LexicalDetector::new(&Taxonomy::builtin())
    }

    #[tokio::test]
    async fn flags_urgency_and_rage_verbs_in_title() {
        let result = detector()
            .detect(
                "BREAKING: Senator SLAMS critics in devastating attack.",
                Segment::Title,
            )
            .await
            .unwrap();

        let type_ids: Vec<&str> = result.detections.iter().map(|d| d.type_id.as_str()).collect();
        assert!(type_ids.contains(&"A.2.1"), "urgency missing: {type_ids:?}");
        assert!(type_ids.contains(&"B.2.2"), "rage verb missing: {type_ids:?}");
    }

    #[tokio::test]
    async fn spans_point_at_the_matched_text() {
        let text = "Experts say the plan is a ticking time bomb.";
        let result = detector().detect(text, Segment::Body).await.unwrap();
        assert!(!result.detections.is_empty());
        for det in &result.detections {
            assert!(det.span_is_valid(text), "bad span for {:?}", det.text);
        }
    }

    #[tokio::test]
    async fn quoted_matches_are_annotated_with_reduced_confidence() {
        let text = r#"The mayor responded: "this radical proposal is a disgraceful stunt.""#;
        let result = detector().detect(text, Segment::Body).await.unwrap();

        let radical = result
            .detections
            .iter()
            .find(|d| d.text.eq_ignore_ascii_case("radical"))
            .expect("radical flagged");
        assert_eq!(radical.action, Action::Annotate);
        assert!(radical.exemptions.contains(&"inside_quote".to_string()));
        // B.1.1 severity 4 -> 0.15 * 4
        assert!((radical.confidence - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unquoted_matches_keep_default_action_and_confidence() {
        let text = "The radical proposal drew fire.";
        let result = detector().detect(text, Segment::Body).await.unwrap();
        let radical = result
            .detections
            .iter()
            .find(|d| d.type_id == "B.1.1")
            .expect("radical flagged");
        assert_eq!(radical.action, Action::Replace);
        assert!((radical.confidence - 0.95).abs() < 1e-9);
        assert!(radical.exemptions.is_empty());
    }

    #[tokio::test]
    async fn identical_spans_from_overlapping_alternatives_dedup() {
        let text = "It was a catastrophic, catastrophic failure.";
        let result = detector().detect(text, Segment::Body).await.unwrap();
        let hits: Vec<_> = result
            .detections
            .iter()
            .filter(|d| d.type_id == "A.1.1")
            .collect();
        // Two occurrences, each flagged exactly once.
        assert_eq!(hits.len(), 2);
        assert_ne!(hits[0].span_start, hits[1].span_start);
    }

    #[tokio::test]
    async fn clean_copy_yields_nothing() {
        let text = "The city council approved the budget on Tuesday by a 7-2 vote.";
        let result = detector().detect(text, Segment::Body).await.unwrap();
        assert!(result.detections.is_empty(), "{:?}", result.detections);
    }
}
