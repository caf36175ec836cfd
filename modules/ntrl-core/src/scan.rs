use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{info, warn};

use ntrl_common::{DetectionInstance, MergedScanResult, ScanResult, ScanStats, Segment};

use crate::traits::Detector;

pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.5;
/// Overlap at or above this is "the same span wearing two labels".
const NEAR_IDENTICAL: f64 = 0.9;

/// Runs the detector ensemble concurrently over one segment and merges the
/// result. A detector failing or timing out degrades to "found nothing";
/// the scan itself never fails.
pub struct Scanner {
    detectors: Vec<Arc<dyn Detector>>,
    overlap_threshold: f64,
    scan_timeout: Duration,
}

impl Scanner {
    pub fn new(detectors: Vec<Arc<dyn Detector>>, scan_timeout: Duration) -> Self {
        Self {
            detectors,
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            scan_timeout,
        }
    }

    pub fn with_overlap_threshold(mut self, threshold: f64) -> Self {
        self.overlap_threshold = threshold;
        self
    }

    pub async fn scan(&self, text: &str, segment: Segment) -> MergedScanResult {
        let deadline = Instant::now() + self.scan_timeout;

        let handles: Vec<_> = self
            .detectors
            .iter()
            .map(|detector| {
                let detector = Arc::clone(detector);
                let text = text.to_string();
                let name = detector.source();
                (
                    name,
                    tokio::spawn(async move { detector.detect(&text, segment).await }),
                )
            })
            .collect();

        let mut results: Vec<ScanResult> = Vec::new();
        let mut timings: HashMap<String, u64> = HashMap::new();

        for (name, mut handle) in handles {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, &mut handle).await {
                Ok(Ok(Ok(result))) => {
                    timings.insert(name.to_string(), result.elapsed_ms);
                    results.push(result);
                }
                Ok(Ok(Err(e))) => {
                    warn!(detector = %name, error = %e, "Detector failed, degrading to empty");
                    timings.insert(name.to_string(), 0);
                }
                Ok(Err(e)) => {
                    warn!(detector = %name, error = %e, "Detector task panicked, degrading to empty");
                    timings.insert(name.to_string(), 0);
                }
                Err(_) => {
                    handle.abort();
                    warn!(detector = %name, timeout_ms = self.scan_timeout.as_millis() as u64,
                        "Detector timed out, degrading to empty");
                    timings.insert(name.to_string(), self.scan_timeout.as_millis() as u64);
                }
            }
        }

        let all: Vec<DetectionInstance> =
            results.into_iter().flat_map(|r| r.detections).collect();
        let mut merged = merge_detections(all, self.overlap_threshold);

        for det in &mut merged {
            det.severity_weighted = det.severity as f64 * segment.severity_multiplier();
        }
        merged.sort_by_key(|d| (d.span_start, d.span_end));

        let stats = compute_stats(&merged, text);

        info!(
            segment = %segment,
            detections = merged.len(),
            density = stats.density,
            "Scan complete"
        );

        MergedScanResult {
            segment,
            detections: merged,
            detector_timings_ms: timings,
            stats,
        }
    }
}

/// Merge and deduplicate spans from all detectors. Pure function: walk the
/// candidates in `(start, end)` order, comparing each against every accepted
/// span by overlap ratio (intersection over the shorter span):
///
/// - ratio <= threshold: independent spans, accept.
/// - same type above threshold: keep the higher-confidence one.
/// - different type below 0.9: both carry signal, keep both.
/// - different type at 0.9+: same span wearing two labels; keep the higher
///   severity and record the loser as a secondary type. Severity wins even
///   over a higher-confidence loser.
pub fn merge_detections(
    mut candidates: Vec<DetectionInstance>,
    threshold: f64,
) -> Vec<DetectionInstance> {
    candidates.sort_by_key(|d| (d.span_start, d.span_end));

    let mut accepted: Vec<DetectionInstance> = Vec::new();
    'candidates: for candidate in candidates {
        for acc in accepted.iter_mut() {
            let ratio = overlap_ratio(acc, &candidate);
            if ratio <= threshold {
                continue;
            }
            if acc.type_id == candidate.type_id {
                if candidate.confidence > acc.confidence {
                    *acc = candidate;
                }
                continue 'candidates;
            }
            if ratio >= NEAR_IDENTICAL {
                if candidate.severity > acc.severity {
                    let mut winner = candidate;
                    winner.secondary_type_ids.push(acc.type_id.clone());
                    *acc = winner;
                } else {
                    acc.secondary_type_ids.push(candidate.type_id.clone());
                }
                continue 'candidates;
            }
            // Different type, partially overlapping: keep both.
        }
        accepted.push(candidate);
    }
    accepted
}

/// Intersection length over the shorter span's length.
fn overlap_ratio(a: &DetectionInstance, b: &DetectionInstance) -> f64 {
    let start = a.span_start.max(b.span_start);
    let end = a.span_end.min(b.span_end);
    if end <= start {
        return 0.0;
    }
    let shorter = a.span_len().min(b.span_len());
    if shorter == 0 {
        return 0.0;
    }
    (end - start) as f64 / shorter as f64
}

fn compute_stats(detections: &[DetectionInstance], text: &str) -> ScanStats {
    let mut by_category: HashMap<String, usize> = HashMap::new();
    let mut by_severity: HashMap<u8, usize> = HashMap::new();
    for det in detections {
        if let Some(code) = det.type_id.chars().next() {
            *by_category.entry(code.to_string()).or_default() += 1;
        }
        *by_severity.entry(det.severity).or_default() += 1;
    }
    // Rough word estimate: one word per 5 characters.
    let words = (text.len() / 5).max(1);
    let density = detections.len() as f64 / words as f64 * 100.0;

    ScanStats {
        total: detections.len(),
        by_category,
        by_severity,
        density,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::make_detection;
    use ntrl_common::{Action, DetectorSource};

    fn det(
        type_id: &str,
        span: (usize, usize),
        confidence: f64,
        severity: u8,
    ) -> DetectionInstance {
        make_detection(
            type_id,
            Segment::Body,
            span,
            confidence,
            severity,
            DetectorSource::Lexical,
            Action::Replace,
        )
    }

    #[test]
    fn disjoint_spans_all_accepted() {
        let merged = merge_detections(
            vec![det("A.1.1", (0, 5), 0.9, 3), det("A.1.1", (10, 15), 0.9, 3)],
            0.5,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn same_type_overlap_keeps_higher_confidence() {
        let merged = merge_detections(
            vec![det("A.1.1", (0, 10), 0.6, 3), det("A.1.1", (2, 10), 0.9, 3)],
            0.5,
        );
        assert_eq!(merged.len(), 1);
        assert!((merged[0].confidence - 0.9).abs() < 1e-9);
        assert_eq!(merged[0].span_start, 2);
    }

    #[test]
    fn different_type_partial_overlap_keeps_both() {
        // Overlap ratio 6/8 = 0.75: above threshold, below 0.9.
        let merged = merge_detections(
            vec![det("A.1.1", (0, 10), 0.9, 3), det("B.2.2", (2, 10), 0.9, 4)],
            0.5,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn near_identical_spans_resolve_by_severity() {
        let merged = merge_detections(
            vec![det("A.1.1", (0, 10), 0.9, 3), det("B.2.2", (0, 10), 0.5, 4)],
            0.5,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].type_id, "B.2.2");
        assert_eq!(merged[0].secondary_type_ids, vec!["A.1.1".to_string()]);
    }

    #[test]
    fn severity_wins_over_confidence_at_near_identical_overlap() {
        // The lower-severity span is far more confident; severity still wins.
        let merged = merge_detections(
            vec![det("A.1.1", (0, 10), 0.99, 2), det("B.2.2", (0, 10), 0.4, 4)],
            0.5,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].type_id, "B.2.2");
    }

    #[test]
    fn no_same_type_overlap_above_threshold_after_merge() {
        let candidates = vec![
            det("A.1.1", (0, 10), 0.6, 3),
            det("A.1.1", (1, 11), 0.7, 3),
            det("A.1.1", (2, 12), 0.8, 3),
            det("A.1.1", (30, 40), 0.9, 3),
            det("B.2.2", (5, 12), 0.9, 4),
        ];
        let merged = merge_detections(candidates, 0.5);
        for (i, a) in merged.iter().enumerate() {
            for b in merged.iter().skip(i + 1) {
                if a.type_id == b.type_id {
                    assert!(
                        overlap_ratio(a, b) <= 0.5,
                        "same-type overlap survived merge: {a:?} {b:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn merged_output_is_ordered_by_position() {
        let merged = merge_detections(
            vec![
                det("A.1.1", (20, 25), 0.9, 3),
                det("B.2.2", (0, 5), 0.9, 4),
                det("C.3.3", (10, 15), 0.9, 3),
            ],
            0.5,
        );
        let starts: Vec<usize> = merged.iter().map(|d| d.span_start).collect();
        assert_eq!(starts, vec![0, 10, 20]);
    }

    #[test]
    fn zero_length_candidates_never_divide_by_zero() {
        let mut bad = det("A.1.1", (5, 5), 0.9, 3);
        bad.span_end = 5;
        let merged = merge_detections(vec![bad, det("A.1.1", (0, 10), 0.9, 3)], 0.5);
        assert_eq!(merged.len(), 2);
    }

    #[tokio::test]
    async fn scanner_weights_title_above_body() {
        use crate::detect::LexicalDetector;
        use ntrl_common::Taxonomy;

        let detector: Arc<dyn Detector> = Arc::new(LexicalDetector::new(&Taxonomy::builtin()));
        let scanner = Scanner::new(vec![detector], Duration::from_secs(5));
        let text = "Senator slams critics.";

        let title = scanner.scan(text, Segment::Title).await;
        let body = scanner.scan(text, Segment::Body).await;

        let title_det = title
            .detections
            .iter()
            .find(|d| d.type_id == "B.2.2")
            .expect("title hit");
        let body_det = body
            .detections
            .iter()
            .find(|d| d.type_id == "B.2.2")
            .expect("body hit");

        assert!(title_det.severity_weighted > body_det.severity_weighted);
        assert!((title_det.severity_weighted - 6.0).abs() < 1e-9); // 4 x 1.5
        assert!((body_det.severity_weighted - 4.0).abs() < 1e-9); // 4 x 1.0
    }

    #[tokio::test]
    async fn failing_detector_degrades_scan_not_fails() {
        struct Exploder;
        #[async_trait::async_trait]
        impl Detector for Exploder {
            fn source(&self) -> DetectorSource {
                DetectorSource::Semantic
            }
            async fn detect(
                &self,
                _text: &str,
                _segment: Segment,
            ) -> anyhow::Result<ntrl_common::ScanResult> {
                anyhow::bail!("boom")
            }
        }

        use crate::detect::LexicalDetector;
        use ntrl_common::Taxonomy;

        let scanner = Scanner::new(
            vec![
                Arc::new(LexicalDetector::new(&Taxonomy::builtin())),
                Arc::new(Exploder),
            ],
            Duration::from_secs(5),
        );
        let result = scanner.scan("Senator slams critics.", Segment::Body).await;
        assert!(result.detections.iter().any(|d| d.type_id == "B.2.2"));
    }
}
