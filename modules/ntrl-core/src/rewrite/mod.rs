pub mod brief;
pub mod feed;
pub mod full;
pub mod rule_based;

pub use brief::BriefGenerator;
pub use feed::FeedGenerator;
pub use full::FullRewriteGenerator;
pub use rule_based::RuleBasedGenerator;

use ntrl_common::MergedScanResult;

/// Render flagged spans for a rewrite prompt, one line per detection, so the
/// model edits what was flagged and nothing else.
pub(crate) fn format_spans(scan: &MergedScanResult) -> String {
    let mut out = String::new();
    for det in &scan.detections {
        out.push_str(&format!(
            "- [{}..{}] {} (id {}, severity {}, action {}): {:?}\n",
            det.span_start,
            det.span_end,
            det.type_id,
            det.detection_id,
            det.severity,
            det.action,
            det.text,
        ));
    }
    if out.is_empty() {
        out.push_str("(no spans flagged)\n");
    }
    out
}
