pub mod lexical;
pub mod semantic;
pub mod structural;

pub use lexical::LexicalDetector;
pub use semantic::{SemanticDetector, SEMANTIC_TYPE_IDS};
pub use structural::{LinguisticModel, StructuralDetector};

use ntrl_common::{Action, DetectionInstance, DetectorSource, Segment};
use uuid::Uuid;

/// Build a detection with the invariant fields filled in. `severity_weighted`
/// starts at the raw severity; the merge step applies the segment multiplier.
#[allow(clippy::too_many_arguments)]
pub(crate) fn detection(
    type_id: &str,
    segment: Segment,
    span: (usize, usize),
    text: &str,
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
        text: text.to_string(),
        confidence: confidence.clamp(0.0, 1.0),
        severity,
        severity_weighted: severity as f64,
        source,
        action,
        exemptions: Vec::new(),
    }
}
