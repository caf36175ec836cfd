use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

// --- Segments ---

/// Structural part of an article a detection belongs to.
/// Each segment carries a severity multiplier: manipulation in a title
/// reaches far more readers than the same phrase buried in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Title,
    Deck,
    Lede,
    Body,
    Caption,
    Pullquote,
    Embed,
    Table,
}

impl Segment {
    pub fn severity_multiplier(&self) -> f64 {
        match self {
            Segment::Title => 1.5,
            Segment::Deck => 1.3,
            Segment::Lede | Segment::Caption => 1.2,
            Segment::Body | Segment::Embed | Segment::Table => 1.0,
            Segment::Pullquote => 0.6,
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Title => write!(f, "title"),
            Segment::Deck => write!(f, "deck"),
            Segment::Lede => write!(f, "lede"),
            Segment::Body => write!(f, "body"),
            Segment::Caption => write!(f, "caption"),
            Segment::Pullquote => write!(f, "pullquote"),
            Segment::Embed => write!(f, "embed"),
            Segment::Table => write!(f, "table"),
        }
    }
}

// --- Taxonomy enums ---

/// Top-level manipulation category. The letter code is the first component
/// of every type ID ("A.2.1" is a Sensationalism type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sensationalism,
    LoadedLanguage,
    Framing,
    Attribution,
    Fallacy,
    Structural,
}

impl Category {
    pub fn code(&self) -> char {
        match self {
            Category::Sensationalism => 'A',
            Category::LoadedLanguage => 'B',
            Category::Framing => 'C',
            Category::Attribution => 'D',
            Category::Fallacy => 'E',
            Category::Structural => 'F',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'A' => Some(Category::Sensationalism),
            'B' => Some(Category::LoadedLanguage),
            'C' => Some(Category::Framing),
            'D' => Some(Category::Attribution),
            'E' => Some(Category::Fallacy),
            'F' => Some(Category::Structural),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Sensationalism => write!(f, "sensationalism"),
            Category::LoadedLanguage => write!(f, "loaded_language"),
            Category::Framing => write!(f, "framing"),
            Category::Attribution => write!(f, "attribution"),
            Category::Fallacy => write!(f, "fallacy"),
            Category::Structural => write!(f, "structural"),
        }
    }
}

/// Default edit action for a manipulation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Remove,
    Replace,
    Rewrite,
    Annotate,
    Preserve,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Remove => write!(f, "remove"),
            Action::Replace => write!(f, "replace"),
            Action::Rewrite => write!(f, "rewrite"),
            Action::Annotate => write!(f, "annotate"),
            Action::Preserve => write!(f, "preserve"),
        }
    }
}

/// Which detector produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorSource {
    Lexical,
    Structural,
    Semantic,
}

impl std::fmt::Display for DetectorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorSource::Lexical => write!(f, "lexical"),
            DetectorSource::Structural => write!(f, "structural"),
            DetectorSource::Semantic => write!(f, "semantic"),
        }
    }
}

// --- Detections ---

/// One flagged span in one segment. Spans are half-open `[start, end)`
/// character offsets into the scanned text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionInstance {
    pub detection_id: Uuid,
    pub type_id: String,
    /// Types absorbed during merge (near-identical span, different type).
    #[serde(default)]
    pub secondary_type_ids: Vec<String>,
    pub segment: Segment,
    pub span_start: usize,
    pub span_end: usize,
    /// The exact flagged text, always equal to `scanned[span_start..span_end]`.
    pub text: String,
    pub confidence: f64,
    pub severity: u8,
    /// `severity` scaled by the segment multiplier. Set during merge.
    pub severity_weighted: f64,
    pub source: DetectorSource,
    pub action: Action,
    #[serde(default)]
    pub exemptions: Vec<String>,
}

impl DetectionInstance {
    pub fn span_len(&self) -> usize {
        self.span_end.saturating_sub(self.span_start)
    }

    /// Span invariant: `0 <= start < end <= len` and the stored text
    /// matches the slice it points at.
    pub fn span_is_valid(&self, scanned: &str) -> bool {
        self.span_start < self.span_end
            && self.span_end <= scanned.len()
            && scanned.is_char_boundary(self.span_start)
            && scanned.is_char_boundary(self.span_end)
            && scanned[self.span_start..self.span_end] == self.text
    }
}

/// Summary statistics over a merged scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub total: usize,
    /// Counts keyed by category code letter ("A".."F").
    pub by_category: HashMap<String, usize>,
    /// Counts keyed by severity 1-5.
    pub by_severity: HashMap<u8, usize>,
    /// Detections per ~5-char word estimate, x100.
    pub density: f64,
}

/// Output of a single detector over one segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub segment: Segment,
    pub detector: DetectorSource,
    pub detections: Vec<DetectionInstance>,
    pub elapsed_ms: u64,
}

impl ScanResult {
    pub fn empty(segment: Segment, detector: DetectorSource) -> Self {
        Self {
            segment,
            detector,
            detections: Vec::new(),
            elapsed_ms: 0,
        }
    }
}

/// Merged, deduplicated detections for one segment, ordered by `(start, end)`.
/// No two spans of the same primary type overlap beyond the merge threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedScanResult {
    pub segment: Segment,
    pub detections: Vec<DetectionInstance>,
    pub detector_timings_ms: HashMap<String, u64>,
    pub stats: ScanStats,
}

impl MergedScanResult {
    pub fn empty(segment: Segment) -> Self {
        Self {
            segment,
            detections: Vec::new(),
            detector_timings_ms: HashMap::new(),
            stats: ScanStats::default(),
        }
    }
}

// --- Fix types ---

/// Links one applied edit back to the detection that motivated it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub detection_id: Option<Uuid>,
    pub type_id: Option<String>,
    pub before: String,
    pub after: String,
    pub action: Action,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    Warning,
    Skipped,
}

/// Result of one red-line invariant check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        matches!(self.status, CheckStatus::Passed | CheckStatus::Skipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::None => write!(f, "none"),
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Aggregate outcome of all red-line checks for one rewrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub checks: Vec<CheckResult>,
    pub failures: Vec<String>,
    pub warnings: Vec<String>,
    pub risk: RiskLevel,
}

impl ValidationResult {
    /// Look up a check by name.
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// The result used when the fixer gives up and returns the original
    /// text verbatim. Nothing was changed, so nothing can have been broken.
    pub fn fallback_to_original() -> Self {
        Self {
            passed: true,
            checks: vec![CheckResult {
                name: "fallback".to_string(),
                status: CheckStatus::Skipped,
                detail: "fallback to original".to_string(),
            }],
            failures: Vec::new(),
            warnings: Vec::new(),
            risk: RiskLevel::None,
        }
    }
}

/// Everything the fixer produced for one article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixResult {
    pub fixed_text: String,
    pub brief: String,
    pub feed_title: String,
    pub feed_summary: String,
    pub changes: Vec<ChangeRecord>,
    pub validation: ValidationResult,
    pub original_len: usize,
    pub fixed_len: usize,
    pub elapsed_ms: u64,
    pub used_fallback: bool,
}

// --- Pipeline types ---

/// Audit summary for downstream disclosure: what was detected, how dense
/// the manipulation was, and which models touched the text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransparencyPackage {
    pub detections_by_category: HashMap<String, usize>,
    pub detections_by_severity: HashMap<u8, usize>,
    pub manipulation_density: f64,
    pub epistemic_flags: Vec<String>,
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub body_scan: MergedScanResult,
    pub title_scan: Option<MergedScanResult>,
    /// Absent in scan-only mode.
    pub fix: Option<FixResult>,
    pub transparency: TransparencyPackage,
    pub content_hash: String,
    pub from_cache: bool,
    pub processed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

// --- Batch types ---

/// Caller-supplied article envelope, keyed by the caller's own ID.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct ArticleInput {
    #[builder(setter(into))]
    pub article_id: String,
    #[builder(setter(into))]
    pub title: String,
    #[builder(default, setter(strip_option, into))]
    pub deck: Option<String>,
    #[builder(setter(into))]
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub total_articles: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: HashMap<String, PipelineResult>,
    /// Failure reason per article ID. One article failing never aborts siblings.
    pub failures: HashMap<String, String>,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_multiplier_exceeds_body() {
        assert!(Segment::Title.severity_multiplier() > Segment::Body.severity_multiplier());
        assert_eq!(Segment::Title.severity_multiplier(), 1.5);
        assert_eq!(Segment::Body.severity_multiplier(), 1.0);
        assert_eq!(Segment::Pullquote.severity_multiplier(), 0.6);
    }

    #[test]
    fn category_codes_round_trip() {
        for cat in [
            Category::Sensationalism,
            Category::LoadedLanguage,
            Category::Framing,
            Category::Attribution,
            Category::Fallacy,
            Category::Structural,
        ] {
            assert_eq!(Category::from_code(cat.code()), Some(cat));
        }
        assert_eq!(Category::from_code('Z'), None);
    }

    #[test]
    fn span_validity_checks_text_match() {
        let scanned = "Senator slams critics";
        let det = DetectionInstance {
            detection_id: Uuid::new_v4(),
            type_id: "B.2.2".to_string(),
            secondary_type_ids: vec![],
            segment: Segment::Body,
            span_start: 8,
            span_end: 13,
            text: "slams".to_string(),
            confidence: 0.95,
            severity: 4,
            severity_weighted: 4.0,
            source: DetectorSource::Lexical,
            action: Action::Replace,
            exemptions: vec![],
        };
        assert!(det.span_is_valid(scanned));

        let mut bad = det.clone();
        bad.text = "slam".to_string();
        assert!(!bad.span_is_valid(scanned));

        let mut out_of_range = det;
        out_of_range.span_end = scanned.len() + 1;
        assert!(!out_of_range.span_is_valid(scanned));
    }

    #[test]
    fn fallback_validation_passes() {
        let v = ValidationResult::fallback_to_original();
        assert!(v.passed);
        assert_eq!(v.risk, RiskLevel::None);
        assert_eq!(v.check("fallback").unwrap().detail, "fallback to original");
    }

    #[test]
    fn article_input_builder_defaults_deck() {
        let article = ArticleInput::builder()
            .article_id("a-1")
            .title("Title")
            .body("Body text")
            .build();
        assert!(article.deck.is_none());
    }
}
