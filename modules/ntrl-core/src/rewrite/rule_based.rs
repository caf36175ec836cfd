use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use ntrl_common::{Action, DetectionInstance, MergedScanResult};

use crate::traits::{Generator, GeneratorOutput, RawChange, RewriteRequest};

/// Neutral stand-ins for the most common manipulative phrases. Keys are
/// lowercase flagged text; an empty value deletes the span.
static SUBSTITUTIONS: &[(&str, &str)] = &[
    // urgency markers
    ("breaking:", ""),
    ("just in:", ""),
    ("urgent:", ""),
    ("developing:", ""),
    ("alert:", ""),
    // rage verbs
    ("slams", "criticizes"),
    ("slammed", "criticized"),
    ("slam", "criticize"),
    ("blasts", "criticizes"),
    ("blasted", "criticized"),
    ("blast", "criticize"),
    ("rips into", "criticizes"),
    ("ripped into", "criticized"),
    ("torches", "criticizes"),
    ("torched", "criticized"),
    ("skewers", "criticizes"),
    ("skewered", "criticized"),
    ("lashes out", "responds sharply"),
    ("lashed out", "responded sharply"),
    // violence metaphors
    ("destroys", "rebuts"),
    ("destroyed", "rebutted"),
    ("demolishes", "rebuts"),
    ("demolished", "rebutted"),
    ("eviscerates", "criticizes"),
    ("eviscerated", "criticized"),
    ("annihilates", "defeats"),
    ("annihilated", "defeated"),
    ("obliterates", "defeats"),
    ("obliterated", "defeated"),
    ("crushes", "defeats"),
    ("crushed", "defeated"),
    // superlatives and shock descriptors
    ("devastating", "serious"),
    ("heartbreaking", "difficult"),
    ("horrifying", "serious"),
    ("terrifying", "serious"),
    ("chilling", "notable"),
    ("stunning", "notable"),
    ("shocking", "unexpected"),
    ("bombshell", "significant"),
    ("jaw-dropping", "notable"),
    // intensifiers and loaded adjectives
    ("massive", "large"),
    ("sweeping", "broad"),
    ("unprecedented", "unusual"),
    ("staggering", "large"),
    ("whopping", "large"),
    ("radical", "far-reaching"),
    ("extremist", "hardline"),
    ("notorious", "well-known"),
    ("infamous", "well-known"),
    ("so-called", ""),
    ("outrageous", "controversial"),
    ("outrageously", "controversially"),
    ("disgraceful", "widely criticized"),
    ("shameful", "widely criticized"),
    ("scandalous", "controversial"),
    ("appalling", "serious"),
    // chaos nouns
    ("chaos", "disruption"),
    ("mayhem", "disorder"),
    ("meltdown", "breakdown"),
    ("frenzy", "surge"),
    ("firestorm", "controversy"),
    ("debacle", "setback"),
    ("fiasco", "setback"),
    // catastrophe framing
    ("catastrophic", "severe"),
    ("catastrophe", "emergency"),
    ("apocalyptic", "severe"),
    ("doomed", "at risk"),
    // dysphemism
    ("witch hunt", "investigation"),
    ("witchhunt", "investigation"),
    ("death tax", "estate tax"),
    ("job-killing", "contested"),
    // manufactured consensus
    ("everybody knows", "many believe"),
    ("everyone is talking about", "there is discussion of"),
];

/// Deterministic string-substitution rewriter. Used in tests and as the
/// final-resort fallback when the LLM path is unavailable or repeatedly
/// fails validation. Edits flagged spans only, in descending offset order so
/// earlier edits never shift later offsets.
#[derive(Default)]
pub struct RuleBasedGenerator;

impl RuleBasedGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn rewrite(&self, text: &str, scan: &MergedScanResult) -> (String, Vec<RawChange>) {
        let mut detections: Vec<&DetectionInstance> = scan
            .detections
            .iter()
            .filter(|d| d.span_is_valid(text))
            .collect();
        detections.sort_by(|a, b| b.span_start.cmp(&a.span_start));

        let mut out = text.to_string();
        let mut changes = Vec::new();
        // Everything at or past this offset has already been edited; spans
        // reaching into it would corrupt the buffer.
        let mut edited_from = usize::MAX;

        for det in detections {
            if matches!(det.action, Action::Annotate | Action::Preserve) {
                continue;
            }
            if det.span_end > edited_from {
                continue;
            }
            let before = &text[det.span_start..det.span_end];
            let after = match substitution_for(before) {
                Some(replacement) => match_case(replacement, before),
                None if det.action == Action::Remove => String::new(),
                None => continue,
            };

            out.replace_range(det.span_start..det.span_end, &after);
            edited_from = det.span_start;
            changes.push(RawChange {
                detection_id: Some(det.detection_id.to_string()),
                before: before.to_string(),
                after: after.clone(),
                action: Some(det.action.to_string()),
                rationale: Some("rule-based substitution".to_string()),
            });
        }

        changes.reverse();
        debug!(edits = changes.len(), "Rule-based rewrite applied");
        (tidy_whitespace(&out), changes)
    }
}

fn substitution_for(text: &str) -> Option<&'static str> {
    let key = text.trim().to_lowercase();
    SUBSTITUTIONS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
}

/// Carry sentence-case over to the replacement. All-caps originals are
/// shouting, so the replacement stays lowercase.
fn match_case(replacement: &str, original: &str) -> String {
    if replacement.is_empty() {
        return String::new();
    }
    let all_caps = original.len() > 1 && original.chars().all(|c| !c.is_lowercase());
    let starts_upper = original.chars().next().is_some_and(|c| c.is_uppercase());
    if starts_upper && !all_caps {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    } else {
        replacement.to_string()
    }
}

fn tidy_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for c in s.chars() {
        if c == ' ' {
            if prev_space {
                continue;
            }
            prev_space = true;
        } else {
            prev_space = false;
        }
        out.push(c);
    }
    out.replace(" ,", ",")
        .replace(" .", ".")
        .replace(" !", "!")
        .replace(" ?", "?")
        .replace(" ;", ";")
        .trim()
        .to_string()
}

#[async_trait]
impl Generator for RuleBasedGenerator {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    async fn generate(&self, req: RewriteRequest<'_>) -> Result<GeneratorOutput> {
        let (text, changes) = match req.scan {
            Some(scan) => self.rewrite(req.body, scan),
            None => (req.body.to_string(), Vec::new()),
        };
        Ok(GeneratorOutput {
            text,
            changes,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::LexicalDetector;
    use crate::scan::Scanner;
    use ntrl_common::{Segment, Taxonomy};
    use std::sync::Arc;
    use std::time::Duration;

    async fn scan_and_fix(text: &str, segment: Segment) -> (String, Vec<RawChange>) {
        let scanner = Scanner::new(
            vec![Arc::new(LexicalDetector::new(&Taxonomy::builtin()))],
            Duration::from_secs(5),
        );
        let scan = scanner.scan(text, segment).await;
        RuleBasedGenerator::new().rewrite(text, &scan)
    }

    #[tokio::test]
    async fn strips_urgency_and_rage_verbs_from_headline() {
        let (fixed, changes) =
            scan_and_fix("BREAKING: Senator SLAMS critics in devastating attack.", Segment::Title)
                .await;

        assert!(!fixed.contains("BREAKING"), "{fixed}");
        assert!(!fixed.contains("SLAMS"), "{fixed}");
        assert!(fixed.contains("criticizes"), "{fixed}");
        assert!(fixed.starts_with("Senator"), "{fixed}");
        assert!(!changes.is_empty());
    }

    #[tokio::test]
    async fn multiple_edits_apply_in_descending_offset_order() {
        let (fixed, changes) = scan_and_fix(
            "The stunning reversal caused chaos at city hall.",
            Segment::Body,
        )
        .await;
        assert_eq!(fixed, "The notable reversal caused disruption at city hall.");
        assert_eq!(changes.len(), 2);
        // Changes are reported in document order.
        assert_eq!(changes[0].before, "stunning");
        assert_eq!(changes[1].before, "chaos");
    }

    #[tokio::test]
    async fn quoted_spans_are_left_verbatim() {
        let text = r#"The mayor said: "this is a devastating day for the city.""#;
        let (fixed, _) = scan_and_fix(text, Segment::Body).await;
        assert!(fixed.contains("devastating day"), "{fixed}");
    }

    #[tokio::test]
    async fn sentence_initial_replacement_keeps_capitalization() {
        let (fixed, _) = scan_and_fix("Stunning scenes unfolded downtown.", Segment::Body).await;
        assert!(fixed.starts_with("Notable"), "{fixed}");
    }

    #[tokio::test]
    async fn unknown_replace_spans_are_left_alone() {
        // "embattled" (B.1.5) has no table entry and action replace: stay put.
        let (fixed, changes) = scan_and_fix("The embattled director resigned.", Segment::Body).await;
        assert_eq!(fixed, "The embattled director resigned.");
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn clean_text_passes_through_unchanged() {
        let text = "The council approved the budget on Tuesday.";
        let (fixed, changes) = scan_and_fix(text, Segment::Body).await;
        assert_eq!(fixed, text);
        assert!(changes.is_empty());
    }
}
