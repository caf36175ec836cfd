use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use ntrl_common::{Action, DetectionInstance, DetectorSource, ScanResult, Segment, Taxonomy};

use crate::detect::detection;
use crate::traits::Detector;

// ---------------------------------------------------------------------------
// LinguisticModel
// ---------------------------------------------------------------------------

/// Sentence/token-level parse handle: compiled patterns plus the lexicons the
/// heuristics consult. Built once at startup and shared process-wide behind an
/// `Arc`; constructor-injected so tests can run against the same instance the
/// production scanner uses. Parser and tagger concerns only; entity
/// extraction lives in the validator.
pub struct LinguisticModel {
    passive: Regex,
    by_agent: Regex,
    temporal: Regex,
    token: Regex,
    attribution_verbs: HashSet<&'static str>,
    cognition_verbs: HashSet<&'static str>,
    speculative_modals: HashSet<&'static str>,
    second_person: HashSet<&'static str>,
    vague_quantifiers: HashSet<&'static str>,
    absolutes: HashSet<&'static str>,
    non_participles: HashSet<&'static str>,
    rhetorical_openers: &'static [&'static str],
}

impl LinguisticModel {
    pub fn load() -> Self {
        Self {
            passive: Regex::new(
                r"(?i)\b(?:is|are|was|were|been|being|be)\s+([A-Za-z]+(?:ed|en)|known|seen|made|found|held|shown|told|done|sent|paid|built|lost|struck|shot|hit|sold|caught|kept|left|put|set)\b",
            )
            .expect("passive pattern is valid"),
            by_agent: Regex::new(r"(?i)\bby\b").expect("by pattern is valid"),
            temporal: Regex::new(
                r"(?i)\b(?:recently|lately|of late|these days|in recent (?:days|weeks|months|years)|for some time|in the coming (?:days|weeks|months))\b",
            )
            .expect("temporal pattern is valid"),
            token: Regex::new(r"[A-Za-z0-9']+").expect("token pattern is valid"),
            attribution_verbs: [
                "say", "says", "said", "claim", "claims", "claimed", "argue", "argues", "argued",
                "believe", "believes", "believed", "suggest", "suggests", "suggested", "insist",
                "insists", "insisted", "contend", "contends", "note", "notes", "noted", "warn",
                "warns", "warned", "report", "reports", "reported", "told", "allege", "alleges",
                "alleged", "fear", "fears", "feared",
            ]
            .into_iter()
            .collect(),
            cognition_verbs: [
                "know", "knows", "knew", "think", "thinks", "thought", "believe", "believes",
                "believed", "say", "says", "said", "feel", "feels", "felt", "agree", "agrees",
                "agreed", "want", "wants", "wanted", "understand", "understands", "realize",
                "realizes", "admit", "admits", "claim", "claims", "insist", "insists",
            ]
            .into_iter()
            .collect(),
            speculative_modals: ["could", "might", "may", "would", "should", "perhaps", "possibly"]
                .into_iter()
                .collect(),
            second_person: ["you", "your", "yours", "yourself"].into_iter().collect(),
            vague_quantifiers: [
                "some", "many", "several", "most", "few", "numerous", "countless", "others",
            ]
            .into_iter()
            .collect(),
            absolutes: ["everyone", "everybody", "nobody", "always", "never", "nothing"]
                .into_iter()
                .collect(),
            non_participles: ["even", "open", "often", "seven", "eleven", "heaven", "children"]
                .into_iter()
                .collect(),
            rhetorical_openers: &[
                "why ", "how ", "what if ", "is it ", "are we ", "could it ", "who ", "isn't it ",
                "shouldn't ", "wouldn't ", "can we ", "do we ", "does anyone ", "when will ",
                "what's next",
            ],
        }
    }

    /// Byte spans of sentences, terminal punctuation included.
    fn sentence_spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut start = 0usize;
        let mut chars = text.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            if !matches!(c, '.' | '!' | '?') {
                continue;
            }
            let mut end = i + c.len_utf8();
            while let Some(&(j, c2)) = chars.peek() {
                if matches!(c2, '.' | '!' | '?') {
                    end = j + c2.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let at_boundary = text[end..].chars().next().is_none_or(|c2| c2.is_whitespace());
            if at_boundary {
                if !text[start..end].trim().is_empty() {
                    spans.push((start, end));
                }
                start = end
                    + text[end..]
                        .chars()
                        .take_while(|c2| c2.is_whitespace())
                        .map(|c2| c2.len_utf8())
                        .sum::<usize>();
            }
        }
        if start < text.len() && !text[start..].trim().is_empty() {
            spans.push((start, text.len()));
        }
        spans
    }

    /// Token spans within a sentence, relative to the sentence.
    fn token_spans<'t>(&self, sentence: &'t str) -> Vec<(usize, usize, &'t str)> {
        self.token
            .find_iter(sentence)
            .map(|m| (m.start(), m.end(), m.as_str()))
            .collect()
    }
}

impl Default for LinguisticModel {
    fn default() -> Self {
        Self::load()
    }
}

// ---------------------------------------------------------------------------
// StructuralDetector
// ---------------------------------------------------------------------------

/// Five sentence-level heuristics: passive voice, rhetorical questions, vague
/// quantifier attribution, vague temporal anchoring, and gated absolutes.
/// Each emits independently; overlap resolution happens in the merge step.
pub struct StructuralDetector {
    model: Arc<LinguisticModel>,
    taxonomy: Arc<Taxonomy>,
}

struct TypeInfo {
    severity: u8,
    action: Action,
}

impl StructuralDetector {
    pub fn new(model: Arc<LinguisticModel>, taxonomy: Arc<Taxonomy>) -> Self {
        Self { model, taxonomy }
    }

    fn type_info(&self, type_id: &str, default_severity: u8) -> TypeInfo {
        match self.taxonomy.get(type_id) {
            Some(mt) => TypeInfo {
                severity: mt.severity,
                action: mt.action,
            },
            None => TypeInfo {
                severity: default_severity,
                action: Action::Annotate,
            },
        }
    }

    fn emit(
        &self,
        out: &mut Vec<DetectionInstance>,
        type_id: &str,
        default_severity: u8,
        segment: Segment,
        text: &str,
        span: (usize, usize),
        confidence: f64,
    ) {
        let info = self.type_info(type_id, default_severity);
        out.push(detection(
            type_id,
            segment,
            span,
            &text[span.0..span.1],
            confidence,
            info.severity,
            DetectorSource::Structural,
            info.action,
        ));
    }

    fn scan(&self, text: &str, segment: Segment) -> ScanResult {
        let started = Instant::now();
        let model = &self.model;
        let mut detections = Vec::new();

        for (s_start, s_end) in model.sentence_spans(text) {
            let sentence = &text[s_start..s_end];
            let tokens = model.token_spans(sentence);
            let lowered: Vec<String> = tokens.iter().map(|t| t.2.to_lowercase()).collect();

            self.passive_voice(&mut detections, text, segment, s_start, sentence);
            self.rhetorical_question(&mut detections, text, segment, s_start, sentence, &lowered);
            self.vague_quantifier(&mut detections, text, segment, s_start, &tokens, &lowered);
            self.absolutes(&mut detections, text, segment, s_start, &tokens, &lowered);
        }

        // Temporal vagueness scans the whole text, not sentence-by-sentence.
        for m in model.temporal.find_iter(text) {
            self.emit(
                &mut detections,
                "D.2.1",
                2,
                segment,
                text,
                (m.start(), m.end()),
                0.85,
            );
        }

        detections.sort_by_key(|d| (d.span_start, d.span_end));

        debug!(
            segment = %segment,
            detections = detections.len(),
            "Structural scan complete"
        );

        ScanResult {
            segment,
            detector: DetectorSource::Structural,
            detections,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Passive constructions. An expressed `by`-agent demotes the actor
    /// (severity 2); a missing agent hides it entirely (severity 3).
    fn passive_voice(
        &self,
        out: &mut Vec<DetectionInstance>,
        text: &str,
        segment: Segment,
        s_start: usize,
        sentence: &str,
    ) {
        for caps in self.model.passive.captures_iter(sentence) {
            let m = caps.get(0).expect("whole match");
            let participle = caps.get(1).map(|g| g.as_str().to_lowercase());
            if let Some(p) = &participle {
                if self.model.non_participles.contains(p.as_str()) {
                    continue;
                }
            }
            let has_agent = self.model.by_agent.is_match(&sentence[m.end()..]);
            let (type_id, severity, confidence) = if has_agent {
                ("C.2.2", 2, 0.7)
            } else {
                ("C.2.1", 3, 0.75)
            };
            self.emit(
                out,
                type_id,
                severity,
                segment,
                text,
                (s_start + m.start(), s_start + m.end()),
                confidence,
            );
        }
    }

    /// A question is rhetorical when it opens like one, or when it addresses
    /// the reader directly while speculating.
    fn rhetorical_question(
        &self,
        out: &mut Vec<DetectionInstance>,
        text: &str,
        segment: Segment,
        s_start: usize,
        sentence: &str,
        lowered: &[String],
    ) {
        if !sentence.trim_end().ends_with('?') {
            return;
        }
        let opening = sentence.trim_start().to_lowercase();
        let opener_hit = self
            .model
            .rhetorical_openers
            .iter()
            .any(|o| opening.starts_with(o));
        let second_person = lowered
            .iter()
            .any(|t| self.model.second_person.contains(t.as_str()));
        let speculative = lowered
            .iter()
            .any(|t| self.model.speculative_modals.contains(t.as_str()));

        if opener_hit || (second_person && speculative) {
            self.emit(
                out,
                "C.3.1",
                2,
                segment,
                text,
                (s_start, s_start + sentence.len()),
                0.8,
            );
        }
    }

    /// "Some/many say" only counts when an attribution verb follows within
    /// three tokens; "many residents attended" is reporting, not sourcing.
    fn vague_quantifier(
        &self,
        out: &mut Vec<DetectionInstance>,
        text: &str,
        segment: Segment,
        s_start: usize,
        tokens: &[(usize, usize, &str)],
        lowered: &[String],
    ) {
        for (i, tok) in lowered.iter().enumerate() {
            if !self.model.vague_quantifiers.contains(tok.as_str()) {
                continue;
            }
            let window = &lowered[i + 1..(i + 4).min(lowered.len())];
            if let Some(rel) = window
                .iter()
                .position(|t| self.model.attribution_verbs.contains(t.as_str()))
            {
                let verb_idx = i + 1 + rel;
                self.emit(
                    out,
                    "D.1.2",
                    3,
                    segment,
                    text,
                    (s_start + tokens[i].0, s_start + tokens[verb_idx].1),
                    0.8,
                );
            }
        }
    }

    /// Absolute terms, gated on a cognition/speech verb in the same sentence.
    fn absolutes(
        &self,
        out: &mut Vec<DetectionInstance>,
        text: &str,
        segment: Segment,
        s_start: usize,
        tokens: &[(usize, usize, &str)],
        lowered: &[String],
    ) {
        let has_cognition = lowered
            .iter()
            .any(|t| self.model.cognition_verbs.contains(t.as_str()));
        if !has_cognition {
            return;
        }
        let mut i = 0;
        while i < lowered.len() {
            // "no one" is the one two-token absolute.
            if lowered[i] == "no" && lowered.get(i + 1).map(String::as_str) == Some("one") {
                self.emit(
                    out,
                    "E.1.1",
                    3,
                    segment,
                    text,
                    (s_start + tokens[i].0, s_start + tokens[i + 1].1),
                    0.7,
                );
                i += 2;
                continue;
            }
            if self.model.absolutes.contains(lowered[i].as_str()) {
                self.emit(
                    out,
                    "E.1.1",
                    3,
                    segment,
                    text,
                    (s_start + tokens[i].0, s_start + tokens[i].1),
                    0.7,
                );
            }
            i += 1;
        }
    }
}

#[async_trait]
impl Detector for StructuralDetector {
    fn source(&self) -> DetectorSource {
        DetectorSource::Structural
    }

    async fn detect(&self, text: &str, segment: Segment) -> Result<ScanResult> {
        let model = Arc::clone(&self.model);
        let taxonomy = Arc::clone(&self.taxonomy);
        let text = text.to_string();
        let result = tokio::task::spawn_blocking(move || {
            StructuralDetector { model, taxonomy }.scan(&text, segment)
        })
        .await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> StructuralDetector {
        StructuralDetector::new(
            Arc::new(LinguisticModel::load()),
            Arc::new(Taxonomy::builtin()),
        )
    }

    async fn scan(text: &str) -> ScanResult {
        detector().detect(text, Segment::Body).await.unwrap()
    }

    #[tokio::test]
    async fn agentless_passive_is_severity_three() {
        let result = scan("The protesters were arrested. The case continues.").await;
        let hit = result
            .detections
            .iter()
            .find(|d| d.type_id == "C.2.1")
            .expect("agentless passive flagged");
        assert_eq!(hit.severity, 3);
    }

    #[tokio::test]
    async fn passive_with_agent_is_severity_two() {
        let result = scan("The bill was rejected by the senate.").await;
        let hit = result
            .detections
            .iter()
            .find(|d| d.type_id == "C.2.2")
            .expect("agented passive flagged");
        assert_eq!(hit.severity, 2);
        assert!(result.detections.iter().all(|d| d.type_id != "C.2.1"));
    }

    #[tokio::test]
    async fn rhetorical_opener_is_flagged() {
        let result = scan("Why would anyone trust this plan?").await;
        assert!(result.detections.iter().any(|d| d.type_id == "C.3.1"));
    }

    #[tokio::test]
    async fn second_person_plus_modal_question_is_flagged() {
        let result = scan("Could your family survive another winter like this?").await;
        assert!(result.detections.iter().any(|d| d.type_id == "C.3.1"));
    }

    #[tokio::test]
    async fn plain_information_question_is_not_flagged() {
        let result = scan("What time does the hearing start?").await;
        assert!(result.detections.iter().all(|d| d.type_id != "C.3.1"));
    }

    #[tokio::test]
    async fn vague_quantifier_requires_attribution_verb() {
        let flagged = scan("Many say the policy failed.").await;
        assert!(flagged.detections.iter().any(|d| d.type_id == "D.1.2"));

        let unflagged = scan("Many residents attended the meeting.").await;
        assert!(unflagged.detections.iter().all(|d| d.type_id != "D.1.2"));
    }

    #[tokio::test]
    async fn vague_temporal_phrases_are_flagged() {
        let result = scan("Recently, prices have soared across the region.").await;
        let hit = result
            .detections
            .iter()
            .find(|d| d.type_id == "D.2.1")
            .expect("temporal flagged");
        assert_eq!(hit.text.to_lowercase(), "recently");
    }

    #[tokio::test]
    async fn absolutes_are_gated_on_cognition_verbs() {
        let flagged = scan("Everyone knows the mayor lied.").await;
        assert!(flagged.detections.iter().any(|d| d.type_id == "E.1.1"));

        let unflagged = scan("Everyone left the building.").await;
        assert!(unflagged.detections.iter().all(|d| d.type_id != "E.1.1"));
    }

    #[tokio::test]
    async fn no_one_bigram_is_a_single_span() {
        let text = "No one believes the official story.";
        let result = scan(text).await;
        let hit = result
            .detections
            .iter()
            .find(|d| d.type_id == "E.1.1")
            .expect("no one flagged");
        assert_eq!(hit.text, "No one");
        assert!(hit.span_is_valid(text));
    }

    #[tokio::test]
    async fn all_spans_are_valid() {
        let text = "Why would you believe them? Many say mistakes were made. \
                    Recently, everyone said it never happened.";
        let result = scan(text).await;
        assert!(!result.detections.is_empty());
        for det in &result.detections {
            assert!(det.span_is_valid(text), "bad span: {det:?}");
        }
    }
}
