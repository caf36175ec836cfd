use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use ntrl_common::{Action, ChangeRecord, FixResult, MergedScanResult, ValidationResult};

use crate::rewrite::RuleBasedGenerator;
use crate::traits::{Generator, RawChange, RewriteRequest};
use crate::validate::validate;

/// Orchestrates the three generators concurrently and guards the full rewrite
/// with the red-line validator. Failure ladder: LLM rewrite, then the
/// conservative rule-based rewrite, then the original text verbatim. The
/// worst possible output is the input, honestly reported as unchanged.
pub struct Fixer {
    full: Arc<dyn Generator>,
    brief: Arc<dyn Generator>,
    feed: Arc<dyn Generator>,
    fallback: RuleBasedGenerator,
    max_retries: u32,
    strict: bool,
}

impl Fixer {
    pub fn new(
        full: Arc<dyn Generator>,
        brief: Arc<dyn Generator>,
        feed: Arc<dyn Generator>,
        max_retries: u32,
        strict: bool,
    ) -> Self {
        Self {
            full,
            brief,
            feed,
            fallback: RuleBasedGenerator::new(),
            max_retries,
            strict,
        }
    }

    pub async fn fix(
        &self,
        body: &str,
        title: &str,
        deck: Option<&str>,
        scan: &MergedScanResult,
    ) -> FixResult {
        let started = Instant::now();
        let req = RewriteRequest {
            body,
            title,
            deck,
            scan: Some(scan),
        };

        let (full_res, brief_res, feed_res) = tokio::join!(
            self.full.generate(req),
            self.brief.generate(req),
            self.feed.generate(req),
        );

        // Secondary surfaces degrade to neutral defaults, never abort the fix.
        let brief = match brief_res {
            Ok(out) => out.text,
            Err(e) => {
                warn!(generator = self.brief.name(), error = %e, "Brief generator failed");
                String::new()
            }
        };
        let (feed_title, feed_summary) = match feed_res {
            Ok(out) => (
                out.feed_title.unwrap_or_else(|| title.to_string()),
                out.feed_summary.unwrap_or_default(),
            ),
            Err(e) => {
                warn!(generator = self.feed.name(), error = %e, "Feed generator failed");
                (title.to_string(), String::new())
            }
        };

        let (mut fixed, mut raw_changes) = match full_res {
            Ok(out) => (out.text, out.changes),
            Err(e) => {
                warn!(generator = self.full.name(), error = %e,
                    "Full rewrite failed, substituting original");
                (body.to_string(), Vec::new())
            }
        };
        let mut used_fallback = false;

        let mut validation = validate(body, &fixed, self.strict);
        if !validation.passed {
            for attempt in 1..=self.max_retries {
                warn!(
                    attempt,
                    failures = ?validation.failures,
                    "Rewrite failed validation, retrying with conservative generator"
                );
                match self.fallback.generate(req).await {
                    Ok(out) => {
                        let candidate = validate(body, &out.text, self.strict);
                        let candidate_passed = candidate.passed;
                        validation = candidate;
                        if candidate_passed {
                            fixed = out.text;
                            raw_changes = out.changes;
                            used_fallback = true;
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(attempt, error = %e, "Conservative generator failed");
                    }
                }
            }
            if !validation.passed {
                warn!("All rewrite attempts failed validation, falling back to original");
                fixed = body.to_string();
                raw_changes = Vec::new();
                validation = ValidationResult::fallback_to_original();
                used_fallback = true;
            }
        }

        let changes = join_changes(raw_changes, scan);

        let result = FixResult {
            original_len: body.len(),
            fixed_len: fixed.len(),
            fixed_text: fixed,
            brief,
            feed_title,
            feed_summary,
            changes,
            validation,
            elapsed_ms: started.elapsed().as_millis() as u64,
            used_fallback,
        };

        info!(
            changes = result.changes.len(),
            used_fallback = result.used_fallback,
            passed = result.validation.passed,
            elapsed_ms = result.elapsed_ms,
            "Fix complete"
        );
        result
    }
}

/// Join raw generator changes back to the detections that motivated them by
/// detection ID. Changes the model could not attribute keep a null detection.
fn join_changes(raw: Vec<RawChange>, scan: &MergedScanResult) -> Vec<ChangeRecord> {
    raw.into_iter()
        .map(|change| {
            let detection_id = change
                .detection_id
                .as_deref()
                .and_then(|id| Uuid::parse_str(id).ok());
            let detection = detection_id
                .and_then(|id| scan.detections.iter().find(|d| d.detection_id == id));

            let action = change
                .action
                .as_deref()
                .and_then(parse_action)
                .or(detection.map(|d| d.action))
                .unwrap_or(Action::Rewrite);

            ChangeRecord {
                detection_id,
                type_id: detection.map(|d| d.type_id.clone()),
                before: change.before,
                after: change.after,
                action,
                rationale: change
                    .rationale
                    .unwrap_or_else(|| "flagged span neutralized".to_string()),
            }
        })
        .collect()
}

fn parse_action(s: &str) -> Option<Action> {
    match s {
        "remove" => Some(Action::Remove),
        "replace" => Some(Action::Replace),
        "rewrite" => Some(Action::Rewrite),
        "annotate" => Some(Action::Annotate),
        "preserve" => Some(Action::Preserve),
        _ => None,
    }
}
