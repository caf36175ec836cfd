use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use ntrl_common::{CheckResult, CheckStatus, RiskLevel, ValidationResult};

// ---------------------------------------------------------------------------
// Fixed word sets and patterns
// ---------------------------------------------------------------------------

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d+(?:[,.]\d+)*(?:%|st|nd|rd|th)?\b").expect("number pattern is valid")
});

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b").expect("entity pattern is valid")
});

static QUOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([^"\n]+)"|“([^”\n]+)”"#).expect("quote pattern is valid")
});

static ATTRIBUTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:said|says|stated|told|announced|according to)\b")
        .expect("attribution pattern is valid")
});

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("year pattern is valid"));

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9']+").expect("token pattern is valid"));

const SPELLED_NUMBERS: &[&str] = &[
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
    "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety", "hundred",
    "thousand", "million", "billion", "trillion", "dozen",
];

// "may" is absent: in news copy it is almost always the modal, not the month.
const MONTHS_AND_WEEKDAYS: &[&str] = &[
    "january", "february", "march", "april", "june", "july", "august", "september", "october",
    "november", "december", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday",
    "sunday", "yesterday", "tomorrow",
];

const SOFT_MODALS: &[&str] = &[
    "alleged", "allegedly", "may", "might", "could", "reportedly", "apparently", "suggests",
    "appears", "possibly", "claims", "claimed", "rumored", "suspected",
];

const HARD_MODALS: &[&str] = &[
    "confirmed", "definitely", "certainly", "undoubtedly", "unquestionably", "proved", "proven",
];

const CAUSAL_CONNECTIVES: &[&str] = &[
    "because", "due to", "caused", "causes", "causing", "led to", "leads to", "resulted in",
    "results in", "therefore", "consequently", "as a result",
];

const RISK_INDICATORS: &[&str] = &[
    "warning", "warnings", "danger", "dangerous", "hazard", "hazardous", "risk", "risks",
    "recall", "recalled", "toxic", "fatal", "deadly", "lethal", "emergency", "evacuate",
    "evacuation", "contaminated", "contamination", "outbreak", "poison", "poisoning", "unsafe",
];

const QUANTIFIERS: &[&str] = &[
    "all", "every", "most", "many", "some", "few", "several", "none", "no", "both", "each",
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "cannot", "can't", "won't", "didn't", "doesn't", "don't",
    "isn't", "aren't", "wasn't", "weren't", "nor", "neither", "without", "nothing", "nobody",
];

/// Quotes shorter than this are idiom/scare-quote noise, not protected speech.
const MIN_QUOTE_LEN: usize = 10;
/// Single-word entities shorter than this are skipped to avoid noise.
const MIN_ENTITY_LEN: usize = 4;

/// Checks whose failure blocks publication even in non-strict mode.
const CRITICAL_CHECKS: &[&str] = &[
    "entity_invariance",
    "number_invariance",
    "quote_integrity",
    "negation_integrity",
];

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Run all ten red-line checks on a rewrite. State-free: same inputs, same
/// verdict. `strict` fails on any failed check; otherwise only the critical
/// subset blocks.
pub fn validate(original: &str, rewritten: &str, strict: bool) -> ValidationResult {
    let checks = vec![
        entity_invariance(original, rewritten),
        number_invariance(original, rewritten),
        date_invariance(original, rewritten),
        attribution_invariance(original, rewritten),
        modality_invariance(original, rewritten),
        causality_invariance(original, rewritten),
        risk_invariance(original, rewritten),
        quote_integrity(original, rewritten),
        scope_invariance(original, rewritten),
        negation_integrity(original, rewritten),
    ];

    let failures: Vec<String> = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Failed)
        .map(|c| c.name.clone())
        .collect();
    let warnings: Vec<String> = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Warning)
        .map(|c| c.name.clone())
        .collect();

    let passed = if strict {
        failures.is_empty()
    } else {
        !failures.iter().any(|f| CRITICAL_CHECKS.contains(&f.as_str()))
    };

    let risk = match failures.len() {
        n if n >= 3 => RiskLevel::Critical,
        2 => RiskLevel::High,
        1 => RiskLevel::Medium,
        _ if warnings.len() >= 2 => RiskLevel::Low,
        _ => RiskLevel::None,
    };

    ValidationResult {
        passed,
        checks,
        failures,
        warnings,
        risk,
    }
}

// ---------------------------------------------------------------------------
// Individual checks
// ---------------------------------------------------------------------------

fn check(name: &str, status: CheckStatus, detail: impl Into<String>) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        status,
        detail: detail.into(),
    }
}

fn tokens_lower(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

fn token_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for tok in tokens_lower(text) {
        *counts.entry(tok).or_insert(0) += 1;
    }
    counts
}

/// Capitalized sequences, excluding single sentence-initial words and short
/// tokens. Multiword sequences always count.
fn entities(text: &str) -> HashSet<String> {
    let sentence_starts = sentence_start_offsets(text);
    ENTITY_RE
        .find_iter(text)
        .filter(|m| {
            let multiword = m.as_str().contains(' ');
            if multiword {
                return true;
            }
            if sentence_starts.contains(&m.start()) {
                return false;
            }
            m.as_str().len() >= MIN_ENTITY_LEN
        })
        .map(|m| m.as_str().to_string())
        .collect()
}

fn sentence_start_offsets(text: &str) -> HashSet<usize> {
    let mut starts = HashSet::new();
    let mut expecting_start = true;
    for (i, c) in text.char_indices() {
        if expecting_start && c.is_alphabetic() {
            starts.insert(i);
            expecting_start = false;
        } else if matches!(c, '.' | '!' | '?' | '\n' | ':') {
            expecting_start = true;
        }
    }
    starts
}

fn entity_invariance(original: &str, rewritten: &str) -> CheckResult {
    let orig = entities(original);
    let rew_text = rewritten; // entities must reappear anywhere, case-exact
    let missing: Vec<&String> = orig.iter().filter(|e| !rew_text.contains(e.as_str())).collect();
    if missing.is_empty() {
        check("entity_invariance", CheckStatus::Passed, "all entities preserved")
    } else {
        check(
            "entity_invariance",
            CheckStatus::Failed,
            format!("missing entities: {missing:?}"),
        )
    }
}

fn number_invariance(original: &str, rewritten: &str) -> CheckResult {
    let extract = |text: &str| -> HashSet<String> {
        let mut set: HashSet<String> = NUMBER_RE
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        let toks = tokens_lower(text);
        for tok in toks {
            if SPELLED_NUMBERS.contains(&tok.as_str()) {
                set.insert(tok);
            }
        }
        set
    };
    let missing: Vec<String> = extract(original)
        .difference(&extract(rewritten))
        .cloned()
        .collect();
    if missing.is_empty() {
        check("number_invariance", CheckStatus::Passed, "all numbers preserved")
    } else {
        check(
            "number_invariance",
            CheckStatus::Failed,
            format!("missing numbers: {missing:?}"),
        )
    }
}

fn date_invariance(original: &str, rewritten: &str) -> CheckResult {
    let extract = |text: &str| -> HashSet<String> {
        let mut set: HashSet<String> = YEAR_RE
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        for tok in tokens_lower(text) {
            if MONTHS_AND_WEEKDAYS.contains(&tok.as_str()) {
                set.insert(tok);
            }
        }
        set
    };
    let missing: Vec<String> = extract(original)
        .difference(&extract(rewritten))
        .cloned()
        .collect();
    if missing.is_empty() {
        check("date_invariance", CheckStatus::Passed, "all dates preserved")
    } else {
        check(
            "date_invariance",
            CheckStatus::Failed,
            format!("missing dates: {missing:?}"),
        )
    }
}

fn attribution_invariance(original: &str, rewritten: &str) -> CheckResult {
    let orig = ATTRIBUTION_RE.find_iter(original).count();
    let rew = ATTRIBUTION_RE.find_iter(rewritten).count();
    if rew >= orig {
        check("attribution_invariance", CheckStatus::Passed, "attributions preserved")
    } else {
        check(
            "attribution_invariance",
            CheckStatus::Warning,
            format!("attribution markers dropped from {orig} to {rew}"),
        )
    }
}

/// A soft-modal claim must never come back as a hard certainty the original
/// did not assert.
fn modality_invariance(original: &str, rewritten: &str) -> CheckResult {
    let orig_tokens: HashSet<String> = tokens_lower(original).into_iter().collect();
    let rew_tokens: HashSet<String> = tokens_lower(rewritten).into_iter().collect();

    let original_is_hedged = SOFT_MODALS.iter().any(|m| orig_tokens.contains(*m));
    let introduced: Vec<&&str> = HARD_MODALS
        .iter()
        .filter(|m| rew_tokens.contains(**m) && !orig_tokens.contains(**m))
        .collect();

    if original_is_hedged && !introduced.is_empty() {
        check(
            "modality_invariance",
            CheckStatus::Failed,
            format!("hedged claim upgraded with {introduced:?}"),
        )
    } else {
        check("modality_invariance", CheckStatus::Passed, "no hedge upgrades")
    }
}

fn causality_invariance(original: &str, rewritten: &str) -> CheckResult {
    let has = |text: &str| {
        let lower = text.to_lowercase();
        CAUSAL_CONNECTIVES.iter().any(|c| lower.contains(c))
    };
    let (orig, rew) = (has(original), has(rewritten));
    if orig == rew {
        check("causality_invariance", CheckStatus::Passed, "causal framing unchanged")
    } else if rew {
        check(
            "causality_invariance",
            CheckStatus::Warning,
            "causal connective introduced",
        )
    } else {
        check(
            "causality_invariance",
            CheckStatus::Warning,
            "causal connective dropped",
        )
    }
}

/// Safety-relevant words must survive the rewrite. Dropping "recall" from a
/// product-recall story is not neutralization, it is a new article.
fn risk_invariance(original: &str, rewritten: &str) -> CheckResult {
    let orig: HashSet<String> = tokens_lower(original).into_iter().collect();
    let rew: HashSet<String> = tokens_lower(rewritten).into_iter().collect();
    let dropped: Vec<&&str> = RISK_INDICATORS
        .iter()
        .filter(|w| orig.contains(**w) && !rew.contains(**w))
        .collect();
    if dropped.is_empty() {
        check("risk_invariance", CheckStatus::Passed, "safety indicators preserved")
    } else {
        check(
            "risk_invariance",
            CheckStatus::Failed,
            format!("safety indicators dropped: {dropped:?}"),
        )
    }
}

fn quote_integrity(original: &str, rewritten: &str) -> CheckResult {
    let mut altered = Vec::new();
    for caps in QUOTE_RE.captures_iter(original) {
        let inner = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        if inner.len() < MIN_QUOTE_LEN {
            continue;
        }
        if !rewritten.contains(inner) {
            altered.push(inner.to_string());
        }
    }
    if altered.is_empty() {
        check("quote_integrity", CheckStatus::Passed, "all quotes verbatim")
    } else {
        check(
            "quote_integrity",
            CheckStatus::Failed,
            format!("quotes altered or dropped: {altered:?}"),
        )
    }
}

fn scope_invariance(original: &str, rewritten: &str) -> CheckResult {
    let orig = token_counts(original);
    let rew = token_counts(rewritten);
    let narrowed: Vec<&&str> = QUANTIFIERS
        .iter()
        .filter(|q| rew.get(**q).copied().unwrap_or(0) < orig.get(**q).copied().unwrap_or(0))
        .collect();
    if narrowed.is_empty() {
        check("scope_invariance", CheckStatus::Passed, "quantifier scope unchanged")
    } else {
        check(
            "scope_invariance",
            CheckStatus::Warning,
            format!("quantifier counts decreased: {narrowed:?}"),
        )
    }
}

fn negation_integrity(original: &str, rewritten: &str) -> CheckResult {
    let orig = token_counts(original);
    let rew = token_counts(rewritten);
    let dropped: Vec<&&str> = NEGATIONS
        .iter()
        .filter(|n| rew.get(**n).copied().unwrap_or(0) < orig.get(**n).copied().unwrap_or(0))
        .collect();
    if dropped.is_empty() {
        check("negation_integrity", CheckStatus::Passed, "negations preserved")
    } else {
        check(
            "negation_integrity",
            CheckStatus::Failed,
            format!("negations dropped: {dropped:?}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trip_passes_strict() {
        let texts = [
            "",
            "Plain sentence.",
            "Mayor Johnson said the 2024 budget \"will not be cut\" despite warnings.",
            "Some say the recall, announced Tuesday, may never happen.",
        ];
        for text in texts {
            let result = validate(text, text, true);
            assert!(result.passed, "identity failed for {text:?}: {:?}", result.failures);
            assert_eq!(result.risk, RiskLevel::None);
        }
    }

    #[test]
    fn removing_a_negation_fails_hard() {
        let result = validate("X did not do Y", "X did Y", false);
        assert!(!result.passed);
        assert_eq!(
            result.check("negation_integrity").unwrap().status,
            CheckStatus::Failed
        );
    }

    #[test]
    fn upgrading_a_soft_modal_fails_modality() {
        let result = validate("allegedly stole", "definitely stole", true);
        assert!(!result.passed);
        assert_eq!(
            result.check("modality_invariance").unwrap().status,
            CheckStatus::Failed
        );
    }

    #[test]
    fn modality_upgrade_is_not_critical_in_lenient_mode() {
        let result = validate("allegedly stole", "definitely stole", false);
        assert!(result.passed);
        assert_eq!(result.risk, RiskLevel::Medium);
    }

    #[test]
    fn verbatim_quote_passes_one_char_edit_fails() {
        let original = r#"She said "the investigation is ongoing" on Monday."#;
        let preserved = r#"On Monday she said "the investigation is ongoing"."#;
        let altered = r#"She said "the investigation is ending" on Monday."#;

        let ok = validate(original, preserved, true);
        assert_eq!(ok.check("quote_integrity").unwrap().status, CheckStatus::Passed);

        let bad = validate(original, altered, false);
        assert!(!bad.passed);
        assert_eq!(bad.check("quote_integrity").unwrap().status, CheckStatus::Failed);
    }

    #[test]
    fn short_quotes_are_ignored() {
        let result = validate(r#"The "best" plan."#, "The best plan.", true);
        assert_eq!(
            result.check("quote_integrity").unwrap().status,
            CheckStatus::Passed
        );
    }

    #[test]
    fn dropping_an_entity_fails() {
        let result = validate(
            "Senator Warren questioned the director of Acme Corporation.",
            "The senator questioned the director.",
            false,
        );
        assert!(!result.passed);
        assert_eq!(
            result.check("entity_invariance").unwrap().status,
            CheckStatus::Failed
        );
    }

    #[test]
    fn dropping_a_number_fails() {
        let result = validate(
            "The budget fell by 12% over three years.",
            "The budget fell over the years.",
            false,
        );
        assert!(!result.passed);
        let detail = &result.check("number_invariance").unwrap().detail;
        assert!(detail.contains("12%") || detail.contains("three"), "{detail}");
    }

    #[test]
    fn dropping_a_date_fails_strict_only() {
        let original = "The hearing happened in March 2023.";
        let rewritten = "The hearing happened last year.";
        let strict = validate(original, rewritten, true);
        assert!(!strict.passed);
        assert_eq!(
            strict.check("date_invariance").unwrap().status,
            CheckStatus::Failed
        );
    }

    #[test]
    fn dropping_a_risk_word_fails_hard() {
        let original = "Officials issued a recall after the outbreak.";
        let rewritten = "Officials acted after the incident.";

        let strict = validate(original, rewritten, true);
        assert!(!strict.passed);
        assert_eq!(
            strict.check("risk_invariance").unwrap().status,
            CheckStatus::Failed
        );

        // Outside the critical subset: lenient mode records the failure but
        // does not block.
        let lenient = validate(original, rewritten, false);
        assert!(lenient.passed);
        assert!(lenient.failures.contains(&"risk_invariance".to_string()));
    }

    #[test]
    fn narrowing_scope_warns_but_passes_lenient() {
        let result = validate(
            "All council members objected, and many residents agreed.",
            "Council members objected, and residents agreed.",
            false,
        );
        assert!(result.passed);
        assert_eq!(
            result.check("scope_invariance").unwrap().status,
            CheckStatus::Warning
        );
    }

    #[test]
    fn dropping_attribution_warns() {
        let result = validate(
            "The figure is wrong, according to the auditor.",
            "The figure is wrong.",
            false,
        );
        assert_eq!(
            result.check("attribution_invariance").unwrap().status,
            CheckStatus::Warning
        );
    }

    #[test]
    fn introducing_causality_warns() {
        let result = validate(
            "Prices rose. The strike continued.",
            "Prices rose because the strike continued.",
            false,
        );
        assert_eq!(
            result.check("causality_invariance").unwrap().status,
            CheckStatus::Warning
        );
    }

    #[test]
    fn risk_escalates_with_failure_count() {
        // Three independent failures: negation, number, risk indicator.
        let result = validate(
            "The recall is not optional; 500 units are affected.",
            "The action is optional; some units are affected.",
            false,
        );
        assert!(result.failures.len() >= 3, "{:?}", result.failures);
        assert_eq!(result.risk, RiskLevel::Critical);
    }
}
