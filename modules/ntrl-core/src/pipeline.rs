use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use ai_client::{ChatModel, Claude};
use ntrl_common::{
    Config, MergedScanResult, PipelineResult, Segment, Taxonomy, TransparencyPackage,
};

use crate::detect::{LexicalDetector, LinguisticModel, SemanticDetector, StructuralDetector};
use crate::fixer::Fixer;
use crate::rewrite::{BriefGenerator, FeedGenerator, FullRewriteGenerator};
use crate::scan::Scanner;
use crate::traits::Detector;

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

// ---------------------------------------------------------------------------
// Result cache
// ---------------------------------------------------------------------------

/// Bounded result cache keyed by content hash. Eviction is deliberately
/// coarse: when the cache fills, the oldest half by insertion order is
/// dropped. Not LRU, and that is fine for this workload.
struct ResultCache {
    capacity: usize,
    map: HashMap<String, PipelineResult>,
    order: VecDeque<String>,
}

impl ResultCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(2),
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &str) -> Option<PipelineResult> {
        self.map.get(key).cloned()
    }

    fn insert(&mut self, key: String, value: PipelineResult) {
        if !self.map.contains_key(&key) {
            self.order.push_back(key.clone());
        }
        self.map.insert(key, value);

        if self.map.len() > self.capacity {
            let drop_count = self.map.len() / 2;
            for _ in 0..drop_count {
                if let Some(old) = self.order.pop_front() {
                    self.map.remove(&old);
                }
            }
            info!(dropped = drop_count, retained = self.map.len(), "Result cache evicted");
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Scan → fix sequencing for one article, with content-hash caching and
/// transparency reporting. A pipeline without a fixer is in scan-only mode
/// and returns the original text unchanged.
pub struct Pipeline {
    scanner: Scanner,
    fixer: Option<Fixer>,
    /// Model identifiers surfaced in the transparency package.
    models: Vec<String>,
    cache: Mutex<ResultCache>,
}

impl Pipeline {
    pub fn new(scanner: Scanner, fixer: Option<Fixer>, models: Vec<String>) -> Self {
        Self::with_cache_capacity(scanner, fixer, models, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(
        scanner: Scanner,
        fixer: Option<Fixer>,
        models: Vec<String>,
        capacity: usize,
    ) -> Self {
        Self {
            scanner,
            fixer,
            models,
            cache: Mutex::new(ResultCache::new(capacity)),
        }
    }

    /// Wire the full production pipeline from configuration: taxonomy,
    /// linguistic model, the three detectors, and the three generators.
    pub fn from_config(config: &Config) -> Self {
        let taxonomy = Arc::new(Taxonomy::builtin());
        let linguistic = Arc::new(LinguisticModel::load());

        let detector_model: Arc<dyn ChatModel> = Arc::new(Claude::new(
            &config.anthropic_api_key,
            &config.detector_model,
        ));
        let rewrite_model: Arc<dyn ChatModel> = Arc::new(
            Claude::new(&config.anthropic_api_key, &config.rewrite_model).with_max_tokens(8192),
        );

        let detectors: Vec<Arc<dyn Detector>> = vec![
            Arc::new(LexicalDetector::new(&taxonomy)),
            Arc::new(StructuralDetector::new(linguistic, Arc::clone(&taxonomy))),
            Arc::new(SemanticDetector::new(
                Arc::clone(&detector_model),
                Arc::clone(&taxonomy),
                config.semantic_char_budget,
            )),
        ];
        let scanner = Scanner::new(detectors, Duration::from_secs(config.scan_timeout_secs))
            .with_overlap_threshold(config.overlap_threshold);

        let fixer = (!config.scan_only).then(|| {
            Fixer::new(
                Arc::new(FullRewriteGenerator::new(Arc::clone(&rewrite_model))),
                Arc::new(BriefGenerator::new(Arc::clone(&detector_model))),
                Arc::new(FeedGenerator::new(Arc::clone(&detector_model))),
                config.max_fix_retries,
                config.strict_validation,
            )
        });

        let models = vec![
            detector_model.model_id().to_string(),
            rewrite_model.model_id().to_string(),
        ];

        Self::with_cache_capacity(scanner, fixer, models, config.cache_capacity)
    }

    pub async fn process(
        &self,
        body: &str,
        title: &str,
        deck: Option<&str>,
        force: bool,
    ) -> PipelineResult {
        let started = Instant::now();
        let content_hash = content_hash(title, body);

        if !force {
            let cached = match self.cache.lock() {
                Ok(cache) => cache.get(&content_hash),
                Err(_) => {
                    warn!("Result cache lock poisoned, bypassing");
                    None
                }
            };
            if let Some(mut hit) = cached {
                hit.from_cache = true;
                info!(content_hash = %content_hash, "Pipeline cache hit");
                return hit;
            }
        }

        let (body_scan, title_scan) = self.scan_only(body, title).await;

        let fix = match &self.fixer {
            Some(fixer) => Some(fixer.fix(body, title, deck, &body_scan).await),
            None => None,
        };

        let transparency = build_transparency(
            body,
            title,
            &body_scan,
            title_scan.as_ref(),
            self.models.clone(),
        );

        let result = PipelineResult {
            body_scan,
            title_scan,
            fix,
            transparency,
            content_hash: content_hash.clone(),
            from_cache: false,
            processed_at: chrono::Utc::now(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(content_hash, result.clone());
        }

        info!(
            detections = result.body_scan.stats.total,
            fixed = result.fix.is_some(),
            elapsed_ms = result.elapsed_ms,
            "Pipeline complete"
        );
        result
    }

    /// Scan without fixing. Body and title are scanned concurrently; an empty
    /// title skips the title scan.
    pub async fn scan_only(
        &self,
        body: &str,
        title: &str,
    ) -> (MergedScanResult, Option<MergedScanResult>) {
        tokio::join!(self.scanner.scan(body, Segment::Body), async {
            if title.trim().is_empty() {
                None
            } else {
                Some(self.scanner.scan(title, Segment::Title).await)
            }
        })
    }
}

fn content_hash(title: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update([0x1f]);
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Transparency
// ---------------------------------------------------------------------------

/// Minimum matching detections before an epistemic flag is raised.
const FLAG_THRESHOLD: usize = 3;
const SENSATIONAL_FLAG_THRESHOLD: usize = 5;

fn build_transparency(
    body: &str,
    title: &str,
    body_scan: &MergedScanResult,
    title_scan: Option<&MergedScanResult>,
    models: Vec<String>,
) -> TransparencyPackage {
    let all_detections = body_scan
        .detections
        .iter()
        .chain(title_scan.iter().flat_map(|s| s.detections.iter()));

    let mut by_category: HashMap<String, usize> = HashMap::new();
    let mut by_severity: HashMap<u8, usize> = HashMap::new();
    let mut prefix_counts: HashMap<String, usize> = HashMap::new();
    let mut total = 0usize;

    for det in all_detections {
        total += 1;
        if let Some(code) = det.type_id.chars().next() {
            *by_category.entry(code.to_string()).or_default() += 1;
        }
        if let Some((prefix, _)) = det.type_id.rsplit_once('.') {
            *prefix_counts.entry(prefix.to_string()).or_default() += 1;
        }
        *by_severity.entry(det.severity).or_default() += 1;
    }

    // Detections per ~5-char word estimate, x100.
    let words = ((body.len() + title.len()) / 5).max(1);
    let density = total as f64 / words as f64 * 100.0;

    let mut flags = Vec::new();
    if prefix_counts.get("D.1").copied().unwrap_or(0) >= FLAG_THRESHOLD {
        flags.push("anonymous_source_heavy".to_string());
    }
    if prefix_counts.get("E.1").copied().unwrap_or(0) >= FLAG_THRESHOLD {
        flags.push("absolutist_language".to_string());
    }
    if prefix_counts.get("C.2").copied().unwrap_or(0) >= FLAG_THRESHOLD {
        flags.push("hidden_agency_heavy".to_string());
    }
    if by_category.get("A").copied().unwrap_or(0) >= SENSATIONAL_FLAG_THRESHOLD {
        flags.push("sensational_framing".to_string());
    }

    TransparencyPackage {
        detections_by_category: by_category,
        detections_by_severity: by_severity,
        manipulation_density: density,
        epistemic_flags: flags,
        models,
    }
}
