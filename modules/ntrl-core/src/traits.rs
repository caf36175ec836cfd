// Seam traits for the detection and rewrite stages.
//
// Detector — one detection pass over one segment. Concrete implementations
//   (lexical, structural, semantic) are selected at construction time and
//   injected into the Scanner; no runtime string dispatch.
// Generator — one rewrite producer. The Fixer holds one per output surface
//   plus the deterministic rule-based fallback.
//
// Both enable deterministic testing with StaticModel-backed instances:
// no network, no API keys. `cargo test` in seconds.

use anyhow::Result;
use async_trait::async_trait;

use ntrl_common::{DetectorSource, MergedScanResult, ScanResult, Segment};

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Detector: Send + Sync {
    fn source(&self) -> DetectorSource;

    /// Scan one segment. Implementations degrade internally where they can;
    /// a returned error means this detector found nothing this round and the
    /// scan as a whole continues.
    async fn detect(&self, text: &str, segment: Segment) -> Result<ScanResult>;
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Inputs shared by every generator. The scan is optional: the brief and feed
/// generators summarize without span guidance.
#[derive(Debug, Clone, Copy)]
pub struct RewriteRequest<'a> {
    pub body: &'a str,
    pub title: &'a str,
    pub deck: Option<&'a str>,
    pub scan: Option<&'a MergedScanResult>,
}

/// A raw edit reported by a generator, before it is joined back to the
/// detection that motivated it.
#[derive(Debug, Clone, Default)]
pub struct RawChange {
    /// Detection UUID echoed back by the model, when it attributed the edit.
    pub detection_id: Option<String>,
    pub before: String,
    pub after: String,
    pub action: Option<String>,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GeneratorOutput {
    /// Main text output: the rewrite for the full generator, the synthesis
    /// for the brief generator, empty for the feed generator.
    pub text: String,
    pub feed_title: Option<String>,
    pub feed_summary: Option<String>,
    pub changes: Vec<RawChange>,
    /// Model identifier for transparency reporting, when an LLM was used.
    pub model: Option<String>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, req: RewriteRequest<'_>) -> Result<GeneratorOutput>;
}
