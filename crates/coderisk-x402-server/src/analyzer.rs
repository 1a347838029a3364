//! Seam to the static analyzers.
//!
//! The gate treats the analysis itself as an external collaborator: it only
//! needs an opaque result value it can canonicalize, hash, and return. Wire a
//! real analyzer by implementing [`CodeAnalyzer`] and injecting it into the
//! application state.

use serde::Deserialize;
use serde_json::{json, Value};

/// Body of a `POST /analyze` request.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub code: String,
    pub language: Option<String>,
    pub context: Option<String>,
    pub mode: Option<String>,
}

/// Body of a `POST /scan-dependencies` request.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    pub manifest: String,
    pub lockfile: Option<String>,
    pub mode: Option<String>,
}

/// Produces a risk verdict for submitted code or dependency manifests.
pub trait CodeAnalyzer: Send + Sync {
    fn analyze(&self, request: &AnalyzeRequest) -> Value;
    fn scan_dependencies(&self, request: &ScanRequest) -> Value;
}

/// Placeholder analyzer: returns a fixed REVIEW verdict with no findings.
/// The detection heuristics are intentionally out of scope here.
pub struct NoopAnalyzer;

impl CodeAnalyzer for NoopAnalyzer {
    fn analyze(&self, request: &AnalyzeRequest) -> Value {
        json!({
            "decision": "REVIEW",
            "overallRisk": "unknown",
            "findings": [],
            "language": request.language,
        })
    }

    fn scan_dependencies(&self, _request: &ScanRequest) -> Value {
        json!({
            "decision": "REVIEW",
            "overallRisk": "unknown",
            "findings": [],
        })
    }
}
