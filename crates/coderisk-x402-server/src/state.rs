use std::sync::Arc;

use alloy::providers::RootProvider;

use x402gate::{GateConfig, PaymentGate, ResultSigner, UsageCounters};

use crate::analyzer::CodeAnalyzer;

/// Shared application state.
pub struct AppState {
    pub config: Arc<GateConfig>,
    pub gate: PaymentGate<RootProvider>,
    /// Same provider the gate verifies against; used by the health probe.
    pub provider: RootProvider,
    pub counters: Arc<UsageCounters>,
    pub analyzer: Arc<dyn CodeAnalyzer>,
    /// Present when a result signing key is configured.
    pub signer: Option<ResultSigner>,
    /// Bearer token guarding the /metrics endpoint (None = no token set).
    pub metrics_token: Option<String>,
    /// Explicit opt-in to serve /metrics without a token.
    pub public_metrics: bool,
}
