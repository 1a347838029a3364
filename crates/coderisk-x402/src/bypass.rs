//! Bypass policy chain.
//!
//! Precedence is a data structure: an ordered slice of named policy
//! predicates, evaluated by one dispatcher, first match wins. A bypass never
//! touches the replay ledger.

use serde::Serialize;

use crate::config::{GateConfig, ServiceMode};
use crate::counters::UsageCounters;
use crate::gate::GateRequest;
use crate::security::constant_time_eq;

/// Which policy granted the bypass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BypassSource {
    TestMode,
    Owner,
    TrustedCaller,
}

impl BypassSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BypassSource::TestMode => "test-mode",
            BypassSource::Owner => "owner",
            BypassSource::TrustedCaller => "trusted-caller",
        }
    }
}

/// A granted bypass. `verified` distinguishes credentialed bypasses from the
/// unverified test-mode pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BypassDecision {
    pub source: BypassSource,
    pub verified: bool,
}

type BypassPolicy = fn(&GateConfig, &GateRequest) -> Option<BypassDecision>;

/// Ordered policy chain. Earlier entries win: a request in test mode passes
/// via test-mode even when it also carries a valid owner credential.
const POLICY_CHAIN: &[BypassPolicy] = &[test_mode, owner_override, trusted_caller];

fn test_mode(config: &GateConfig, _request: &GateRequest) -> Option<BypassDecision> {
    if config.mode == ServiceMode::Test || !config.require_payment {
        return Some(BypassDecision {
            source: BypassSource::TestMode,
            verified: false,
        });
    }
    None
}

fn owner_override(config: &GateConfig, request: &GateRequest) -> Option<BypassDecision> {
    credential_match(&config.owner_key, &request.owner_key).then_some(BypassDecision {
        source: BypassSource::Owner,
        verified: true,
    })
}

fn trusted_caller(config: &GateConfig, request: &GateRequest) -> Option<BypassDecision> {
    credential_match(&config.trusted_key, &request.trusted_key).then_some(BypassDecision {
        source: BypassSource::TrustedCaller,
        verified: true,
    })
}

fn credential_match(configured: &Option<String>, presented: &Option<String>) -> bool {
    match (configured, presented) {
        (Some(expected), Some(given)) => constant_time_eq(expected.as_bytes(), given.as_bytes()),
        _ => false,
    }
}

/// Run the policy chain. Verified bypasses count toward the paid-request
/// counter so usage accounting stays meaningful; test-mode does not.
pub fn resolve(
    config: &GateConfig,
    request: &GateRequest,
    counters: &UsageCounters,
) -> Option<BypassDecision> {
    let decision = POLICY_CHAIN
        .iter()
        .find_map(|policy| policy(config, request))?;
    if decision.verified {
        counters.record_paid();
    }
    tracing::debug!(source = decision.source.as_str(), "bypass granted");
    Some(decision)
}
