//! The payment gate: admission control for paid endpoints.

use std::sync::Arc;

use alloy::providers::Provider;

use crate::bypass::{self, BypassSource};
use crate::config::GateConfig;
use crate::counters::UsageCounters;
use crate::payment::PaymentChallenge;
use crate::pricing::PriceTier;
use crate::replay::ReplayLedger;
use crate::verifier::{parse_proof_reference, OnChainVerifier, VerifiedPayment};

/// Everything the gate needs to know about one request.
#[derive(Debug, Clone, Default)]
pub struct GateRequest {
    /// Path or operation name, for logging only.
    pub resource: String,
    /// Dependency-scan requests always price at Premium.
    pub dependency_scan: bool,
    /// Caller-declared mode ("basic" / "premium" / "pipeline").
    pub mode: Option<String>,
    /// Payment proof header: a transaction hash.
    pub payment_proof: Option<String>,
    /// Owner-override credential header.
    pub owner_key: Option<String>,
    /// Trusted-caller secret header.
    pub trusted_key: Option<String>,
}

/// A request admitted past the gate.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub tier: PriceTier,
    /// False only for the unverified test-mode bypass.
    pub verified: bool,
    pub bypass: Option<BypassSource>,
    /// Present when an on-chain payment was actually verified.
    pub payment: Option<VerifiedPayment>,
}

/// A request the gate turned away.
#[derive(Debug)]
pub enum GateRejection {
    /// Payment missing or rejected: respond 402 with the challenge.
    PaymentRequired(Box<PaymentChallenge>),
    /// The payment could not be checked: respond with a 5xx-class status,
    /// never a payment challenge, so the caller knows a retry may succeed.
    Infrastructure(String),
}

/// Orchestrates tier resolution, bypass policy, and payment verification.
pub struct PaymentGate<P> {
    config: Arc<GateConfig>,
    verifier: OnChainVerifier<P>,
    counters: Arc<UsageCounters>,
}

impl<P> PaymentGate<P> {
    pub fn new(
        config: Arc<GateConfig>,
        provider: P,
        ledger: Arc<dyn ReplayLedger>,
        counters: Arc<UsageCounters>,
    ) -> Self {
        let verifier = OnChainVerifier::new(
            provider,
            config.network.clone(),
            config.pay_to,
            ledger,
        );
        Self {
            config,
            verifier,
            counters,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    fn challenge(
        &self,
        tier: PriceTier,
        reason: Option<&str>,
        detail: Option<String>,
    ) -> GateRejection {
        GateRejection::PaymentRequired(Box::new(PaymentChallenge::build(
            &self.config,
            tier,
            reason,
            detail,
        )))
    }
}

impl<P: Provider> PaymentGate<P> {
    /// Admit or reject one request.
    pub async fn admit(&self, request: &GateRequest) -> Result<AccessGrant, GateRejection> {
        self.counters.record_request();
        let tier = PriceTier::resolve(request.dependency_scan, request.mode.as_deref());

        if let Some(decision) = bypass::resolve(&self.config, request, &self.counters) {
            return Ok(AccessGrant {
                tier,
                verified: decision.verified,
                bypass: Some(decision.source),
                payment: None,
            });
        }

        let proof = match request.payment_proof.as_deref() {
            Some(p) => p,
            None => return Err(self.challenge(tier, None, None)),
        };

        if !self.config.verify_on_chain {
            // Header-only development posture: syntax check only. Reachable
            // in an enforcing deployment solely through the explicit
            // X402_INSECURE_HEADER_ONLY opt-in validated at config time.
            return match parse_proof_reference(proof) {
                Ok(_) => {
                    self.counters.record_paid();
                    Ok(AccessGrant {
                        tier,
                        verified: true,
                        bypass: None,
                        payment: None,
                    })
                }
                Err(e) => Err(self.challenge(tier, Some(e.reason_code()), Some(e.to_string()))),
            };
        }

        let price = self.config.prices.for_tier(tier);
        match self
            .verifier
            .verify(proof, price.minor_units, self.config.min_confirmations)
            .await
        {
            Ok(payment) => {
                self.counters.record_paid();
                Ok(AccessGrant {
                    tier,
                    verified: true,
                    bypass: None,
                    payment: Some(payment),
                })
            }
            Err(e) if e.is_infrastructure() => {
                tracing::error!(resource = %request.resource, error = %e, "payment check unavailable");
                Err(GateRejection::Infrastructure(e.to_string()))
            }
            Err(e) => {
                tracing::info!(
                    resource = %request.resource,
                    reason = e.reason_code(),
                    "payment rejected"
                );
                Err(self.challenge(tier, Some(e.reason_code()), Some(e.to_string())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceMode;
    use crate::pricing::TierPrices;
    use crate::registry;
    use crate::replay::InMemoryReplayLedger;
    use alloy::primitives::Address;
    use alloy::providers::RootProvider;

    fn test_config(mode: ServiceMode, verify_on_chain: bool) -> GateConfig {
        GateConfig {
            mode,
            require_payment: true,
            network: registry::lookup(registry::BASE_SEPOLIA)
                .unwrap()
                .resolve(Some("http://localhost:1".to_string()), None),
            pay_to: Address::new([0x42; 20]),
            prices: TierPrices::new("0.25", "0.50", "1.00").unwrap(),
            verify_on_chain,
            min_confirmations: 2,
            owner_key: Some("owner-secret".to_string()),
            trusted_key: None,
        }
    }

    fn gate(config: GateConfig) -> PaymentGate<RootProvider> {
        let provider: RootProvider = RootProvider::new_http("http://localhost:1".parse().unwrap());
        PaymentGate::new(
            Arc::new(config),
            provider,
            Arc::new(InMemoryReplayLedger::new()),
            Arc::new(UsageCounters::new()),
        )
    }

    #[tokio::test]
    async fn missing_proof_yields_challenge_for_resolved_tier() {
        let gate = gate(test_config(ServiceMode::Live, true));
        let request = GateRequest {
            mode: Some("premium".to_string()),
            ..GateRequest::default()
        };
        match gate.admit(&request).await {
            Err(GateRejection::PaymentRequired(challenge)) => {
                assert_eq!(challenge.accepts[0].max_amount_required, "500000");
                assert!(challenge.reason.is_none());
            }
            other => panic!("expected 402 challenge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mode_passes_unverified() {
        let gate = gate(test_config(ServiceMode::Test, true));
        let grant = gate.admit(&GateRequest::default()).await.unwrap();
        assert!(!grant.verified);
        assert_eq!(grant.bypass, Some(BypassSource::TestMode));
        assert!(grant.payment.is_none());
    }

    #[tokio::test]
    async fn owner_credential_passes_verified() {
        let gate = gate(test_config(ServiceMode::Live, true));
        let request = GateRequest {
            owner_key: Some("owner-secret".to_string()),
            ..GateRequest::default()
        };
        let grant = gate.admit(&request).await.unwrap();
        assert!(grant.verified);
        assert_eq!(grant.bypass, Some(BypassSource::Owner));
    }

    #[tokio::test]
    async fn header_only_accepts_well_formed_proof() {
        let gate = gate(test_config(ServiceMode::Live, false));
        let request = GateRequest {
            payment_proof: Some(format!("0x{}", "ab".repeat(32))),
            ..GateRequest::default()
        };
        let grant = gate.admit(&request).await.unwrap();
        assert!(grant.verified);
        assert!(grant.bypass.is_none());
        assert!(grant.payment.is_none());
    }

    #[tokio::test]
    async fn header_only_rejects_malformed_proof() {
        let gate = gate(test_config(ServiceMode::Live, false));
        let request = GateRequest {
            payment_proof: Some("not-a-hash".to_string()),
            ..GateRequest::default()
        };
        match gate.admit(&request).await {
            Err(GateRejection::PaymentRequired(challenge)) => {
                assert_eq!(challenge.reason.as_deref(), Some("malformed_proof"));
            }
            other => panic!("expected 402 challenge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_proof_rejected_before_any_network_call() {
        // Provider points at a closed port: reaching the network would error
        // as infrastructure, so a clean 402 proves the early rejection.
        let gate = gate(test_config(ServiceMode::Live, true));
        let request = GateRequest {
            payment_proof: Some("0x1234".to_string()),
            ..GateRequest::default()
        };
        match gate.admit(&request).await {
            Err(GateRejection::PaymentRequired(challenge)) => {
                assert_eq!(challenge.reason.as_deref(), Some("malformed_proof"));
            }
            other => panic!("expected 402 challenge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rpc_failure_is_infrastructure_not_a_verdict() {
        let gate = gate(test_config(ServiceMode::Live, true));
        let request = GateRequest {
            payment_proof: Some(format!("0x{}", "cd".repeat(32))),
            ..GateRequest::default()
        };
        match gate.admit(&request).await {
            Err(GateRejection::Infrastructure(_)) => {}
            other => panic!("expected infrastructure rejection, got {other:?}"),
        }
    }
}
