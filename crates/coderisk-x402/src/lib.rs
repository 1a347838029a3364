//! Payment-gated access control for the code-risk analysis API.
//!
//! Implements HTTP 402 pay-per-request backed by on-chain USDC transfers:
//! a caller presents a transaction hash as proof of payment, the gate
//! verifies the transfer on chain (amount, payee, finality), and consumes
//! the proof so it can never buy a second request.
//!
//! # Request flow
//!
//! - [`PaymentGate`] — resolves the pricing tier, consults the bypass
//!   policy chain, and either admits the request or rejects it with a
//!   structured 402 challenge
//! - [`OnChainVerifier`] — checks a transaction reference against the
//!   configured network and records it in the [`ReplayLedger`]
//! - [`CanonicalResult`] / [`ResultHash`] — deterministic fingerprint of a
//!   paid analysis result, optionally signed
//!
//! # Quick example (gate)
//!
//! ```no_run
//! use std::sync::Arc;
//! use alloy::providers::RootProvider;
//! use x402gate::{GateConfig, GateRequest, InMemoryReplayLedger, PaymentGate, UsageCounters};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = Arc::new(GateConfig::from_env().unwrap());
//! let provider: RootProvider = RootProvider::new_http(config.network.rpc_url.parse().unwrap());
//! let gate = PaymentGate::new(
//!     config,
//!     provider,
//!     Arc::new(InMemoryReplayLedger::new()),
//!     Arc::new(UsageCounters::new()),
//! );
//!
//! let grant = gate.admit(&GateRequest::default()).await;
//! # let _ = grant;
//! # }
//! ```

pub mod bypass;
pub mod canonical;
pub mod config;
pub mod counters;
pub mod error;
pub mod gate;
pub mod payment;
pub mod pricing;
pub mod registry;
pub mod replay;
pub mod seal;
pub mod security;
pub mod verifier;

use alloy::sol;

// ERC-20 Transfer event, decoded from receipt logs when summing stablecoin
// payments to the payee.
sol! {
    #[derive(Debug)]
    event Transfer(address indexed from, address indexed to, uint256 value);
}

// Re-exports
pub use bypass::{BypassDecision, BypassSource};
pub use canonical::{CanonicalResult, Finding};
pub use config::{GateConfig, ServiceMode};
pub use counters::{UsageCounters, UsageSnapshot};
pub use error::{ConfigError, VerifyError};
pub use gate::{AccessGrant, GateRejection, GateRequest, PaymentGate};
pub use payment::{ChallengeOffer, PaymentChallenge, StablecoinInfo};
pub use pricing::{PriceTier, TierPrice, TierPrices};
pub use registry::{NetworkConfig, ResolvedNetwork};
pub use replay::{InMemoryReplayLedger, ReplayLedger};
pub use seal::{ResultHash, ResultSignature, ResultSigner};
pub use verifier::{OnChainVerifier, VerifiedPayment};
