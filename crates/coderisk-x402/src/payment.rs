//! Wire types for the 402 Payment Required challenge.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::config::GateConfig;
use crate::pricing::PriceTier;
use crate::registry::{STABLECOIN_DECIMALS, STABLECOIN_NAME};

/// x402 protocol version advertised in challenges.
pub const X402_VERSION: u32 = 1;

/// Payment scheme offered: an exact-amount stablecoin transfer.
pub const CHALLENGE_SCHEME: &str = "exact";

/// How long a challenge's terms are guaranteed to be honored.
pub const CHALLENGE_TIMEOUT_SECONDS: u64 = 60;

/// Settlement token metadata in the `extra` field of an offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StablecoinInfo {
    pub name: String,
    pub decimals: u32,
}

/// A single entry in the `accepts` array of a 402 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeOffer {
    pub scheme: String,
    pub network: String,
    /// Required amount as an integer minor-units string.
    pub max_amount_required: String,
    pub resource: String,
    pub pay_to: Address,
    pub max_timeout_seconds: u64,
    pub extra: StablecoinInfo,
}

/// The 402 response body. Built fresh for every rejected request, never
/// persisted; restates the exact price and destination so the caller can
/// retry without re-deriving configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChallenge {
    pub error: String,
    #[serde(rename = "x402-version")]
    pub x402_version: u32,
    pub accepts: Vec<ChallengeOffer>,
    /// Machine-readable reason a presented proof was rejected, if one was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub description: String,
}

impl PaymentChallenge {
    /// Build a challenge for the given tier.
    pub fn build(
        config: &GateConfig,
        tier: PriceTier,
        reason: Option<&str>,
        detail: Option<String>,
    ) -> Self {
        let price = config.prices.for_tier(tier);
        Self {
            error: "Payment Required".to_string(),
            x402_version: X402_VERSION,
            accepts: vec![ChallengeOffer {
                scheme: CHALLENGE_SCHEME.to_string(),
                network: config.network.id.to_string(),
                max_amount_required: price.minor_units.to_string(),
                resource: format!("usdc:{}", config.network.stablecoin),
                pay_to: config.pay_to,
                max_timeout_seconds: CHALLENGE_TIMEOUT_SECONDS,
                extra: StablecoinInfo {
                    name: STABLECOIN_NAME.to_string(),
                    decimals: STABLECOIN_DECIMALS,
                },
            }],
            reason: reason.map(String::from),
            detail,
            description: format!(
                "Pay ${} {} on {} to access this endpoint ({} tier).",
                price.text,
                STABLECOIN_NAME,
                config.network.display_name,
                tier.as_str()
            ),
        }
    }
}
