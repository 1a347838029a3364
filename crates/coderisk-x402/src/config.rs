//! Typed configuration snapshot for the payment gate.
//!
//! Built once at startup by [`GateConfig::from_env`]; every cross-field
//! invariant is checked at construction so a misconfigured service never
//! accepts traffic.

use std::env;

use alloy::primitives::Address;
use url::Url;

use crate::error::ConfigError;
use crate::pricing::TierPrices;
use crate::registry::{self, ResolvedNetwork};

const DEFAULT_NETWORK: &str = registry::BASE_MAINNET;
const DEFAULT_PRICE_BASIC: &str = "0.25";
const DEFAULT_PRICE_PREMIUM: &str = "0.50";
const DEFAULT_PRICE_PIPELINE: &str = "1.00";
const DEFAULT_CONFIRMATIONS: u64 = 2;

/// Billing mode of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    Test,
    Live,
}

impl ServiceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceMode::Test => "test",
            ServiceMode::Live => "live",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "test" => ServiceMode::Test,
            _ => ServiceMode::Live,
        }
    }
}

/// Immutable gate configuration. No lazily computed fields: the network is
/// resolved (overrides applied) and prices are converted to minor units here.
#[derive(Clone)]
pub struct GateConfig {
    pub mode: ServiceMode,
    /// Global payment enforcement switch. Off means every request bypasses.
    pub require_payment: bool,
    pub network: ResolvedNetwork,
    /// Address payments must be made to.
    pub pay_to: Address,
    pub prices: TierPrices,
    /// When false, any syntactically valid proof is accepted without a chain
    /// lookup. Development posture only; see [`GateConfig::from_env`].
    pub verify_on_chain: bool,
    pub min_confirmations: u64,
    /// Credential granting the owner-override bypass.
    pub owner_key: Option<String>,
    /// Shared secret granting the trusted-caller bypass.
    pub trusted_key: Option<String>,
}

impl std::fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateConfig")
            .field("mode", &self.mode)
            .field("require_payment", &self.require_payment)
            .field("network", &self.network)
            .field("pay_to", &self.pay_to)
            .field("prices", &self.prices)
            .field("verify_on_chain", &self.verify_on_chain)
            .field("min_confirmations", &self.min_confirmations)
            .field("owner_key", &self.owner_key.as_ref().map(|_| "[REDACTED]"))
            .field(
                "trusted_key",
                &self.trusted_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn flag_env(key: &str) -> bool {
    opt_env(key).map(|v| v == "true" || v == "1").unwrap_or(false)
}

impl GateConfig {
    /// Build the configuration from the environment, validating everything
    /// up front.
    ///
    /// Environment surface:
    /// - `SERVICE_MODE` — "test" or "live" (default live)
    /// - `REQUIRE_PAYMENT` — "0" disables the paywall entirely (default on)
    /// - `X402_NETWORK` — CAIP-2 network id (default eip155:8453)
    /// - `X402_PAY_TO` — payee address, required
    /// - `PRICE_BASIC` / `PRICE_PREMIUM` / `PRICE_PIPELINE` — decimal USDC
    /// - `X402_VERIFY_ONCHAIN` — "0" switches to header-only checking
    /// - `X402_CONFIRMATIONS` — minimum confirmation depth (default 2)
    /// - `RPC_URL` / `STABLECOIN_ADDRESS` — per-deployment network overrides
    /// - `OWNER_KEY` / `TRUSTED_CALLER_KEY` — bypass credentials
    /// - `X402_INSECURE_HEADER_ONLY` — explicit opt-in required to run
    ///   header-only verification while live and enforcing
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = ServiceMode::parse(&opt_env("SERVICE_MODE").unwrap_or_default());
        let require_payment = opt_env("REQUIRE_PAYMENT").map(|v| v != "0").unwrap_or(true);

        let network_id = opt_env("X402_NETWORK").unwrap_or_else(|| DEFAULT_NETWORK.to_string());
        let network = registry::lookup(&network_id)?;

        let rpc_override = match opt_env("RPC_URL") {
            Some(raw) => {
                Url::parse(&raw).map_err(|_| ConfigError::InvalidUrl(raw.clone()))?;
                Some(raw)
            }
            None => None,
        };
        let stablecoin_override = match opt_env("STABLECOIN_ADDRESS") {
            Some(raw) => Some(
                raw.parse::<Address>()
                    .map_err(|_| ConfigError::InvalidAddress(raw))?,
            ),
            None => None,
        };
        let network = network.resolve(rpc_override, stablecoin_override);

        let pay_to_raw =
            opt_env("X402_PAY_TO").ok_or(ConfigError::MissingRequired("X402_PAY_TO"))?;
        let pay_to: Address = pay_to_raw
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(pay_to_raw))?;

        let prices = TierPrices::new(
            &opt_env("PRICE_BASIC").unwrap_or_else(|| DEFAULT_PRICE_BASIC.to_string()),
            &opt_env("PRICE_PREMIUM").unwrap_or_else(|| DEFAULT_PRICE_PREMIUM.to_string()),
            &opt_env("PRICE_PIPELINE").unwrap_or_else(|| DEFAULT_PRICE_PIPELINE.to_string()),
        )?;

        let verify_on_chain = opt_env("X402_VERIFY_ONCHAIN").map(|v| v != "0").unwrap_or(true);
        let min_confirmations = opt_env("X402_CONFIRMATIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CONFIRMATIONS)
            .max(1);

        let config = Self {
            mode,
            require_payment,
            network,
            pay_to,
            prices,
            verify_on_chain,
            min_confirmations,
            owner_key: opt_env("OWNER_KEY"),
            trusted_key: opt_env("TRUSTED_CALLER_KEY"),
        };

        // Header-only checking accepts any well-formed hash as payment. It
        // must never silently coexist with live enforcement.
        if config.enforcing() && !config.verify_on_chain {
            if flag_env("X402_INSECURE_HEADER_ONLY") {
                tracing::warn!(
                    "X402_INSECURE_HEADER_ONLY=true — payment proofs are NOT checked on chain. \
                     DO NOT use this in production!"
                );
            } else {
                return Err(ConfigError::InsecureVerification);
            }
        }

        Ok(config)
    }

    /// True when payments are actually demanded: live mode with the paywall on.
    pub fn enforcing(&self) -> bool {
        self.require_payment && self.mode == ServiceMode::Live
    }
}
