//! Pricing tiers and decimal-to-minor-unit conversion.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::registry::STABLECOIN_DECIMALS;

/// Pricing tier for a gated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier {
    Basic,
    Premium,
    Pipeline,
}

impl PriceTier {
    /// Resolve the tier for a request. A dependency scan is always Premium;
    /// otherwise the caller-supplied mode selects the tier, case-insensitively,
    /// with Basic as the default for anything missing or unrecognized.
    pub fn resolve(dependency_scan: bool, mode: Option<&str>) -> Self {
        if dependency_scan {
            return PriceTier::Premium;
        }
        match mode.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
            Some("premium") => PriceTier::Premium,
            Some("pipeline") => PriceTier::Pipeline,
            _ => PriceTier::Basic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceTier::Basic => "basic",
            PriceTier::Premium => "premium",
            PriceTier::Pipeline => "pipeline",
        }
    }
}

/// Convert a decimal price string (e.g. "0.25", "$1.00") into integer minor
/// units at 6 decimals. Integer-only parsing: the fractional part is padded
/// or truncated to exactly 6 digits, and no f64 appears anywhere.
pub fn to_minor_units(price: &str) -> Result<u64, ConfigError> {
    // Strip non-numeric characters (except '.') — tolerates "$0.25" etc.
    let cleaned: String = price
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if cleaned.is_empty() {
        return Err(ConfigError::InvalidPrice(format!(
            "'{price}': no numeric content"
        )));
    }

    let invalid = |detail: &str| ConfigError::InvalidPrice(format!("'{price}': {detail}"));
    let overflow = || ConfigError::InvalidPrice(format!("'{price}': overflow"));

    let decimals = STABLECOIN_DECIMALS as usize;
    let multiplier = 10u64.pow(STABLECOIN_DECIMALS);

    match cleaned.split_once('.') {
        Some((integer_part, fractional_part)) => {
            let integer: u64 = if integer_part.is_empty() {
                0
            } else {
                integer_part
                    .parse()
                    .map_err(|e| invalid(&format!("integer part: {e}")))?
            };

            // Truncate beyond 6 fractional digits, scale up anything shorter.
            let frac_str = if fractional_part.len() >= decimals {
                &fractional_part[..decimals]
            } else {
                fractional_part
            };
            let fractional: u64 = if frac_str.is_empty() {
                0
            } else {
                frac_str
                    .parse()
                    .map_err(|e| invalid(&format!("fractional part: {e}")))?
            };
            let scale = 10u64.pow((decimals - frac_str.len()) as u32);

            integer
                .checked_mul(multiplier)
                .and_then(|i| fractional.checked_mul(scale).and_then(|f| i.checked_add(f)))
                .ok_or_else(overflow)
        }
        None => {
            let integer: u64 = cleaned.parse().map_err(|e| invalid(&format!("{e}")))?;
            integer.checked_mul(multiplier).ok_or_else(overflow)
        }
    }
}

/// A tier's price, both as the configured decimal string and as minor units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPrice {
    pub text: String,
    pub minor_units: u64,
}

impl TierPrice {
    fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            text: text.to_string(),
            minor_units: to_minor_units(text)?,
        })
    }
}

/// Validated per-tier price table, built once at configuration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPrices {
    pub basic: TierPrice,
    pub premium: TierPrice,
    pub pipeline: TierPrice,
}

impl TierPrices {
    pub fn new(basic: &str, premium: &str, pipeline: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            basic: TierPrice::parse(basic)?,
            premium: TierPrice::parse(premium)?,
            pipeline: TierPrice::parse(pipeline)?,
        })
    }

    pub fn for_tier(&self, tier: PriceTier) -> &TierPrice {
        match tier {
            PriceTier::Basic => &self.basic,
            PriceTier::Premium => &self.premium,
            PriceTier::Pipeline => &self.pipeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_scan_always_premium() {
        assert_eq!(PriceTier::resolve(true, None), PriceTier::Premium);
        assert_eq!(PriceTier::resolve(true, Some("basic")), PriceTier::Premium);
        assert_eq!(
            PriceTier::resolve(true, Some("pipeline")),
            PriceTier::Premium
        );
    }

    #[test]
    fn mode_selects_tier_case_insensitively() {
        assert_eq!(PriceTier::resolve(false, Some("PREMIUM")), PriceTier::Premium);
        assert_eq!(
            PriceTier::resolve(false, Some("Pipeline")),
            PriceTier::Pipeline
        );
        assert_eq!(PriceTier::resolve(false, Some("basic")), PriceTier::Basic);
    }

    #[test]
    fn unrecognized_mode_defaults_basic() {
        assert_eq!(PriceTier::resolve(false, None), PriceTier::Basic);
        assert_eq!(PriceTier::resolve(false, Some("")), PriceTier::Basic);
        assert_eq!(PriceTier::resolve(false, Some("gold")), PriceTier::Basic);
    }

    #[test]
    fn minor_units_conversion() {
        assert_eq!(to_minor_units("0.002").unwrap(), 2000);
        assert_eq!(to_minor_units("0.25").unwrap(), 250_000);
        assert_eq!(to_minor_units("$0.50").unwrap(), 500_000);
        assert_eq!(to_minor_units("1.00").unwrap(), 1_000_000);
        assert_eq!(to_minor_units("1").unwrap(), 1_000_000);
        assert_eq!(to_minor_units("0.000001").unwrap(), 1);
    }

    #[test]
    fn minor_units_truncates_beyond_six_digits() {
        assert_eq!(to_minor_units("0.0000019").unwrap(), 1);
    }

    #[test]
    fn minor_units_rejects_empty_and_overflow() {
        assert!(to_minor_units("$").is_err());
        assert!(to_minor_units("abc").is_err());
        assert!(to_minor_units("99999999999999999999").is_err());
    }

    #[test]
    fn tier_prices_lookup() {
        let prices = TierPrices::new("0.25", "0.50", "1.00").unwrap();
        assert_eq!(prices.for_tier(PriceTier::Basic).minor_units, 250_000);
        assert_eq!(prices.for_tier(PriceTier::Premium).minor_units, 500_000);
        assert_eq!(prices.for_tier(PriceTier::Pipeline).minor_units, 1_000_000);
        assert_eq!(prices.for_tier(PriceTier::Premium).text, "0.50");
    }

    #[test]
    fn tier_prices_reject_bad_input() {
        assert!(TierPrices::new("0.25", "not-a-price", "1.00").is_err());
    }
}
