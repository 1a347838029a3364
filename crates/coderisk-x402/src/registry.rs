//! Static registry of supported settlement networks.
//!
//! Pure lookup keyed by CAIP-2 identifier. RPC endpoint and stablecoin
//! contract can be overridden per deployment without changing a network's
//! identity or display name.

use alloy::primitives::{address, Address};

use crate::error::ConfigError;

/// CAIP-2 identifier for Base mainnet.
pub const BASE_MAINNET: &str = "eip155:8453";

/// CAIP-2 identifier for Base Sepolia.
pub const BASE_SEPOLIA: &str = "eip155:84532";

/// USDC has 6 decimal places on every supported network.
pub const STABLECOIN_DECIMALS: u32 = 6;

/// Display name of the settlement token.
pub const STABLECOIN_NAME: &str = "USDC";

/// A supported settlement network. `id` uniquely determines all other fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub id: &'static str,
    pub display_name: &'static str,
    pub chain_id: u64,
    pub rpc_url: &'static str,
    pub stablecoin: Address,
}

static NETWORKS: [NetworkConfig; 2] = [
    NetworkConfig {
        id: BASE_MAINNET,
        display_name: "Base Mainnet",
        chain_id: 8453,
        rpc_url: "https://mainnet.base.org",
        stablecoin: address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
    },
    NetworkConfig {
        id: BASE_SEPOLIA,
        display_name: "Base Sepolia",
        chain_id: 84532,
        rpc_url: "https://sepolia.base.org",
        stablecoin: address!("036CbD53842c5426634e7929541eC2318f3dCF7e"),
    },
];

/// Look up a network by CAIP-2 identifier.
pub fn lookup(network_id: &str) -> Result<&'static NetworkConfig, ConfigError> {
    NETWORKS
        .iter()
        .find(|n| n.id == network_id)
        .ok_or_else(|| ConfigError::UnsupportedNetwork {
            given: network_id.to_string(),
            supported: supported_ids().join(", "),
        })
}

/// All supported CAIP-2 identifiers, in registry order.
pub fn supported_ids() -> Vec<&'static str> {
    NETWORKS.iter().map(|n| n.id).collect()
}

/// A registry entry with deployment overrides applied. Identity and display
/// name always come from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNetwork {
    pub id: &'static str,
    pub display_name: &'static str,
    pub chain_id: u64,
    pub rpc_url: String,
    pub stablecoin: Address,
}

impl NetworkConfig {
    /// Apply optional RPC and stablecoin overrides.
    pub fn resolve(
        &'static self,
        rpc_override: Option<String>,
        stablecoin_override: Option<Address>,
    ) -> ResolvedNetwork {
        ResolvedNetwork {
            id: self.id,
            display_name: self.display_name,
            chain_id: self.chain_id,
            rpc_url: rpc_override.unwrap_or_else(|| self.rpc_url.to_string()),
            stablecoin: stablecoin_override.unwrap_or(self.stablecoin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_base_mainnet() {
        let net = lookup("eip155:8453").unwrap();
        assert_eq!(net.display_name, "Base Mainnet");
        assert_eq!(net.chain_id, 8453);
    }

    #[test]
    fn lookup_unknown_network_fails() {
        let err = lookup("eip155:1").unwrap_err();
        match err {
            ConfigError::UnsupportedNetwork { given, supported } => {
                assert_eq!(given, "eip155:1");
                assert!(supported.contains("eip155:8453"));
                assert!(supported.contains("eip155:84532"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn resolve_keeps_identity_under_overrides() {
        let net = lookup(BASE_SEPOLIA).unwrap();
        let custom: Address = "0x1111111111111111111111111111111111111111"
            .parse()
            .unwrap();
        let resolved = net.resolve(Some("http://localhost:8545".to_string()), Some(custom));
        assert_eq!(resolved.id, BASE_SEPOLIA);
        assert_eq!(resolved.display_name, "Base Sepolia");
        assert_eq!(resolved.rpc_url, "http://localhost:8545");
        assert_eq!(resolved.stablecoin, custom);
    }

    #[test]
    fn resolve_defaults_without_overrides() {
        let net = lookup(BASE_MAINNET).unwrap();
        let resolved = net.resolve(None, None);
        assert_eq!(resolved.rpc_url, "https://mainnet.base.org");
        assert_eq!(resolved.stablecoin, net.stablecoin);
    }
}
