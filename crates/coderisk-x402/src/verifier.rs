//! On-chain payment verification.
//!
//! Given a transaction hash, checks that the transaction exists, succeeded,
//! is final enough, and transferred enough of the configured stablecoin to
//! the payee — then consumes the hash in the replay ledger so it can never
//! be presented again.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::Provider;
use alloy::rpc::types::Log;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::VerifyError;
use crate::registry::ResolvedNetwork;
use crate::replay::ReplayLedger;
use crate::Transfer;

/// Timeout applied to each chain RPC call. On expiry the verifier reports an
/// infrastructure error, never a negative payment verdict.
const RPC_TIMEOUT: Duration = Duration::from_secs(15);

/// Cap on concurrent per-reference locks to bound memory under abuse.
const MAX_REF_LOCKS: usize = 100_000;

/// A successfully verified payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    /// Normalized (lowercased) transaction reference, as stored in the ledger.
    pub reference: String,
    /// Total stablecoin minor units transferred to the payee.
    pub paid_minor_units: U256,
    /// Sender of the transaction, when determinable.
    pub payer: Option<Address>,
}

/// Verifies payment proofs against a single configured network.
pub struct OnChainVerifier<P> {
    provider: P,
    network: ResolvedNetwork,
    pay_to: Address,
    ledger: Arc<dyn ReplayLedger>,
    /// Per-reference mutexes serializing check-then-consume for one proof.
    ref_locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Validate and parse a proof reference: a 0x-prefixed 32-byte hex hash.
/// Fails before any lock or network activity.
pub fn parse_proof_reference(reference: &str) -> Result<TxHash, VerifyError> {
    let digits = reference
        .strip_prefix("0x")
        .ok_or_else(|| VerifyError::MalformedProof("missing 0x prefix".to_string()))?;
    if digits.len() != 64 {
        return Err(VerifyError::MalformedProof(format!(
            "expected 64 hex digits, got {}",
            digits.len()
        )));
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(VerifyError::MalformedProof(
            "non-hex characters in transaction hash".to_string(),
        ));
    }
    reference
        .parse()
        .map_err(|_| VerifyError::MalformedProof("unparseable transaction hash".to_string()))
}

/// Canonical ledger key for a proof: lowercase 0x-prefixed hex.
pub fn normalize_reference(hash: &TxHash) -> String {
    format!("{hash:#x}")
}

/// Blocks elapsed since inclusion, counting the including block itself.
pub fn confirmation_depth(current_height: u64, tx_height: u64) -> u64 {
    current_height.saturating_sub(tx_height).saturating_add(1)
}

/// Sum all stablecoin `Transfer` amounts destined for the payee.
pub fn sum_transfers_to(logs: &[Log], token: Address, payee: Address) -> U256 {
    logs.iter()
        .filter(|log| log.address() == token)
        .filter_map(|log| log.log_decode::<Transfer>().ok())
        .filter(|decoded| decoded.inner.data.to == payee)
        .fold(U256::ZERO, |total, decoded| {
            total.saturating_add(decoded.inner.data.value)
        })
}

impl<P> OnChainVerifier<P> {
    pub fn new(
        provider: P,
        network: ResolvedNetwork,
        pay_to: Address,
        ledger: Arc<dyn ReplayLedger>,
    ) -> Self {
        Self {
            provider,
            network,
            pay_to,
            ledger,
            ref_locks: DashMap::new(),
        }
    }

    /// The ledger this verifier consumes proofs into.
    pub fn ledger(&self) -> &Arc<dyn ReplayLedger> {
        &self.ledger
    }

    fn ref_lock(&self, reference: &str) -> Result<Arc<Mutex<()>>, VerifyError> {
        if self.ref_locks.len() >= MAX_REF_LOCKS && !self.ref_locks.contains_key(reference) {
            return Err(VerifyError::Infrastructure(
                "too many concurrent verifications — try again later".to_string(),
            ));
        }
        Ok(self
            .ref_locks
            .entry(reference.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }
}

impl<P: Provider> OnChainVerifier<P> {
    /// Verify a payment proof for `required_minor_units` at
    /// `min_confirmations` depth.
    ///
    /// The ledger check and the eventual consume run under a mutex keyed by
    /// the normalized reference, so two concurrent verifications of the same
    /// proof cannot both observe it as unconsumed.
    pub async fn verify(
        &self,
        reference: &str,
        required_minor_units: u64,
        min_confirmations: u64,
    ) -> Result<VerifiedPayment, VerifyError> {
        let tx_hash = parse_proof_reference(reference)?;
        let key = normalize_reference(&tx_hash);

        let lock = self.ref_lock(&key)?;
        let outcome = {
            let _guard = lock.lock().await;
            self.verify_locked(tx_hash, &key, required_minor_units, min_confirmations)
                .await
        };

        // Drop idle lock entries once no other verification holds them.
        // strong_count == 2 means only the map and our local clone remain.
        self.ref_locks
            .remove_if(&key, |_, entry| Arc::strong_count(entry) <= 2);

        outcome
    }

    async fn verify_locked(
        &self,
        tx_hash: TxHash,
        key: &str,
        required_minor_units: u64,
        min_confirmations: u64,
    ) -> Result<VerifiedPayment, VerifyError> {
        if self.ledger.is_consumed(key) {
            tracing::warn!(reference = %key, "replayed payment proof rejected");
            return Err(VerifyError::ReplayedPayment);
        }

        let receipt = tokio::time::timeout(RPC_TIMEOUT, self.provider.get_transaction_receipt(tx_hash))
            .await
            .map_err(|_| VerifyError::Infrastructure("receipt fetch timed out".to_string()))?
            .map_err(|e| VerifyError::Infrastructure(format!("receipt fetch failed: {e}")))?
            .ok_or(VerifyError::ProofNotFound)?;

        if !receipt.status() {
            return Err(VerifyError::TransactionFailed);
        }

        let current_height = tokio::time::timeout(RPC_TIMEOUT, self.provider.get_block_number())
            .await
            .map_err(|_| VerifyError::Infrastructure("block height fetch timed out".to_string()))?
            .map_err(|e| VerifyError::Infrastructure(format!("block height fetch failed: {e}")))?;

        // A receipt with no block number is still pending: zero confirmations.
        let confirmed = receipt
            .block_number
            .map(|height| confirmation_depth(current_height, height))
            .unwrap_or(0);
        if confirmed < min_confirmations {
            return Err(VerifyError::InsufficientConfirmations {
                confirmed,
                required: min_confirmations,
            });
        }

        let paid = sum_transfers_to(receipt.inner.logs(), self.network.stablecoin, self.pay_to);
        if paid < U256::from(required_minor_units) {
            tracing::info!(
                reference = %key,
                paid = %paid,
                required = required_minor_units,
                "payment rejected: insufficient amount"
            );
            return Err(VerifyError::InsufficientAmount {
                paid,
                required: required_minor_units,
            });
        }

        // Consume the proof only after a fully positive verdict. The atomic
        // insert is the backstop for the per-reference lock above.
        if !self.ledger.try_consume(key) {
            tracing::warn!(reference = %key, "proof consumed by a concurrent verification");
            return Err(VerifyError::ReplayedPayment);
        }

        tracing::info!(
            reference = %key,
            paid = %paid,
            payer = %receipt.from,
            network = self.network.id,
            "payment verified"
        );

        Ok(VerifiedPayment {
            reference: key.to_string(),
            paid_minor_units: paid,
            payer: Some(receipt.from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolEvent;

    const PAYEE: Address = Address::new([0x11; 20]);
    const TOKEN: Address = Address::new([0x22; 20]);
    const OTHER: Address = Address::new([0x33; 20]);

    fn transfer_log(token: Address, from: Address, to: Address, value: u64) -> Log {
        let event = Transfer {
            from,
            to,
            value: U256::from(value),
        };
        Log {
            inner: alloy::primitives::Log {
                address: token,
                data: event.encode_log_data(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn parse_rejects_malformed_references() {
        assert!(matches!(
            parse_proof_reference("deadbeef"),
            Err(VerifyError::MalformedProof(_))
        ));
        assert!(matches!(
            parse_proof_reference("0x1234"),
            Err(VerifyError::MalformedProof(_))
        ));
        assert!(matches!(
            parse_proof_reference(&format!("0x{}", "g".repeat(64))),
            Err(VerifyError::MalformedProof(_))
        ));
        assert!(matches!(
            parse_proof_reference(&format!("0x{}", "a".repeat(63))),
            Err(VerifyError::MalformedProof(_))
        ));
    }

    #[test]
    fn parse_accepts_and_normalizes_mixed_case() {
        let reference = format!("0x{}{}", "AB".repeat(16), "cd".repeat(16));
        let hash = parse_proof_reference(&reference).unwrap();
        let normalized = normalize_reference(&hash);
        assert_eq!(normalized, reference.to_lowercase());
        assert!(normalized.starts_with("0x"));
    }

    #[test]
    fn confirmation_depth_counts_inclusion_block() {
        assert_eq!(confirmation_depth(100, 100), 1);
        assert_eq!(confirmation_depth(101, 100), 2);
        // Height behind the tx (reorg or lagging node) saturates to 1.
        assert_eq!(confirmation_depth(99, 100), 1);
    }

    #[test]
    fn sums_only_payee_transfers_from_the_token() {
        let logs = vec![
            transfer_log(TOKEN, OTHER, PAYEE, 1200),
            transfer_log(TOKEN, OTHER, PAYEE, 800),
            // wrong destination
            transfer_log(TOKEN, OTHER, OTHER, 5000),
            // right destination, wrong contract
            transfer_log(OTHER, OTHER, PAYEE, 5000),
        ];
        assert_eq!(sum_transfers_to(&logs, TOKEN, PAYEE), U256::from(2000u64));
    }

    #[test]
    fn amount_threshold_is_strict() {
        // "0.002" → 2000 minor units: 1999 is short, 2000 is enough.
        let required = U256::from(crate::pricing::to_minor_units("0.002").unwrap());
        assert_eq!(required, U256::from(2000u64));

        let short = vec![transfer_log(TOKEN, OTHER, PAYEE, 1999)];
        assert!(sum_transfers_to(&short, TOKEN, PAYEE) < required);

        let exact = vec![transfer_log(TOKEN, OTHER, PAYEE, 1999), transfer_log(TOKEN, OTHER, PAYEE, 1)];
        assert!(sum_transfers_to(&exact, TOKEN, PAYEE) >= required);
    }

    #[test]
    fn no_transfers_sums_to_zero() {
        assert_eq!(sum_transfers_to(&[], TOKEN, PAYEE), U256::ZERO);
    }
}
