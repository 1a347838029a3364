use alloy::primitives::U256;
use thiserror::Error;

/// Errors returned by payment verification.
///
/// Everything except [`VerifyError::Infrastructure`] is a terminal negative
/// verdict on the presented proof. Infrastructure errors mean the proof could
/// not be checked at all; callers may retry, and the replay ledger is never
/// touched on that path.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("malformed payment proof: {0}")]
    MalformedProof(String),

    #[error("payment proof already consumed")]
    ReplayedPayment,

    #[error("transaction not found on chain")]
    ProofNotFound,

    #[error("transaction reverted on chain")]
    TransactionFailed,

    #[error("insufficient confirmations: {confirmed} of {required}")]
    InsufficientConfirmations { confirmed: u64, required: u64 },

    #[error("insufficient amount: paid {paid} of {required} minor units")]
    InsufficientAmount { paid: U256, required: u64 },

    #[error("verification infrastructure error: {0}")]
    Infrastructure(String),
}

impl VerifyError {
    /// Machine-readable reason code carried in reject responses.
    pub fn reason_code(&self) -> &'static str {
        match self {
            VerifyError::MalformedProof(_) => "malformed_proof",
            VerifyError::ReplayedPayment => "replayed_payment",
            VerifyError::ProofNotFound => "proof_not_found",
            VerifyError::TransactionFailed => "transaction_failed",
            VerifyError::InsufficientConfirmations { .. } => "insufficient_confirmations",
            VerifyError::InsufficientAmount { .. } => "insufficient_amount",
            VerifyError::Infrastructure(_) => "verification_infrastructure",
        }
    }

    /// True when the proof could not be checked (retryable 5xx-class outcome),
    /// as opposed to a negative payment verdict.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, VerifyError::Infrastructure(_))
    }
}

/// Errors raised while building the configuration snapshot. All of these are
/// fatal at startup; the service must not accept traffic with a broken config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),

    #[error("unsupported network '{given}', supported: {supported}")]
    UnsupportedNetwork { given: String, supported: String },

    #[error("header-only verification cannot be combined with live enforcement; set X402_INSECURE_HEADER_ONLY=true to override for development")]
    InsecureVerification,
}
