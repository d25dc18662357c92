//! Error types for the wallet adapter.
//!
//! One crate-level [`Error`] covers the whole surface:
//! - codec failures (CAIP account ids, provider request envelopes)
//! - connection preconditions (missing account or scope)
//! - backend response defects (missing txid or signed psbt)
//! - transport failures forwarded from the multichain client

use crate::client::ClientError;
use crate::satsconnect::AddressPurpose;

/// Result type alias for wallet adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for all wallet adapter operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid wallet configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A CAIP-10 account id did not match the `namespace:reference:address`
    /// grammar.
    #[error("invalid CAIP account id: {0}")]
    MalformedIdentifier(String),

    /// A provider request envelope could not be decoded.
    #[error("malformed provider request: {0}")]
    MalformedRequest(String),

    /// A provider connect requested address purposes other than `payment`.
    #[error("only payment addresses are supported (requested {})", join_purposes(.0))]
    UnsupportedPurpose(Vec<AddressPurpose>),

    /// Connecting finished without any user-granted account.
    #[error("no accounts available")]
    NoAccountsAvailable,

    /// A signing operation was attempted without a connected account.
    #[error("no connected account")]
    NoConnectedAccount,

    /// A signing operation was attempted before any session scope was
    /// selected.
    #[error("no session scope established")]
    ScopeNotEstablished,

    /// The broadcast backend response carried no transaction id.
    #[error("transaction id missing from response")]
    TransactionIdMissing,

    /// The signing backend response carried no signed psbt.
    #[error("signed psbt missing from response")]
    SignedPsbtMissing,

    /// Transport failure reported by the multichain client.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// JSON (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A base64 payload could not be decoded.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl Error {
    /// Create a malformed-request error with a message.
    #[must_use]
    pub fn malformed_request(msg: impl Into<String>) -> Self {
        Self::MalformedRequest(msg.into())
    }

    /// Create a malformed-identifier error for the given account id.
    #[must_use]
    pub fn malformed_identifier(id: impl Into<String>) -> Self {
        Self::MalformedIdentifier(id.into())
    }
}

fn join_purposes(purposes: &[AddressPurpose]) -> String {
    purposes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
