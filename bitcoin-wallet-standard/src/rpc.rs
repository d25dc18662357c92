//! Wire shapes for wallet method invocations.
//!
//! Requests serialize as `{ "method": ..., "params": ... }`, the envelope
//! the multichain client forwards under the selected scope. Responses are
//! loosely typed on the wallet side; the fields the adapter needs are
//! deserialized at the call site.

use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};

/// A wallet method invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum RpcRequest {
    /// Sign (and optionally broadcast) a partially signed transaction.
    SignPsbt {
        /// Base64-encoded PSBT.
        psbt: String,
        /// Signing options.
        options: SignPsbtOptions,
        /// Account to sign with.
        account: AccountRef,
    },
    /// Sign a message with an account key.
    SignMessage {
        /// The message text to sign.
        message: String,
        /// Account to sign with.
        account: AccountRef,
    },
    /// Build, sign, and broadcast a transfer.
    SendTransfer {
        /// Transfer outputs.
        recipients: Vec<TransferRecipient>,
        /// Account to spend from.
        account: AccountRef,
    },
}

impl RpcRequest {
    /// Build a `signPsbt` request; `fill` is always requested.
    #[must_use]
    pub fn sign_psbt(psbt: &[u8], broadcast: bool, address: impl Into<String>) -> Self {
        Self::SignPsbt {
            psbt: BASE64_STANDARD.encode(psbt),
            options: SignPsbtOptions { fill: true, broadcast },
            account: AccountRef { address: address.into() },
        }
    }

    /// Build a `signMessage` request.
    #[must_use]
    pub fn sign_message(message: impl Into<String>, address: impl Into<String>) -> Self {
        Self::SignMessage {
            message: message.into(),
            account: AccountRef { address: address.into() },
        }
    }

    /// Build a `sendTransfer` request.
    #[must_use]
    pub fn send_transfer(
        recipients: Vec<TransferRecipient>,
        address: impl Into<String>,
    ) -> Self {
        Self::SendTransfer { recipients, account: AccountRef { address: address.into() } }
    }
}

/// Options of a `signPsbt` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignPsbtOptions {
    /// Ask the wallet to fill missing transaction fields.
    pub fill: bool,
    /// Broadcast after signing.
    pub broadcast: bool,
}

/// Reference to the signing account inside a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    /// Address of the account.
    pub address: String,
}

/// One output of a `sendTransfer` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecipient {
    /// Destination address.
    pub address: String,
    /// Amount in satoshis, as a decimal string.
    pub amount: String,
}

impl TransferRecipient {
    /// Build a recipient from a satoshi amount.
    #[must_use]
    pub fn from_sats(address: impl Into<String>, amount_sats: u64) -> Self {
        Self { address: address.into(), amount: amount_sats.to_string() }
    }
}

/// Response of a `signPsbt` invocation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignPsbtResponse {
    /// Base64-encoded signed PSBT, when the wallet returns one.
    #[serde(default)]
    pub psbt: Option<String>,
    /// Transaction id, present when the wallet broadcast.
    #[serde(default)]
    pub txid: Option<String>,
}

/// Response of a `signMessage` invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct SignMessageResponse {
    /// Base64-encoded signature.
    pub signature: String,
}

/// Response of a `sendTransfer` invocation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendTransferResponse {
    /// Transaction id of the broadcast transfer.
    #[serde(default)]
    pub txid: Option<String>,
}
