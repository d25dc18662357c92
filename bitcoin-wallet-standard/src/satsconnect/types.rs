//! Request and response shapes of the legacy provider contract.
//!
//! Wire names follow the legacy convention (`camelCase`, token-encoded
//! payloads), so every struct here carries explicit serde renames rather
//! than leaking Rust naming onto the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::account::Account;

/// Address purpose named by legacy connect requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressPurpose {
    /// Ordinals inscriptions.
    Ordinals,
    /// Payments.
    Payment,
    /// Stacks operations.
    Stacks,
    /// Starknet operations.
    Starknet,
    /// Spark operations.
    Spark,
}

impl AddressPurpose {
    /// The wire identifier of this purpose.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ordinals => "ordinals",
            Self::Payment => "payment",
            Self::Stacks => "stacks",
            Self::Starknet => "starknet",
            Self::Spark => "spark",
        }
    }
}

impl fmt::Display for AddressPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Script kind of a legacy address record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    /// Pay-to-pubkey-hash.
    P2pkh,
    /// Pay-to-script-hash.
    P2sh,
    /// Pay-to-witness-pubkey-hash.
    P2wpkh,
    /// Pay-to-witness-script-hash.
    P2wsh,
    /// Pay-to-taproot.
    P2tr,
    /// Stacks address.
    Stacks,
    /// Starknet address.
    Starknet,
    /// Spark address.
    Spark,
}

/// Kind of wallet backing an address record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    /// Software wallet.
    Software,
    /// Ledger hardware wallet.
    Ledger,
    /// Keystone hardware wallet.
    Keystone,
}

/// Address record returned by legacy connect and account-change events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// The account address.
    pub address: String,
    /// Hex-encoded public key bytes.
    pub public_key: String,
    /// Purpose this address serves.
    pub purpose: AddressPurpose,
    /// Script kind of the address.
    pub address_type: AddressType,
    /// Kind of wallet backing the address.
    pub wallet_type: WalletType,
}

impl Address {
    /// The payment record exposed for a connected account.
    #[must_use]
    pub fn payment(account: &Account) -> Self {
        Self {
            address: account.address().to_owned(),
            public_key: hex::encode(account.public_key()),
            purpose: AddressPurpose::Payment,
            address_type: AddressType::P2wpkh,
            wallet_type: WalletType::Software,
        }
    }
}

/// Response of a legacy connect request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAddressResponse {
    /// Address records for the connected accounts.
    pub addresses: Vec<Address>,
}

/// Payload of a legacy connect request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectPayload {
    /// Requested address purposes.
    pub purposes: Vec<AddressPurpose>,
}

/// Payload of a legacy sign-transaction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionPayload {
    /// Base64-encoded PSBT to sign.
    pub psbt_base64: String,
    /// Broadcast after signing; defaults to off.
    #[serde(default)]
    pub broadcast: bool,
}

/// Response of a legacy sign-transaction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionResponse {
    /// Base64-encoded signed PSBT.
    pub psbt_base64: String,
    /// Transaction id, present when the transaction was broadcast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
}

/// Payload of a legacy sign-message request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignMessagePayload {
    /// Address to sign with; the current account when absent.
    #[serde(default)]
    pub address: Option<String>,
    /// Message text to sign.
    pub message: String,
}

/// One output of a legacy send-transaction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionRecipient {
    /// Destination address.
    pub address: String,
    /// Amount in satoshis.
    pub amount_sats: u64,
}

/// Payload of a legacy send-transaction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionPayload {
    /// Transfer outputs.
    pub recipients: Vec<SendTransactionRecipient>,
    /// Address to spend from; the current account when absent.
    #[serde(default)]
    pub sender_address: Option<String>,
}

/// One entry of a legacy multi-sign request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSignEntry {
    /// Base64-encoded PSBT to sign.
    pub psbt_base64: String,
}

/// Payload of a legacy multi-sign request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSignPayload {
    /// PSBTs to sign, in order.
    pub psbts: Vec<MultiSignEntry>,
}

/// Request operation the legacy provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    /// Legacy connect.
    Connect,
    /// Sign a transaction.
    SignTransaction,
    /// Sign a message.
    SignMessage,
    /// Build, sign, and broadcast a transfer.
    SendBtcTransaction,
    /// Sign several transactions in one request.
    SignMultipleTransactions,
}
