//! Legacy single-provider contract.
//!
//! Pre-existing integrations talk to the wallet through one provider object
//! whose requests arrive as unsecured tokens: `header.payload[.signature]`
//! with base64url segments, the payload being request JSON. The provider is
//! a thin façade over the shared wallet state; it decodes envelopes,
//! delegates to the session and signing operations, and maps results back
//! into the legacy response shapes.

mod types;

use std::sync::Arc;

use base64::{
    Engine,
    prelude::{BASE64_STANDARD, BASE64_URL_SAFE_NO_PAD},
};
use serde::de::DeserializeOwned;
use tracing::debug;

pub use self::types::{
    Address, AddressPurpose, AddressType, Capability, ConnectPayload, GetAddressResponse,
    MultiSignEntry, MultiSignPayload, SendTransactionPayload, SendTransactionRecipient,
    SignMessagePayload, SignTransactionPayload, SignTransactionResponse, WalletType,
};

use crate::error::{Error, Result};
use crate::events::{EventSubscription, ProviderEvent, ProviderEventKind};
use crate::rpc::TransferRecipient;
use crate::wallet::WalletInner;

/// Request operations this provider answers.
pub const CAPABILITIES: [Capability; 5] = [
    Capability::Connect,
    Capability::SignTransaction,
    Capability::SignMessage,
    Capability::SendBtcTransaction,
    Capability::SignMultipleTransactions,
];

/// Decode the payload segment of a legacy request token.
fn decode_request<T: DeserializeOwned>(token: &str) -> Result<T> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::malformed_request("token has no payload segment"))?;
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| Error::malformed_request("payload segment is not base64url"))?;
    serde_json::from_slice(&bytes)
        .map_err(|_| Error::malformed_request("payload is not a valid request"))
}

/// The legacy provider object, sharing state with the wallet it came from.
#[derive(Debug, Clone)]
pub struct SatsConnectProvider {
    inner: Arc<WalletInner>,
}

impl SatsConnectProvider {
    pub(crate) fn new(inner: Arc<WalletInner>) -> Self {
        Self { inner }
    }

    /// Connect the wallet and return the legacy address records.
    ///
    /// # Errors
    ///
    /// Fails when the request asks for any purpose besides `payment`, when
    /// connecting fails, or when the user grants no account.
    pub async fn connect(&self, request: &str) -> Result<GetAddressResponse> {
        let payload: ConnectPayload = decode_request(request)?;
        debug!(purposes = ?payload.purposes, "legacy connect requested");
        if payload.purposes != [AddressPurpose::Payment] {
            return Err(Error::UnsupportedPurpose(payload.purposes));
        }
        let accounts = self.inner.connect().await?;
        if accounts.is_empty() {
            return Err(Error::NoAccountsAvailable);
        }
        Ok(GetAddressResponse { addresses: accounts.iter().map(Address::payment).collect() })
    }

    /// Sign one PSBT, optionally broadcasting it.
    ///
    /// # Errors
    ///
    /// Fails when the envelope or PSBT cannot be decoded, no account is
    /// connected, or the backend returns no signed PSBT.
    pub async fn sign_transaction(&self, request: &str) -> Result<SignTransactionResponse> {
        let payload: SignTransactionPayload = decode_request(request)?;
        debug!(broadcast = payload.broadcast, "legacy transaction signing requested");
        self.sign_encoded_psbt(&payload.psbt_base64, payload.broadcast).await
    }

    /// Sign a message and return the base64 signature.
    ///
    /// # Errors
    ///
    /// Fails when the envelope cannot be decoded, no account is connected,
    /// or the backend rejects the request.
    pub async fn sign_message(&self, request: &str) -> Result<String> {
        let payload: SignMessagePayload = decode_request(request)?;
        debug!("legacy message signing requested");
        self.inner.sign_message(&payload.message, payload.address.as_deref()).await
    }

    /// Send bitcoin to the requested recipients and return the transaction
    /// id.
    ///
    /// # Errors
    ///
    /// Fails when the envelope cannot be decoded, no account is connected,
    /// or the backend returns no transaction id.
    pub async fn send_transaction(&self, request: &str) -> Result<String> {
        let SendTransactionPayload { recipients, sender_address } = decode_request(request)?;
        debug!(recipients = recipients.len(), "legacy transfer requested");
        let recipients = recipients
            .into_iter()
            .map(|recipient| TransferRecipient::from_sats(recipient.address, recipient.amount_sats))
            .collect();
        self.inner.send_transfer(recipients, sender_address.as_deref()).await
    }

    /// Sign several PSBTs in request order, none of them broadcast.
    ///
    /// Signing stops at the first failure.
    ///
    /// # Errors
    ///
    /// Fails when the envelope or any PSBT cannot be decoded, no account is
    /// connected, or any signing call fails.
    pub async fn multi_sign(&self, request: &str) -> Result<Vec<SignTransactionResponse>> {
        let payload: MultiSignPayload = decode_request(request)?;
        debug!(count = payload.psbts.len(), "legacy multi-sign requested");
        let mut responses = Vec::with_capacity(payload.psbts.len());
        for entry in payload.psbts {
            responses.push(self.sign_encoded_psbt(&entry.psbt_base64, false).await?);
        }
        Ok(responses)
    }

    /// Register a listener on the legacy event surface.
    ///
    /// The subscription stays registered until explicitly unsubscribed.
    pub fn add_listener(
        &self,
        kind: ProviderEventKind,
        listener: impl Fn(&ProviderEvent) + Send + Sync + 'static,
    ) -> EventSubscription {
        self.inner.provider_events().on(kind, listener)
    }

    /// The request operations this provider supports.
    #[must_use]
    pub fn capabilities(&self) -> &'static [Capability] {
        &CAPABILITIES
    }

    async fn sign_encoded_psbt(
        &self,
        psbt_base64: &str,
        broadcast: bool,
    ) -> Result<SignTransactionResponse> {
        let psbt = BASE64_STANDARD
            .decode(psbt_base64)
            .map_err(|_| Error::malformed_request("psbtBase64 is not valid base64"))?;
        let response = self.inner.sign_psbt(&psbt, broadcast, None).await?;
        let psbt_base64 = response.psbt.ok_or(Error::SignedPsbtMissing)?;
        Ok(SignTransactionResponse { psbt_base64, tx_id: response.txid })
    }
}
