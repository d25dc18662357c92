//! Wallet Standard account exposed to applications.

use crate::caip::Chain;

/// Feature id of the legacy provider namespace.
pub const SATS_CONNECT_FEATURE: &str = "sats-connect:";
/// Feature id of the connect capability.
pub const CONNECT_FEATURE: &str = "bitcoin:connect";
/// Feature id of the disconnect capability.
pub const DISCONNECT_FEATURE: &str = "bitcoin:disconnect";
/// Feature id of the events capability.
pub const EVENTS_FEATURE: &str = "bitcoin:events";
/// Feature id of transaction signing.
pub const SIGN_TRANSACTION_FEATURE: &str = "bitcoin:signTransaction";
/// Feature id of combined sign-and-broadcast.
pub const SIGN_AND_SEND_TRANSACTION_FEATURE: &str = "bitcoin:signAndSendTransaction";
/// Feature id of message signing.
pub const SIGN_MESSAGE_FEATURE: &str = "bitcoin:signMessage";

/// Features advertised on every exposed account.
pub const ACCOUNT_FEATURES: [&str; 6] = [
    SATS_CONNECT_FEATURE,
    CONNECT_FEATURE,
    DISCONNECT_FEATURE,
    SIGN_TRANSACTION_FEATURE,
    SIGN_AND_SEND_TRANSACTION_FEATURE,
    SIGN_MESSAGE_FEATURE,
];

/// A connected Bitcoin account.
///
/// Two accounts compare equal when they hold the same address; the session
/// reconciler relies on this to decide whether a session update actually
/// changed the selection.
#[derive(Debug, Clone)]
pub struct Account {
    address: String,
    public_key: Vec<u8>,
}

impl Account {
    /// Build an account for `address`.
    ///
    /// The session layer does not carry key material, so the public key slot
    /// is filled with the address bytes.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        let public_key = address.as_bytes().to_vec();
        Self { address, public_key }
    }

    /// The account address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Raw public key bytes.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Chains this account can operate on.
    #[must_use]
    pub const fn chains(&self) -> &'static [Chain] {
        &Chain::ALL
    }

    /// Feature ids this account supports.
    #[must_use]
    pub const fn features(&self) -> &'static [&'static str] {
        &ACCOUNT_FEATURES
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Account {}
