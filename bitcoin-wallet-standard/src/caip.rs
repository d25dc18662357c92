//! CAIP-2 scopes, Wallet Standard chain ids, and the CAIP-10 account-id
//! grammar.
//!
//! Sessions granted by the multichain client are keyed by CAIP-2 scope
//! strings and list accounts as CAIP-10 composite ids
//! (`namespace:reference:address`). The application-facing surface instead
//! speaks Wallet Standard chain ids (`bitcoin:mainnet` and friends). This
//! module holds both naming schemes and the conversions between them.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::satsconnect::AddressType;

/// CAIP-2 scope of a Bitcoin network, as used in multichain sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CaipScope {
    /// Bitcoin mainnet.
    #[serde(rename = "bip122:000000000019d6689c085ae165831e93")]
    Mainnet,
    /// Bitcoin testnet3.
    #[serde(rename = "bip122:000000000933ea01ad0ee984209779ba")]
    Testnet,
    /// Local regtest network.
    #[serde(rename = "bip122:regtest")]
    Regtest,
}

impl CaipScope {
    /// All supported scopes, in connection priority order.
    pub const ALL: [Self; 3] = [Self::Mainnet, Self::Testnet, Self::Regtest];

    /// The CAIP-2 identifier string for this scope.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Mainnet => "bip122:000000000019d6689c085ae165831e93",
            Self::Testnet => "bip122:000000000933ea01ad0ee984209779ba",
            Self::Regtest => "bip122:regtest",
        }
    }

    /// Decorate a bare address into the CAIP-10 composite id under this
    /// scope.
    #[must_use]
    pub fn account_id(self, address: &str) -> String {
        format!("{}:{address}", self.id())
    }

    /// The Wallet Standard chain id naming the same network.
    #[must_use]
    pub const fn chain(self) -> Chain {
        match self {
            Self::Mainnet => Chain::Mainnet,
            Self::Testnet => Chain::Testnet,
            Self::Regtest => Chain::Regtest,
        }
    }
}

impl fmt::Display for CaipScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Wallet Standard chain id of a Bitcoin network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    /// Bitcoin mainnet.
    #[serde(rename = "bitcoin:mainnet")]
    Mainnet,
    /// Bitcoin testnet3.
    #[serde(rename = "bitcoin:testnet")]
    Testnet,
    /// Local regtest network.
    #[serde(rename = "bitcoin:regtest")]
    Regtest,
}

impl Chain {
    /// All supported chains, in the same order as [`CaipScope::ALL`].
    pub const ALL: [Self; 3] = [Self::Mainnet, Self::Testnet, Self::Regtest];

    /// The chain id string.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Mainnet => "bitcoin:mainnet",
            Self::Testnet => "bitcoin:testnet",
            Self::Regtest => "bitcoin:regtest",
        }
    }

    /// The CAIP-2 scope naming the same network.
    #[must_use]
    pub const fn scope(self) -> CaipScope {
        match self {
            Self::Mainnet => CaipScope::Mainnet,
            Self::Testnet => CaipScope::Testnet,
            Self::Regtest => CaipScope::Regtest,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// CAIP-namespaced address-type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaipAccountType {
    /// Pay-to-pubkey-hash.
    #[serde(rename = "bip122:p2pkh")]
    P2pkh,
    /// Pay-to-script-hash.
    #[serde(rename = "bip122:p2sh")]
    P2sh,
    /// Pay-to-witness-pubkey-hash.
    #[serde(rename = "bip122:p2wpkh")]
    P2wpkh,
    /// Pay-to-taproot.
    #[serde(rename = "bip122:p2tr")]
    P2tr,
}

impl CaipAccountType {
    /// The legacy provider address type naming the same script kind.
    #[must_use]
    pub const fn address_type(self) -> AddressType {
        match self {
            Self::P2pkh => AddressType::P2pkh,
            Self::P2sh => AddressType::P2sh,
            Self::P2wpkh => AddressType::P2wpkh,
            Self::P2tr => AddressType::P2tr,
        }
    }

    /// Reverse lookup from a legacy address type.
    ///
    /// Returns `None` for script kinds that have no CAIP namespace entry.
    #[must_use]
    pub const fn from_address_type(address_type: AddressType) -> Option<Self> {
        match address_type {
            AddressType::P2pkh => Some(Self::P2pkh),
            AddressType::P2sh => Some(Self::P2sh),
            AddressType::P2wpkh => Some(Self::P2wpkh),
            AddressType::P2tr => Some(Self::P2tr),
            AddressType::P2wsh
            | AddressType::Stacks
            | AddressType::Starknet
            | AddressType::Spark => None,
        }
    }
}

// CAIP-10 account id. The chain-id prefix is itself two-part, so a full id
// always has exactly three colon-separated segments.
static ACCOUNT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<chain>(?P<namespace>[-a-z0-9]{3,8}):(?P<reference>[-_a-zA-Z0-9]{1,32})):(?P<address>[-.%a-zA-Z0-9]{1,128})$",
    )
    .expect("valid CAIP-10 account id regex")
});

/// Extract the bare address out of a CAIP-10 composite account id.
///
/// # Errors
///
/// Returns [`Error::MalformedIdentifier`] when the id does not match the
/// `namespace:reference:address` grammar.
pub fn account_address(account_id: &str) -> Result<&str> {
    ACCOUNT_ID_RE
        .captures(account_id)
        .and_then(|caps| caps.name("address"))
        .map(|m| m.as_str())
        .ok_or_else(|| Error::malformed_identifier(account_id))
}
