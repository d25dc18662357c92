#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(tail_expr_drop_order)]
//! Bitcoin wallet adapter over a multichain session client.
//!
//! One wallet, two provider contracts: the capability-map surface
//! ([`BitcoinWallet`] with typed connect/sign/event operations) and the
//! legacy token-encoded surface ([`SatsConnectProvider`]). Both share a
//! single reconciled "currently connected account", kept consistent against
//! the backend's session snapshots and push notifications, and both fan
//! account changes out through their own listener registries.
//!
//! The backend itself stays abstract: implement [`MultichainClient`] for
//! whatever transport carries the session and invocation calls.

pub mod account;
pub mod caip;
pub mod client;
pub mod error;
pub mod events;
pub mod rpc;
pub mod satsconnect;
pub mod wallet;

mod hint;
#[cfg(test)]
mod testing;

pub use account::Account;
pub use caip::{CaipScope, Chain};
pub use client::{
    ClientError, ClientResult, CreateSessionRequest, MultichainClient, NotificationHandler,
    NotificationSubscription, SessionData, SessionScope,
};
pub use error::{Error, Result};
pub use events::{ChangeEvent, EventSubscription, ProviderEvent, ProviderEventKind};
pub use rpc::{RpcRequest, TransferRecipient};
pub use satsconnect::SatsConnectProvider;
pub use wallet::{BitcoinWallet, BitcoinWalletBuilder};
