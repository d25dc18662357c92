//! Boundary to the external multichain API client.
//!
//! The wallet never talks to a node directly. Everything flows through an
//! implementation of [`MultichainClient`]: session negotiation, method
//! invocation, and push notifications. The trait is object-safe so the
//! wallet can hold `Arc<dyn MultichainClient>`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::caip::CaipScope;
use crate::rpc::RpcRequest;

/// Session property asking the wallet backend to push account-change
/// notifications for bip122 scopes.
pub const ACCOUNT_CHANGED_NOTIFICATIONS_PROPERTY: &str = "bip122_accountChanged_notifications";

const NOTIFY_METHOD: &str = "wallet_notify";
const ACCOUNTS_CHANGED_METHOD: &str = "metamask_accountsChanged";
const SESSION_CHANGED_METHOD: &str = "wallet_sessionChanged";

/// Transport-level failure reported by a [`MultichainClient`] implementation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("client error: {0}")]
pub struct ClientError(String);

impl ClientError {
    /// Wrap a transport failure message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result alias for client-boundary calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Snapshot of an established multichain session.
///
/// Scope keys stay plain strings: a session may carry scopes for unrelated
/// namespaces next to the bip122 ones. The ordered map gives a deterministic
/// first entry when inspecting foreign snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// Granted scopes keyed by CAIP-2 identifier.
    #[serde(default)]
    pub session_scopes: BTreeMap<String, SessionScope>,
}

/// Per-scope grant inside a session snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionScope {
    /// CAIP-10 composite account ids granted under this scope.
    #[serde(default)]
    pub accounts: Vec<String>,
    /// Methods the session may invoke.
    #[serde(default)]
    pub methods: Vec<String>,
    /// Notifications the session may receive.
    #[serde(default)]
    pub notifications: Vec<String>,
}

/// Scope grant requested when creating a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRequest {
    /// Methods to request; empty defers to the wallet's defaults.
    pub methods: Vec<String>,
    /// Notifications to request; empty defers to the wallet's defaults.
    pub notifications: Vec<String>,
}

/// Request body for [`MultichainClient::create_session`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Scopes the wallet would like granted, keyed by CAIP-2 identifier.
    pub optional_scopes: BTreeMap<String, ScopeRequest>,
    /// Free-form session properties.
    pub session_properties: BTreeMap<String, Value>,
}

impl CreateSessionRequest {
    /// The request the wallet issues when connecting: one optional scope and
    /// the account-change notification property switched on.
    #[must_use]
    pub fn for_scope(scope: CaipScope) -> Self {
        let mut optional_scopes = BTreeMap::new();
        optional_scopes.insert(scope.id().to_owned(), ScopeRequest::default());
        let mut session_properties = BTreeMap::new();
        session_properties.insert(
            ACCOUNT_CHANGED_NOTIFICATIONS_PROPERTY.to_owned(),
            Value::Bool(true),
        );
        Self { optional_scopes, session_properties }
    }
}

/// Callback invoked for every push notification delivered by the client.
pub type NotificationHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle to a registered notification handler.
///
/// Dropping the subscription removes the handler, so a guard tied to a
/// bounded wait cleans itself up when the wait ends, whichever side won.
pub struct NotificationSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl NotificationSubscription {
    /// Build a subscription whose removal runs `cancel`.
    #[must_use]
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// Remove the handler now instead of at drop time.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for NotificationSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationSubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// External multichain API client the wallet is built over.
#[async_trait]
pub trait MultichainClient: Send + Sync {
    /// Fetch the currently established session, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the transport fails.
    async fn get_session(&self) -> ClientResult<Option<SessionData>>;

    /// Negotiate a new session.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the transport fails or the wallet
    /// backend rejects the request.
    async fn create_session(&self, request: CreateSessionRequest) -> ClientResult<SessionData>;

    /// Revoke the session grants for the given scopes.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the transport fails.
    async fn revoke_session(&self, scopes: &[CaipScope]) -> ClientResult<()>;

    /// Invoke a wallet method under a scope.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the transport fails or the method is
    /// rejected.
    async fn invoke_method(&self, scope: CaipScope, request: RpcRequest) -> ClientResult<Value>;

    /// Register a push-notification handler.
    fn on_notification(&self, handler: NotificationHandler) -> NotificationSubscription;
}

/// Push notification recognized by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WalletNotification {
    /// The selected account changed; `None` means the wallet backend dropped
    /// the connection.
    AccountsChanged { address: Option<String> },
    /// The session grants changed wholesale.
    SessionChanged { session: SessionData },
}

impl WalletNotification {
    /// Parse a raw notification value; unrecognized shapes yield `None`.
    pub(crate) fn parse(event: &Value) -> Option<Self> {
        if event.get("method")?.as_str()? != NOTIFY_METHOD {
            return None;
        }
        let notification = event.get("params")?.get("notification")?;
        match notification.get("method")?.as_str()? {
            ACCOUNTS_CHANGED_METHOD => {
                let address = notification
                    .get("params")
                    .and_then(Value::as_array)
                    .and_then(|params| params.first())
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                Some(Self::AccountsChanged { address })
            }
            SESSION_CHANGED_METHOD => {
                let session = notification
                    .get("params")
                    .cloned()
                    .and_then(|params| serde_json::from_value(params).ok())?;
                Some(Self::SessionChanged { session })
            }
            _ => None,
        }
    }
}
