//! Test doubles shared across the crate's unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use serde_json::{Value, json};

use crate::caip::CaipScope;
use crate::client::{
    ClientError, ClientResult, CreateSessionRequest, MultichainClient, NotificationHandler,
    NotificationSubscription, SessionData, SessionScope,
};
use crate::rpc::RpcRequest;

pub(crate) const ADDRESS: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";
pub(crate) const ADDRESS_2: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

/// Scripted multichain client that records every call it receives.
pub(crate) struct MockClient {
    get_session: Mutex<ClientResult<Option<SessionData>>>,
    create_session: Mutex<ClientResult<SessionData>>,
    invoke: Mutex<ClientResult<Value>>,
    handlers: Arc<Mutex<HashMap<u64, NotificationHandler>>>,
    next_handler_id: AtomicU64,
    get_session_calls: AtomicU64,
    create_requests: Mutex<Vec<CreateSessionRequest>>,
    invocations: Mutex<Vec<(CaipScope, RpcRequest)>>,
    revocations: Mutex<Vec<Vec<CaipScope>>>,
}

impl MockClient {
    pub(crate) fn new() -> Self {
        Self {
            get_session: Mutex::new(Ok(None)),
            create_session: Mutex::new(Ok(SessionData::default())),
            invoke: Mutex::new(Ok(Value::Null)),
            handlers: Arc::new(Mutex::new(HashMap::new())),
            next_handler_id: AtomicU64::new(0),
            get_session_calls: AtomicU64::new(0),
            create_requests: Mutex::new(Vec::new()),
            invocations: Mutex::new(Vec::new()),
            revocations: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_session(&self, session: Option<SessionData>) {
        *self.get_session.lock().unwrap() = Ok(session);
    }

    pub(crate) fn fail_get_session(&self, message: &str) {
        *self.get_session.lock().unwrap() = Err(ClientError::new(message));
    }

    pub(crate) fn set_created_session(&self, session: SessionData) {
        *self.create_session.lock().unwrap() = Ok(session);
    }

    pub(crate) fn fail_create_session(&self, message: &str) {
        *self.create_session.lock().unwrap() = Err(ClientError::new(message));
    }

    pub(crate) fn set_invoke_result(&self, value: Value) {
        *self.invoke.lock().unwrap() = Ok(value);
    }

    /// Deliver a raw notification to every registered handler.
    pub(crate) fn emit(&self, event: &Value) {
        let snapshot: Vec<NotificationHandler> = {
            let handlers = self.handlers.lock().unwrap();
            handlers.values().map(Arc::clone).collect()
        };
        for handler in snapshot {
            handler(event);
        }
    }

    pub(crate) fn handler_count(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }

    pub(crate) fn get_session_calls(&self) -> u64 {
        self.get_session_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn create_session_requests(&self) -> Vec<CreateSessionRequest> {
        self.create_requests.lock().unwrap().clone()
    }

    pub(crate) fn invocations(&self) -> Vec<(CaipScope, RpcRequest)> {
        self.invocations.lock().unwrap().clone()
    }

    pub(crate) fn revocations(&self) -> Vec<Vec<CaipScope>> {
        self.revocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl MultichainClient for MockClient {
    async fn get_session(&self) -> ClientResult<Option<SessionData>> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);
        self.get_session.lock().unwrap().clone()
    }

    async fn create_session(&self, request: CreateSessionRequest) -> ClientResult<SessionData> {
        self.create_requests.lock().unwrap().push(request);
        self.create_session.lock().unwrap().clone()
    }

    async fn revoke_session(&self, scopes: &[CaipScope]) -> ClientResult<()> {
        self.revocations.lock().unwrap().push(scopes.to_vec());
        Ok(())
    }

    async fn invoke_method(&self, scope: CaipScope, request: RpcRequest) -> ClientResult<Value> {
        self.invocations.lock().unwrap().push((scope, request));
        self.invoke.lock().unwrap().clone()
    }

    fn on_notification(&self, handler: NotificationHandler) -> NotificationSubscription {
        let id = self.next_handler_id.fetch_add(1, Ordering::SeqCst);
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, handler);
        let handlers = Arc::clone(&self.handlers);
        NotificationSubscription::new(move || {
            handlers.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
        })
    }
}

/// Build a session snapshot granting `addresses` under each scope, in order.
pub(crate) fn session_with_scopes(entries: &[(CaipScope, &[&str])]) -> SessionData {
    let mut session = SessionData::default();
    for (scope, addresses) in entries {
        session.session_scopes.insert(
            scope.id().to_owned(),
            SessionScope {
                accounts: addresses.iter().map(|address| scope.account_id(address)).collect(),
                ..SessionScope::default()
            },
        );
    }
    session
}

pub(crate) fn session_with(scope: CaipScope, addresses: &[&str]) -> SessionData {
    session_with_scopes(&[(scope, addresses)])
}

/// The account-changed notification as delivered over the wire.
pub(crate) fn account_changed_event(address: &str) -> Value {
    json!({
        "method": "wallet_notify",
        "params": {
            "notification": {
                "method": "metamask_accountsChanged",
                "params": [address],
            },
        },
    })
}

/// An account-changed notification with no address attached.
pub(crate) fn empty_account_changed_event() -> Value {
    json!({
        "method": "wallet_notify",
        "params": {
            "notification": { "method": "metamask_accountsChanged", "params": [] },
        },
    })
}

/// The session-changed notification carrying a full snapshot.
pub(crate) fn session_changed_event(session: &SessionData) -> Value {
    json!({
        "method": "wallet_notify",
        "params": {
            "notification": {
                "method": "wallet_sessionChanged",
                "params": session,
            },
        },
    })
}

/// Encode `payload` as an unsecured two-segment token.
pub(crate) fn unsecured_token(payload: &Value) -> String {
    let header = BASE64_URL_SAFE_NO_PAD.encode(br#"{"typ":"JWT","alg":"none"}"#);
    let body =
        BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).expect("payload serializes"));
    format!("{header}.{body}")
}
