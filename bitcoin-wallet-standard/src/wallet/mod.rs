//! The wallet adapter: account state, session lifecycle, signing operations.

mod reconcile;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use base64::{Engine, prelude::BASE64_STANDARD};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::account::{
    Account, CONNECT_FEATURE, DISCONNECT_FEATURE, EVENTS_FEATURE, SATS_CONNECT_FEATURE,
    SIGN_AND_SEND_TRANSACTION_FEATURE, SIGN_MESSAGE_FEATURE, SIGN_TRANSACTION_FEATURE,
};
use crate::caip::{CaipScope, Chain};
use crate::client::{
    CreateSessionRequest, MultichainClient, NotificationSubscription, SessionData,
    WalletNotification,
};
use crate::error::{Error, Result};
use crate::events::{
    ChangeEvent, EventRegistry, EventSubscription, ProviderEvent, ProviderEventKind,
    StandardEventKind,
};
use crate::hint::AddressHint;
use crate::rpc::{
    RpcRequest, SendTransferResponse, SignMessageResponse, SignPsbtResponse, TransferRecipient,
};
use crate::satsconnect::SatsConnectProvider;

/// Version advertised through the wallet surface.
pub const WALLET_VERSION: &str = "1.0.0";

/// Feature identifiers advertised by the wallet surface, in announcement
/// order.
pub const WALLET_FEATURES: [&str; 7] = [
    CONNECT_FEATURE,
    DISCONNECT_FEATURE,
    EVENTS_FEATURE,
    SIGN_TRANSACTION_FEATURE,
    SIGN_AND_SEND_TRANSACTION_FEATURE,
    SIGN_MESSAGE_FEATURE,
    SATS_CONNECT_FEATURE,
];

const DEFAULT_WALLET_NAME: &str = "Bitcoin Wallet";

/// How long after construction an announced address still steers session
/// restoration.
const PAGE_LOAD_WINDOW: Duration = Duration::from_millis(2000);

/// How long a fresh session waits for the backend to announce which of the
/// granted addresses the user picked.
const ACCOUNT_SELECTION_WINDOW: Duration = Duration::from_millis(200);

/// A PSBT to sign together with the accounts expected to sign it.
#[derive(Debug, Clone)]
pub struct SignTransactionInput {
    /// Raw PSBT bytes.
    pub psbt: Vec<u8>,
    /// Which accounts sign which transaction inputs.
    pub inputs_to_sign: Vec<SigningInput>,
    /// Chain the transaction targets, when the caller knows it.
    pub chain: Option<Chain>,
}

/// One signer entry of a [`SignTransactionInput`].
#[derive(Debug, Clone)]
pub struct SigningInput {
    /// The signing account.
    pub account: Account,
    /// Transaction input indexes this account signs.
    pub signing_indexes: Vec<u32>,
}

/// A signed PSBT, decoded back to raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignTransactionOutput {
    /// The signed PSBT.
    pub signed_psbt: Vec<u8>,
}

/// Input for signing and broadcasting in one step.
pub type SignAndSendTransactionInput = SignTransactionInput;

/// Identifier of a broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignAndSendTransactionOutput {
    /// Transaction id returned by the backend.
    pub tx_id: String,
}

/// A message to sign with a specific account.
#[derive(Debug, Clone)]
pub struct SignMessageInput {
    /// The signing account.
    pub account: Account,
    /// Message bytes, expected to be UTF-8 text.
    pub message: Vec<u8>,
}

/// A produced message signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignMessageOutput {
    /// Decoded signature bytes.
    pub signature: Vec<u8>,
    /// The signed payload as the backend reported it.
    pub signed_message: Vec<u8>,
}

#[derive(Debug, Default)]
struct Selection {
    account: Option<Account>,
    scope: Option<CaipScope>,
}

pub(crate) struct WalletInner {
    client: Arc<dyn MultichainClient>,
    name: String,
    state: Mutex<Selection>,
    /// Serializes connect, disconnect and notification handling so session
    /// calls from different flows never interleave.
    flow_gate: tokio::sync::Mutex<()>,
    page_load_hint: Mutex<Option<AddressHint>>,
    page_load_deadline: Instant,
    live_subscription: Mutex<Option<NotificationSubscription>>,
    standard_events: EventRegistry<StandardEventKind, ChangeEvent>,
    provider_events: EventRegistry<ProviderEventKind, ProviderEvent>,
}

impl WalletInner {
    fn selection(&self) -> MutexGuard<'_, Selection> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_account(&self) -> Option<Account> {
        self.selection().account.clone()
    }

    pub(crate) fn provider_events(&self) -> &EventRegistry<ProviderEventKind, ProviderEvent> {
        &self.provider_events
    }

    /// Connect the wallet, restoring an existing session when the backend
    /// still has one and creating a fresh mainnet session otherwise.
    pub(crate) async fn connect(self: &Arc<Self>) -> Result<Vec<Account>> {
        if let Some(account) = self.current_account() {
            return Ok(vec![account]);
        }
        let _flow = self.flow_gate.lock().await;
        if let Some(account) = self.current_account() {
            return Ok(vec![account]);
        }

        self.try_restore_session().await;
        if self.current_account().is_none() {
            self.establish_session(CaipScope::Mainnet).await?;
        }
        // The restoration hint never outlives a completed connect flow.
        *self
            .page_load_hint
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;

        let Some(account) = self.current_account() else {
            return Ok(Vec::new());
        };
        self.subscribe_live();
        Ok(vec![account])
    }

    /// Fold an already-granted session into the selection. Fetch or
    /// reconciliation failures leave the wallet ready to create a fresh
    /// session instead.
    async fn try_restore_session(&self) {
        let session = match self.client.get_session().await {
            Ok(Some(session)) => session,
            Ok(None) => return,
            Err(error) => {
                warn!(error = %error, "failed to fetch existing session");
                return;
            }
        };
        let watch = self
            .page_load_hint
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let hint = match watch {
            Some(watch) => watch.resolve_by(self.page_load_deadline).await,
            None => None,
        };
        if let Err(error) = self.reconcile(&session, hint.as_deref()) {
            warn!(error = %error, "failed to restore existing session");
        }
    }

    async fn establish_session(&self, scope: CaipScope) -> Result<()> {
        // Watch before the session call: the backend may announce the
        // selected address while approval is still in flight.
        let watch = AddressHint::watch(self.client.as_ref());
        let session = self
            .client
            .create_session(CreateSessionRequest::for_scope(scope))
            .await?;
        debug!(scope = %scope, "session created");
        let hint = watch.resolve_within(ACCOUNT_SELECTION_WINDOW).await;
        self.reconcile(&session, hint.as_deref())
    }

    /// Revoke every scope and clear the selection. Repeated calls are
    /// harmless.
    async fn disconnect(&self) -> Result<()> {
        let _flow = self.flow_gate.lock().await;
        self.client.revoke_session(&CaipScope::ALL).await?;

        let had_account = {
            let mut selection = self.selection();
            let had_account = selection.account.is_some();
            selection.account = None;
            selection.scope = None;
            had_account
        };
        *self
            .live_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;

        if had_account {
            debug!("wallet disconnected");
            self.standard_events
                .emit(StandardEventKind::Change, &ChangeEvent::default());
            self.provider_events
                .emit(ProviderEventKind::Disconnect, &ProviderEvent::Disconnect);
        }
        Ok(())
    }

    /// Route backend notifications into the wallet while it is connected.
    /// The handler only holds a weak reference, so dropping the wallet
    /// stops the routing.
    fn subscribe_live(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let subscription = self.client.on_notification(Arc::new(move |event| {
            let Some(notification) = WalletNotification::parse(event) else {
                return;
            };
            let Some(inner) = weak.upgrade() else {
                return;
            };
            tokio::spawn(async move {
                inner.handle_notification(notification).await;
            });
        }));
        *self
            .live_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscription);
    }

    async fn handle_notification(self: Arc<Self>, notification: WalletNotification) {
        match notification {
            WalletNotification::AccountsChanged { address: None } => {
                if let Err(error) = self.disconnect().await {
                    warn!(error = %error, "disconnect after empty account change failed");
                }
            }
            WalletNotification::AccountsChanged {
                address: Some(address),
            } => {
                let _flow = self.flow_gate.lock().await;
                let session = match self.client.get_session().await {
                    Ok(session) => session.unwrap_or_default(),
                    Err(error) => {
                        warn!(error = %error, "failed to fetch session after account change");
                        return;
                    }
                };
                if let Err(error) = self.reconcile(&session, Some(&address)) {
                    warn!(error = %error, "account change reconciliation failed");
                }
            }
            WalletNotification::SessionChanged { session } => {
                if session_lost(&session) {
                    if let Err(error) = self.disconnect().await {
                        warn!(error = %error, "disconnect after session loss failed");
                    }
                } else {
                    let _flow = self.flow_gate.lock().await;
                    if let Err(error) = self.reconcile(&session, None) {
                        warn!(error = %error, "session change reconciliation failed");
                    }
                }
            }
        }
    }

    fn signing_context(&self, preferred: Option<&str>) -> Result<(String, CaipScope)> {
        let selection = self.selection();
        let account = selection.account.as_ref().ok_or(Error::NoConnectedAccount)?;
        let scope = selection.scope.ok_or(Error::ScopeNotEstablished)?;
        let address = preferred.unwrap_or_else(|| account.address()).to_owned();
        Ok((address, scope))
    }

    pub(crate) async fn sign_psbt(
        &self,
        psbt: &[u8],
        broadcast: bool,
        preferred: Option<&str>,
    ) -> Result<SignPsbtResponse> {
        let (address, scope) = self.signing_context(preferred)?;
        let response = self
            .client
            .invoke_method(scope, RpcRequest::sign_psbt(psbt, broadcast, address))
            .await?;
        Ok(serde_json::from_value(response)?)
    }

    pub(crate) async fn sign_message(
        &self,
        message: &str,
        preferred: Option<&str>,
    ) -> Result<String> {
        let (address, scope) = self.signing_context(preferred)?;
        let response = self
            .client
            .invoke_method(scope, RpcRequest::sign_message(message, address))
            .await?;
        let response: SignMessageResponse = serde_json::from_value(response)?;
        Ok(response.signature)
    }

    pub(crate) async fn send_transfer(
        &self,
        recipients: Vec<TransferRecipient>,
        preferred: Option<&str>,
    ) -> Result<String> {
        let (address, scope) = self.signing_context(preferred)?;
        let response = self
            .client
            .invoke_method(scope, RpcRequest::send_transfer(recipients, address))
            .await?;
        let response: SendTransferResponse = serde_json::from_value(response)?;
        response.txid.ok_or(Error::TransactionIdMissing)
    }
}

impl std::fmt::Debug for WalletInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletInner")
            .field("name", &self.name)
            .field("state", &self.selection())
            .finish_non_exhaustive()
    }
}

/// A session lost its scopes, or its first scope no longer grants any
/// account.
fn session_lost(session: &SessionData) -> bool {
    match session.session_scopes.values().next() {
        None => true,
        Some(scope) => scope.accounts.is_empty(),
    }
}

/// A Bitcoin wallet surfaced over a multichain session client.
///
/// The wallet exposes at most one connected [`Account`] at a time and keeps
/// it reconciled against the session the backend granted. Cloning is cheap
/// and clones share state.
#[derive(Debug, Clone)]
pub struct BitcoinWallet {
    inner: Arc<WalletInner>,
}

impl BitcoinWallet {
    /// Create a builder for a [`BitcoinWallet`].
    #[must_use]
    pub fn builder() -> BitcoinWalletBuilder {
        BitcoinWalletBuilder::default()
    }

    fn new(client: Arc<dyn MultichainClient>, name: String) -> Self {
        let page_load_hint = AddressHint::watch(client.as_ref());
        let inner = Arc::new(WalletInner {
            client,
            name,
            state: Mutex::new(Selection::default()),
            flow_gate: tokio::sync::Mutex::new(()),
            page_load_hint: Mutex::new(Some(page_load_hint)),
            page_load_deadline: Instant::now() + PAGE_LOAD_WINDOW,
            live_subscription: Mutex::new(None),
            standard_events: EventRegistry::default(),
            provider_events: EventRegistry::default(),
        });
        Self { inner }
    }

    /// Wallet display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Wallet surface version.
    #[must_use]
    pub fn version(&self) -> &'static str {
        WALLET_VERSION
    }

    /// Chains this wallet can operate on.
    #[must_use]
    pub fn chains(&self) -> &'static [Chain] {
        &Chain::ALL
    }

    /// Feature identifiers the wallet surface advertises.
    #[must_use]
    pub fn features(&self) -> &'static [&'static str] {
        &WALLET_FEATURES
    }

    /// The connected accounts: one entry while connected, empty otherwise.
    #[must_use]
    pub fn accounts(&self) -> Vec<Account> {
        self.inner.current_account().into_iter().collect()
    }

    /// CAIP-2 scope of the current session, while connected.
    #[must_use]
    pub fn scope(&self) -> Option<CaipScope> {
        self.inner.selection().scope
    }

    /// Connect the wallet and return the granted accounts.
    ///
    /// Restores the backend's existing session when one is still granted,
    /// otherwise requests a fresh mainnet session. Already being connected
    /// short-circuits without any session call.
    ///
    /// # Errors
    ///
    /// Fails when creating a session fails or the granted session carries a
    /// malformed account identifier.
    pub async fn connect(&self) -> Result<Vec<Account>> {
        self.inner.connect().await
    }

    /// Revoke the session on every chain and clear the connected account.
    ///
    /// # Errors
    ///
    /// Fails when the backend rejects the revocation.
    pub async fn disconnect(&self) -> Result<()> {
        self.inner.disconnect().await
    }

    /// Sign a PSBT without broadcasting it.
    ///
    /// # Errors
    ///
    /// Fails when no account is connected, the backend rejects the request,
    /// or the response carries no signed PSBT.
    pub async fn sign_transaction(
        &self,
        input: SignTransactionInput,
    ) -> Result<Vec<SignTransactionOutput>> {
        let preferred = input
            .inputs_to_sign
            .first()
            .map(|entry| entry.account.address().to_owned());
        let response = self
            .inner
            .sign_psbt(&input.psbt, false, preferred.as_deref())
            .await?;
        let psbt = response.psbt.ok_or(Error::SignedPsbtMissing)?;
        Ok(vec![SignTransactionOutput {
            signed_psbt: BASE64_STANDARD.decode(psbt)?,
        }])
    }

    /// Sign a PSBT and broadcast the finalized transaction.
    ///
    /// # Errors
    ///
    /// Fails when no account is connected, the backend rejects the request,
    /// or the response carries no transaction id.
    pub async fn sign_and_send_transaction(
        &self,
        input: SignAndSendTransactionInput,
    ) -> Result<Vec<SignAndSendTransactionOutput>> {
        let preferred = input
            .inputs_to_sign
            .first()
            .map(|entry| entry.account.address().to_owned());
        let response = self
            .inner
            .sign_psbt(&input.psbt, true, preferred.as_deref())
            .await?;
        let tx_id = response.txid.ok_or(Error::TransactionIdMissing)?;
        Ok(vec![SignAndSendTransactionOutput { tx_id }])
    }

    /// Sign a text message with the given account.
    ///
    /// # Errors
    ///
    /// Fails when no account is connected or the backend rejects the
    /// request.
    pub async fn sign_message(&self, input: SignMessageInput) -> Result<Vec<SignMessageOutput>> {
        let message = String::from_utf8_lossy(&input.message).into_owned();
        let signature = self
            .inner
            .sign_message(&message, Some(input.account.address()))
            .await?;
        let signature = BASE64_STANDARD.decode(signature)?;
        Ok(vec![SignMessageOutput {
            signed_message: signature.clone(),
            signature,
        }])
    }

    /// Send bitcoin to one or more recipients and return the transaction
    /// id.
    ///
    /// # Errors
    ///
    /// Fails when no account is connected, the backend rejects the
    /// transfer, or the response carries no transaction id.
    pub async fn send_transfer(
        &self,
        recipients: Vec<TransferRecipient>,
        sender: Option<&str>,
    ) -> Result<String> {
        self.inner.send_transfer(recipients, sender).await
    }

    /// Register a listener for connected-account changes.
    ///
    /// The returned subscription stays registered until explicitly
    /// unsubscribed.
    pub fn on_change(
        &self,
        listener: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> EventSubscription {
        self.inner.standard_events.on(StandardEventKind::Change, listener)
    }

    /// The legacy provider surface backed by this wallet.
    #[must_use]
    pub fn provider(&self) -> SatsConnectProvider {
        SatsConnectProvider::new(Arc::clone(&self.inner))
    }
}

/// Builds a [`BitcoinWallet`].
#[derive(Default)]
pub struct BitcoinWalletBuilder {
    client: Option<Arc<dyn MultichainClient>>,
    wallet_name: Option<String>,
}

impl BitcoinWalletBuilder {
    /// Session client the wallet talks to. Required.
    #[must_use]
    pub fn client(mut self, client: Arc<dyn MultichainClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Display name of the wallet. Defaults to `Bitcoin Wallet`.
    #[must_use]
    pub fn wallet_name(mut self, wallet_name: impl Into<String>) -> Self {
        self.wallet_name = Some(wallet_name.into());
        self
    }

    /// Build the wallet. Restoration hints are accepted from this point
    /// on, so build early during page load.
    ///
    /// # Errors
    ///
    /// Returns a config error when no client was provided.
    pub fn build(self) -> Result<BitcoinWallet> {
        let client = self
            .client
            .ok_or_else(|| Error::Config("client is required".to_string()))?;
        let wallet_name = self
            .wallet_name
            .unwrap_or_else(|| DEFAULT_WALLET_NAME.to_string());
        Ok(BitcoinWallet::new(client, wallet_name))
    }
}

impl std::fmt::Debug for BitcoinWalletBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitcoinWalletBuilder")
            .field("wallet_name", &self.wallet_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::testing::{
        ADDRESS, ADDRESS_2, MockClient, account_changed_event, empty_account_changed_event,
        session_changed_event, session_with,
    };

    use super::*;

    fn wallet_over(client: &Arc<MockClient>) -> BitcoinWallet {
        BitcoinWallet::builder().client(Arc::<MockClient>::clone(client)).build().unwrap()
    }

    /// Wallet connected through the restore path with `ADDRESS` on mainnet.
    async fn connected_wallet(client: &Arc<MockClient>) -> BitcoinWallet {
        client.set_session(Some(session_with(CaipScope::Mainnet, &[ADDRESS])));
        let wallet = wallet_over(client);
        wallet.connect().await.unwrap();
        wallet
    }

    async fn settle(wallet: &BitcoinWallet, done: impl Fn(&BitcoinWallet) -> bool) {
        for _ in 0..32 {
            if done(wallet) {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_builder_requires_a_client() {
        let error = BitcoinWallet::builder().build().unwrap_err();
        assert!(matches!(error, Error::Config(_)));
        assert_eq!(error.to_string(), "config error: client is required");
    }

    #[test]
    fn test_builder_defaults() {
        let wallet = wallet_over(&Arc::new(MockClient::new()));
        assert_eq!(wallet.name(), "Bitcoin Wallet");
        assert_eq!(wallet.version(), "1.0.0");
        assert_eq!(wallet.chains(), &Chain::ALL);
        assert_eq!(wallet.features(), &WALLET_FEATURES);
        assert!(wallet.features().contains(&SATS_CONNECT_FEATURE));
        assert!(wallet.accounts().is_empty());
    }

    #[test]
    fn test_builder_accepts_a_name() {
        let wallet = BitcoinWallet::builder()
            .client(Arc::new(MockClient::new()))
            .wallet_name("Example Wallet")
            .build()
            .unwrap();
        assert_eq!(wallet.name(), "Example Wallet");
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_restores_an_existing_session() {
        let client = Arc::new(MockClient::new());
        client.set_session(Some(session_with(CaipScope::Mainnet, &[ADDRESS])));
        let wallet = wallet_over(&client);

        let accounts = wallet.connect().await.unwrap();

        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].address(), ADDRESS);
        assert_eq!(wallet.accounts(), accounts);
        assert_eq!(client.get_session_calls(), 1);
        assert!(client.create_session_requests().is_empty());
        // Page-load watch retired, live routing registered.
        assert_eq!(client.handler_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_creates_a_session_when_none_exists() {
        let client = Arc::new(MockClient::new());
        client.set_created_session(session_with(CaipScope::Mainnet, &[ADDRESS]));
        let wallet = wallet_over(&client);

        let accounts = wallet.connect().await.unwrap();

        assert_eq!(accounts[0].address(), ADDRESS);
        let requests = client.create_session_requests();
        assert_eq!(requests, vec![CreateSessionRequest::for_scope(CaipScope::Mainnet)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_waits_for_the_announced_address() {
        let client = Arc::new(MockClient::new());
        client.set_created_session(session_with(CaipScope::Mainnet, &[ADDRESS, ADDRESS_2]));
        let wallet = wallet_over(&client);

        let handle = tokio::spawn({
            let wallet = wallet.clone();
            async move { wallet.connect().await }
        });
        // Let the connect flow reach the post-creation wait, then announce.
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        client.emit(&account_changed_event(ADDRESS_2));

        let accounts = handle.await.unwrap().unwrap();
        assert_eq!(accounts[0].address(), ADDRESS_2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_falls_back_to_the_first_granted_account() {
        let client = Arc::new(MockClient::new());
        client.set_created_session(session_with(CaipScope::Mainnet, &[ADDRESS, ADDRESS_2]));
        let wallet = wallet_over(&client);

        let accounts = wallet.connect().await.unwrap();
        assert_eq!(accounts[0].address(), ADDRESS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_short_circuits_while_connected() {
        let client = Arc::new(MockClient::new());
        let wallet = connected_wallet(&client).await;

        let again = wallet.connect().await.unwrap();

        assert_eq!(again[0].address(), ADDRESS);
        assert_eq!(client.get_session_calls(), 1);
        assert!(client.create_session_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_with_an_empty_grant_stays_disconnected() {
        let client = Arc::new(MockClient::new());
        let wallet = wallet_over(&client);

        let accounts = wallet.connect().await.unwrap();

        assert!(accounts.is_empty());
        assert!(wallet.accounts().is_empty());
        assert_eq!(client.create_session_requests().len(), 1);
        // No live routing without a connected account.
        assert_eq!(client.handler_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_surfaces_creation_failures() {
        let client = Arc::new(MockClient::new());
        client.fail_create_session("user rejected");
        let wallet = wallet_over(&client);

        let error = wallet.connect().await.unwrap_err();
        assert!(matches!(error, Error::Client(_)));
        assert!(wallet.accounts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_recovers_from_a_failed_session_fetch() {
        let client = Arc::new(MockClient::new());
        client.fail_get_session("transport down");
        client.set_created_session(session_with(CaipScope::Mainnet, &[ADDRESS]));
        let wallet = wallet_over(&client);

        let accounts = wallet.connect().await.unwrap();

        assert_eq!(accounts[0].address(), ADDRESS);
        assert_eq!(client.create_session_requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_load_announcement_steers_restoration() {
        let client = Arc::new(MockClient::new());
        client.set_session(Some(session_with(CaipScope::Mainnet, &[ADDRESS, ADDRESS_2])));
        let wallet = wallet_over(&client);

        // The announcement lands before anyone calls connect.
        client.emit(&account_changed_event(ADDRESS_2));

        let accounts = wallet.connect().await.unwrap();
        assert_eq!(accounts[0].address(), ADDRESS_2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_revokes_and_clears() {
        let client = Arc::new(MockClient::new());
        let wallet = connected_wallet(&client).await;

        let changes = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&changes);
        let _change_subscription = wallet.on_change(move |event| {
            assert!(event.accounts.is_empty());
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let disconnects = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&disconnects);
        let _provider_subscription = wallet
            .inner
            .provider_events()
            .on(ProviderEventKind::Disconnect, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            });

        wallet.disconnect().await.unwrap();

        assert!(wallet.accounts().is_empty());
        assert_eq!(client.revocations(), vec![CaipScope::ALL.to_vec()]);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(client.handler_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_twice_emits_once() {
        let client = Arc::new(MockClient::new());
        let wallet = connected_wallet(&client).await;

        let changes = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&changes);
        let _subscription = wallet.on_change(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        wallet.disconnect().await.unwrap();
        wallet.disconnect().await.unwrap();

        assert_eq!(changes.load(Ordering::SeqCst), 1);
        assert_eq!(client.revocations().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_account_change_disconnects() {
        let client = Arc::new(MockClient::new());
        let wallet = connected_wallet(&client).await;

        let changes = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&changes);
        let _subscription = wallet.on_change(move |event| {
            assert!(event.accounts.is_empty());
            seen.fetch_add(1, Ordering::SeqCst);
        });

        client.emit(&empty_account_changed_event());
        settle(&wallet, |wallet| wallet.accounts().is_empty()).await;

        assert!(wallet.accounts().is_empty());
        assert_eq!(client.revocations(), vec![CaipScope::ALL.to_vec()]);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_account_change_reselects_from_a_fresh_session() {
        let client = Arc::new(MockClient::new());
        let wallet = connected_wallet(&client).await;
        client.set_session(Some(session_with(CaipScope::Mainnet, &[ADDRESS, ADDRESS_2])));

        client.emit(&account_changed_event(ADDRESS_2));
        settle(&wallet, |wallet| {
            wallet.accounts().first().map(Account::address) == Some(ADDRESS_2)
        })
        .await;

        assert_eq!(wallet.accounts()[0].address(), ADDRESS_2);
        assert_eq!(client.get_session_calls(), 2);
        assert!(client.revocations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_change_with_grants_reconciles() {
        let client = Arc::new(MockClient::new());
        let wallet = connected_wallet(&client).await;

        let session = session_with(CaipScope::Mainnet, &[ADDRESS_2]);
        client.emit(&session_changed_event(&session));
        settle(&wallet, |wallet| {
            wallet.accounts().first().map(Account::address) == Some(ADDRESS_2)
        })
        .await;

        assert_eq!(wallet.accounts()[0].address(), ADDRESS_2);
        // The carried snapshot is authoritative; no session fetch happens.
        assert_eq!(client.get_session_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_change_without_grants_disconnects() {
        let client = Arc::new(MockClient::new());
        let wallet = connected_wallet(&client).await;

        client.emit(&session_changed_event(&SessionData::default()));
        settle(&wallet, |wallet| wallet.accounts().is_empty()).await;

        assert!(wallet.accounts().is_empty());
        assert_eq!(client.revocations().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_transaction_decodes_the_signed_psbt() {
        let client = Arc::new(MockClient::new());
        let wallet = connected_wallet(&client).await;
        client.set_invoke_result(json!({ "psbt": BASE64_STANDARD.encode(b"signed-psbt") }));

        let outputs = wallet
            .sign_transaction(SignTransactionInput {
                psbt: b"unsigned".to_vec(),
                inputs_to_sign: vec![SigningInput {
                    account: wallet.accounts()[0].clone(),
                    signing_indexes: vec![0],
                }],
                chain: Some(Chain::Mainnet),
            })
            .await
            .unwrap();

        assert_eq!(outputs, vec![SignTransactionOutput { signed_psbt: b"signed-psbt".to_vec() }]);
        let invocations = client.invocations();
        assert_eq!(invocations[0].0, CaipScope::Mainnet);
        assert_eq!(
            serde_json::to_value(&invocations[0].1).unwrap(),
            json!({
                "method": "signPsbt",
                "params": {
                    "psbt": BASE64_STANDARD.encode(b"unsigned"),
                    "options": { "fill": true, "broadcast": false },
                    "account": { "address": ADDRESS },
                },
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_transaction_requires_a_signed_psbt() {
        let client = Arc::new(MockClient::new());
        let wallet = connected_wallet(&client).await;
        client.set_invoke_result(json!({ "txid": "ab12" }));

        let error = wallet
            .sign_transaction(SignTransactionInput {
                psbt: b"unsigned".to_vec(),
                inputs_to_sign: Vec::new(),
                chain: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(error, Error::SignedPsbtMissing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_and_send_returns_the_transaction_id() {
        let client = Arc::new(MockClient::new());
        let wallet = connected_wallet(&client).await;
        client.set_invoke_result(json!({ "txid": "ab12cd34" }));

        let outputs = wallet
            .sign_and_send_transaction(SignAndSendTransactionInput {
                psbt: b"unsigned".to_vec(),
                inputs_to_sign: Vec::new(),
                chain: None,
            })
            .await
            .unwrap();

        assert_eq!(outputs, vec![SignAndSendTransactionOutput { tx_id: "ab12cd34".into() }]);
        let invocations = client.invocations();
        let value = serde_json::to_value(&invocations[0].1).unwrap();
        assert_eq!(value["params"]["options"], json!({ "fill": true, "broadcast": true }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_and_send_requires_a_transaction_id() {
        let client = Arc::new(MockClient::new());
        let wallet = connected_wallet(&client).await;
        client.set_invoke_result(json!({}));

        let error = wallet
            .sign_and_send_transaction(SignAndSendTransactionInput {
                psbt: b"unsigned".to_vec(),
                inputs_to_sign: Vec::new(),
                chain: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(error, Error::TransactionIdMissing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_message_decodes_the_signature() {
        let client = Arc::new(MockClient::new());
        let wallet = connected_wallet(&client).await;
        client.set_invoke_result(json!({ "signature": BASE64_STANDARD.encode(b"sig-bytes") }));

        let outputs = wallet
            .sign_message(SignMessageInput {
                account: wallet.accounts()[0].clone(),
                message: b"hello world".to_vec(),
            })
            .await
            .unwrap();

        assert_eq!(outputs[0].signature, b"sig-bytes");
        assert_eq!(outputs[0].signed_message, b"sig-bytes");
        let invocations = client.invocations();
        assert_eq!(
            serde_json::to_value(&invocations[0].1).unwrap(),
            json!({
                "method": "signMessage",
                "params": {
                    "message": "hello world",
                    "account": { "address": ADDRESS },
                },
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_transfer_returns_the_transaction_id() {
        let client = Arc::new(MockClient::new());
        let wallet = connected_wallet(&client).await;
        client.set_invoke_result(json!({ "txid": "feed" }));

        let txid = wallet
            .send_transfer(vec![TransferRecipient::from_sats(ADDRESS_2, 1500)], None)
            .await
            .unwrap();

        assert_eq!(txid, "feed");
        let invocations = client.invocations();
        assert_eq!(
            serde_json::to_value(&invocations[0].1).unwrap(),
            json!({
                "method": "sendTransfer",
                "params": {
                    "recipients": [{ "address": ADDRESS_2, "amount": "1500" }],
                    "account": { "address": ADDRESS },
                },
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_require_a_connected_account() {
        let wallet = wallet_over(&Arc::new(MockClient::new()));

        let error = wallet
            .sign_message(SignMessageInput { account: Account::new(ADDRESS), message: vec![] })
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NoConnectedAccount));

        let error = wallet.send_transfer(Vec::new(), None).await.unwrap_err();
        assert!(matches!(error, Error::NoConnectedAccount));
    }
}
