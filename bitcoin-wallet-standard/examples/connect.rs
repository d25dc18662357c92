use std::sync::Arc;

use async_trait::async_trait;
use bitcoin_wallet_standard::wallet::SignMessageInput;
use bitcoin_wallet_standard::{
    BitcoinWallet, CaipScope, ClientResult, CreateSessionRequest, MultichainClient,
    NotificationHandler, NotificationSubscription, RpcRequest, SessionData, SessionScope,
};
use serde_json::{Value, json};

/// In-memory wallet backend granting a single mainnet account.
struct DemoClient;

#[async_trait]
impl MultichainClient for DemoClient {
    async fn get_session(&self) -> ClientResult<Option<SessionData>> {
        Ok(None)
    }

    async fn create_session(&self, request: CreateSessionRequest) -> ClientResult<SessionData> {
        let mut session = SessionData::default();
        for scope in request.optional_scopes.keys() {
            session.session_scopes.insert(
                scope.clone(),
                SessionScope {
                    accounts: vec![format!(
                        "{scope}:bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"
                    )],
                    ..SessionScope::default()
                },
            );
        }
        Ok(session)
    }

    async fn revoke_session(&self, _scopes: &[CaipScope]) -> ClientResult<()> {
        Ok(())
    }

    async fn invoke_method(&self, _scope: CaipScope, request: RpcRequest) -> ClientResult<Value> {
        Ok(match request {
            // "Sign" by echoing the PSBT back.
            RpcRequest::SignPsbt { psbt, .. } => json!({ "psbt": psbt, "txid": "demo-txid" }),
            RpcRequest::SignMessage { .. } => json!({ "signature": "c2lnbmF0dXJl" }),
            RpcRequest::SendTransfer { .. } => json!({ "txid": "demo-txid" }),
        })
    }

    fn on_notification(&self, _handler: NotificationHandler) -> NotificationSubscription {
        NotificationSubscription::new(|| {})
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let wallet = BitcoinWallet::builder()
        .client(Arc::new(DemoClient))
        .wallet_name("Demo Wallet")
        .build()?;

    // No restorable session here, so connect negotiates a fresh one.
    let accounts = wallet.connect().await?;
    println!("connected: {}", accounts[0].address());

    let outputs = wallet
        .sign_message(SignMessageInput {
            account: accounts[0].clone(),
            message: b"hello from the demo".to_vec(),
        })
        .await?;
    println!("signature: {} bytes", outputs[0].signature.len());

    wallet.disconnect().await?;
    println!("disconnected; accounts now: {:?}", wallet.accounts());

    Ok(())
}
