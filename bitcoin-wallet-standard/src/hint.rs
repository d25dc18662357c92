//! Bounded wait for an address pushed by the wallet backend.
//!
//! The backend announces the user's selection through an account-changed
//! notification that races the session calls around it. An [`AddressHint`]
//! owns that race: a oneshot for the first announced address and the
//! notification subscription keeping the watch alive. The watch starts
//! buffering as soon as it is created; the deadline is picked when the
//! caller is ready to wait. Consuming or dropping the hint tears the watch
//! down, so the losing side of the race never leaves a handler behind.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, timeout_at};

use crate::client::{MultichainClient, NotificationSubscription, WalletNotification};

pub(crate) struct AddressHint {
    receiver: oneshot::Receiver<String>,
    _subscription: NotificationSubscription,
}

impl AddressHint {
    /// Start watching for an announced address.
    pub(crate) fn watch(client: &dyn MultichainClient) -> Self {
        let (sender, receiver) = oneshot::channel();
        let sender = Mutex::new(Some(sender));
        let subscription = client.on_notification(Arc::new(move |event| {
            if let Some(WalletNotification::AccountsChanged { address: Some(address) }) =
                WalletNotification::parse(event)
            {
                let taken = sender.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(sender) = taken {
                    // The receiver may already be gone; a late address is
                    // simply dropped.
                    let _ = sender.send(address);
                }
            }
        }));
        Self { receiver, _subscription: subscription }
    }

    /// Wait for the address until `deadline`.
    ///
    /// An address buffered before the call resolves immediately, even when
    /// the deadline has already passed.
    pub(crate) async fn resolve_by(mut self, deadline: Instant) -> Option<String> {
        if let Ok(address) = self.receiver.try_recv() {
            return Some(address);
        }
        timeout_at(deadline, self.receiver).await.ok()?.ok()
    }

    /// Wait for the address for at most `window` from now.
    pub(crate) async fn resolve_within(self, window: Duration) -> Option<String> {
        self.resolve_by(Instant::now() + window).await
    }
}
