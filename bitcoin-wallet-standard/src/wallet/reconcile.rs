//! Folding session snapshots into the wallet's selected account and scope.

use tracing::debug;

use crate::account::Account;
use crate::caip::{self, CaipScope};
use crate::client::SessionData;
use crate::error::Result;
use crate::events::{ChangeEvent, ProviderEvent, ProviderEventKind, StandardEventKind};
use crate::satsconnect::Address;

use super::WalletInner;

impl WalletInner {
    /// Reconcile the selection against a session snapshot.
    ///
    /// The first scope of the priority order the session grants wins. Within
    /// it the hinted address is taken when granted, then the previously
    /// selected one, then the scope's first entry. The stored [`Account`] is
    /// replaced only when the resolved address differs from the current one,
    /// and exactly then a change is dispatched on both event surfaces. The
    /// scope is updated either way.
    ///
    /// Callers hold the connection flow gate, so reconciliations never race
    /// each other.
    pub(crate) fn reconcile(&self, session: &SessionData, hint: Option<&str>) -> Result<()> {
        let Some((scope, accounts)) = granted_scope(session) else {
            self.clear_selection();
            return Ok(());
        };
        let Some(first) = accounts.first() else {
            self.clear_selection();
            return Ok(());
        };

        let previous = self.selection().account.clone();
        let resolved = if let Some(hinted) =
            hint.filter(|hinted| accounts.contains(&scope.account_id(hinted)))
        {
            hinted.to_owned()
        } else if let Some(kept) = previous
            .as_ref()
            .map(Account::address)
            .filter(|kept| accounts.contains(&scope.account_id(kept)))
        {
            kept.to_owned()
        } else {
            caip::account_address(first)?.to_owned()
        };

        let changed = previous.as_ref().map(Account::address) != Some(resolved.as_str());
        if changed {
            let account = Account::new(resolved);
            {
                let mut selection = self.selection();
                selection.account = Some(account.clone());
                selection.scope = Some(scope);
            }
            debug!(address = %account.address(), scope = %scope, "selected account changed");
            self.standard_events.emit(
                StandardEventKind::Change,
                &ChangeEvent { accounts: vec![account.clone()] },
            );
            self.provider_events.emit(
                ProviderEventKind::AccountChange,
                &ProviderEvent::AccountChange { addresses: vec![Address::payment(&account)] },
            );
        } else {
            self.selection().scope = Some(scope);
        }
        Ok(())
    }

    /// Drop the selected account and scope without dispatching events.
    pub(crate) fn clear_selection(&self) {
        let mut selection = self.selection();
        if selection.account.is_some() {
            debug!("session grants no usable account, clearing selection");
        }
        selection.account = None;
        selection.scope = None;
    }
}

/// First scope of the priority order the session carries, with the account
/// ids it grants.
///
/// Presence decides, not usability: a granted scope with an empty account
/// list still shadows a later populated one.
fn granted_scope(session: &SessionData) -> Option<(CaipScope, &[String])> {
    CaipScope::ALL.into_iter().find_map(|scope| {
        session
            .session_scopes
            .get(scope.id())
            .map(|grant| (scope, grant.accounts.as_slice()))
    })
}
