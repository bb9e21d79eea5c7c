//! Thread-safe in-memory [`AccountStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, AccountInfo},
	store::{AccountStore, StoreError},
};

#[derive(Debug, Default)]
struct State {
	accounts: HashMap<AccountId, AccountInfo>,
	active: Option<AccountId>,
	legacy_login_hint: Option<String>,
}

/// Account store that keeps records in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryAccountStore(Arc<RwLock<State>>);
impl MemoryAccountStore {
	/// Inserts or replaces an account.
	pub fn insert(&self, account: AccountInfo) {
		self.0.write().accounts.insert(account.home_account_id.clone(), account);
	}

	/// Inserts the account (if needed) and marks it active.
	pub fn set_active(&self, account: AccountInfo) {
		let mut state = self.0.write();

		state.active = Some(account.home_account_id.clone());
		state.accounts.insert(account.home_account_id.clone(), account);
	}

	/// Clears the active account without removing it.
	pub fn clear_active(&self) {
		self.0.write().active = None;
	}

	/// Seeds the legacy login hint.
	pub fn set_legacy_login_hint(&self, hint: impl Into<String>) {
		self.0.write().legacy_login_hint = Some(hint.into());
	}

	/// Looks up an account by its home account id.
	pub fn account(&self, id: &str) -> Option<AccountInfo> {
		self.0.read().accounts.get(id).cloned()
	}
}
impl AccountStore for MemoryAccountStore {
	fn active_account(&self) -> Result<Option<AccountInfo>, StoreError> {
		let state = self.0.read();

		Ok(state.active.as_ref().and_then(|id| state.accounts.get(id)).cloned())
	}

	fn legacy_login_hint(&self) -> Result<Option<String>, StoreError> {
		Ok(self.0.read().legacy_login_hint.clone())
	}
}
