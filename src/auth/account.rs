//! Account records read from the account store and returned by the broker.

// self
use crate::{_prelude::*, auth::AccountId};

/// Signed-in account as known to the account store and the broker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
	/// Opaque home account identifier.
	pub home_account_id: AccountId,
	/// Username (typically a UPN or email) used as a login hint.
	pub username: String,
	/// Identity provider host that issued the account.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub environment: Option<String>,
	/// Tenant the account was authenticated in.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tenant_id: Option<String>,
	/// Tenant-local object identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub local_account_id: Option<String>,
	/// Display name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}
impl AccountInfo {
	/// Creates an account with only the identifier and username populated.
	pub fn new(home_account_id: AccountId, username: impl Into<String>) -> Self {
		Self {
			home_account_id,
			username: username.into(),
			environment: None,
			tenant_id: None,
			local_account_id: None,
			name: None,
		}
	}

	/// Sets the tenant identifier.
	pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
		self.tenant_id = Some(tenant_id.into());

		self
	}

	/// Sets the display name.
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());

		self
	}

	/// Username if it is non-empty.
	pub fn login_hint(&self) -> Option<&str> {
		Some(self.username.as_str()).filter(|username| !username.is_empty())
	}
}
