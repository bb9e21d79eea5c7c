//! Ordered login-hint resolution.
//!
//! Sources are consulted in [`LOGIN_HINT_CHAIN`] order and the first non-empty value wins;
//! later sources are never consulted once a value is found, and values are never merged.

// self
use crate::{_prelude::*, auth::AccountInfo, obs, store::AccountStore};

/// Signature shared by every login-hint lookup.
pub type LoginHintLookup = fn(&LoginHintContext<'_>) -> Result<Option<String>>;

/// Lookups in resolution order.
pub const LOGIN_HINT_CHAIN: [(LoginHintSource, LoginHintLookup); 4] = [
	(LoginHintSource::RequestHint, from_request_hint),
	(LoginHintSource::RequestAccount, from_request_account),
	(LoginHintSource::ActiveAccount, from_active_account),
	(LoginHintSource::LegacyHint, from_legacy_hint),
];

/// Where a resolved login hint came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoginHintSource {
	/// Hint passed explicitly on the request.
	RequestHint,
	/// Username of the account passed on the request.
	RequestAccount,
	/// Username of the store's active account.
	ActiveAccount,
	/// Hint left behind by a prior-session (legacy) cache.
	LegacyHint,
}
impl LoginHintSource {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LoginHintSource::RequestHint => "request_hint",
			LoginHintSource::RequestAccount => "request_account",
			LoginHintSource::ActiveAccount => "active_account",
			LoginHintSource::LegacyHint => "legacy_hint",
		}
	}

	/// Runs this source's lookup from [`LOGIN_HINT_CHAIN`] in isolation.
	pub fn lookup(self, ctx: &LoginHintContext<'_>) -> Result<Option<String>> {
		LOGIN_HINT_CHAIN
			.iter()
			.find(|(source, _)| *source == self)
			.map_or(Ok(None), |(_, lookup)| lookup(ctx))
	}
}
impl Display for LoginHintSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Inputs available to login-hint lookups.
pub struct LoginHintContext<'a> {
	/// Hint supplied on the request.
	pub request_hint: Option<&'a str>,
	/// Account supplied on the request.
	pub request_account: Option<&'a AccountInfo>,
	/// Account store consulted for the active account and legacy hint.
	pub store: &'a dyn AccountStore,
}
impl Debug for LoginHintContext<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginHintContext")
			.field("request_hint", &self.request_hint)
			.field("request_account", &self.request_account)
			.finish_non_exhaustive()
	}
}

/// Login hint paired with the source that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedLoginHint {
	/// Winning source.
	pub source: LoginHintSource,
	/// Hint value.
	pub value: String,
}

/// Walks [`LOGIN_HINT_CHAIN`] and returns the first non-empty hint.
pub fn resolve_login_hint(ctx: &LoginHintContext<'_>) -> Result<Option<ResolvedLoginHint>> {
	for (source, lookup) in LOGIN_HINT_CHAIN {
		if let Some(value) = lookup(ctx)?.filter(|value| !value.is_empty()) {
			obs::log_debug!(source = source.as_str(), "Resolved login hint.");

			return Ok(Some(ResolvedLoginHint { source, value }));
		}

		obs::log_debug!(source = source.as_str(), "Login hint source yielded nothing.");
	}

	Ok(None)
}

fn from_request_hint(ctx: &LoginHintContext<'_>) -> Result<Option<String>> {
	Ok(ctx.request_hint.map(str::to_owned))
}

fn from_request_account(ctx: &LoginHintContext<'_>) -> Result<Option<String>> {
	Ok(ctx.request_account.and_then(AccountInfo::login_hint).map(str::to_owned))
}

fn from_active_account(ctx: &LoginHintContext<'_>) -> Result<Option<String>> {
	let account = ctx.store.active_account()?;

	Ok(account.as_ref().and_then(AccountInfo::login_hint).map(str::to_owned))
}

fn from_legacy_hint(ctx: &LoginHintContext<'_>) -> Result<Option<String>> {
	Ok(ctx.store.legacy_login_hint()?)
}
