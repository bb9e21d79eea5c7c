//! Developer-facing requests and the builder that turns them into broker payloads.
//!
//! Building happens in two steps. [`RequestBuilder::normalize_base`] resolves the fields every
//! broker request shares (correlation id, authority, extra parameters); each request kind then
//! applies its own extension step on top of that [`BaseRequest`]. The builder only reads from
//! the account store and the crypto provider and never mutates the caller's request.

pub mod login_hint;
pub mod strategy;

pub use login_hint::*;
pub use strategy::*;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{AccountId, AccountInfo, CorrelationId, ScopeSet},
	config::BridgeConfig,
	crypto::CryptoProvider,
	envelope::BrokerMethod,
	error::{ConfigError, ValidationError},
	obs,
	store::AccountStore,
};

/// Prompt behavior requested from the broker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptValue {
	/// Silent only; the broker fails instead of showing UI.
	#[default]
	None,
	/// Force credential entry.
	Login,
	/// Show the account picker.
	SelectAccount,
	/// Force the consent screen.
	Consent,
	/// Offer account creation.
	Create,
}

/// Token binding scheme requested from the broker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthenticationScheme {
	/// Plain bearer tokens.
	#[default]
	#[serde(rename = "Bearer")]
	Bearer,
	/// Proof-of-possession tokens.
	#[serde(rename = "pop")]
	Pop,
}

/// Developer-facing token request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AcquireRequest {
	/// Requested scopes; at least one is required.
	pub scopes: Vec<String>,
	/// Account to acquire the token for.
	pub account: Option<AccountInfo>,
	/// Explicit login hint.
	pub login_hint: Option<String>,
	/// Nonce to embed in the ID token; generated when absent.
	pub nonce: Option<String>,
	/// Prompt behavior; `none` when absent.
	pub prompt: Option<PromptValue>,
	/// Redirect URI override.
	pub redirect_uri: Option<Url>,
	/// Caller-chosen correlation id; generated when absent.
	pub correlation_id: Option<String>,
	/// Authority override.
	pub authority: Option<Url>,
	/// Claims challenge forwarded to the broker.
	pub claims: Option<String>,
	/// Token binding scheme.
	pub authentication_scheme: AuthenticationScheme,
	/// Extra parameters forwarded verbatim.
	pub extra_parameters: BTreeMap<String, String>,
}
impl AcquireRequest {
	/// Creates a request for the provided scopes.
	pub fn new<I, S>(scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { scopes: scopes.into_iter().map(Into::into).collect(), ..Default::default() }
	}

	/// Targets a specific account.
	pub fn with_account(mut self, account: AccountInfo) -> Self {
		self.account = Some(account);

		self
	}

	/// Sets an explicit login hint.
	pub fn with_login_hint(mut self, hint: impl Into<String>) -> Self {
		self.login_hint = Some(hint.into());

		self
	}

	/// Sets the nonce.
	pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
		self.nonce = Some(nonce.into());

		self
	}

	/// Sets the prompt behavior.
	pub fn with_prompt(mut self, prompt: PromptValue) -> Self {
		self.prompt = Some(prompt);

		self
	}

	/// Overrides the redirect URI.
	pub fn with_redirect_uri(mut self, url: Url) -> Self {
		self.redirect_uri = Some(url);

		self
	}

	/// Sets the correlation id.
	pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
		self.correlation_id = Some(id.into());

		self
	}

	/// Overrides the authority.
	pub fn with_authority(mut self, url: Url) -> Self {
		self.authority = Some(url);

		self
	}

	/// Attaches a claims challenge.
	pub fn with_claims(mut self, claims: impl Into<String>) -> Self {
		self.claims = Some(claims.into());

		self
	}

	/// Selects the token binding scheme.
	pub fn with_authentication_scheme(mut self, scheme: AuthenticationScheme) -> Self {
		self.authentication_scheme = scheme;

		self
	}

	/// Adds an extra parameter.
	pub fn with_extra_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra_parameters.insert(key.into(), value.into());

		self
	}
}

/// Developer-facing sign-out request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogoutRequest {
	/// Account to sign out; the active account when absent.
	pub account: Option<AccountInfo>,
	/// Post-logout redirect URI override.
	pub post_logout_redirect_uri: Option<Url>,
	/// Caller-chosen correlation id; generated when absent.
	pub correlation_id: Option<String>,
	/// Authority override.
	pub authority: Option<Url>,
}
impl LogoutRequest {
	/// Signs out the provided account.
	pub fn for_account(account: AccountInfo) -> Self {
		Self { account: Some(account), ..Default::default() }
	}

	/// Overrides the post-logout redirect URI.
	pub fn with_post_logout_redirect_uri(mut self, url: Url) -> Self {
		self.post_logout_redirect_uri = Some(url);

		self
	}

	/// Sets the correlation id.
	pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
		self.correlation_id = Some(id.into());

		self
	}
}

/// Fields shared by every broker request kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseRequest {
	/// Correlation id for this call.
	pub correlation_id: CorrelationId,
	/// Authority the broker should authenticate against.
	pub authority: Url,
	/// Extra parameters forwarded verbatim.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub extra_parameters: BTreeMap<String, String>,
}

/// Payloads the builder produces, keyed by the broker method that carries them.
pub trait BrokerPayload
where
	Self: Serialize + DeserializeOwned,
{
	/// Method this payload is sent with.
	const METHOD: BrokerMethod;

	/// Shared base fields.
	fn base(&self) -> &BaseRequest;

	/// Correlation id of the call.
	fn correlation_id(&self) -> &CorrelationId {
		&self.base().correlation_id
	}
}

/// Canonical `GetToken` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerTokenRequest {
	/// Shared base fields.
	#[serde(flatten)]
	pub base: BaseRequest,
	/// Application (client) identifier.
	pub client_id: String,
	/// Resolved redirect URI.
	pub redirect_uri: Url,
	/// Normalized scopes.
	pub scopes: ScopeSet,
	/// Prompt behavior.
	pub prompt: PromptValue,
	/// Nonce for the ID token.
	pub nonce: String,
	/// Resolved login hint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub login_hint: Option<String>,
	/// Claims challenge.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub claims: Option<String>,
	/// Token binding scheme.
	pub authentication_scheme: AuthenticationScheme,
}
impl BrokerPayload for BrokerTokenRequest {
	const METHOD: BrokerMethod = BrokerMethod::GetToken;

	fn base(&self) -> &BaseRequest {
		&self.base
	}
}

/// Canonical `SignOut` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerSignOutRequest {
	/// Shared base fields.
	#[serde(flatten)]
	pub base: BaseRequest,
	/// Application (client) identifier.
	pub client_id: String,
	/// Home account id of the account being signed out.
	pub account_id: AccountId,
	/// Username of the account being signed out.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub login_hint: Option<String>,
	/// Where the broker should send the user afterwards.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub post_logout_redirect_uri: Option<Url>,
}
impl BrokerPayload for BrokerSignOutRequest {
	const METHOD: BrokerMethod = BrokerMethod::SignOut;

	fn base(&self) -> &BaseRequest {
		&self.base
	}
}

/// Builds broker payloads from developer requests.
///
/// The builder borrows its collaborators for the duration of one call and keeps no state of
/// its own.
pub struct RequestBuilder<'a> {
	config: &'a BridgeConfig,
	store: &'a dyn AccountStore,
	crypto: &'a dyn CryptoProvider,
	strategy: &'a dyn RequestStrategy,
}
impl<'a> RequestBuilder<'a> {
	/// Creates a builder over the provided collaborators.
	pub fn new(
		config: &'a BridgeConfig,
		store: &'a dyn AccountStore,
		crypto: &'a dyn CryptoProvider,
		strategy: &'a dyn RequestStrategy,
	) -> Self {
		Self { config, store, crypto, strategy }
	}

	/// Builds the canonical `GetToken` payload.
	pub fn build_token_request(&self, request: &AcquireRequest) -> Result<BrokerTokenRequest> {
		obs::log_debug!("Building broker token request.");

		let client_id = self.client_id()?;

		if request.scopes.is_empty() {
			return Err(ValidationError::EmptyScopes.into());
		}

		let scopes = ScopeSet::new(request.scopes.iter().cloned()).map_err(ValidationError::from)?;
		let redirect_uri = match (&request.redirect_uri, &self.config.redirect_uri) {
			(Some(uri), _) => {
				obs::log_debug!("Using request redirect URI.");

				uri.clone()
			},
			(None, Some(uri)) => {
				obs::log_debug!("Using configured redirect URI.");

				uri.clone()
			},
			(None, None) => return Err(ConfigError::MissingRedirectUri.into()),
		};
		let base = self.normalize_base(
			BrokerMethod::GetToken,
			request.correlation_id.as_deref(),
			request.authority.as_ref(),
			&request.extra_parameters,
		)?;
		let nonce = match request.nonce.as_deref().filter(|nonce| !nonce.is_empty()) {
			Some(nonce) => nonce.to_owned(),
			None => {
				obs::log_debug!("Generating nonce.");

				self.crypto.new_opaque_token()
			},
		};
		let prompt = request.prompt.unwrap_or_default();
		let login_hint = resolve_login_hint(&LoginHintContext {
			request_hint: request.login_hint.as_deref(),
			request_account: request.account.as_ref(),
			store: self.store,
		})?
		.map(|hint| hint.value);

		obs::log_debug!(
			correlation_id = %base.correlation_id,
			prompt = ?prompt,
			login_hint_present = login_hint.is_some(),
			"Built broker token request."
		);

		Ok(BrokerTokenRequest {
			base,
			client_id,
			redirect_uri,
			scopes,
			prompt,
			nonce,
			login_hint,
			claims: request.claims.clone().filter(|claims| !claims.is_empty()),
			authentication_scheme: request.authentication_scheme,
		})
	}

	/// Builds the canonical `SignOut` payload.
	pub fn build_sign_out_request(&self, request: &LogoutRequest) -> Result<BrokerSignOutRequest> {
		obs::log_debug!("Building broker sign-out request.");

		let client_id = self.client_id()?;
		let account = match &request.account {
			Some(account) => account.clone(),
			None => self.store.active_account()?.ok_or(ValidationError::MissingAccount)?,
		};
		let base = self.normalize_base(
			BrokerMethod::SignOut,
			request.correlation_id.as_deref(),
			request.authority.as_ref(),
			&BTreeMap::new(),
		)?;
		let post_logout_redirect_uri = request
			.post_logout_redirect_uri
			.clone()
			.or_else(|| self.config.post_logout_redirect_uri.clone());

		Ok(BrokerSignOutRequest {
			base,
			client_id,
			login_hint: account.login_hint().map(str::to_owned),
			account_id: account.home_account_id,
			post_logout_redirect_uri,
		})
	}

	/// Resolves the fields shared by every request kind and applies the request strategy.
	pub fn normalize_base(
		&self,
		method: BrokerMethod,
		correlation_id: Option<&str>,
		authority: Option<&Url>,
		extra_parameters: &BTreeMap<String, String>,
	) -> Result<BaseRequest> {
		let correlation_id = match correlation_id {
			Some(id) => CorrelationId::new(id).map_err(ValidationError::from)?,
			None => CorrelationId::new(self.crypto.new_guid()).map_err(ValidationError::from)?,
		};
		let authority = authority.unwrap_or(&self.config.authority).clone();
		let mut extra_parameters = extra_parameters.clone();

		self.strategy.augment_request(method, &mut extra_parameters);

		Ok(BaseRequest { correlation_id, authority, extra_parameters })
	}

	fn client_id(&self) -> Result<String> {
		let client_id = self.config.client_id.trim();

		if client_id.is_empty() {
			return Err(ConfigError::MissingClientId.into());
		}

		Ok(client_id.to_owned())
	}
}
impl Debug for RequestBuilder<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestBuilder").field("client_id", &self.config.client_id).finish()
	}
}
