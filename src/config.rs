//! Static bridge configuration and its validating builder.
//!
//! Configuration is loaded by the host application (file, environment, hard-coded) and handed
//! to the bridge as a [`BridgeConfig`]. The struct deserializes with serde so hosts can keep it
//! next to the rest of their settings; [`BridgeConfig::builder`] covers programmatic setup.

// self
use crate::{_prelude::*, channel::ChannelMode, error::ConfigError};

/// Authority used when none is configured.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/common";

/// Settings shared by every request issued through a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
	/// Application (client) identifier registered with the identity provider.
	pub client_id: String,
	/// Default authority for requests that do not override it.
	pub authority: Url,
	/// Default redirect URI for requests that do not override it.
	#[serde(default)]
	pub redirect_uri: Option<Url>,
	/// Default post-logout redirect URI for sign-out requests.
	#[serde(default)]
	pub post_logout_redirect_uri: Option<Url>,
	/// How long a call waits for the broker's reply.
	#[serde(default = "BridgeConfig::default_reply_timeout", with = "timeout_millis")]
	pub reply_timeout: Duration,
	/// Correlation strategy used by the channel.
	#[serde(default)]
	pub channel_mode: ChannelMode,
}
impl BridgeConfig {
	const DEFAULT_REPLY_TIMEOUT: Duration = Duration::seconds(60);

	/// Creates a builder seeded with the client identifier.
	pub fn builder(client_id: impl Into<String>) -> BridgeConfigBuilder {
		BridgeConfigBuilder::new(client_id)
	}

	/// Validates invariants that do not depend on a particular request.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingClientId);
		}
		if self.authority.scheme() != "https" {
			return Err(ConfigError::InsecureAuthority { url: self.authority.to_string() });
		}
		if !self.reply_timeout.is_positive() {
			return Err(ConfigError::NonPositiveTimeout);
		}

		Ok(())
	}

	fn default_reply_timeout() -> Duration {
		Self::DEFAULT_REPLY_TIMEOUT
	}
}

/// Builder for [`BridgeConfig`] values.
#[derive(Debug)]
pub struct BridgeConfigBuilder {
	client_id: String,
	authority: Option<Url>,
	redirect_uri: Option<Url>,
	post_logout_redirect_uri: Option<Url>,
	reply_timeout: Duration,
	channel_mode: ChannelMode,
}
impl BridgeConfigBuilder {
	/// Creates a new builder for the client identifier.
	pub fn new(client_id: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			authority: None,
			redirect_uri: None,
			post_logout_redirect_uri: None,
			reply_timeout: BridgeConfig::DEFAULT_REPLY_TIMEOUT,
			channel_mode: ChannelMode::default(),
		}
	}

	/// Overrides the default authority.
	pub fn authority(mut self, url: Url) -> Self {
		self.authority = Some(url);

		self
	}

	/// Sets the default redirect URI.
	pub fn redirect_uri(mut self, url: Url) -> Self {
		self.redirect_uri = Some(url);

		self
	}

	/// Sets the default post-logout redirect URI.
	pub fn post_logout_redirect_uri(mut self, url: Url) -> Self {
		self.post_logout_redirect_uri = Some(url);

		self
	}

	/// Overrides the reply timeout (defaults to 60 seconds).
	pub fn reply_timeout(mut self, timeout: Duration) -> Self {
		self.reply_timeout = timeout;

		self
	}

	/// Selects the channel correlation strategy.
	pub fn channel_mode(mut self, mode: ChannelMode) -> Self {
		self.channel_mode = mode;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<BridgeConfig, ConfigError> {
		let authority = match self.authority {
			Some(authority) => authority,
			None => Url::parse(DEFAULT_AUTHORITY)
				.map_err(|source| ConfigError::InvalidAuthority { source })?,
		};
		let config = BridgeConfig {
			client_id: self.client_id,
			authority,
			redirect_uri: self.redirect_uri,
			post_logout_redirect_uri: self.post_logout_redirect_uri,
			reply_timeout: self.reply_timeout,
			channel_mode: self.channel_mode,
		};

		config.validate()?;

		Ok(config)
	}
}

mod timeout_millis {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub(super) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(i64::try_from(value.whole_milliseconds()).unwrap_or(i64::MAX))
	}

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::milliseconds)
	}
}
