//! Bridge-level error types shared across the request builder, codec, channel, and clients.

// self
use crate::_prelude::*;

/// Bridge-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical bridge error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Account store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Required static configuration is missing or invalid.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Developer-supplied request is malformed.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Messaging channel failure (timeout, broker unavailable).
	#[error(transparent)]
	Channel(#[from] crate::channel::ChannelError),
	/// Envelope violated the broker wire contract.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// Broker understood the request and explicitly declined it.
	#[error(transparent)]
	Broker(#[from] BrokerError),

	/// Operation has no implementation on this client.
	#[error("The {operation} operation is not implemented by this client.")]
	NotImplemented {
		/// Operation label.
		operation: &'static str,
	},
}
impl Error {
	/// Returns `true` for transport-level failures the caller may retry or route to an
	/// interactive fallback.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			Self::Channel(
				crate::channel::ChannelError::Timeout { .. }
					| crate::channel::ChannelError::Unavailable { .. }
			)
		)
	}

	/// Broker error code, when the failure originated from a broker reply.
	pub fn broker_code(&self) -> Option<&str> {
		match self {
			Self::Broker(err) => Some(err.code.as_str()),
			_ => None,
		}
	}
}

/// Configuration failures; never retryable.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// Client identifier is empty.
	#[error("Client id is not configured.")]
	MissingClientId,
	/// Neither the request nor the configuration supplies a redirect URI.
	#[error("Redirect URI is not configured and the request did not supply one.")]
	MissingRedirectUri,
	/// Authority must use HTTPS.
	#[error("The authority must use HTTPS: {url}.")]
	InsecureAuthority {
		/// Authority URL that failed validation.
		url: String,
	},
	/// Authority could not be parsed.
	#[error("Authority is invalid.")]
	InvalidAuthority {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Reply timeout must be positive.
	#[error("Reply timeout must be positive.")]
	NonPositiveTimeout,
	/// The channel handed to a client uses a different correlation strategy than configured.
	#[error("Channel mode {channel:?} does not match the configured mode {configured:?}.")]
	ChannelModeMismatch {
		/// Mode set in the configuration.
		configured: crate::channel::ChannelMode,
		/// Mode of the supplied channel.
		channel: crate::channel::ChannelMode,
	},
}

/// Malformed developer request; never retryable.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// At least one scope is required.
	#[error("Request must include at least one scope.")]
	EmptyScopes,
	/// A scope entry failed normalization.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Caller-supplied correlation id is not a valid identifier.
	#[error("Correlation id is invalid.")]
	InvalidCorrelationId(#[from] crate::auth::IdentifierError),
	/// Sign-out needs an account and none was supplied or active.
	#[error("No account was supplied and no active account is set.")]
	MissingAccount,
}

/// Envelope shape violations; treated as a defect on either side and never retried.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// Envelope carried a method this codec does not recognize.
	#[error("Broker envelope carried an unknown method `{method}`.")]
	UnknownMethod {
		/// Method string received on the wire.
		method: String,
	},
	/// Reply method differs from the request method.
	#[error("Broker replied to {expected} with {actual}.")]
	MethodMismatch {
		/// Method of the outgoing envelope.
		expected: &'static str,
		/// Method of the reply envelope.
		actual: &'static str,
	},
	/// Envelope or payload failed to (de)serialize.
	#[error("Broker envelope is malformed at `{path}`: {message}.")]
	Malformed {
		/// Path of the offending field (`.` when unknown).
		path: String,
		/// Parser message.
		message: String,
	},
}
impl ProtocolError {
	/// Builds a [`ProtocolError::Malformed`] from a path-tracked serde failure.
	pub fn malformed(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = err.path().to_string();

		Self::Malformed { path, message: err.into_inner().to_string() }
	}
}

/// Failure reported by the broker itself; code and message are carried verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("Broker declined the request: {code}: {message}.")]
pub struct BrokerError {
	/// Broker error code (for example `consent_required`).
	pub code: String,
	/// Broker-supplied description.
	pub message: String,
	/// Optional broker sub-error classification.
	pub sub_error: Option<String>,
	/// Optional broker status string.
	pub status: Option<String>,
}
impl BrokerError {
	/// Creates an error carrying only a code and message.
	pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { code: code.into(), message: message.into(), sub_error: None, status: None }
	}
}
