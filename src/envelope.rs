//! Message envelope codec for the broker wire contract.
//!
//! Every message exchanged with the broker is a JSON object of the form
//! `{ "method": "<Method>", "correlationId": "<id>", "request": { ... } }`. Replies reuse the
//! same shape; their `request` member carries either a method-specific success payload or a
//! broker failure (`{ "errorCode": ..., "errorMessage": ... }`). The codec only checks the
//! envelope structure and the method tag; payload semantics belong to the caller.

// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{AccountInfo, CorrelationId, ScopeSet},
	error::{BrokerError, ProtocolError},
};

/// Methods understood by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BrokerMethod {
	/// Extension/broker handshake.
	Handshake,
	/// Token acquisition.
	GetToken,
	/// Sign-out of an account.
	SignOut,
	/// Single account lookup.
	GetAccount,
	/// Enumeration of broker accounts.
	GetAllAccounts,
}
impl BrokerMethod {
	/// Returns the wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			BrokerMethod::Handshake => "Handshake",
			BrokerMethod::GetToken => "GetToken",
			BrokerMethod::SignOut => "SignOut",
			BrokerMethod::GetAccount => "GetAccount",
			BrokerMethod::GetAllAccounts => "GetAllAccounts",
		}
	}
}
impl Display for BrokerMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for BrokerMethod {
	type Err = ProtocolError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"Handshake" => Ok(BrokerMethod::Handshake),
			"GetToken" => Ok(BrokerMethod::GetToken),
			"SignOut" => Ok(BrokerMethod::SignOut),
			"GetAccount" => Ok(BrokerMethod::GetAccount),
			"GetAllAccounts" => Ok(BrokerMethod::GetAllAccounts),
			other => Err(ProtocolError::UnknownMethod { method: other.to_owned() }),
		}
	}
}

/// Tagged message exchanged with the broker.
///
/// The method stays a raw string on the wire type so that transports can carry envelopes
/// with methods this crate does not know; [`decode`] is where unknown methods are rejected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
	/// Method tag.
	pub method: String,
	/// Correlation id pairing a request with its reply.
	pub correlation_id: CorrelationId,
	/// Method-specific payload (request going out, result or failure coming back).
	pub request: Value,
}
impl Envelope {
	/// Parses an envelope from wire text.
	pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
		let mut de = serde_json::Deserializer::from_str(raw);

		serde_path_to_error::deserialize(&mut de).map_err(ProtocolError::malformed)
	}

	/// Renders the envelope as wire text.
	pub fn to_json(&self) -> Result<String, ProtocolError> {
		let mut buf = Vec::new();
		let mut ser = serde_json::Serializer::new(&mut buf);

		serde_path_to_error::serialize(self, &mut ser).map_err(ProtocolError::malformed)?;

		String::from_utf8(buf).map_err(|err| ProtocolError::Malformed {
			path: ".".into(),
			message: err.to_string(),
		})
	}
}

/// Wraps a payload into an envelope for `method`.
pub fn encode<P>(
	method: BrokerMethod,
	correlation_id: &CorrelationId,
	payload: &P,
) -> Result<Envelope, ProtocolError>
where
	P: ?Sized + Serialize,
{
	let request = serde_path_to_error::serialize(payload, serde_json::value::Serializer)
		.map_err(ProtocolError::malformed)?;

	if !request.is_object() {
		return Err(ProtocolError::Malformed {
			path: "request".into(),
			message: "payload must serialize to a JSON object".into(),
		});
	}

	Ok(Envelope {
		method: method.as_str().to_owned(),
		correlation_id: correlation_id.clone(),
		request,
	})
}

/// Splits an envelope into its recognized method, correlation id, and raw payload.
pub fn decode(envelope: Envelope) -> Result<(BrokerMethod, CorrelationId, Value), ProtocolError> {
	let Envelope { method, correlation_id, request } = envelope;
	let method = method.parse::<BrokerMethod>()?;

	Ok((method, correlation_id, request))
}

/// Deserializes a raw payload into a typed structure with path-qualified errors.
pub fn decode_payload<T>(payload: Value) -> Result<T, ProtocolError>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(payload).map_err(ProtocolError::malformed)
}

/// Reply payload classified by the presence of `errorCode`.
#[derive(Clone, Debug, PartialEq)]
pub enum BrokerReply<T> {
	/// Method-specific success payload.
	Success(T),
	/// Broker-reported failure.
	Failure(BrokerFailure),
}

/// Classifies and decodes a reply payload.
pub fn decode_reply<T>(payload: Value) -> Result<BrokerReply<T>, ProtocolError>
where
	T: DeserializeOwned,
{
	let Some(object) = payload.as_object() else {
		return Err(ProtocolError::Malformed {
			path: "request".into(),
			message: "reply payload must be a JSON object".into(),
		});
	};

	if object.contains_key("errorCode") {
		decode_payload(payload).map(BrokerReply::Failure)
	} else {
		decode_payload(payload).map(BrokerReply::Success)
	}
}

/// Failure payload reported by the broker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerFailure {
	/// Broker error code.
	pub error_code: String,
	/// Broker error description.
	#[serde(default)]
	pub error_message: String,
	/// Optional sub-error classification.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sub_error: Option<String>,
	/// Optional broker status.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}
impl BrokerFailure {
	/// Creates a failure payload from a code and message.
	pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { error_code: code.into(), error_message: message.into(), sub_error: None, status: None }
	}
}
impl From<BrokerFailure> for BrokerError {
	fn from(failure: BrokerFailure) -> Self {
		BrokerError {
			code: failure.error_code,
			message: failure.error_message,
			sub_error: failure.sub_error,
			status: failure.status,
		}
	}
}

/// Success payload of a `GetToken` reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerTokenResponse {
	/// Issued access token.
	pub access_token: String,
	/// Issued ID token, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
	/// Token type (`Bearer`, `pop`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_type: Option<String>,
	/// Expiry instant as Unix seconds.
	#[serde(with = "time::serde::timestamp")]
	pub expires_on: OffsetDateTime,
	/// Account the token belongs to.
	pub account: AccountInfo,
	/// Granted scopes; absent means the requested scopes were granted.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scopes: Option<ScopeSet>,
}

/// Success payload of a `SignOut` reply; extra broker fields are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignOutResponse {}
