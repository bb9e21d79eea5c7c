//! Authentication results produced from successful broker replies.

// self
use crate::{
	_prelude::*,
	auth::{AccountInfo, CorrelationId, ScopeSet, TokenSecret},
};

/// Token material returned to the caller after a successful `GetToken` round trip.
///
/// Values are only ever built from a broker reply; the bridge never fabricates tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResult {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// OIDC ID token, when the broker returned one.
	pub id_token: Option<TokenSecret>,
	/// Token type reported by the broker (`Bearer` unless stated otherwise).
	pub token_type: String,
	/// Absolute expiry instant.
	#[serde(with = "time::serde::timestamp")]
	pub expires_on: OffsetDateTime,
	/// Account the token was issued for.
	pub account: AccountInfo,
	/// Scopes granted by the broker.
	pub scopes: ScopeSet,
	/// Authority the request was issued against.
	pub authority: Url,
	/// Correlation id of the originating call.
	pub correlation_id: CorrelationId,
}
impl AuthenticationResult {
	/// Returns `true` if the access token is expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_on
	}

	/// Remaining lifetime relative to `instant`, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_on - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;
	use crate::auth::AccountId;

	fn result(expires_on: OffsetDateTime) -> AuthenticationResult {
		AuthenticationResult {
			access_token: TokenSecret::new("at"),
			id_token: None,
			token_type: "Bearer".into(),
			expires_on,
			account: AccountInfo::new(
				AccountId::new("uid.utid").expect("Account id fixture should be valid."),
				"u@c",
			),
			scopes: ScopeSet::new(["User.Read"]).expect("Scope fixture should be valid."),
			authority: Url::parse("https://login.example.com/common")
				.expect("Authority fixture should parse."),
			correlation_id: CorrelationId::new("corr").expect("Correlation fixture should be valid."),
		}
	}

	#[test]
	fn expiry_helpers_compare_against_the_given_instant() {
		let result = result(datetime!(2026-01-01 12:00 UTC));

		assert!(!result.is_expired_at(datetime!(2026-01-01 11:00 UTC)));
		assert!(result.is_expired_at(datetime!(2026-01-01 12:00 UTC)));
		assert_eq!(result.remaining_at(datetime!(2026-01-01 11:30 UTC)), Duration::minutes(30));
		assert_eq!(result.remaining_at(datetime!(2026-01-01 13:00 UTC)), Duration::ZERO);
	}

	#[test]
	fn debug_output_redacts_the_access_token() {
		let rendered = format!("{:?}", result(datetime!(2026-01-01 12:00 UTC)));

		assert!(!rendered.contains("\"at\""));
		assert!(rendered.contains("<redacted>"));
	}
}
