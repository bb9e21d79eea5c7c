//! Random value generation used for correlation ids and nonces.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use uuid::Uuid;

const OPAQUE_TOKEN_BYTES: usize = 32;

/// Source of fresh random identifiers.
pub trait CryptoProvider
where
	Self: Send + Sync,
{
	/// Returns a new RFC 4122 version 4 GUID string.
	fn new_guid(&self) -> String;

	/// Returns a new URL-safe opaque token suitable for nonces.
	fn new_opaque_token(&self) -> String;
}

/// [`CryptoProvider`] backed by `uuid` v4 GUIDs and the thread-local `rand` generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomCrypto;
impl CryptoProvider for RandomCrypto {
	fn new_guid(&self) -> String {
		Uuid::new_v4().to_string()
	}

	fn new_opaque_token(&self) -> String {
		let mut bytes = [0_u8; OPAQUE_TOKEN_BYTES];

		rand::rng().fill(&mut bytes);

		URL_SAFE_NO_PAD.encode(bytes)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn guids_are_version_4_and_unique() {
		let crypto = RandomCrypto;
		let first = crypto.new_guid();
		let second = crypto.new_guid();

		assert_ne!(first, second);

		let parsed = Uuid::parse_str(&first).expect("Generated GUID should parse.");

		assert_eq!(parsed.get_version_num(), 4);
		assert_eq!(parsed.hyphenated().to_string(), first);
	}

	#[test]
	fn opaque_tokens_are_url_safe() {
		let token = RandomCrypto.new_opaque_token();

		assert_eq!(token.len(), 43);
		assert!(token.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'));
	}
}
