//! Delegate OAuth 2.0/OIDC token acquisition to a trusted native broker reached through an
//! extension messaging channel, with correlated replies and typed failures.
//!
//! # Testing
//!
//! The integration suites under `tests/` drive clients through the scripted transport in
//! `_preludet`, which only exists with the `test` feature. They are compiled out otherwise,
//! so run them with `cargo test --features test`.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod channel;
pub mod client;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod obs;
pub mod request;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// crates.io
	use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
	// self
	use crate::{
		auth::{AccountId, AccountInfo},
		channel::{BrokerChannel, ChannelError, ExtensionTransport},
		client::BrokerInteractionClient,
		config::BridgeConfig,
		crypto::CryptoProvider,
		envelope::Envelope,
		store::MemoryAccountStore,
	};

	/// Client id shared by test fixtures.
	pub const TEST_CLIENT_ID: &str = "client-it";

	/// Transport that forwards every posted envelope to an unbounded queue so tests decide
	/// when (and whether) the broker answers.
	#[derive(Debug)]
	pub struct ScriptedTransport {
		connected: AtomicBool,
		outbox: UnboundedSender<Envelope>,
	}
	impl ScriptedTransport {
		/// Creates a connected transport plus the receiver observing posted envelopes.
		pub fn new() -> (Arc<Self>, UnboundedReceiver<Envelope>) {
			let (outbox, inbox) = mpsc::unbounded_channel();

			(Arc::new(Self { connected: AtomicBool::new(true), outbox }), inbox)
		}

		/// Flips the connection flag reported to the channel.
		pub fn set_connected(&self, connected: bool) {
			self.connected.store(connected, AtomicOrdering::SeqCst);
		}
	}
	impl ExtensionTransport for ScriptedTransport {
		fn is_connected(&self) -> bool {
			self.connected.load(AtomicOrdering::SeqCst)
		}

		fn post(&self, envelope: Envelope) -> Result<(), ChannelError> {
			self.outbox.send(envelope).map_err(|_| ChannelError::Unavailable {
				reason: "Scripted broker inbox was dropped.".into(),
			})
		}
	}

	/// Deterministic crypto collaborator producing sequential values.
	#[derive(Debug, Default)]
	pub struct SequentialCrypto(AtomicU64);
	impl CryptoProvider for SequentialCrypto {
		fn new_guid(&self) -> String {
			format!("guid-{}", self.0.fetch_add(1, AtomicOrdering::SeqCst))
		}

		fn new_opaque_token(&self) -> String {
			format!("nonce-{}", self.0.fetch_add(1, AtomicOrdering::SeqCst))
		}
	}

	/// Bundles a client with the handles tests need to drive it.
	pub struct TestHarness {
		/// Client under test.
		pub client: BrokerInteractionClient,
		/// Channel shared with the client; tests dispatch replies through it.
		pub channel: BrokerChannel,
		/// Transport the channel posts into.
		pub transport: Arc<ScriptedTransport>,
		/// Envelopes posted by the channel, in order.
		pub outbox: UnboundedReceiver<Envelope>,
		/// Account store backing login-hint resolution.
		pub store: Arc<MemoryAccountStore>,
	}

	/// Builds a test configuration with a default redirect URI and the provided reply timeout.
	pub fn test_config(reply_timeout: Duration) -> BridgeConfig {
		BridgeConfig::builder(TEST_CLIENT_ID)
			.redirect_uri(
				Url::parse("https://app.example.com/redirect")
					.expect("Redirect URI fixture should parse."),
			)
			.reply_timeout(reply_timeout)
			.build()
			.expect("Test bridge configuration should be valid.")
	}

	/// Wires a client, channel, scripted transport, and memory store together.
	///
	/// The channel follows `config.channel_mode`.
	pub fn build_test_harness(config: BridgeConfig) -> TestHarness {
		let (transport, outbox) = ScriptedTransport::new();
		let channel = BrokerChannel::from_config(transport.clone(), &config);
		let store = Arc::new(MemoryAccountStore::default());
		let client = BrokerInteractionClient::new(config, channel.clone(), store.clone())
			.expect("Test harness configuration should be valid.")
			.with_crypto(Arc::new(SequentialCrypto::default()));

		TestHarness { client, channel, transport, outbox, store }
	}

	/// Builds an account fixture for the given username.
	pub fn test_account(username: &str) -> AccountInfo {
		let id = format!("uid-{}.utid", username.replace('@', "-at-"));

		AccountInfo::new(
			AccountId::new(id).expect("Account identifier fixture should be valid."),
			username,
		)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::{
			Arc,
			atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering},
		},
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use url;
#[cfg(test)] use color_eyre as _;
