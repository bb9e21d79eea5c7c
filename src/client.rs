//! Interaction clients orchestrating broker round trips.
//!
//! [`BrokerInteractionClient`] drives each operation through the same pipeline: build the
//! canonical request, wrap it in an envelope, send it over the [`BrokerChannel`], then
//! translate the reply (or its absence) into a result or a typed failure. Every call owns its
//! correlation id and its [`InteractionState`]; the client itself keeps no per-call state, so
//! concurrent calls on one client never observe each other.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{AuthenticationResult, CorrelationId, TokenSecret},
	channel::BrokerChannel,
	config::BridgeConfig,
	crypto::{CryptoProvider, RandomCrypto},
	envelope::{self, BrokerMethod, BrokerReply, BrokerTokenResponse, Envelope, SignOutResponse},
	error::{BrokerError, ConfigError, ProtocolError},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	request::{
		AcquireRequest, BrokerPayload, DefaultRequestStrategy, LogoutRequest, RequestBuilder,
		RequestStrategy,
	},
	store::AccountStore,
};

/// Boxed future returned by [`InteractionClient`] operations.
pub type OperationFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Operations an interaction client exposes to the application.
pub trait InteractionClient
where
	Self: Send + Sync,
{
	/// Acquires a token through the broker.
	fn acquire_token<'a>(
		&'a self,
		request: &'a AcquireRequest,
	) -> OperationFuture<'a, AuthenticationResult>;

	/// Signs an account out through the broker.
	///
	/// Clients that cannot sign out keep this default, which fails with
	/// [`Error::NotImplemented`].
	fn logout<'a>(&'a self, request: &'a LogoutRequest) -> OperationFuture<'a, ()> {
		let _ = request;

		Box::pin(async { Err(Error::NotImplemented { operation: OperationKind::Logout.as_str() }) })
	}
}

/// Lifecycle of a single interaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InteractionState {
	/// Nothing has happened yet.
	#[default]
	Idle,
	/// The canonical broker request was built.
	RequestBuilt,
	/// The envelope was handed to the channel.
	EnvelopeSent,
	/// The channel returned a reply that is being interpreted.
	AwaitingReply,
	/// A result was produced.
	Succeeded,
	/// A typed failure was produced.
	Failed,
}
impl InteractionState {
	/// Returns `true` once no further transition is possible.
	pub const fn is_terminal(self) -> bool {
		matches!(self, InteractionState::Succeeded | InteractionState::Failed)
	}

	/// Returns `true` when moving from `self` to `next` is allowed.
	///
	/// Every non-terminal state may fail; the happy path only moves forward one step.
	pub const fn can_transition_to(self, next: InteractionState) -> bool {
		use InteractionState::*;

		matches!(
			(self, next),
			(Idle, RequestBuilt)
				| (RequestBuilt, EnvelopeSent)
				| (EnvelopeSent, AwaitingReply)
				| (AwaitingReply, Succeeded)
				| (Idle | RequestBuilt | EnvelopeSent | AwaitingReply, Failed)
		)
	}

	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			InteractionState::Idle => "idle",
			InteractionState::RequestBuilt => "request_built",
			InteractionState::EnvelopeSent => "envelope_sent",
			InteractionState::AwaitingReply => "awaiting_reply",
			InteractionState::Succeeded => "succeeded",
			InteractionState::Failed => "failed",
		}
	}
}
impl Display for InteractionState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Per-call state tracker.
#[derive(Debug, Default)]
struct Interaction {
	state: InteractionState,
}
impl Interaction {
	fn advance(&mut self, next: InteractionState) {
		debug_assert!(
			self.state.can_transition_to(next),
			"invalid interaction transition {} -> {next}",
			self.state
		);
		obs::log_debug!(from = self.state.as_str(), to = next.as_str(), "Interaction advanced.");

		self.state = next;
	}

	fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
		match &result {
			Ok(_) => self.advance(InteractionState::Succeeded),
			Err(_) => self.advance(InteractionState::Failed),
		}

		result
	}
}

/// Interaction client backed by a [`BrokerChannel`].
///
/// Collaborators are shared handles; cloning the client is cheap.
#[derive(Clone)]
pub struct BrokerInteractionClient {
	config: BridgeConfig,
	channel: BrokerChannel,
	store: Arc<dyn AccountStore>,
	crypto: Arc<dyn CryptoProvider>,
	strategy: Arc<dyn RequestStrategy>,
}
impl BrokerInteractionClient {
	/// Creates a client with the default crypto provider and request strategy.
	///
	/// The configuration is validated here, so values that skipped the builder (for example
	/// ones deserialized from host settings) are checked too. The channel must use the
	/// correlation strategy the configuration asks for; see [`BrokerChannel::from_config`].
	pub fn new(
		config: BridgeConfig,
		channel: BrokerChannel,
		store: Arc<dyn AccountStore>,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		if channel.mode() != config.channel_mode {
			return Err(ConfigError::ChannelModeMismatch {
				configured: config.channel_mode,
				channel: channel.mode(),
			});
		}

		Ok(Self {
			config,
			channel,
			store,
			crypto: Arc::new(RandomCrypto),
			strategy: Arc::new(DefaultRequestStrategy),
		})
	}

	/// Replaces the crypto provider used for correlation ids and nonces.
	pub fn with_crypto(mut self, crypto: Arc<dyn CryptoProvider>) -> Self {
		self.crypto = crypto;

		self
	}

	/// Replaces the request strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn RequestStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Configuration the client was built with.
	pub fn config(&self) -> &BridgeConfig {
		&self.config
	}

	/// Acquires a token through the broker.
	///
	/// Validation and configuration failures surface before anything is sent. A broker
	/// failure becomes [`Error::Broker`]; a missing reply becomes a channel timeout.
	pub async fn acquire_token(&self, request: &AcquireRequest) -> Result<AuthenticationResult> {
		const KIND: OperationKind = OperationKind::AcquireToken;

		let span = OperationSpan::new(KIND, "acquire_token");

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut interaction = Interaction::default();
				let outcome = self.acquire_token_inner(&mut interaction, request).await;

				interaction.finish(outcome)
			})
			.await;

		record_outcome(KIND, &result);

		result
	}

	/// Signs an account out through the broker.
	pub async fn logout(&self, request: &LogoutRequest) -> Result<()> {
		const KIND: OperationKind = OperationKind::Logout;

		let span = OperationSpan::new(KIND, "logout");

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut interaction = Interaction::default();
				let outcome = self.logout_inner(&mut interaction, request).await;

				interaction.finish(outcome)
			})
			.await;

		record_outcome(KIND, &result);

		result
	}

	async fn acquire_token_inner(
		&self,
		interaction: &mut Interaction,
		request: &AcquireRequest,
	) -> Result<AuthenticationResult> {
		let payload = self.builder().build_token_request(request)?;

		interaction.advance(InteractionState::RequestBuilt);

		let response: BrokerTokenResponse = self.round_trip(interaction, &payload).await?;
		let scopes = match response.scopes {
			Some(scopes) if !scopes.is_empty() => scopes,
			_ => payload.scopes.clone(),
		};

		Ok(AuthenticationResult {
			access_token: TokenSecret::new(response.access_token),
			id_token: response.id_token.map(TokenSecret::new),
			token_type: response.token_type.unwrap_or_else(|| "Bearer".into()),
			expires_on: response.expires_on,
			account: response.account,
			scopes,
			authority: payload.base.authority,
			correlation_id: payload.base.correlation_id,
		})
	}

	async fn logout_inner(
		&self,
		interaction: &mut Interaction,
		request: &LogoutRequest,
	) -> Result<()> {
		let payload = self.builder().build_sign_out_request(request)?;

		interaction.advance(InteractionState::RequestBuilt);

		let SignOutResponse {} = self.round_trip(interaction, &payload).await?;

		Ok(())
	}

	/// Encodes `payload`, sends it, and decodes the typed success payload of the reply.
	async fn round_trip<P, T>(&self, interaction: &mut Interaction, payload: &P) -> Result<T>
	where
		P: BrokerPayload,
		T: DeserializeOwned,
	{
		let correlation_id = payload.correlation_id();
		let envelope = envelope::encode(P::METHOD, correlation_id, payload)?;

		interaction.advance(InteractionState::EnvelopeSent);

		let reply = self.channel.send(envelope, self.config.reply_timeout).await?;

		interaction.advance(InteractionState::AwaitingReply);

		match decode_reply::<T>(P::METHOD, correlation_id, reply)? {
			BrokerReply::Success(value) => Ok(value),
			BrokerReply::Failure(failure) => {
				obs::log_debug!(
					correlation_id = %correlation_id,
					error_code = %failure.error_code,
					"Broker declined the request."
				);

				Err(BrokerError::from(failure).into())
			},
		}
	}

	fn builder(&self) -> RequestBuilder<'_> {
		RequestBuilder::new(
			&self.config,
			self.store.as_ref(),
			self.crypto.as_ref(),
			self.strategy.as_ref(),
		)
	}
}
impl Debug for BrokerInteractionClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BrokerInteractionClient")
			.field("client_id", &self.config.client_id)
			.field("channel_mode", &self.channel.mode())
			.finish_non_exhaustive()
	}
}
impl InteractionClient for BrokerInteractionClient {
	fn acquire_token<'a>(
		&'a self,
		request: &'a AcquireRequest,
	) -> OperationFuture<'a, AuthenticationResult> {
		Box::pin(BrokerInteractionClient::acquire_token(self, request))
	}

	fn logout<'a>(&'a self, request: &'a LogoutRequest) -> OperationFuture<'a, ()> {
		Box::pin(BrokerInteractionClient::logout(self, request))
	}
}

fn decode_reply<T>(
	expected: BrokerMethod,
	correlation_id: &CorrelationId,
	reply: Envelope,
) -> Result<BrokerReply<T>, ProtocolError>
where
	T: DeserializeOwned,
{
	let (method, reply_id, payload) = envelope::decode(reply)?;

	if method != expected {
		return Err(ProtocolError::MethodMismatch {
			expected: expected.as_str(),
			actual: method.as_str(),
		});
	}
	// The channel only routes by correlation id, so a mismatch here means the envelope was
	// rewritten in transit.
	if &reply_id != correlation_id {
		return Err(ProtocolError::Malformed {
			path: "correlationId".into(),
			message: format!("expected {correlation_id}, received {reply_id}"),
		});
	}

	envelope::decode_reply(payload)
}

fn record_outcome<T>(kind: OperationKind, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_operation_outcome(kind, OperationOutcome::Success),
		Err(_err) => {
			obs::log_debug!(operation = kind.as_str(), error = %_err, "Operation failed.");
			obs::record_operation_outcome(kind, OperationOutcome::Failure);
		},
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		_preludet::{
			ScriptedTransport, TestHarness, build_test_harness, test_account, test_config,
		},
		channel::{ChannelError, ChannelMode, DispatchOutcome},
		error::ValidationError,
		store::MemoryAccountStore,
	};

	fn harness() -> TestHarness {
		build_test_harness(test_config(Duration::seconds(5)))
	}

	fn token_reply(request: &Envelope, access_token: &str) -> Envelope {
		Envelope {
			method: request.method.clone(),
			correlation_id: request.correlation_id.clone(),
			request: json!({
				"accessToken": access_token,
				"expiresOn": 1_900_000_000,
				"account": { "homeAccountId": "uid-u-at-c.utid", "username": "u@c" },
			}),
		}
	}

	#[tokio::test]
	async fn empty_scopes_fail_without_channel_io() {
		let TestHarness { client, channel, mut outbox, .. } = harness();
		let err = client
			.acquire_token(&AcquireRequest::default())
			.await
			.expect_err("Empty scopes must be rejected.");

		assert!(matches!(err, Error::Validation(ValidationError::EmptyScopes)));
		assert!(outbox.try_recv().is_err());
		assert_eq!(channel.in_flight(), 0);
	}

	#[tokio::test]
	async fn user_read_round_trip_produces_a_result() {
		let TestHarness { client, channel, mut outbox, store, .. } = harness();

		store.set_active(test_account("u@c"));

		let responder = tokio::spawn(async move {
			let sent = outbox.recv().await.expect("Client should post an envelope.");

			assert_eq!(sent.method, "GetToken");
			assert_eq!(sent.request["prompt"], "none");
			assert_eq!(sent.request["loginHint"], "u@c");
			assert_eq!(sent.request["clientId"], "client-it");
			assert_eq!(sent.request["scopes"], json!(["User.Read"]));

			channel.dispatch(token_reply(&sent, "T"))
		});
		let result = client
			.acquire_token(&AcquireRequest::new(["User.Read"]))
			.await
			.expect("Broker success should produce a result.");

		assert_eq!(result.access_token.expose(), "T");
		assert_eq!(result.account.username, "u@c");
		assert_eq!(result.scopes.normalized(), "User.Read");
		assert_eq!(result.token_type, "Bearer");
		assert_eq!(result.correlation_id.as_ref(), "guid-0");
		assert_eq!(
			responder.await.expect("Responder should finish."),
			DispatchOutcome::Delivered
		);
	}

	#[tokio::test]
	async fn broker_failure_maps_to_a_typed_error() {
		let TestHarness { client, channel, mut outbox, .. } = harness();

		tokio::spawn(async move {
			let sent = outbox.recv().await.expect("Client should post an envelope.");

			channel.dispatch(Envelope {
				method: sent.method,
				correlation_id: sent.correlation_id,
				request: json!({
					"errorCode": "consent_required",
					"errorMessage": "User consent is required.",
				}),
			});
		});

		let err = client
			.acquire_token(&AcquireRequest::new(["User.Read"]))
			.await
			.expect_err("Broker failure must surface.");

		assert_eq!(err.broker_code(), Some("consent_required"));
		assert!(!err.is_retryable());
	}

	#[tokio::test]
	async fn method_mismatch_is_a_protocol_error() {
		let TestHarness { client, channel, mut outbox, .. } = harness();

		tokio::spawn(async move {
			let sent = outbox.recv().await.expect("Client should post an envelope.");

			channel.dispatch(Envelope {
				method: "SignOut".into(),
				correlation_id: sent.correlation_id,
				request: json!({}),
			});
		});

		let err = client
			.acquire_token(&AcquireRequest::new(["User.Read"]))
			.await
			.expect_err("Mismatched method must be rejected.");

		assert!(matches!(
			err,
			Error::Protocol(ProtocolError::MethodMismatch { expected: "GetToken", actual: "SignOut" })
		));
	}

	#[tokio::test]
	async fn missing_reply_times_out() {
		let TestHarness { client, channel, outbox, .. } =
			build_test_harness(test_config(Duration::milliseconds(50)));
		let err = client
			.acquire_token(&AcquireRequest::new(["User.Read"]))
			.await
			.expect_err("Silent broker must time out.");

		assert!(matches!(err, Error::Channel(ChannelError::Timeout { .. })));
		assert!(err.is_retryable());
		assert_eq!(channel.in_flight(), 0);

		drop(outbox);
	}

	#[tokio::test]
	async fn logout_sends_sign_out_for_the_account() {
		let TestHarness { client, channel, mut outbox, .. } = harness();
		let responder = tokio::spawn(async move {
			let sent = outbox.recv().await.expect("Client should post an envelope.");

			assert_eq!(sent.method, "SignOut");
			assert_eq!(sent.request["accountId"], "uid-a-at-x.utid");
			assert_eq!(sent.request["loginHint"], "a@x");

			channel.dispatch(Envelope {
				method: sent.method,
				correlation_id: sent.correlation_id,
				request: json!({}),
			});
		});

		client
			.logout(&LogoutRequest::for_account(test_account("a@x")))
			.await
			.expect("Sign-out should succeed.");
		responder.await.expect("Responder should finish.");
	}

	#[tokio::test]
	async fn logout_without_any_account_fails_before_sending() {
		let TestHarness { client, mut outbox, .. } = harness();
		let err = client
			.logout(&LogoutRequest::default())
			.await
			.expect_err("Sign-out without an account must fail.");

		assert!(matches!(err, Error::Validation(ValidationError::MissingAccount)));
		assert!(outbox.try_recv().is_err());
	}

	#[tokio::test]
	async fn default_logout_is_not_implemented() {
		struct TokenOnly;
		impl InteractionClient for TokenOnly {
			fn acquire_token<'a>(
				&'a self,
				_request: &'a AcquireRequest,
			) -> OperationFuture<'a, AuthenticationResult> {
				Box::pin(async { Err(Error::NotImplemented { operation: "acquire_token" }) })
			}
		}

		let err = TokenOnly
			.logout(&LogoutRequest::default())
			.await
			.expect_err("Default logout must fail.");

		assert!(matches!(err, Error::NotImplemented { operation: "logout" }));
	}

	#[tokio::test]
	async fn trait_object_dispatches_to_the_broker_client() {
		let TestHarness { client, channel, mut outbox, .. } = harness();

		tokio::spawn(async move {
			let sent = outbox.recv().await.expect("Client should post an envelope.");

			channel.dispatch(token_reply(&sent, "dyn"));
		});

		let client: Arc<dyn InteractionClient> = Arc::new(client);
		let result = client
			.acquire_token(&AcquireRequest::new(["User.Read"]))
			.await
			.expect("Trait call should succeed.");

		assert_eq!(result.access_token.expose(), "dyn");
	}

	#[test]
	fn deserialized_configs_are_validated_at_construction() {
		let config: BridgeConfig = serde_json::from_str(
			r#"{
				"clientId": "client-it",
				"authority": "https://login.example.com/common",
				"redirectUri": "https://app.example.com/redirect",
				"replyTimeout": -100
			}"#,
		)
		.expect("Configuration JSON should deserialize.");
		let (transport, mut outbox) = ScriptedTransport::new();
		let channel = BrokerChannel::from_config(transport, &config);
		let err =
			BrokerInteractionClient::new(config, channel, Arc::new(MemoryAccountStore::default()))
				.expect_err("Non-positive reply timeouts must be rejected.");

		assert!(matches!(Error::from(err), Error::Config(ConfigError::NonPositiveTimeout)));
		assert!(outbox.try_recv().is_err());
	}

	#[test]
	fn construction_rejects_a_channel_in_another_mode() {
		let (transport, _outbox) = ScriptedTransport::new();
		let mut config = test_config(Duration::seconds(5));

		config.channel_mode = ChannelMode::SingleFlight;

		let channel = BrokerChannel::new(transport, ChannelMode::Multiplexed);
		let err =
			BrokerInteractionClient::new(config, channel, Arc::new(MemoryAccountStore::default()))
				.expect_err("Mismatched channel modes must be rejected.");

		assert_eq!(err, ConfigError::ChannelModeMismatch {
			configured: ChannelMode::SingleFlight,
			channel: ChannelMode::Multiplexed,
		});
	}

	#[tokio::test]
	async fn single_flight_config_keeps_one_envelope_on_the_wire() {
		let config: BridgeConfig = serde_json::from_str(
			r#"{
				"clientId": "client-it",
				"authority": "https://login.example.com/common",
				"redirectUri": "https://app.example.com/redirect",
				"channelMode": "singleFlight"
			}"#,
		)
		.expect("Configuration JSON should deserialize.");
		let TestHarness { client, channel, mut outbox, .. } = build_test_harness(config);
		let first_request = AcquireRequest::new(["User.Read"]);
		let second_request = AcquireRequest::new(["User.Read"]);
		let first = client.acquire_token(&first_request);
		let second = client.acquire_token(&second_request);
		let responder = async {
			for _ in 0..2 {
				let sent = outbox.recv().await.expect("Envelope should be posted.");

				tokio::time::sleep(std::time::Duration::from_millis(20)).await;

				assert!(outbox.try_recv().is_err(), "Only one envelope may be on the wire.");
				assert_eq!(channel.dispatch(token_reply(&sent, "T")), DispatchOutcome::Delivered);
			}
		};
		let (first, second, ()) = tokio::join!(first, second, responder);

		first.expect("First call should succeed.");
		second.expect("Second call should succeed.");
	}

	#[test]
	fn state_transitions_follow_the_lifecycle() {
		use InteractionState::*;

		let path = [Idle, RequestBuilt, EnvelopeSent, AwaitingReply, Succeeded];

		for pair in path.windows(2) {
			assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
		}
		for state in [Idle, RequestBuilt, EnvelopeSent, AwaitingReply] {
			assert!(state.can_transition_to(Failed));
			assert!(!state.is_terminal());
		}

		assert!(!Idle.can_transition_to(EnvelopeSent));
		assert!(!Succeeded.can_transition_to(Failed));
		assert!(!Failed.can_transition_to(Idle));
		assert!(Succeeded.is_terminal());
	}
}
