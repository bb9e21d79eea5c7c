#![cfg(feature = "test")]

// crates.io
use serde_json::json;
// self
use broker_bridge::{
	_preludet::*,
	channel::{ChannelError, ChannelMode, DispatchOutcome},
	client::InteractionClient,
	envelope::Envelope,
	error::ValidationError,
	request::{AcquireRequest, PromptValue},
};

fn token_reply(request: &Envelope, access_token: &str) -> Envelope {
	Envelope {
		method: request.method.clone(),
		correlation_id: request.correlation_id.clone(),
		request: json!({
			"accessToken": access_token,
			"idToken": "id-token",
			"tokenType": "Bearer",
			"expiresOn": 1_900_000_000,
			"account": {
				"homeAccountId": "uid-u-at-c.utid",
				"username": "u@c",
				"tenantId": "utid",
			},
			"scopes": ["User.Read", "openid"],
		}),
	}
}

#[tokio::test]
async fn silent_acquisition_uses_the_active_account() {
	let TestHarness { client, channel, mut outbox, store, .. } =
		build_test_harness(test_config(Duration::seconds(5)));

	store.set_active(test_account("u@c"));

	let responder = tokio::spawn(async move {
		let sent = outbox.recv().await.expect("Client should post a GetToken envelope.");
		let wire = sent.to_json().expect("Posted envelope should render.");
		let outcome = channel
			.dispatch_json(
				&token_reply(&sent, "T").to_json().expect("Reply envelope should render."),
			)
			.expect("Reply text should parse.");

		(sent, wire, outcome)
	});
	let result = client
		.acquire_token(&AcquireRequest::new(["User.Read"]))
		.await
		.expect("Broker success should produce a result.");
	let (sent, wire, outcome) = responder.await.expect("Responder task should join.");

	assert_eq!(outcome, DispatchOutcome::Delivered);
	assert!(wire.contains("\"method\":\"GetToken\""));
	assert_eq!(sent.request["prompt"], "none");
	assert_eq!(sent.request["loginHint"], "u@c");
	assert_eq!(sent.request["nonce"], "nonce-1");
	assert_eq!(sent.request["redirectUri"], "https://app.example.com/redirect");
	assert_eq!(result.access_token.expose(), "T");
	assert_eq!(result.id_token.as_ref().map(|token| token.expose()), Some("id-token"));
	assert_eq!(result.account.tenant_id.as_deref(), Some("utid"));
	assert!(result.scopes.contains("openid"));
	assert_eq!(result.correlation_id, sent.correlation_id);
	assert!(!format!("{result:?}").contains("\"T\""), "Debug output must redact the token.");
}

#[tokio::test]
async fn concurrent_calls_receive_their_own_replies() {
	let TestHarness { client, channel, mut outbox, .. } =
		build_test_harness(test_config(Duration::seconds(5)));
	let first_request = AcquireRequest::new(["User.Read"]).with_correlation_id("corr-a");
	let second_request = AcquireRequest::new(["Mail.Read"]).with_correlation_id("corr-b");
	let first = client.acquire_token(&first_request);
	let second = client.acquire_token(&second_request);
	let responder = async {
		let a = outbox.recv().await.expect("First envelope should be posted.");
		let b = outbox.recv().await.expect("Second envelope should be posted.");

		// Answer in reverse order to prove replies are matched by correlation id.
		for sent in [&b, &a] {
			let token = format!("token-{}", sent.correlation_id);

			assert_eq!(channel.dispatch(token_reply(sent, &token)), DispatchOutcome::Delivered);
		}
	};
	let (first, second, ()) = tokio::join!(first, second, responder);

	assert_eq!(first.expect("First call should succeed.").access_token.expose(), "token-corr-a");
	assert_eq!(second.expect("Second call should succeed.").access_token.expose(), "token-corr-b");
	assert_eq!(channel.in_flight(), 0);
}

#[tokio::test]
async fn single_flight_channel_serves_callers_in_turn() {
	let mut config = test_config(Duration::seconds(5));

	config.channel_mode = ChannelMode::SingleFlight;

	let TestHarness { client, channel, mut outbox, .. } = build_test_harness(config);

	assert_eq!(channel.mode(), ChannelMode::SingleFlight);

	let client: Arc<dyn InteractionClient> = Arc::new(client);
	let first_request = AcquireRequest::new(["User.Read"]).with_correlation_id("turn-1");
	let second_request = AcquireRequest::new(["User.Read"]).with_correlation_id("turn-2");
	let first = client.acquire_token(&first_request);
	let second = client.acquire_token(&second_request);
	let responder = async {
		for expected in ["turn-1", "turn-2"] {
			let sent = outbox.recv().await.expect("Envelope should be posted.");

			assert_eq!(sent.correlation_id.as_ref(), expected);
			assert_eq!(channel.in_flight(), 1, "Only one call may be on the wire.");

			channel.dispatch(token_reply(&sent, expected));
		}
	};
	let (first, second, ()) = tokio::join!(first, second, responder);

	assert_eq!(first.expect("First call should succeed.").access_token.expose(), "turn-1");
	assert_eq!(second.expect("Second call should succeed.").access_token.expose(), "turn-2");
}

#[tokio::test]
async fn explicit_prompt_and_account_are_forwarded() {
	let TestHarness { client, channel, mut outbox, store, .. } =
		build_test_harness(test_config(Duration::seconds(5)));

	store.set_active(test_account("b@x"));
	store.set_legacy_login_hint("legacy@x");

	let request = AcquireRequest::new(["User.Read"])
		.with_account(test_account("a@x"))
		.with_prompt(PromptValue::Consent)
		.with_nonce("n-1");
	let responder = tokio::spawn(async move {
		let sent = outbox.recv().await.expect("Envelope should be posted.");

		channel.dispatch(token_reply(&sent, "T"));

		sent
	});

	client.acquire_token(&request).await.expect("Call should succeed.");

	let sent = responder.await.expect("Responder task should join.");

	assert_eq!(sent.request["loginHint"], "a@x");
	assert_eq!(sent.request["prompt"], "consent");
	assert_eq!(sent.request["nonce"], "n-1");
}

#[tokio::test]
async fn failures_are_typed_and_classified() {
	let TestHarness { client, transport, mut outbox, .. } =
		build_test_harness(test_config(Duration::milliseconds(40)));
	let err = client
		.acquire_token(&AcquireRequest::new(Vec::<String>::new()))
		.await
		.expect_err("Empty scopes must be rejected.");

	assert!(matches!(err, Error::Validation(ValidationError::EmptyScopes)));
	assert!(!err.is_retryable());
	assert!(outbox.try_recv().is_err(), "Validation failures must not reach the channel.");

	let err = client
		.acquire_token(&AcquireRequest::new(["User.Read"]))
		.await
		.expect_err("A silent broker must time out.");

	assert!(matches!(err, Error::Channel(ChannelError::Timeout { .. })));
	assert!(err.is_retryable());

	transport.set_connected(false);

	let err = client
		.acquire_token(&AcquireRequest::new(["User.Read"]))
		.await
		.expect_err("A disconnected transport must fail.");

	assert!(matches!(err, Error::Channel(ChannelError::Unavailable { .. })));
}
