#![cfg(feature = "test")]

// crates.io
use serde_json::json;
// self
use broker_bridge::{
	_preludet::*,
	envelope::Envelope,
	error::ValidationError,
	request::LogoutRequest,
};

#[tokio::test]
async fn logout_signs_out_the_active_account() {
	let TestHarness { client, channel, mut outbox, store, .. } =
		build_test_harness(test_config(Duration::seconds(5)));
	let post_logout =
		Url::parse("https://app.example.com/signed-out").expect("Fixture URL should parse.");

	store.set_active(test_account("u@c"));

	let responder = tokio::spawn(async move {
		let sent = outbox.recv().await.expect("Client should post a SignOut envelope.");

		channel.dispatch(Envelope {
			method: sent.method.clone(),
			correlation_id: sent.correlation_id.clone(),
			request: json!({ "signedOut": true }),
		});

		sent
	});

	client
		.logout(&LogoutRequest::default().with_post_logout_redirect_uri(post_logout))
		.await
		.expect("Sign-out should succeed.");

	let sent = responder.await.expect("Responder task should join.");

	assert_eq!(sent.method, "SignOut");
	assert_eq!(sent.request["clientId"], TEST_CLIENT_ID);
	assert_eq!(sent.request["accountId"], "uid-u-at-c.utid");
	assert_eq!(sent.request["postLogoutRedirectUri"], "https://app.example.com/signed-out");
}

#[tokio::test]
async fn logout_surfaces_broker_failures() {
	let TestHarness { client, channel, mut outbox, .. } =
		build_test_harness(test_config(Duration::seconds(5)));

	tokio::spawn(async move {
		let sent = outbox.recv().await.expect("Client should post a SignOut envelope.");

		channel.dispatch(Envelope {
			method: sent.method,
			correlation_id: sent.correlation_id,
			request: json!({ "errorCode": "no_account_found", "errorMessage": "Unknown account." }),
		});
	});

	let err = client
		.logout(&LogoutRequest::for_account(test_account("gone@x")))
		.await
		.expect_err("Broker failure must surface.");

	assert_eq!(err.broker_code(), Some("no_account_found"));
}

#[tokio::test]
async fn logout_requires_an_account() {
	let TestHarness { client, mut outbox, .. } =
		build_test_harness(test_config(Duration::seconds(5)));
	let err =
		client.logout(&LogoutRequest::default()).await.expect_err("Sign-out must need an account.");

	assert!(matches!(err, Error::Validation(ValidationError::MissingAccount)));
	assert!(outbox.try_recv().is_err());
}
