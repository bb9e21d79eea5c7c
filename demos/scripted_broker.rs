//! Demonstrates a silent token acquisition against an in-process broker that answers every
//! `GetToken` envelope through the extension channel's inbound side.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedSender};
use url::Url;
// self
use broker_bridge::{
	auth::{AccountId, AccountInfo},
	channel::{BrokerChannel, ChannelError, ChannelMode, ExtensionTransport},
	client::BrokerInteractionClient,
	config::BridgeConfig,
	envelope::Envelope,
	request::AcquireRequest,
	store::MemoryAccountStore,
};

// Serializes each envelope to wire text, the way a browser extension port would.
struct PortTransport(UnboundedSender<String>);
impl ExtensionTransport for PortTransport {
	fn is_connected(&self) -> bool {
		!self.0.is_closed()
	}

	fn post(&self, envelope: Envelope) -> Result<(), ChannelError> {
		let wire = envelope
			.to_json()
			.map_err(|err| ChannelError::Unavailable { reason: err.to_string() })?;

		self.0.send(wire).map_err(|_| ChannelError::Unavailable { reason: "port closed".into() })
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let (port, mut broker_inbox) = mpsc::unbounded_channel::<String>();
	let store = Arc::new(MemoryAccountStore::default());

	store.set_active(AccountInfo::new(AccountId::new("uid.utid")?, "demo@contoso.com"));

	let config = BridgeConfig::builder("demo-client")
		.redirect_uri(Url::parse("https://app.contoso.com/redirect")?)
		.channel_mode(ChannelMode::Multiplexed)
		.build()?;
	let channel = BrokerChannel::from_config(Arc::new(PortTransport(port)), &config);
	let client = BrokerInteractionClient::new(config, channel.clone(), store)?;
	let broker = tokio::spawn(async move {
		while let Some(wire) = broker_inbox.recv().await {
			let Ok(request) = Envelope::from_json(&wire) else { continue };

			println!("Broker received: {wire}.");

			let reply = Envelope {
				method: request.method,
				correlation_id: request.correlation_id,
				request: json!({
					"accessToken": "demo-access",
					"expiresOn": 1_900_000_000,
					"account": {
						"homeAccountId": "uid.utid",
						"username": request.request["loginHint"],
					},
				}),
			};

			if let Ok(reply) = reply.to_json() {
				let _ = channel.dispatch_json(&reply);
			}
		}
	});
	let result = client.acquire_token(&AcquireRequest::new(["User.Read"])).await?;

	println!(
		"Access token for {} expires at {}: {}.",
		result.account.username,
		result.expires_on,
		result.access_token.expose()
	);

	drop(client);
	broker.abort();

	Ok(())
}
