//! Correlated request/reply channel over the extension transport.
//!
//! The channel posts an [`Envelope`] through an [`ExtensionTransport`] and parks the caller
//! until the broker's reply with the same correlation id is handed to
//! [`BrokerChannel::dispatch`]. Replies are matched by correlation id, so any number of calls
//! may be outstanding at once ([`ChannelMode::Multiplexed`]). Transports that can only carry
//! one message at a time use [`ChannelMode::SingleFlight`], which queues callers behind an
//! async gate while keeping the same correlation checks.
//!
//! Each outstanding call owns a slot in the pending map. The slot is released when the reply
//! is delivered, when the timeout fires, or when the caller drops the future; replies that
//! arrive for a released slot are ignored.

// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*, auth::CorrelationId, config::BridgeConfig, envelope::Envelope,
	error::ProtocolError, obs,
};

type PendingMap = Arc<Mutex<HashMap<CorrelationId, PendingReply>>>;

/// Outbound half of the extension messaging transport.
///
/// Inbound messages are not pulled through this trait: whatever receives them from the
/// extension (an event listener, a reader task) passes them to [`BrokerChannel::dispatch`].
pub trait ExtensionTransport
where
	Self: Send + Sync,
{
	/// Returns `false` once the extension or broker is known to be absent.
	fn is_connected(&self) -> bool;

	/// Hands an envelope to the extension without waiting for a reply.
	fn post(&self, envelope: Envelope) -> Result<(), ChannelError>;
}

/// Correlation strategy used by a [`BrokerChannel`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelMode {
	/// Concurrent outstanding requests distinguished by correlation id.
	#[default]
	Multiplexed,
	/// One request on the wire at a time; later callers wait in FIFO order.
	SingleFlight,
}

/// Transport-level failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ChannelError {
	/// No reply arrived within the timeout.
	#[error("Broker did not reply within {waited}.")]
	Timeout {
		/// Timeout that elapsed.
		waited: Duration,
	},
	/// Extension or broker is absent or disconnected.
	#[error("Broker channel is unavailable: {reason}.")]
	Unavailable {
		/// Human-readable reason.
		reason: String,
	},
	/// Another call is already waiting on this correlation id.
	#[error("Correlation id {correlation_id} is already in flight.")]
	DuplicateCorrelation {
		/// Offending correlation id.
		correlation_id: CorrelationId,
	},
}

/// What [`BrokerChannel::dispatch`] did with an inbound envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
	/// The reply resolved a waiting call.
	Delivered,
	/// No call was waiting on the correlation id (late, duplicate, or unsolicited reply).
	Ignored,
}

/// Shared handle to the broker messaging channel.
///
/// Cloning is cheap; clones share the transport and the pending map.
#[derive(Clone)]
pub struct BrokerChannel {
	transport: Arc<dyn ExtensionTransport>,
	mode: ChannelMode,
	pending: PendingMap,
	gate: Arc<AsyncMutex<()>>,
	next_slot: Arc<AtomicU64>,
}
impl BrokerChannel {
	/// Creates a channel over the provided transport.
	pub fn new(transport: Arc<dyn ExtensionTransport>, mode: ChannelMode) -> Self {
		Self {
			transport,
			mode,
			pending: Default::default(),
			gate: Default::default(),
			next_slot: Default::default(),
		}
	}

	/// Creates a channel using the correlation strategy set in `config`.
	pub fn from_config(transport: Arc<dyn ExtensionTransport>, config: &BridgeConfig) -> Self {
		Self::new(transport, config.channel_mode)
	}

	/// Correlation strategy in use.
	pub fn mode(&self) -> ChannelMode {
		self.mode
	}

	/// Number of calls currently waiting for a reply.
	pub fn in_flight(&self) -> usize {
		self.pending.lock().len()
	}

	/// Sends `envelope` and waits up to `timeout` for the reply carrying the same correlation
	/// id.
	///
	/// Fails fast with [`ChannelError::Unavailable`] when the transport reports itself
	/// disconnected. A non-positive timeout fails with [`ChannelError::Timeout`] before
	/// anything is posted. In single-flight mode the timeout also covers the time spent queued.
	pub async fn send(
		&self,
		envelope: Envelope,
		timeout: Duration,
	) -> Result<Envelope, ChannelError> {
		if !self.transport.is_connected() {
			return Err(unavailable("extension transport is not connected"));
		}

		let budget = match std::time::Duration::try_from(timeout) {
			Ok(budget) if !budget.is_zero() => budget,
			_ => {
				obs::log_warn!(waited = %timeout, "Refusing to send with a non-positive timeout.");

				return Err(ChannelError::Timeout { waited: timeout });
			},
		};

		match tokio::time::timeout(budget, self.round_trip(envelope)).await {
			Ok(result) => result,
			Err(_) => {
				obs::log_warn!(waited = %timeout, "Broker reply timed out.");

				Err(ChannelError::Timeout { waited: timeout })
			},
		}
	}

	/// Routes an inbound envelope to the call waiting on its correlation id.
	pub fn dispatch(&self, envelope: Envelope) -> DispatchOutcome {
		let waiting = self.pending.lock().remove(&envelope.correlation_id);
		let Some(waiting) = waiting else {
			obs::log_warn!(
				correlation_id = %envelope.correlation_id,
				method = %envelope.method,
				"Ignoring broker reply without a waiting call."
			);

			return DispatchOutcome::Ignored;
		};

		match waiting.sender.send(envelope) {
			Ok(()) => DispatchOutcome::Delivered,
			Err(_) => DispatchOutcome::Ignored,
		}
	}

	/// Parses wire text and routes the resulting envelope.
	pub fn dispatch_json(&self, raw: &str) -> Result<DispatchOutcome, ProtocolError> {
		Envelope::from_json(raw).map(|envelope| self.dispatch(envelope))
	}

	/// Fails every waiting call with [`ChannelError::Unavailable`].
	///
	/// Hosts call this when the extension port disconnects.
	pub fn close(&self) {
		let drained = std::mem::take(&mut *self.pending.lock());

		obs::log_debug!(released = drained.len(), "Broker channel closed.");

		drop(drained);
	}

	async fn round_trip(&self, envelope: Envelope) -> Result<Envelope, ChannelError> {
		let _turn = match self.mode {
			ChannelMode::SingleFlight => Some(self.gate.lock().await),
			ChannelMode::Multiplexed => None,
		};

		if !self.transport.is_connected() {
			return Err(unavailable("extension transport disconnected while queued"));
		}

		let (slot, receiver) = self.register(&envelope.correlation_id)?;

		obs::log_debug!(
			correlation_id = %envelope.correlation_id,
			method = %envelope.method,
			"Posting envelope to broker."
		);

		self.transport.post(envelope)?;

		let reply =
			receiver.await.map_err(|_| unavailable("channel closed before the broker replied"));

		drop(slot);

		reply
	}

	fn register(
		&self,
		correlation_id: &CorrelationId,
	) -> Result<(SlotGuard, oneshot::Receiver<Envelope>), ChannelError> {
		let (sender, receiver) = oneshot::channel();
		let id = self.next_slot.fetch_add(1, AtomicOrdering::Relaxed);
		let mut pending = self.pending.lock();

		if pending.contains_key(correlation_id) {
			return Err(ChannelError::DuplicateCorrelation {
				correlation_id: correlation_id.clone(),
			});
		}

		pending.insert(correlation_id.clone(), PendingReply { slot: id, sender });

		let guard = SlotGuard {
			pending: self.pending.clone(),
			correlation_id: correlation_id.clone(),
			slot: id,
		};

		Ok((guard, receiver))
	}
}
impl Debug for BrokerChannel {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BrokerChannel")
			.field("mode", &self.mode)
			.field("in_flight", &self.in_flight())
			.finish()
	}
}

struct PendingReply {
	slot: u64,
	sender: oneshot::Sender<Envelope>,
}

// Releases the pending entry when the owning call finishes or is dropped. The slot number
// keeps a finished call from removing a newer entry that reuses its correlation id.
struct SlotGuard {
	pending: PendingMap,
	correlation_id: CorrelationId,
	slot: u64,
}
impl Drop for SlotGuard {
	fn drop(&mut self) {
		let mut pending = self.pending.lock();

		if pending.get(&self.correlation_id).is_some_and(|entry| entry.slot == self.slot) {
			pending.remove(&self.correlation_id);
		}
	}
}

fn unavailable(reason: &str) -> ChannelError {
	ChannelError::Unavailable { reason: reason.to_owned() }
}
