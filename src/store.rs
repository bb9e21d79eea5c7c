//! Read-only account store contract consulted while resolving login hints.

pub mod memory;

pub use memory::MemoryAccountStore;

// self
use crate::{_prelude::*, auth::AccountInfo};

/// Account lookups the bridge needs from the host's token cache.
///
/// The bridge never writes through this trait. Implementations back it with whatever cache
/// the host application already maintains.
pub trait AccountStore
where
	Self: Send + Sync,
{
	/// Account currently marked active, if any.
	fn active_account(&self) -> Result<Option<AccountInfo>, StoreError>;

	/// Login hint recovered from a prior-session (legacy library) cache entry, if any.
	fn legacy_login_hint(&self) -> Result<Option<String>, StoreError>;
}

/// Error type produced by [`AccountStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Cached entry could not be decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
