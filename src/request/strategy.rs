//! Provider-specific request extension hooks.
//!
//! The builder normalizes the fields every broker request shares, then hands the extra
//! parameter map to a [`RequestStrategy`] so a deployment can add what its broker expects
//! (for example a `msal_request_type` or a resource indicator) without touching the core.

// self
use crate::{_prelude::*, envelope::BrokerMethod};

/// Hook that lets deployments decorate broker requests.
///
/// Implementations must be `Send + Sync`; the default [`augment_request`](Self::augment_request)
/// does nothing.
pub trait RequestStrategy: Send + Sync {
	/// Adds or rewrites extra parameters for a request about to be sent with `method`.
	fn augment_request(&self, _method: BrokerMethod, _params: &mut BTreeMap<String, String>) {}
}

/// Strategy that leaves requests untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRequestStrategy;
impl Display for DefaultRequestStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-request-strategy")
	}
}
impl RequestStrategy for DefaultRequestStrategy {}
