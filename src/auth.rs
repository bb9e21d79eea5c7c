//! Auth-domain identifiers, scope sets, accounts, and token results.

pub mod account;
pub mod id;
pub mod result;
pub mod scope;
pub mod secret;

pub use account::*;
pub use id::*;
pub use result::*;
pub use scope::*;
pub use secret::*;
