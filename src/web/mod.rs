//! Serving collaborators.
//!
//! The provider and the merchant are modelled as plain request handlers.
//! Their only contract with the handshake is the set of headers they attach:
//!
//! - the provider serves the collector document with a `frame-ancestors`
//!   directive naming exactly the merchant origin
//! - the merchant serves its page with `script-src`/`frame-src` limited to
//!   itself and the provider
//! - the provider's data endpoints carry CORS headers only where an
//!   [`AccessPolicy`](crate::AccessPolicy) explicitly allows the merchant
//!
//! Document and script bodies are minimal stand-ins; rendering is not
//! modelled.

mod merchant;
mod provider;

pub use merchant::{MerchantSite, CONTAINER_ID};
pub use provider::{ProviderSite, ALLOWED_API_PATH, BLOCKED_API_PATH};

use crate::http::{Request, Response};
use crate::origin::Origin;

/// A site answering requests for one origin.
pub trait Site {
    /// The origin this site serves.
    fn origin(&self) -> &Origin;

    /// Handles one request. Unknown paths yield 404.
    fn handle(&self, request: &Request) -> Response;
}

/// Serialises a JSON status body, falling back to a 500.
fn json_or_500<T: serde::Serialize>(value: &T) -> Response {
    Response::json(value).unwrap_or_else(|e| Response::new(500, e.to_string()))
}
