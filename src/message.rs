//! Wire payloads and channel events.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::origin::Origin;
use crate::tainted::Tainted;
use crate::token::OpaqueToken;

/// Tag carried by every token message.
pub const TOKENISED_CARD_DETAILS: &str = "tokenisedCardDetails";

/// Payload the collector posts to the embedding page.
///
/// There is no origin field: the receiver learns the sender
/// origin from the transport, never from the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Always [`TOKENISED_CARD_DETAILS`]
    #[serde(rename = "type")]
    pub kind: String,
    /// The derived token
    pub value: OpaqueToken,
    /// Echo of the frame nonce, when the embedding side bound one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Nonce>,
}

impl Message {
    /// Builds a token message.
    pub fn tokenised_card_details(value: OpaqueToken, nonce: Option<Nonce>) -> Self {
        Self {
            kind: TOKENISED_CARD_DETAILS.to_string(),
            value,
            nonce,
        }
    }
}

/// A random value binding messages to one frame instance.
///
/// Generated by the embedding controller and handed to the collector in
/// the frame URL, never over the message channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(Uuid);

impl Nonce {
    /// Generates a fresh random nonce.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Reads the `nonce` query parameter from a URL or path.
    pub fn from_url(url: &str) -> Option<Self> {
        let (_, query) = url.split_once('?')?;
        let query = query.split('#').next().unwrap_or_default();
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "nonce")
            .and_then(|(_, value)| value.parse().ok())
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Nonce {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Nonce)
    }
}

/// One delivery on a browsing context's message channel.
///
/// `origin` is stamped by the transport from the sending context and is the
/// only sender identity a receiver may trust. `data` is whatever the sender
/// posted and stays tainted.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    origin: Origin,
    data: Tainted<serde_json::Value>,
}

impl MessageEvent {
    /// Creates an event as the transport would deliver it.
    pub fn new(origin: Origin, data: serde_json::Value) -> Self {
        Self {
            origin,
            data: Tainted::new(data),
        }
    }

    /// Transport-verified sender origin.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The untrusted payload.
    pub fn data(&self) -> &Tainted<serde_json::Value> {
        &self.data
    }
}
