//! Inbound checks for token messages.
//!
//! The order is fixed: shape first, then sender origin, then the optional
//! nonce. The origin check reads only the transport-supplied
//! [`MessageEvent::origin`]; an `origin` field inside the payload is ignored.

use serde_json::Value;

use crate::error::{Rejection, RejectionKind};
use crate::message::{MessageEvent, Nonce, TOKENISED_CARD_DETAILS};
use crate::origin::Origin;
use crate::token::OpaqueToken;
use crate::verified::Verified;

/// Validates channel events against one expected collector.
///
/// # Examples
///
/// ```
/// use frame_handshake::{MessageEvent, MessageValidator, Origin, RejectionKind};
/// use serde_json::json;
///
/// let collector = Origin::parse("http://localhost:3005").unwrap();
/// let validator = MessageValidator::new(collector.clone());
///
/// let good = MessageEvent::new(
///     collector,
///     json!({ "type": "tokenisedCardDetails", "value": "4111111111111111|123" }),
/// );
/// let token = validator.validate(&good).unwrap().into_inner();
/// assert_eq!(token.as_str(), "4111111111111111|123");
///
/// let evil = MessageEvent::new(
///     Origin::parse("http://evil.example").unwrap(),
///     json!({ "type": "tokenisedCardDetails", "value": "x", "origin": "http://localhost:3005" }),
/// );
/// let rejection = validator.validate(&evil).unwrap_err();
/// assert!(matches!(rejection.kind, RejectionKind::UntrustedOrigin { .. }));
/// ```
#[derive(Debug, Clone)]
pub struct MessageValidator {
    expected_origin: Origin,
    expected_nonce: Option<Nonce>,
}

impl MessageValidator {
    /// Accepts token messages from exactly `expected_origin`.
    pub fn new(expected_origin: Origin) -> Self {
        Self {
            expected_origin,
            expected_nonce: None,
        }
    }

    /// Additionally requires the payload to echo `nonce`.
    pub fn with_nonce(mut self, nonce: Nonce) -> Self {
        self.expected_nonce = Some(nonce);
        self
    }

    /// The only origin this validator trusts.
    pub fn expected_origin(&self) -> &Origin {
        &self.expected_origin
    }

    /// Shape check: an object whose `type` is the token tag.
    ///
    /// Used as the subscription filter, so unrelated traffic never reaches
    /// the controller at all.
    pub fn is_recognised(&self, event: &MessageEvent) -> bool {
        shape_ok(event.data().peek())
    }

    /// Runs every check and returns the token on success.
    ///
    /// # Errors
    ///
    /// - `MalformedMessage` if the payload is not an object, lacks the tag,
    ///   or has no string `value`
    /// - `UntrustedOrigin` if the transport-supplied origin differs
    /// - `NonceMismatch` if a nonce is bound and not echoed
    pub fn validate(&self, event: &MessageEvent) -> Result<Verified<OpaqueToken>, Rejection> {
        let data = event.data().peek();

        if !shape_ok(data) {
            return Err(Rejection::new(
                RejectionKind::MalformedMessage,
                "payload is not a tagged token message",
            ));
        }

        if event.origin() != &self.expected_origin {
            return Err(Rejection::new(
                RejectionKind::UntrustedOrigin {
                    origin: event.origin().clone(),
                },
                format!("expected sender {}", self.expected_origin),
            ));
        }

        let value = match data.get("value") {
            Some(Value::String(value)) => value,
            _ => {
                return Err(Rejection::new(
                    RejectionKind::MalformedMessage,
                    "value is missing or not a string",
                ))
            }
        };

        if let Some(expected) = self.expected_nonce {
            let echoed = data
                .get("nonce")
                .and_then(Value::as_str)
                .and_then(|n| n.parse::<Nonce>().ok());
            if echoed != Some(expected) {
                return Err(Rejection::new(
                    RejectionKind::NonceMismatch,
                    "message is not bound to this frame",
                ));
            }
        }

        Ok(Verified::new_unchecked(OpaqueToken::new(value.as_str())))
    }
}

fn shape_ok(data: &Value) -> bool {
    data.as_object()
        .and_then(|obj| obj.get("type"))
        .and_then(Value::as_str)
        == Some(TOKENISED_CARD_DETAILS)
}
