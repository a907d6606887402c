//! Frame-side half of the handshake.
//!
//! The collector runs under the provider's origin, owns the card inputs,
//! and emits exactly one token message per pay action, pinned to the
//! merchant's exact origin.

use crate::browser::FrameWindow;
use crate::error::Error;
use crate::logging::HandshakeLog;
use crate::message::Message;
use crate::origin::Origin;
use crate::sensitive::{CardFields, FieldName};
use crate::token::{DelimitedTokenizer, Tokenizer};

/// Owns sensitive input and turns it into a token on submit.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use frame_handshake::{Deployment, FieldName, FrameWindow, IsolatedCollector, MessageBus};
///
/// let d = Deployment::default();
/// let parent = Rc::new(MessageBus::new(d.merchant_origin.clone()));
/// let window = FrameWindow::new(d.provider_origin.clone(), d.frame_url(), parent.clone());
///
/// let mut collector = IsolatedCollector::new(window, d.merchant_origin.clone());
/// collector.on_input(FieldName::CardNumber, "4111111111111111");
/// collector.on_input(FieldName::CardCvv, "123");
/// collector.on_submit().unwrap();
///
/// assert_eq!(parent.pending(), 1);
/// ```
#[derive(Debug)]
pub struct IsolatedCollector<T = DelimitedTokenizer> {
    window: FrameWindow,
    target_origin: Origin,
    fields: CardFields,
    tokenizer: T,
}

impl IsolatedCollector<DelimitedTokenizer> {
    /// Creates a collector in `window` that only ever talks to `target_origin`.
    pub fn new(window: FrameWindow, target_origin: Origin) -> Self {
        Self {
            window,
            target_origin,
            fields: CardFields::new(),
            tokenizer: DelimitedTokenizer::default(),
        }
    }
}

impl<T: Tokenizer> IsolatedCollector<T> {
    /// Swaps the token derivation.
    pub fn with_tokenizer<U: Tokenizer>(self, tokenizer: U) -> IsolatedCollector<U> {
        IsolatedCollector {
            window: self.window,
            target_origin: self.target_origin,
            fields: self.fields,
            tokenizer,
        }
    }

    /// Records the latest value of one input. No format validation.
    pub fn on_input(&mut self, field: FieldName, raw: impl Into<String>) {
        self.fields.set(field, raw);
    }

    /// Derives a token from the current fields and posts it to the parent.
    ///
    /// The message goes to the parent window only if its origin is exactly
    /// the target origin; it is never sent to "any origin". If the frame
    /// URL carried a nonce, the message echoes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the message cannot be encoded. Delivery
    /// itself is fire-and-forget and never reports failure.
    pub fn on_submit(&self) -> Result<(), Error> {
        let token = self.tokenizer.tokenize(&self.fields);
        let message = Message::tokenised_card_details(token, self.window.nonce());
        let payload = serde_json::to_value(&message)?;

        self.window.parent().post_message(payload, &self.target_origin);
        HandshakeLog::new("collector", self.window.origin())
            .debug(format_args!("posted token message to {}", self.target_origin));
        Ok(())
    }

    /// The frame context the collector runs in.
    pub fn window(&self) -> &FrameWindow {
        &self.window
    }

    /// The only origin tokens are sent to.
    pub fn target_origin(&self) -> &Origin {
        &self.target_origin
    }
}
