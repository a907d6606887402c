//! Cross-origin card tokenization handshake.
//!
//! A merchant page embeds a payment provider's card-entry frame. The frame
//! keeps the raw card number and CVV inside the provider's origin and hands
//! back only an opaque token over the cross-window message channel.
//!
//! Three pieces make that safe:
//! - **[`IsolatedCollector`]**: runs in the provider's frame, owns the raw
//!   inputs, and posts one token message per pay action to the merchant's
//!   exact origin
//! - **[`EmbeddingController`]**: runs on the merchant page, mounts the
//!   frame, and relays a token to its callback only after the
//!   transport-stamped sender origin has been checked
//! - **[`OriginPolicy`]**: the headers each site must serve so that only the
//!   merchant can frame the collector and only the provider can script the
//!   merchant page
//!
//! # Core Types
//!
//! - [`Origin`]: scheme, host and port, compared exactly
//! - [`MessageEvent`]: a payload plus the sender origin the transport vouches for
//! - [`Tainted<T>`]: inbound payloads nobody has checked yet
//! - [`Verified<T>`]: values that passed [`MessageValidator`]
//! - [`Browser`]: an in-memory model of the browser checks the handshake relies on
//!
//! # Examples
//!
//! ```
//! use frame_handshake::demo::{run_checkout, CheckoutOptions};
//! use frame_handshake::Deployment;
//!
//! let tokens = run_checkout(
//!     &Deployment::default(),
//!     "4111111111111111",
//!     "123",
//!     &CheckoutOptions::default(),
//! )
//! .expect("checkout succeeds");
//!
//! // The host page only ever sees the token.
//! assert_eq!(tokens[0].as_str(), "4111111111111111|123");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
mod browser;
mod channel;
mod collector;
pub mod config;
mod controller;
pub mod demo;
mod error;
pub mod http;
mod logging;
mod message;
mod origin;
pub mod policy;
mod sensitive;
mod tainted;
mod token;
mod validator;
mod verified;
pub mod web;

pub use audit::{AuditEvent, AuditOutcome, AuditTrail};
pub use browser::{Browser, FrameWindow, Page, ParentHandle};
pub use channel::{MessageBus, Subscription};
pub use collector::IsolatedCollector;
pub use config::Deployment;
pub use controller::{
    ContainerElement, ControllerConfig, ControllerState, EmbeddingController, FrameContainer,
    FrameElement,
};
pub use error::{Error, OriginError, Refusal, RefusalKind, Rejection, RejectionKind};
pub use message::{Message, MessageEvent, Nonce, TOKENISED_CARD_DETAILS};
pub use origin::Origin;
pub use policy::{AccessPolicy, ContentSecurityPolicy, OriginPolicy, SourceExpr};
pub use sensitive::{CardFields, FieldName, SensitiveValue, UnknownField};
pub use tainted::Tainted;
pub use token::{DelimitedTokenizer, OpaqueToken, Tokenizer};
pub use validator::MessageValidator;
pub use verified::Verified;
