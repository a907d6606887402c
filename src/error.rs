use std::fmt;

use crate::origin::Origin;

/// Errors that can occur across the handshake.
///
/// None of these is fatal to a page: every failure degrades to
/// "nothing happened" for the user, who may trigger the action again.
#[derive(Debug)]
pub enum Error {
    /// An inbound message was dropped by the embedding controller
    Rejected(Rejection),
    /// The browser refused to embed, execute or expose a resource
    Refused(Refusal),
    /// An origin or URL could not be parsed
    InvalidOrigin(OriginError),
    /// A payload could not be encoded or decoded as JSON
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Rejected(r) => write!(f, "message rejected: {}", r),
            Error::Refused(r) => write!(f, "browser refused: {}", r),
            Error::InvalidOrigin(e) => write!(f, "{}", e),
            Error::Json(e) => write!(f, "JSON payload error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(e) => Some(e),
            Error::InvalidOrigin(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Rejection> for Error {
    fn from(r: Rejection) -> Self {
        Error::Rejected(r)
    }
}

impl From<Refusal> for Error {
    fn from(r: Refusal) -> Self {
        Error::Refused(r)
    }
}

impl From<OriginError> for Error {
    fn from(e: OriginError) -> Self {
        Error::InvalidOrigin(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

/// An inbound message that failed validation.
///
/// The message never names the token value, only what was wrong with
/// the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// The kind of rejection
    pub kind: RejectionKind,
    /// Human-readable detail
    pub message: String,
}

impl Rejection {
    /// Creates a new rejection.
    pub fn new(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether this rejection should be reported as a security event.
    ///
    /// Malformed messages are expected noise on a shared channel;
    /// anything else means a recognised message came from the wrong place.
    pub fn is_security_event(&self) -> bool {
        !matches!(self.kind, RejectionKind::MalformedMessage)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Rejection {}

/// Why an inbound message was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionKind {
    /// Payload is not an object, or does not carry the expected tag or value
    MalformedMessage,
    /// The transport-supplied sender origin is not the collector origin
    UntrustedOrigin {
        /// Origin the transport reported for the sender
        origin: Origin,
    },
    /// The message did not echo the nonce this frame was created with
    NonceMismatch,
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionKind::MalformedMessage => write!(f, "MalformedMessage"),
            RejectionKind::UntrustedOrigin { origin } => {
                write!(f, "UntrustedOrigin '{}'", origin)
            }
            RejectionKind::NonceMismatch => write!(f, "NonceMismatch"),
        }
    }
}

/// A browser-enforced refusal.
///
/// Application code on a real page never observes these; content or a
/// response is simply absent. The browser model surfaces them so that the
/// absence can be asserted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refusal {
    /// The kind of refusal
    pub kind: RefusalKind,
    /// Human-readable detail
    pub message: String,
}

impl Refusal {
    /// Creates a new refusal.
    pub fn new(kind: RefusalKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Refusal {}

/// The browser control that refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalKind {
    /// The framed document's `frame-ancestors` does not list the parent
    EmbeddingRefused,
    /// The parent page's `frame-src` does not allow the frame's origin
    FrameSourceRefused,
    /// The page's `script-src` does not allow the script's origin
    ScriptRefused,
    /// A cross-origin read without a matching `Access-Control-Allow-Origin`
    ResourceAccessRefused,
    /// No site serves the requested origin or path
    NotFound,
}

impl fmt::Display for RefusalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefusalKind::EmbeddingRefused => write!(f, "EmbeddingRefused"),
            RefusalKind::FrameSourceRefused => write!(f, "FrameSourceRefused"),
            RefusalKind::ScriptRefused => write!(f, "ScriptRefused"),
            RefusalKind::ResourceAccessRefused => write!(f, "ResourceAccessRefused"),
            RefusalKind::NotFound => write!(f, "NotFound"),
        }
    }
}

/// An origin or URL string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginError {
    input: String,
    reason: &'static str,
    source: Option<url::ParseError>,
}

impl OriginError {
    pub(crate) fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
            source: None,
        }
    }

    pub(crate) fn from_url(input: &str, source: url::ParseError) -> Self {
        Self {
            input: input.to_string(),
            reason: "not an absolute URL",
            source: Some(source),
        }
    }

    /// Returns the rejected input.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Returns why the input was rejected.
    pub fn reason(&self) -> &str {
        self.reason
    }
}

impl fmt::Display for OriginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid origin '{}': {}", self.input, self.reason)?;
        if let Some(source) = &self.source {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for OriginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as _)
    }
}
