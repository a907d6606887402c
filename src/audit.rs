//! Audit trail of inbound message decisions.
//!
//! Events hold only the sender origin, the frame they were addressed to and
//! the outcome. Token values and payloads are never recorded.

use std::cell::RefCell;
use std::fmt;

use crate::error::{Rejection, RejectionKind};
use crate::origin::Origin;

/// Outcome of one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    /// Token relayed to the host page
    Accepted,
    /// Dropped as malformed
    Malformed,
    /// Dropped because the sender origin was not the collector
    UntrustedOrigin,
    /// Dropped because the frame nonce did not match
    NonceMismatch,
}

impl AuditOutcome {
    /// Maps a rejection to its audit outcome.
    pub fn from_rejection(rejection: &Rejection) -> Self {
        match rejection.kind {
            RejectionKind::MalformedMessage => AuditOutcome::Malformed,
            RejectionKind::UntrustedOrigin { .. } => AuditOutcome::UntrustedOrigin,
            RejectionKind::NonceMismatch => AuditOutcome::NonceMismatch,
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Accepted => write!(f, "accepted"),
            AuditOutcome::Malformed => write!(f, "malformed"),
            AuditOutcome::UntrustedOrigin => write!(f, "untrusted_origin"),
            AuditOutcome::NonceMismatch => write!(f, "nonce_mismatch"),
        }
    }
}

/// One recorded decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    frame_id: String,
    sender: Origin,
    outcome: AuditOutcome,
}

impl AuditEvent {
    /// Creates an event.
    pub fn new(frame_id: impl Into<String>, sender: Origin, outcome: AuditOutcome) -> Self {
        Self {
            frame_id: frame_id.into(),
            sender,
            outcome,
        }
    }

    /// Id of the frame element the controller mounted.
    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    /// Transport-supplied sender origin.
    pub fn sender(&self) -> &Origin {
        &self.sender
    }

    /// What the controller did with the message.
    pub fn outcome(&self) -> AuditOutcome {
        self.outcome
    }
}

/// In-memory recorder for audit events, in arrival order.
///
/// ```
/// use frame_handshake::audit::{AuditEvent, AuditOutcome, AuditTrail};
/// use frame_handshake::Origin;
///
/// let trail = AuditTrail::new();
/// trail.record(AuditEvent::new(
///     "card-frame",
///     Origin::parse("http://evil.example").unwrap(),
///     AuditOutcome::UntrustedOrigin,
/// ));
/// assert_eq!(trail.len(), 1);
/// assert_eq!(trail.count(AuditOutcome::UntrustedOrigin), 1);
/// ```
#[derive(Debug, Default)]
pub struct AuditTrail {
    events: RefCell<Vec<AuditEvent>>,
}

impl AuditTrail {
    /// Creates an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event.
    pub fn record(&self, event: AuditEvent) {
        self.events.borrow_mut().push(event);
    }

    /// Returns a snapshot of all recorded events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.borrow().clone()
    }

    /// Returns how many events had the given outcome.
    pub fn count(&self, outcome: AuditOutcome) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.outcome == outcome)
            .count()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Clears all recorded events.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}
