use std::fmt;

use crate::origin::Origin;

/// Structured logger shared by the handshake components.
///
/// Every record carries the emitting component and the origin of the
/// browsing context it runs in, so that collector-side and host-side
/// records of one checkout can be told apart.
///
/// Never pass raw field values or tokens through these methods at `info`
/// or above; sensitive values redact themselves, tokens do not.
#[derive(Debug, Clone, Copy)]
pub struct HandshakeLog<'a> {
    component: &'static str,
    origin: &'a Origin,
}

impl<'a> HandshakeLog<'a> {
    /// Creates a logger for a component running under `origin`.
    pub(crate) fn new(component: &'static str, origin: &'a Origin) -> Self {
        Self { component, origin }
    }

    /// Logs an info-level message.
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(component = self.component, origin = %self.origin, "{}", args);
    }

    /// Logs a warning-level message. Used for security events.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(component = self.component, origin = %self.origin, "{}", args);
    }

    /// Logs a debug-level message.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(component = self.component, origin = %self.origin, "{}", args);
    }
}
