use std::fmt;

/// Data that arrived over the shared message channel and has not been validated.
///
/// Anything on the channel may come from another frame, a browser extension
/// or devtools. `Tainted<T>` keeps such payloads out of host-page logic
/// until a [`MessageValidator`](crate::MessageValidator) has checked both the
/// payload shape and the transport-supplied sender origin.
///
/// # Security Properties
///
/// - Does NOT implement `Deref` or any implicit conversion traits
/// - Inner value is inaccessible outside this crate
/// - The only way out is validation into [`Verified<T>`](crate::Verified)
///
/// # Examples
///
/// ```
/// use frame_handshake::Tainted;
///
/// let payload = Tainted::new(serde_json::json!({ "type": "tokenisedCardDetails" }));
/// println!("{:?}", payload); // Tainted { inner: Object {...} }
///
/// // No way to read the payload from here:
/// // let value = payload.inner; // private
/// ```
// Clone is needed: one payload fans out to every subscriber on a channel.
#[derive(Clone)]
pub struct Tainted<T> {
    // Must stay private; making it public bypasses validation entirely.
    inner: T,
}

impl<T> Tainted<T> {
    /// Wraps an untrusted value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Borrows the value for inspection by crate-internal validators.
    ///
    /// Never hand the returned reference to application code.
    pub(crate) fn peek(&self) -> &T {
        &self.inner
    }
}

// Do NOT add Deref, AsRef, Borrow, From<T> or Into<T>.

impl<T: fmt::Debug> fmt::Debug for Tainted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tainted")
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tainted_debug_marks_value() {
        let payload = Tainted::new(json!({ "type": "somethingElse" }));
        let debug_output = format!("{:?}", payload);

        assert!(debug_output.contains("Tainted"));
        assert!(debug_output.contains("somethingElse"));
    }

    #[test]
    fn tainted_clone_keeps_payload() {
        let payload = Tainted::new(json!("noise"));
        let copy = payload.clone();
        assert_eq!(payload.peek(), copy.peek());
    }

    #[test]
    fn tainted_cannot_be_used_as_t() {
        let tainted = Tainted::new("x".to_string());

        #[allow(dead_code)]
        fn takes_string(_s: String) {}

        // This would not compile if uncommented:
        // takes_string(tainted);

        let _ = tainted;
    }
}
