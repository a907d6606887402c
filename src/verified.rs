/// A value that passed the embedding controller's inbound checks.
///
/// `Verified<T>` is proof that a channel payload had the expected shape and
/// came from the expected collector origin (and, when bound, echoed the
/// frame nonce). Only [`MessageValidator`](crate::MessageValidator) creates
/// one.
///
/// # Construction Invariants
///
/// There is no public constructor and no `From<T>` implementation.
///
/// ```compile_fail
/// use frame_handshake::{OpaqueToken, Verified};
///
/// let forged = Verified::new(OpaqueToken::new("tok"));
/// ```
///
/// # Access
///
/// - [`AsRef::as_ref`] borrows the value
/// - [`into_inner`](Self::into_inner) consumes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified<T> {
    inner: T,
}

impl<T> Verified<T> {
    /// Wraps a value without checking it.
    ///
    /// Callers must have validated the value first.
    pub(crate) fn new_unchecked(value: T) -> Self {
        Self { inner: value }
    }

    /// Consumes the wrapper and returns the value.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> AsRef<T> for Verified<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}
