//! Opaque tokens and the derivation from raw card fields.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sensitive::{CardFields, FieldName};

/// A stand-in for sensitive data that is safe to cross the trust boundary.
///
/// The embedding side treats the token as opaque: it is relayed to the
/// host page unmodified and never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueToken(String);

impl OpaqueToken {
    /// Wraps a token string received over the channel.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrows the token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the token and returns the string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for OpaqueToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives one token from the collector's current field values.
///
/// Implementations run inside the collector's origin and are the only code
/// expected to call [`SensitiveValue::expose_secret`](crate::SensitiveValue::expose_secret).
pub trait Tokenizer {
    /// Derives a token from the fields.
    fn tokenize(&self, fields: &CardFields) -> OpaqueToken;
}

/// Joins the field values with a delimiter.
///
/// This is a simulation only: the output is trivially reversible. A real
/// deployment would call a tokenisation backend here instead.
///
/// ```
/// use frame_handshake::{CardFields, DelimitedTokenizer, FieldName, Tokenizer};
///
/// let mut fields = CardFields::new();
/// fields.set(FieldName::CardNumber, "4111111111111111");
/// fields.set(FieldName::CardCvv, "123");
///
/// let token = DelimitedTokenizer::default().tokenize(&fields);
/// assert_eq!(token.as_str(), "4111111111111111|123");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DelimitedTokenizer {
    delimiter: char,
}

impl DelimitedTokenizer {
    /// Creates a tokenizer with a custom delimiter.
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }
}

impl Default for DelimitedTokenizer {
    fn default() -> Self {
        Self::new('|')
    }
}

impl Tokenizer for DelimitedTokenizer {
    fn tokenize(&self, fields: &CardFields) -> OpaqueToken {
        let mut token = String::new();
        for (i, field) in FieldName::ALL.iter().enumerate() {
            if i > 0 {
                token.push(self.delimiter);
            }
            token.push_str(fields.get(*field).expose_secret());
        }
        OpaqueToken(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_still_produce_a_token() {
        let token = DelimitedTokenizer::default().tokenize(&CardFields::new());
        assert_eq!(token.as_str(), "|");
    }

    #[test]
    fn custom_delimiter() {
        let mut fields = CardFields::new();
        fields.set(FieldName::CardNumber, "5555");
        fields.set(FieldName::CardCvv, "999");
        let token = DelimitedTokenizer::new(':').tokenize(&fields);
        assert_eq!(token.into_string(), "5555:999");
    }

    #[test]
    fn token_serialises_as_plain_string() {
        let token = OpaqueToken::new("tok_abc");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"tok_abc\"");
    }
}
