//! Raw card input, held only inside the isolated collector.

use std::fmt;
use std::str::FromStr;

/// A raw input value that must never leave the collector as-is.
///
/// `SensitiveValue` redacts itself in `Debug` and `Display`, does not
/// implement `Clone`, `Serialize` or `Deref`, and only hands out the raw
/// string through [`expose_secret`](Self::expose_secret).
///
/// # Examples
///
/// ```
/// use frame_handshake::SensitiveValue;
///
/// let pan = SensitiveValue::new("4111111111111111");
/// assert_eq!(format!("{:?}", pan), "[REDACTED]");
/// assert_eq!(pan.to_string(), "[REDACTED]");
/// assert_eq!(pan.expose_secret(), "4111111111111111");
/// ```
// Do NOT add Clone, Default or Serialize: each would let the raw value be
// duplicated or written out without going through expose_secret().
pub struct SensitiveValue {
    // Must stay private.
    inner: String,
}

impl SensitiveValue {
    /// Wraps a raw input value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Explicitly exposes the raw value.
    ///
    /// Only tokenizers should call this. Never log or transmit the result.
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    /// Returns true if nothing has been entered.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SensitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SensitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// The sensitive fields the collector owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldName {
    /// Primary account number
    CardNumber,
    /// Card verification value
    CardCvv,
}

impl FieldName {
    /// All fields, in token order.
    pub const ALL: [FieldName; 2] = [FieldName::CardNumber, FieldName::CardCvv];

    /// Name of the in-memory value slot.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::CardNumber => "cardNumberValue",
            FieldName::CardCvv => "cardCvvValue",
        }
    }

    /// Id of the input element rendered inside the frame document.
    pub fn element_id(&self) -> &'static str {
        match self {
            FieldName::CardNumber => "card-number",
            FieldName::CardCvv => "card-cvv",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldName {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldName::ALL
            .into_iter()
            .find(|field| field.as_str() == s || field.element_id() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// A field name the collector does not own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown card field '{}'", self.0)
    }
}

impl std::error::Error for UnknownField {}

/// Current values of every sensitive field.
///
/// Lives for the frame session only; it is never persisted, cloned or
/// serialised.
#[derive(Debug)]
pub struct CardFields {
    card_number: SensitiveValue,
    card_cvv: SensitiveValue,
}

impl CardFields {
    /// Creates empty fields.
    pub fn new() -> Self {
        Self {
            card_number: SensitiveValue::new(""),
            card_cvv: SensitiveValue::new(""),
        }
    }

    /// Replaces the value of one field.
    pub fn set(&mut self, field: FieldName, raw: impl Into<String>) {
        let slot = match field {
            FieldName::CardNumber => &mut self.card_number,
            FieldName::CardCvv => &mut self.card_cvv,
        };
        *slot = SensitiveValue::new(raw);
    }

    /// Returns the current value of one field.
    pub fn get(&self, field: FieldName) -> &SensitiveValue {
        match field {
            FieldName::CardNumber => &self.card_number,
            FieldName::CardCvv => &self.card_cvv,
        }
    }
}

impl Default for CardFields {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitive_value_redacts() {
        let cvv = SensitiveValue::new("123");
        let debug_output = format!("{:?}", cvv);

        assert_eq!(debug_output, "[REDACTED]");
        assert!(!debug_output.contains("123"));
        assert!(!debug_output.contains("String"));
        assert_eq!(format!("{}", cvv), "[REDACTED]");
    }

    #[test]
    fn card_fields_debug_never_shows_values() {
        let mut fields = CardFields::new();
        fields.set(FieldName::CardNumber, "4111111111111111");
        fields.set(FieldName::CardCvv, "123");

        let debug_output = format!("{:?}", fields);
        assert!(!debug_output.contains("4111"));
        assert!(!debug_output.contains("123"));
    }

    #[test]
    fn last_input_wins() {
        let mut fields = CardFields::new();
        fields.set(FieldName::CardCvv, "1");
        fields.set(FieldName::CardCvv, "12");
        fields.set(FieldName::CardCvv, "123");
        assert_eq!(fields.get(FieldName::CardCvv).expose_secret(), "123");
        assert!(fields.get(FieldName::CardNumber).is_empty());
    }

    #[test]
    fn field_names_parse_from_slot_or_element_id() {
        assert_eq!("cardNumberValue".parse::<FieldName>(), Ok(FieldName::CardNumber));
        assert_eq!("card-cvv".parse::<FieldName>(), Ok(FieldName::CardCvv));
        assert!("card-expiry".parse::<FieldName>().is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: formatting card fields never reveals digits typed into them
            #[test]
            fn proptest_card_fields_never_leak(
                pan in "[0-9]{12,19}",
                cvv in "[0-9]{3,4}"
            ) {
                let mut fields = CardFields::new();
                fields.set(FieldName::CardNumber, pan.clone());
                fields.set(FieldName::CardCvv, cvv.clone());

                let rendered = format!("{:?} {}", fields, fields.get(FieldName::CardNumber));
                prop_assert!(!rendered.contains(&pan));
                prop_assert!(!rendered.contains(&cvv));
                prop_assert_eq!(fields.get(FieldName::CardCvv).expose_secret(), cvv.as_str());
            }
        }
    }
}
