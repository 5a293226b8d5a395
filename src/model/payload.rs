use std::fmt;

use serde_json::Value;

/// A data channel payload, resolved once at the networking client boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Structured(Value),
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Payload {
        Payload::Text(text.into())
    }

    /// Decodes bytes received from the wire.
    ///
    /// JSON strings and anything that is not JSON become `Text`, every other
    /// JSON value is kept as `Structured`.
    pub fn from_wire(bytes: &[u8]) -> Payload {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::String(text)) => Payload::Text(text),
            Ok(value) => Payload::Structured(value),
            Err(_) => Payload::Text(String::from_utf8_lossy(bytes).to_string()),
        }
    }

    pub fn to_wire(&self) -> Vec<u8> {
        match self {
            Payload::Text(text) => Value::String(text.clone()).to_string().into_bytes(),
            Payload::Structured(value) => value.to_string().into_bytes(),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(text) => f.write_str(text),
            Payload::Structured(value) => write!(f, "{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_bytes_are_text() {
        assert_eq!(Payload::from_wire(b"hello there"), Payload::text("hello there"));
    }

    #[test]
    fn json_string_is_text() {
        assert_eq!(Payload::from_wire(br#""hi""#), Payload::text("hi"));
    }

    #[test]
    fn json_object_is_structured_and_displays_compact() {
        let payload = Payload::from_wire(br#"{ "a": 1, "b": [true] }"#);
        assert_eq!(payload, Payload::Structured(json!({"a": 1, "b": [true]})));
        assert_eq!(payload.to_string(), r#"{"a":1,"b":[true]}"#);
    }

    #[test]
    fn text_survives_the_wire_even_when_it_looks_like_json() {
        let payload = Payload::text("{\"not\": \"structured\"}");
        assert_eq!(Payload::from_wire(&payload.to_wire()), payload);
    }
}
