//! Inbound message types handed to the pipeline by a broker.

use std::collections::HashMap;

use bytes::Bytes;

/// Loosely typed header value, as carried by broker message metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    String(String),
    Int(i64),
    Bool(bool),
    Bytes(Bytes),
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::String(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::String(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Int(value)
    }
}

/// Message metadata keyed by header name.
pub type Headers = HashMap<String, HeaderValue>;

/// A single message delivered from a queue.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Broker-assigned identifier of this delivery.
    pub delivery_id: String,
    /// Optional metadata attached by the producer.
    pub headers: Headers,
    /// Content type declared by the producer, if any.
    pub content_type: Option<String>,
    /// Raw message body (an encoded command envelope).
    pub body: Bytes,
}

impl Delivery {
    /// Creates a delivery with no headers.
    #[must_use]
    pub fn new(delivery_id: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            delivery_id: delivery_id.into(),
            headers: Headers::new(),
            content_type: None,
            body: body.into(),
        }
    }

    /// Adds a header, replacing any previous value under the same name.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_headers_and_content_type() {
        let delivery = Delivery::new("d-1", vec![1_u8, 2])
            .with_header("X-Trace-ID", "abc")
            .with_header("retries", 3_i64)
            .with_content_type("application/msgpack");

        assert_eq!(delivery.delivery_id, "d-1");
        assert_eq!(delivery.body.as_ref(), &[1, 2]);
        assert_eq!(
            delivery.headers.get("X-Trace-ID"),
            Some(&HeaderValue::String("abc".to_string()))
        );
        assert_eq!(delivery.headers.get("retries"), Some(&HeaderValue::Int(3)));
        assert_eq!(delivery.content_type.as_deref(), Some("application/msgpack"));
    }
}
