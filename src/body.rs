//! Response body as a tagged union.
//!
//! Middleware set a [`Body`] through [`Context::set_body`](crate::Context::set_body);
//! the finalizer switches on the variant to decide how bytes reach the wire.

use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// A heap-allocated byte stream piped straight to the client.
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'static>>;

/// What a middleware wants to send back.
#[derive(Default)]
pub enum Body {
    /// No body. Set explicitly, it means "send nothing but keep the status".
    #[default]
    Empty,
    Bytes(Bytes),
    Text(String),
    Stream(BodyStream),
    /// Serialized to canonical JSON text when the response is finalized.
    Json(Value),
}

impl Body {
    /// Wraps any `Send` byte stream.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::Stream(Box::pin(stream))
    }

    /// Converts a serializable value into a structured body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Byte length the body will have on the wire; unknown for streams.
    pub(crate) fn byte_len(&self) -> Option<u64> {
        match self {
            Self::Empty | Self::Stream(_) => None,
            Self::Bytes(b) => Some(b.len() as u64),
            Self::Text(s) => Some(s.len() as u64),
            Self::Json(v) => Some(v.to_string().len() as u64),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Json(v) => f.debug_tuple("Json").field(v).finish(),
        }
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for Body {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self { Self::Bytes(b) }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self { Self::Bytes(b.into()) }
}

impl From<Value> for Body {
    fn from(v: Value) -> Self { Self::Json(v) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lengths_follow_the_wire_representation() {
        assert_eq!(Body::from("héllo").byte_len(), Some(6));
        assert_eq!(Body::from(vec![1, 2, 3]).byte_len(), Some(3));
        assert_eq!(Body::from(json!({"a": 1})).byte_len(), Some(7));
        assert_eq!(Body::Empty.byte_len(), None);
        assert_eq!(Body::stream(futures::stream::empty()).byte_len(), None);
    }

    #[test]
    fn json_from_serializable() {
        let body = Body::json(&[1, 2, 3]).unwrap();
        assert!(matches!(body, Body::Json(Value::Array(ref items)) if items.len() == 3));
        assert!(!body.is_null());
    }
}
