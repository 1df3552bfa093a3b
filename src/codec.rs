//! Payload <-> bytes conversion with content-type tagging, per §4.4.

use serde_json::Value;

use crate::error::BusError;
use crate::message::{self, headers, Message, Payload, MIME_OCTET_STREAM};

/// Target content type for `serialize_if_necessary`. Anything other than
/// these two is rejected, per §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationTarget {
    All,
    ApplicationOctetStream,
}

/// The codec invoked for payloads that are neither raw bytes nor a UTF-8
/// string. Backed by `serde_json` so "the payload's runtime class" has a
/// concrete, typed stand-in (see DESIGN.md).
pub trait Codec: Send + Sync + std::fmt::Debug {
    fn encode(&self, type_name: &str, value: &Value) -> Result<Vec<u8>, BusError>;
    fn decode(&self, type_name: &str, bytes: &[u8]) -> Result<Value, BusError>;
}

#[derive(Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, type_name: &str, value: &Value) -> Result<Vec<u8>, BusError> {
        serde_json::to_vec(value)
            .map_err(|e| BusError::serialization(type_name, e.to_string()))
    }

    fn decode(&self, type_name: &str, bytes: &[u8]) -> Result<Value, BusError> {
        serde_json::from_slice(bytes).map_err(|e| BusError::serialization(type_name, e.to_string()))
    }
}

/// Implements §4.4's `serializeIfNecessary`.
pub fn serialize_if_necessary(
    mut message: Message,
    target: SerializationTarget,
    codec: &dyn Codec,
) -> Result<Message, BusError> {
    if target == SerializationTarget::All {
        return Ok(message);
    }

    let payload = message.payload();
    let synthetic_content_type = payload.synthetic_content_type();
    let encoded: Vec<u8> = match payload {
        Payload::Bytes(bytes) => bytes.to_vec(),
        Payload::Text(text) => text.into_bytes(),
        Payload::Object { type_name, value } => codec.encode(&type_name, &value)?,
    };

    let original_content_type = message
        .headers
        .get(headers::CONTENT_TYPE)
        .cloned()
        .unwrap_or_default();
    message
        .headers
        .insert(headers::ORIGINAL_CONTENT_TYPE.to_string(), original_content_type);
    message
        .headers
        .insert(headers::CONTENT_TYPE.to_string(), synthetic_content_type);
    message.set_payload(Payload::Bytes(bytes::Bytes::from(encoded)));
    Ok(message)
}

/// Implements §4.4's `deserializeIfNecessary`.
pub fn deserialize_if_necessary(mut message: Message, codec: &dyn Codec) -> Result<Message, BusError> {
    let bytes = match message.payload() {
        Payload::Bytes(bytes) => bytes,
        _ => return Ok(message),
    };

    let content_type = message.content_type().unwrap_or(MIME_OCTET_STREAM).to_string();
    if content_type == MIME_OCTET_STREAM {
        return Ok(message);
    }

    let decoded_payload = if content_type == message::MIME_TEXT_PLAIN {
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| BusError::serialization("text/plain", e.to_string()))?;
        Payload::Text(text)
    } else {
        let type_name = message::parse_object_type_name(&content_type)
            .ok_or_else(|| BusError::serialization(content_type.clone(), "malformed content type"))?;
        let value = codec.decode(&type_name, &bytes)?;
        Payload::Object { type_name, value }
    };

    message.set_payload(decoded_payload);
    match message.headers.remove(headers::ORIGINAL_CONTENT_TYPE) {
        Some(original) if !original.is_empty() => {
            message.headers.insert(headers::CONTENT_TYPE.to_string(), original);
        }
        _ => {
            message.headers.remove(headers::CONTENT_TYPE);
        }
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn all_target_leaves_message_untouched() {
        let message = Message::from_payload(Payload::Text("hi".into()), HashMap::new());
        let result = serialize_if_necessary(message.clone(), SerializationTarget::All, &JsonCodec).unwrap();
        assert_eq!(result, message);
    }

    #[test]
    fn text_round_trips_through_octet_stream() {
        let message = Message::from_payload(Payload::Text("hello".into()), HashMap::new());
        let serialized =
            serialize_if_necessary(message, SerializationTarget::ApplicationOctetStream, &JsonCodec).unwrap();
        assert_eq!(serialized.content_type(), Some(message::MIME_TEXT_PLAIN));
        assert!(matches!(serialized.payload(), Payload::Bytes(_)));

        let deserialized = deserialize_if_necessary(serialized, &JsonCodec).unwrap();
        assert_eq!(deserialized.payload(), Payload::Text("hello".into()));
        assert_eq!(deserialized.content_type(), None);
    }

    #[test]
    fn bytes_pass_through_without_decoding() {
        let message = Message::from_payload(Payload::Bytes(bytes::Bytes::from_static(b"raw")), HashMap::new());
        let serialized =
            serialize_if_necessary(message, SerializationTarget::ApplicationOctetStream, &JsonCodec).unwrap();
        assert_eq!(serialized.content_type(), Some(MIME_OCTET_STREAM));

        let deserialized = deserialize_if_necessary(serialized, &JsonCodec).unwrap();
        assert_eq!(
            deserialized.payload(),
            Payload::Bytes(bytes::Bytes::from_static(b"raw"))
        );
    }

    #[test]
    fn arbitrary_object_round_trips_via_codec() {
        let value = serde_json::json!({ "id": 42 });
        let message = Message::from_payload(
            Payload::Object {
                type_name: "orders.Order".into(),
                value: value.clone(),
            },
            HashMap::new(),
        );
        let serialized =
            serialize_if_necessary(message, SerializationTarget::ApplicationOctetStream, &JsonCodec).unwrap();
        assert_eq!(
            serialized.content_type(),
            Some("application/x-java-object;type=orders.Order")
        );

        let deserialized = deserialize_if_necessary(serialized, &JsonCodec).unwrap();
        assert_eq!(
            deserialized.payload(),
            Payload::Object {
                type_name: "orders.Order".into(),
                value
            }
        );
    }

    #[test]
    fn preserves_original_content_type_through_round_trip() {
        let mut headers = HashMap::new();
        headers.insert("contentType".to_string(), "text/custom".to_string());
        let message = Message::from_payload(Payload::Text("hi".into()), headers);

        let serialized =
            serialize_if_necessary(message, SerializationTarget::ApplicationOctetStream, &JsonCodec).unwrap();
        assert_eq!(
            serialized.headers.get("originalContentType").map(String::as_str),
            Some("text/custom")
        );

        let deserialized = deserialize_if_necessary(serialized, &JsonCodec).unwrap();
        assert_eq!(deserialized.content_type(), Some("text/custom"));
        assert!(!deserialized.headers.contains_key("originalContentType"));
    }
}
