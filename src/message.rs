use std::collections::HashMap;

use bytes::Bytes;
use serde_json::Value;

/// Well-known header names carried on the wire, per the content-type and
/// partition-routing grammar.
pub mod headers {
    pub const CONTENT_TYPE: &str = "contentType";
    pub const ORIGINAL_CONTENT_TYPE: &str = "originalContentType";
    pub const PARTITION: &str = "partition";
}

pub const MIME_TEXT_PLAIN: &str = "text/plain";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";
const JAVA_OBJECT_MIME_PREFIX: &str = "application/x-java-object;type=";

/// A message payload in one of the three forms the codec understands: raw
/// bytes, a UTF-8 string, or an arbitrary value tagged with the type name it
/// was encoded from.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Bytes(Bytes),
    Text(String),
    Object { type_name: String, value: Value },
}

impl Payload {
    /// The synthetic content type §6 derives from a payload's runtime class.
    pub fn synthetic_content_type(&self) -> String {
        match self {
            Payload::Bytes(_) => MIME_OCTET_STREAM.to_string(),
            Payload::Text(_) => MIME_TEXT_PLAIN.to_string(),
            Payload::Object { type_name, .. } => format!(
                "{}{}",
                JAVA_OBJECT_MIME_PREFIX,
                quote_if_array(type_name)
            ),
        }
    }
}

fn quote_if_array(type_name: &str) -> String {
    if type_name.ends_with("[]") {
        format!("\"{type_name}\"")
    } else {
        type_name.to_string()
    }
}

/// Parses the `type` parameter out of an `application/x-java-object;type=...`
/// mime string, per §6's content-type grammar.
pub fn parse_object_type_name(content_type: &str) -> Option<String> {
    let rest = content_type.strip_prefix(JAVA_OBJECT_MIME_PREFIX)?;
    Some(rest.trim_matches('"').to_string())
}

/// A message travelling through the bus: a payload plus a flat string header
/// map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub payload_bytes: Option<Bytes>,
    pub payload_text: Option<String>,
    pub payload_object: Option<(String, Value)>,
    pub headers: HashMap<String, String>,
}

impl Message {
    pub fn from_payload(payload: Payload, headers: HashMap<String, String>) -> Self {
        let mut message = Message {
            headers,
            ..Default::default()
        };
        message.set_payload(payload);
        message
    }

    pub fn payload(&self) -> Payload {
        if let Some(bytes) = &self.payload_bytes {
            Payload::Bytes(bytes.clone())
        } else if let Some(text) = &self.payload_text {
            Payload::Text(text.clone())
        } else if let Some((type_name, value)) = &self.payload_object {
            Payload::Object {
                type_name: type_name.clone(),
                value: value.clone(),
            }
        } else {
            Payload::Bytes(Bytes::new())
        }
    }

    pub fn set_payload(&mut self, payload: Payload) {
        self.payload_bytes = None;
        self.payload_text = None;
        self.payload_object = None;
        match payload {
            Payload::Bytes(bytes) => self.payload_bytes = Some(bytes),
            Payload::Text(text) => self.payload_text = Some(text),
            Payload::Object { type_name, value } => {
                self.payload_object = Some((type_name, value))
            }
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(headers::CONTENT_TYPE).map(String::as_str)
    }

    /// A JSON view of the payload, used by expression evaluators that need
    /// to read fields such as `payload.id`. Bytes/text payloads are exposed
    /// as themselves.
    pub fn payload_as_json(&self) -> Value {
        match self.payload() {
            Payload::Bytes(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
            Payload::Text(text) => Value::String(text),
            Payload::Object { value, .. } => value,
        }
    }
}

/// The key a partition selector routes on. Only string-shaped keys have a
/// stable hash contract (§4.2), so this is a thin newtype rather than a
/// fully generic key type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey(pub String);

impl PartitionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        PartitionKey(value)
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        PartitionKey(value.to_string())
    }
}
