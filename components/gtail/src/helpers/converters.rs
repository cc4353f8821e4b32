//! Conversions between Graylog wire records and the internal domain types.
//!
//! Stream conversion is total. Message conversion can fail: the id and the
//! timestamp are required for deduplication and ordering, so a message
//! missing either (or carrying a malformed timestamp) is a protocol error.

// Local crates
use crate::graylog::models::{
    FetchError, MESSAGE_ID_FIELD, Message, MessageEnvelope, STREAMS_FIELD, StreamRecord,
    TIMESTAMP_FIELD, parse_timestamp,
};
use crate::streams::directory::Stream;

// External crates
use serde_json::Value;

/// Convert a wire `StreamRecord` -> internal `Stream`.
impl From<StreamRecord> for Stream {
    fn from(record: StreamRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            description: record.description.filter(|d| !d.trim().is_empty()),
            active: !record.disabled,
        }
    }
}

/// Convert a wire `MessageEnvelope` -> internal `Message`.
impl TryFrom<MessageEnvelope> for Message {
    type Error = FetchError;

    fn try_from(envelope: MessageEnvelope) -> Result<Self, Self::Error> {
        let fields = envelope.message;

        let id = fields
            .get(MESSAGE_ID_FIELD)
            .and_then(Value::as_str)
            .ok_or(FetchError::MissingField {
                field: MESSAGE_ID_FIELD,
            })?
            .to_string();

        let raw_timestamp = fields
            .get(TIMESTAMP_FIELD)
            .and_then(Value::as_str)
            .ok_or(FetchError::MissingField {
                field: TIMESTAMP_FIELD,
            })?;
        let timestamp = parse_timestamp(raw_timestamp)?;

        let stream_ids = fields
            .get(STREAMS_FIELD)
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            id,
            timestamp,
            fields,
            stream_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> MessageEnvelope {
        serde_json::from_value(json!({ "message": value })).unwrap()
    }

    #[test]
    fn message_keeps_open_fields_and_streams() {
        let message = Message::try_from(envelope(json!({
            "_id": "abc",
            "timestamp": "2024-05-01T12:00:00.000001Z",
            "streams": ["s1", "s2"],
            "level": 3,
            "source": "web-01",
        })))
        .unwrap();

        assert_eq!(message.id, "abc");
        assert_eq!(message.stream_ids, ["s1", "s2"]);
        assert_eq!(message.field("level"), Some(&json!(3)));
        assert_eq!(message.field("source"), Some(&json!("web-01")));
    }

    #[test]
    fn message_without_id_is_rejected() {
        let err = Message::try_from(envelope(json!({
            "timestamp": "2024-05-01T12:00:00.000001Z",
        })))
        .unwrap_err();
        assert!(matches!(err, FetchError::MissingField { field: "_id" }));
    }

    #[test]
    fn message_with_bad_timestamp_is_rejected() {
        let err = Message::try_from(envelope(json!({
            "_id": "abc",
            "timestamp": "2024-05-01 12:00:00",
        })))
        .unwrap_err();
        assert!(matches!(err, FetchError::TimestampParse { .. }));
    }

    #[test]
    fn disabled_stream_becomes_inactive() {
        let record = StreamRecord {
            id: "1".into(),
            title: "Web".into(),
            description: Some(String::new()),
            disabled: true,
        };
        let stream = Stream::from(record);
        assert!(!stream.active);
        assert_eq!(stream.description, None);
    }
}
