// External crates
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Name of the message field Graylog uses as the unique message identifier.
pub const MESSAGE_ID_FIELD: &str = "_id";

/// Name of the message field carrying the ingestion timestamp.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Name of the message field listing the ids of the streams a message was routed into.
pub const STREAMS_FIELD: &str = "streams";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

static TIMESTAMP_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{1,9}Z$").ok()
});

/// Errors raised while talking to the Graylog REST API.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Could not fetch {url} from server. Status code: {status}")]
    Status { status: u16, url: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned timestamp {value:?}, expected YYYY-MM-DDTHH:MM:SS.ffffffZ")]
    TimestampParse { value: String },
    #[error("server returned a message without the `{field}` field")]
    MissingField { field: &'static str },
    #[error("failed to decode server response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// HTTP status code for errors caused by a non-success response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// `GET /streams` response body.
#[derive(Debug, Deserialize)]
pub struct StreamsResponse {
    #[serde(default)]
    pub streams: Vec<StreamRecord>,
}

/// A stream as described by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

/// `GET /search/universal/{relative,absolute}` response body.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub messages: Vec<MessageEnvelope>,
    #[serde(default)]
    pub total_results: u64,
}

/// Graylog wraps every search hit in an object holding the message fields.
#[derive(Debug, Deserialize)]
pub struct MessageEnvelope {
    pub message: Map<String, Value>,
}

/// `GET /users/{username}/tokens` response body.
#[derive(Debug, Deserialize)]
pub struct TokenList {
    #[serde(default)]
    pub tokens: Vec<TokenRecord>,
}

/// A single access token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRecord {
    pub name: String,
    pub token: String,
}

/// A log message fetched from the server.
///
/// `fields` keeps every field the server returned, the schema is open. `id` is
/// the deduplication key; `timestamp` is used for ordering and adaptive delay.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub fields: Map<String, Value>,
    pub stream_ids: Vec<String>,
}

impl Message {
    /// Field value by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Parse a Graylog message timestamp (`2024-05-01T12:00:00.123456Z`).
///
/// The fractional part and the `Z` suffix are mandatory; anything else points
/// at a protocol mismatch and is reported instead of guessed.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, FetchError> {
    let mismatch = || FetchError::TimestampParse {
        value: value.to_string(),
    };

    let shape_ok = TIMESTAMP_RE.as_ref().is_some_and(|re| re.is_match(value));
    if !shape_ok {
        return Err(mismatch());
    }

    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| mismatch())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone, Timelike};

    #[test]
    fn parses_microsecond_timestamps() {
        let ts = parse_timestamp("2024-05-01T12:30:45.123456Z").unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap()
            + TimeDelta::microseconds(123_456);
        assert_eq!(ts, expected);
        assert_eq!(ts.nanosecond(), 123_456_000);
    }

    #[test]
    fn accepts_millisecond_precision() {
        let ts = parse_timestamp("2024-05-01T12:30:45.120Z").unwrap();
        assert_eq!(ts.nanosecond(), 120_000_000);
    }

    #[test]
    fn rejects_timestamps_without_fraction_or_zone() {
        for bad in [
            "2024-05-01T12:30:45Z",
            "2024-05-01T12:30:45.123456",
            "2024-05-01 12:30:45.123456Z",
            "2024-05-01T12:30:45.123456+00:00",
            "yesterday",
        ] {
            let err = parse_timestamp(bad).unwrap_err();
            assert!(
                matches!(err, FetchError::TimestampParse { ref value } if value == bad),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_out_of_range_components() {
        assert!(parse_timestamp("2024-13-01T12:30:45.000000Z").is_err());
    }

    #[test]
    fn search_response_tolerates_missing_total() {
        let body = r#"{"messages":[{"message":{"_id":"a","timestamp":"2024-05-01T12:30:45.000000Z"}}]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.messages.len(), 1);
        assert_eq!(parsed.total_results, 0);
    }
}
