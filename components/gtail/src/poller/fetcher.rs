//! Polling Fetcher
//!
//! Turns "what has arrived since the cursor?" into Graylog searches:
//!
//! ```text
//! Cursor -> window + page limit -> [count probe] -> search -> sort -> drop seen
//! ```
//!
//! Deduplication is by message id. If the last-seen id is no longer inside
//! the window (it aged out, or the server returned it elsewhere in the
//! order), the whole sorted batch is returned, so a message can be shown
//! twice when the server's ordering is unstable near the window boundary.

// Local crates
use crate::{
    graylog::{
        client::{GraylogClient, SearchRequest},
        models::{FetchError, Message},
    },
    poller::window::{
        Cursor, PageLimit, SearchRange, project_fields, select_page_limit, select_window,
    },
};

// External crates
use std::time::Duration;
use tracing::instrument;

/// Everything that stays the same between polls.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub window: SearchRange,
    pub query: Option<String>,
    pub stream_ids: Vec<String>,
    pub fields: Option<Vec<String>>,
    pub initial_limit: Option<u64>,
    pub poll_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            window: SearchRange::default(),
            query: None,
            stream_ids: Vec::new(),
            fields: None,
            initial_limit: None,
            poll_delay: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: GraylogClient,
    options: FetchOptions,
}

impl Fetcher {
    /// Create a fetcher. The field projection is fixed here, `_id` included.
    pub fn new(client: GraylogClient, mut options: FetchOptions) -> Self {
        options.fields = project_fields(options.fields.as_deref());
        Self { client, options }
    }

    #[must_use]
    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Absolute ranges are fetched once; the caller must not loop on them.
    #[must_use]
    pub fn is_one_shot(&self) -> bool {
        self.options.window.is_absolute()
    }

    /// Search request for the next poll, without resolving a probed limit.
    #[must_use]
    pub fn plan(&self, cursor: &Cursor) -> (SearchRequest, PageLimit) {
        let window = select_window(&self.options.window, cursor, self.options.poll_delay);
        let limit = select_page_limit(&self.options.window, cursor, self.options.initial_limit);

        let request = SearchRequest {
            window,
            query: self.options.query.clone(),
            fields: self.options.fields.clone(),
            stream_ids: self.options.stream_ids.clone(),
            limit: match limit {
                PageLimit::Fixed(n) => n,
                PageLimit::Probe => 1,
            },
        };
        (request, limit)
    }

    /// Fetch the messages that arrived after `cursor`, oldest first.
    #[instrument(
        name = "gtail_poller::fetch_next",
        target = "poller::fetcher",
        level = "debug",
        skip_all,
        fields(last_message_id = cursor.last_message_id.as_deref())
    )]
    pub async fn fetch_next(&self, cursor: &Cursor) -> Result<Vec<Message>, FetchError> {
        let (mut request, limit) = self.plan(cursor);

        if limit == PageLimit::Probe {
            let total = self.client.count(&request).await?;
            tracing::debug!(total_results = total, "Sized initial fetch from count probe");
            if total == 0 {
                return Ok(Vec::new());
            }
            request.limit = total;
        }

        let batch = self.client.search(&request).await?;
        let fetched = batch.len();
        let fresh = order_and_dedup(batch, cursor.last_message_id.as_deref());

        tracing::debug!(fetched, fresh = fresh.len(), "Fetched message batch");
        Ok(fresh)
    }
}

/// Sort by timestamp (stable) and drop everything up to and including
/// `last_message_id`. When the id is absent the whole sorted batch is kept.
#[must_use]
pub fn order_and_dedup(mut messages: Vec<Message>, last_message_id: Option<&str>) -> Vec<Message> {
    messages.sort_by_key(|message| message.timestamp);

    let Some(last_id) = last_message_id else {
        return messages;
    };

    match messages.iter().position(|message| message.id == last_id) {
        Some(index) => messages.split_off(index + 1),
        None => {
            tracing::debug!(
                last_message_id = %last_id,
                batch = messages.len(),
                "Last seen message not in batch, returning full batch"
            );
            messages
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::load_config::ServerConfig;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn message(id: &str, secs: i64) -> Message {
        Message {
            id: id.to_string(),
            timestamp: at(secs),
            fields: Default::default(),
            stream_ids: Vec::new(),
        }
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    fn fetcher(options: FetchOptions) -> Fetcher {
        let server = ServerConfig {
            uri: "http://graylog.invalid:12900".into(),
            token: None,
            username: None,
            password: None,
            timeout_secs: 5,
        };
        Fetcher::new(GraylogClient::new(&server).unwrap(), options)
    }

    #[test]
    fn returns_suffix_after_last_seen() {
        let batch = vec![message("a", 10), message("b", 20), message("c", 30)];
        assert_eq!(ids(&order_and_dedup(batch, Some("b"))), ["c"]);
    }

    #[test]
    fn suffix_for_every_position() {
        let batch: Vec<Message> = (0..5).map(|i| message(&format!("m{i}"), i * 10)).collect();

        for k in 0..batch.len() {
            let last = batch[k].id.clone();
            let fresh = order_and_dedup(batch.clone(), Some(&last));
            assert_eq!(fresh, batch[k + 1..].to_vec(), "last seen at {k}");
        }
    }

    #[test]
    fn unknown_last_seen_returns_full_batch() {
        let batch = vec![message("a", 10), message("b", 20)];
        assert_eq!(ids(&order_and_dedup(batch, Some("zzz"))), ["a", "b"]);
    }

    #[test]
    fn sorts_before_dedup() {
        let batch = vec![message("c", 30), message("a", 10), message("b", 20)];
        assert_eq!(ids(&order_and_dedup(batch, Some("a"))), ["b", "c"]);
    }

    #[test]
    fn result_is_non_decreasing_and_stable() {
        let batch = vec![
            message("x", 20),
            message("y", 5),
            message("z", 20),
            message("w", 5),
        ];
        let sorted = order_and_dedup(batch, None);

        assert!(sorted.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp));
        assert_eq!(ids(&sorted), ["y", "w", "x", "z"]);
    }

    #[test]
    fn projection_is_fixed_at_construction() {
        let fetcher = fetcher(FetchOptions {
            fields: Some(vec!["message".into()]),
            ..FetchOptions::default()
        });
        assert_eq!(
            fetcher.options().fields.as_deref(),
            Some(&["message".to_string(), "_id".to_string()][..])
        );
    }

    #[test]
    fn plan_switches_to_cursor_window_and_cap() {
        let fetcher = fetcher(FetchOptions {
            window: SearchRange::Relative { initial_seconds: 7200 },
            poll_delay: Duration::from_secs(10),
            ..FetchOptions::default()
        });

        let (first, first_limit) = fetcher.plan(&Cursor::default());
        assert_eq!(first.params()[0], ("range", "7200".to_string()));
        assert_eq!(first_limit, PageLimit::Probe);

        let cursor = Cursor {
            last_message_id: Some("a".into()),
            last_timestamp: Some(at(0)),
        };
        let (next, next_limit) = fetcher.plan(&cursor);
        assert_eq!(next.params()[0], ("range", "300".to_string()));
        assert_eq!(next_limit, PageLimit::Fixed(1000));
        assert_eq!(next.limit, 1000);
    }
}
