// Local crates
use crate::graylog::models::{MESSAGE_ID_FIELD, Message};

// External crates
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Initial relative window when the caller does not ask for one (5 minutes).
pub const DEFAULT_INITIAL_RANGE_SECS: u64 = 300;

/// Page cap once a cursor exists; windows are small from then on.
pub const CURSOR_PAGE_LIMIT: u64 = 1000;

/// Lower bound of the since-cursor window.
pub const MIN_CURSOR_WINDOW_SECS: u64 = 300;

/// Multiplier applied to the poll delay to size the since-cursor window, so
/// a few missed polls or some clock skew still land inside it.
pub const CURSOR_WINDOW_DELAY_FACTOR: u64 = 5;

/// Time range bounding a single search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchWindow {
    Relative { seconds: u64 },
    Absolute { from: DateTime<Utc>, to: DateTime<Utc> },
}

/// What the user asked for on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRange {
    /// Follow from a relative window; later polls shrink to the since-cursor window.
    Relative { initial_seconds: u64 },
    /// A fixed date range, fetched once.
    Absolute { from: DateTime<Utc>, to: DateTime<Utc> },
}

impl Default for SearchRange {
    fn default() -> Self {
        Self::Relative {
            initial_seconds: DEFAULT_INITIAL_RANGE_SECS,
        }
    }
}

impl SearchRange {
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        matches!(self, Self::Absolute { .. })
    }
}

/// Polling state threaded through the tail loop. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub last_message_id: Option<String>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl Cursor {
    /// True once at least one message has been rendered.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.last_message_id.is_some()
    }

    /// Move the cursor to `message`, the latest one handed to the renderer.
    pub fn advance(&mut self, message: &Message) {
        self.last_message_id = Some(message.id.clone());
        self.last_timestamp = Some(message.timestamp);
    }
}

/// How many results to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLimit {
    Fixed(u64),
    /// Ask the server for the total first and fetch exactly that many.
    Probe,
}

/// Width of the since-cursor window: `max(poll_delay * 5, 300)` seconds.
#[must_use]
pub fn cursor_window_seconds(poll_delay: Duration) -> u64 {
    poll_delay
        .as_secs()
        .saturating_mul(CURSOR_WINDOW_DELAY_FACTOR)
        .max(MIN_CURSOR_WINDOW_SECS)
}

/// Pick the window for the next search.
///
/// Absolute ranges are used verbatim and never look at the cursor.
#[must_use]
pub fn select_window(range: &SearchRange, cursor: &Cursor, poll_delay: Duration) -> FetchWindow {
    match range {
        SearchRange::Absolute { from, to } => FetchWindow::Absolute {
            from: *from,
            to: *to,
        },
        SearchRange::Relative { .. } if cursor.is_set() => FetchWindow::Relative {
            seconds: cursor_window_seconds(poll_delay),
        },
        SearchRange::Relative { initial_seconds } => FetchWindow::Relative {
            seconds: *initial_seconds,
        },
    }
}

/// Pick the page size for the next search.
///
/// The first relative fetch (and every absolute one) uses the explicit limit
/// when given, otherwise probes for the backlog size. Later relative fetches
/// use the fixed cap.
#[must_use]
pub fn select_page_limit(range: &SearchRange, cursor: &Cursor, initial_limit: Option<u64>) -> PageLimit {
    if !range.is_absolute() && cursor.is_set() {
        return PageLimit::Fixed(CURSOR_PAGE_LIMIT);
    }

    initial_limit.map_or(PageLimit::Probe, PageLimit::Fixed)
}

/// Effective field projection: the requested fields plus `_id`, which
/// deduplication depends on. `None` (no projection) stays `None`.
#[must_use]
pub fn project_fields(requested: Option<&[String]>) -> Option<Vec<String>> {
    let requested = requested.filter(|fields| !fields.is_empty())?;

    let mut fields = requested.to_vec();
    if !fields.iter().any(|field| field == MESSAGE_ID_FIELD) {
        fields.push(MESSAGE_ID_FIELD.to_string());
    }
    Some(fields)
}
