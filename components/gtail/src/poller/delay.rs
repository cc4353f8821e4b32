// External crates
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Delays at or below this are skipped: the stream is hot, poll again now.
pub const HOT_STREAM_THRESHOLD: Duration = Duration::from_secs(2);

/// Sleep before the next poll.
///
/// With no message in the last poll this is `base_delay`. Otherwise it is the time
/// since that poll's newest message, capped at `base_delay` (a future timestamp from
/// clock skew counts as zero), and collapses to zero when it is at most
/// [`HOT_STREAM_THRESHOLD`]. The result is never above `base_delay`.
#[must_use]
pub fn next_delay(
    last_message_timestamp: Option<DateTime<Utc>>,
    base_delay: Duration,
    now: DateTime<Utc>,
) -> Duration {
    let Some(last) = last_message_timestamp else {
        return base_delay;
    };

    // `to_std` fails for negative spans.
    let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
    let delay = elapsed.min(base_delay);

    if delay <= HOT_STREAM_THRESHOLD {
        Duration::ZERO
    } else {
        delay
    }
}
