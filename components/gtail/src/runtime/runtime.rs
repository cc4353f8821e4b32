// Local crates
use crate::{
    helpers::shutdown::Shutdown,
    poller::{delay::next_delay, fetcher::Fetcher, window::Cursor},
    render::render::MessageRenderer,
};

// External crates
use anyhow::{Context, Result};
use chrono::Utc;
use std::io::{self, Write};
use std::time::Duration;
use tracing::instrument;

/// Loop behaviour that is not part of the fetch itself.
#[derive(Debug, Clone, Copy)]
pub struct TailSettings {
    /// Keep polling after the first successful fetch.
    pub follow: bool,
    /// Base delay between polls; also the retry delay after a failed fetch.
    pub poll_delay: Duration,
}

/// Why the tail loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailOutcome {
    /// One-shot fetch finished.
    Completed,
    /// Shutdown was triggered (Ctrl+C).
    Interrupted,
    /// The reader of our output went away (e.g. piped into `head`).
    OutputClosed,
}

/// Fetch, render, sleep, repeat.
///
/// Fetch failures are logged and retried after `poll_delay`, indefinitely.
/// Without `follow`, or for an absolute date range, the loop ends after the
/// first successful fetch. Shutdown is honoured during fetches and sleeps.
#[instrument(
    name = "gtail_runtime::run_tail",
    target = "runtime::runtime",
    level = "debug",
    skip_all,
    fields(follow = settings.follow, poll_delay_secs = settings.poll_delay.as_secs())
)]
pub async fn run_tail<W: Write>(
    fetcher: &Fetcher,
    renderer: &MessageRenderer<'_>,
    settings: TailSettings,
    shutdown: &Shutdown,
    out: &mut W,
) -> Result<TailOutcome> {
    let mut cursor = Cursor::default();
    let keep_following = settings.follow && !fetcher.is_one_shot();

    loop {
        let fetched = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(TailOutcome::Interrupted),
            res = fetcher.fetch_next(&cursor) => res,
        };

        let messages = match fetched {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    status = e.status(),
                    retry_in_secs = settings.poll_delay.as_secs(),
                    "Fetching messages failed, retrying"
                );
                if !sleep_or_shutdown(settings.poll_delay, shutdown).await {
                    return Ok(TailOutcome::Interrupted);
                }
                continue;
            }
        };

        for message in &messages {
            match renderer.render(message, out) {
                Ok(()) => cursor.advance(message),
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(TailOutcome::OutputClosed),
                Err(e) => return Err(e).context("Failed to write message to output"),
            }
        }
        match out.flush() {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(TailOutcome::OutputClosed),
            Err(e) => return Err(e).context("Failed to flush output"),
        }

        if !keep_following {
            return Ok(TailOutcome::Completed);
        }

        // Measured from this poll's newest message; an empty poll sleeps the full delay.
        let newest = messages.last().map(|message| message.timestamp);
        let delay = next_delay(newest, settings.poll_delay, Utc::now());
        tracing::trace!(
            rendered = messages.len(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Poll finished"
        );

        if !delay.is_zero() && !sleep_or_shutdown(delay, shutdown).await {
            return Ok(TailOutcome::Interrupted);
        }
    }
}

/// Sleep for `delay`; `false` when shutdown interrupted the sleep.
async fn sleep_or_shutdown(delay: Duration, shutdown: &Shutdown) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
