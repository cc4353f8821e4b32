//! Stream Directory
//!
//! A read-only snapshot of the server's active streams, taken once at startup.
//! Users name streams by (a prefix of) their title; searches filter by stream
//! id, so every requested name is resolved against the snapshot before the
//! tail loop starts. Streams created or disabled on the server afterwards are
//! not seen until the process restarts.

// External crates
use std::collections::BTreeMap;
use tracing::instrument;

/// A server-side log channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub active: bool,
}

/// Raised when a requested stream name matches no active stream, or still
/// matches several after narrowing to exact titles.
///
/// Carries the active streams so the caller can show the alternatives.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Stream '{name}' could not be found or is not active")]
pub struct StreamNotFound {
    pub name: String,
    pub available: Vec<Stream>,
}

/// Snapshot of active streams keyed by stream id.
#[derive(Debug, Clone, Default)]
pub struct StreamDirectory {
    streams: BTreeMap<String, Stream>,
}

impl StreamDirectory {
    /// Build a snapshot, keeping only active streams.
    pub fn from_streams<I>(streams: I) -> Self
    where
        I: IntoIterator<Item = Stream>,
    {
        let streams = streams
            .into_iter()
            .filter(|stream| stream.active)
            .map(|stream| (stream.id.clone(), stream))
            .collect();

        Self { streams }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Stream> {
        self.streams.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Active streams ordered by case-insensitive title.
    #[must_use]
    pub fn list(&self) -> Vec<&Stream> {
        let mut streams: Vec<&Stream> = self.streams.values().collect();
        streams.sort_by_cached_key(|stream| stream.title.to_lowercase());
        streams
    }

    /// Resolve every requested name to a stream id, failing on the first
    /// name that cannot be resolved.
    #[instrument(
        name = "gtail_streams::resolve_all",
        target = "streams::directory",
        level = "debug",
        skip(self)
    )]
    pub fn resolve_all<S: AsRef<str> + std::fmt::Debug>(
        &self,
        names: &[S],
    ) -> Result<Vec<String>, StreamNotFound> {
        names.iter().map(|name| self.resolve(name.as_ref())).collect()
    }

    /// Resolve a single stream name.
    ///
    /// Titles are matched by case-insensitive prefix. When several titles share
    /// the prefix, only a title equal to `name` (case-sensitive) is accepted.
    pub fn resolve(&self, name: &str) -> Result<String, StreamNotFound> {
        let wanted = name.to_lowercase();

        let mut candidates: Vec<&Stream> = self
            .streams
            .values()
            .filter(|stream| stream.active && stream.title.to_lowercase().starts_with(&wanted))
            .collect();

        if candidates.len() > 1 {
            tracing::debug!(
                stream_name = %name,
                prefix_matches = candidates.len(),
                "Stream name is ambiguous by prefix, narrowing to exact title matches"
            );
            candidates.retain(|stream| stream.title == name);
        }

        match candidates.as_slice() {
            [stream] => {
                tracing::debug!(stream_name = %name, stream_id = %stream.id, "Resolved stream name");
                Ok(stream.id.clone())
            }
            _ => {
                tracing::debug!(
                    stream_name = %name,
                    candidates = candidates.len(),
                    "Stream name did not resolve to exactly one active stream"
                );
                Err(StreamNotFound {
                    name: name.to_string(),
                    available: self.list().into_iter().cloned().collect(),
                })
            }
        }
    }
}
