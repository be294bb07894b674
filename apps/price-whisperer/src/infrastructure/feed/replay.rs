//! Replay Tick Source
//!
//! Plays a recorded feed back from a JSON-lines file, one line per interval.
//! Each line holds one feed message in the same format the WebSocket feed
//! sends. Blank lines and lines starting with `#` are skipped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio_stream::wrappers::IntervalStream;

use super::codec::{FeedMessage, TickCodec};
use crate::application::ports::{FeedError, RawTick, TickSource, TickStream};
use crate::domain::pricing::Instrument;

/// Tick source that replays a file.
#[derive(Debug, Clone)]
pub struct ReplayTickSource {
    path: PathBuf,
    interval: Duration,
    codec: TickCodec,
}

impl ReplayTickSource {
    /// Create a source replaying `path`, one line every `interval`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            codec: TickCodec::new(),
        }
    }

    /// The replayed file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TickSource for ReplayTickSource {
    async fn subscribe(&self, instrument: &Instrument) -> Result<TickStream, FeedError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FeedError::Connect(format!("{}: {e}", self.path.display())))?;

        let lines: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();

        tracing::info!(
            path = %self.path.display(),
            instrument = %instrument,
            lines = lines.len(),
            interval_ms = self.interval.as_millis(),
            "Replaying recorded ticks"
        );

        let codec = self.codec;
        let ticker = IntervalStream::new(tokio::time::interval(self.interval));

        Ok(stream::iter(lines)
            .zip(ticker)
            .flat_map(move |(line, _)| stream::iter(decode_line(codec, &line)))
            .boxed())
    }
}

fn decode_line(codec: TickCodec, line: &str) -> Vec<Result<RawTick, FeedError>> {
    match codec.decode(line) {
        Ok(messages) => messages
            .into_iter()
            .filter_map(|message| match message {
                FeedMessage::Tick(tick) => Some(Ok(tick)),
                FeedMessage::Error(message) => Some(Err(FeedError::Upstream(message))),
                FeedMessage::Other => None,
            })
            .collect(),
        Err(e) => vec![Err(e.into())],
    }
}
