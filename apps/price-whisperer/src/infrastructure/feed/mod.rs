//! Tick Feed Adapters
//!
//! Implementations of the [`TickSource`](crate::application::ports::TickSource)
//! port: a live WebSocket feed and a file replay for offline runs.

pub mod codec;
mod replay;
mod websocket;

use std::sync::Arc;

pub use codec::{CodecError, FeedMessage, TickCodec};
pub use replay::ReplayTickSource;
pub use websocket::WebSocketTickSource;

use crate::application::ports::TickSource;
use crate::infrastructure::config::FeedSource;

/// Build the tick source for a configured feed.
#[must_use]
pub fn tick_source(feed: &FeedSource) -> Arc<dyn TickSource> {
    match feed {
        FeedSource::WebSocket { url } => Arc::new(WebSocketTickSource::new(url.clone())),
        FeedSource::Replay { path, interval } => {
            Arc::new(ReplayTickSource::new(path.clone(), *interval))
        }
    }
}
