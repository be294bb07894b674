//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TickSource`: Subscription to the external price feed
//! - `SpeechBackend`: Speech synthesizer used for narration
//! - `DisplayPort`: Presentation boundary receiving price frames

mod display_port;
mod speech_port;
mod tick_source_port;

pub use display_port::{DisplayFrame, DisplayPort};
pub use speech_port::{SpeechBackend, SpeechError};
pub use tick_source_port::{FeedError, RawTick, TickPrice, TickSource, TickStream};

#[cfg(test)]
pub use speech_port::MockSpeechBackend;
