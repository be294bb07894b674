//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `StreamSupervisor`: Owns a price subscription and its cancellation
//! - `PricePipeline`: Fans observations out to display, animation and narration
//! - `NarrationEngine`: Throttled speech with bounded retries
//! - `AnimationReaper`: Drops departing prices once their transition ends

mod animation_reaper;
mod narration_engine;
mod price_pipeline;
mod stream_supervisor;

pub use animation_reaper::{AnimationReaper, REAP_INTERVAL, VisibilityPredicate};
pub use narration_engine::NarrationEngine;
pub use price_pipeline::PricePipeline;
pub use stream_supervisor::{StreamExit, StreamState, StreamSupervisor, SubscriptionHandle};
