#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Price Whisperer - Narrated Token Price Ticker
//!
//! Follows the live price of one token, shows every tick, animates the
//! price it replaces and reads moves out loud through a speech synthesizer.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure state machines
//!   - `pricing`: Price samples and direction-of-change tracking
//!   - `animation`: Queue of departing prices
//!   - `narration`: Narration text, throttle window, voice policy, states
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Tick source, speech backend and display interfaces
//!   - `services`: Stream supervision, fan-out, narration, animation reaping
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `feed`: WebSocket and file-replay tick sources
//!   - `speech`: Synthesizer executable and logging backends
//!   - `display`: Headless display state
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//!                      ┌──────────────────┐     ┌───────────────┐
//! Tick feed ──────────►│ StreamSupervisor │────►│ PricePipeline │──► Display
//!                      │  (PriceTracker)  │     └───────┬───────┘
//!                      └──────────────────┘             ├──► NarrationEngine ──► Speech backend
//!                                                       └──► AnimationQueue ◄── AnimationReaper
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core price types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::animation::{AnimationEntry, AnimationId, AnimationQueue, SharedAnimationQueue};
pub use domain::narration::{
    NarrationConfig, NarrationOutcome, NarrationState, NarrationThrottle, Voice, VoicePolicy,
    VoiceToggle,
};
pub use domain::pricing::{Direction, Instrument, Observation, PriceMove, PriceSample, PriceTracker};

// Ports
pub use application::ports::{
    DisplayFrame, DisplayPort, FeedError, RawTick, SpeechBackend, SpeechError, TickSource,
    TickStream,
};

// Services
pub use application::services::{
    AnimationReaper, NarrationEngine, PricePipeline, StreamExit, StreamState, StreamSupervisor,
    SubscriptionHandle,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, FeedSource, WhispererConfig};

// Adapters
pub use infrastructure::display::{DisplaySnapshot, DisplayState, DisplayStatus};
pub use infrastructure::feed::{ReplayTickSource, WebSocketTickSource};
pub use infrastructure::speech::{CommandSpeech, LogSpeech};

// Health server
pub use infrastructure::health::{
    HealthServer, HealthServerError, HealthServerState, VoiceSetting,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
