//! Application Layer - Use cases and port definitions.
//!
//! This layer wires the domain state machines to the outside world through
//! ports: where ticks come from, how narration is spoken, and where frames
//! are displayed.

/// Port interfaces for external systems (tick feed, speech, display).
pub mod ports;

/// Application services: narration engine, stream supervisor, fan-out.
pub mod services;
