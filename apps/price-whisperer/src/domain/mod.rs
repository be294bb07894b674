//! Domain Layer - Core price tracking and narration types.
//!
//! This layer contains the pure state machines of the price pipeline.
//! Nothing here performs I/O or spawns tasks; time is always passed in
//! by the caller so the logic stays deterministic under test.

/// Departing price animations.
pub mod animation;

/// Narration text, throttling, voice selection and state.
pub mod narration;

/// Price samples and direction-of-change tracking.
pub mod pricing;
