//! Cross-thread plumbing around the box graph.
//!
//! The graph itself is single-threaded. This crate carries what leaves it:
//! fixed-size telemetry frames flowing from a realtime producer to the UI, and
//! settings objects whose changes are broadcast to observers and replicas.
//!
//! # Modules
//!
//! - [`telemetry`]: single-producer/single-consumer double buffer that drops
//!   frames instead of blocking the writer
//! - [`settings`]: observable settings with per-key listeners and patches
//! - [`error`]: [`SyncError`]

pub mod error;
pub mod settings;
pub mod telemetry;

// Re-export key types for ergonomic use.
pub use error::SyncError;
pub use settings::{ListenerId, ObservableSettings, SettingsPatch};
pub use telemetry::{telemetry_channel, TelemetryReader, TelemetryStats, TelemetryWriter};
