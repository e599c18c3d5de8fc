//! Tiled inference engine.
//!
//! The engine plans windows over an image, runs the model on each window in
//! turn and merges the per-window scores into a full-resolution result.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          PatchPlan::run                          │
//! │                                                                  │
//! │   for each window (sequential):                                  │
//! │     crop (h, w, c) ─► transform ─► pad to divisor ─► predict     │
//! │                                                      │           │
//! │                          release cache (drop guard) ◄┤           │
//! │                                                      ▼           │
//! │                 crop scores to window ─► Accumulator::add        │
//! │                                                                  │
//! │   Accumulator::finalize ─► (num_classes, H, W)                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`PatchPlan`]: single-use plan; `run` consumes it
//! - [`SlidingWindowInference`]: long-lived engine that holds one pending plan
//!   at a time and tracks its [`EngineState`]

mod inference;
mod plan;

pub use inference::{EngineState, SlidingWindowInference};
pub use plan::{PatchPlan, DEFAULT_PAD_VALUE};
