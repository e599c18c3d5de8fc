//! Window planning.
//!
//! This module decides which image regions are fed to the model. A large
//! image is decomposed into overlapping, fixed-size windows laid out on a
//! stride grid:
//!
//! ```text
//!   x: 0       s       2s   W-p    W
//!      ┌───────┬───────┬────┬──────┐
//!      │   A   │░░░░░░░│    │      │   A = (0, 0, p, p)
//!      │       │░  B  ░│    │      │   B = (s, 0, s+p, p)
//!      ├───────┼───────┼────┼──────┤   ░ = overlap, averaged on merge
//!      │  ...  │       │    │ last │
//!      └───────┴───────┴────┴──────┘   last window is flush with the edge
//! ```
//!
//! # Components
//!
//! - [`Window`]: half-open pixel rectangle `(x1, y1, x2, y2)`
//! - [`WindowSet`]: the ordered windows for one image/patch/stride configuration
//! - [`sliding_window`]: the planner
//! - [`PlanStats`]: overlap statistics for a plan

mod geometry;
mod planner;

pub use geometry::{PlanStats, Window, WindowSet};
pub use planner::sliding_window;
