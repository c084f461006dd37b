//! Bounded-concurrency job execution
//!
//! Clone and scan jobs are subprocess-bound, so the run is throttled by a
//! single admission gate rather than a thread pool:
//!
//! ```text
//! ┌──────────────┐  submit   ┌──────────────┐  acquire  ┌────────────────────┐
//! │  Dispatcher  │──────────▶│  PhaseGroup  │──────────▶│ ConcurrencyLimiter │
//! │ (clone/scan) │◀──────────│  (JoinSet)   │◀──────────│    (N slots)       │
//! └──────────────┘   join    └──────────────┘  release  └────────────────────┘
//! ```
//!
//! A dispatcher submits every job of its phase up front and then joins the
//! group. The join is the phase barrier: the next phase's group is only
//! created once it returns.

pub mod core;
pub mod limiter;

pub use self::core::{JobError, JobKind, PhaseGroup};
pub use limiter::{ConcurrencyLimiter, Slot};
