//! Act phase of a cyclic plan-and-act control loop.
//!
//! Each cycle the act phase picks a plan for the current goals and advances
//! it, either one step at a time or by polling actions that an external
//! actuator completes asynchronously. The crate is split into:
//!
//! - **[`core`]**: Pure, deterministic logic (goals, plans, selection, the
//!   asynchronous step state machine, the bounded action log). No I/O.
//! - **[`io`]**: Side-effecting adapters (config, trace sinks, the shared
//!   instruction slot, publishing, scenario files).
//!
//! Orchestration modules ([`phase`], [`simple`], [`asynch`], [`dispatch`],
//! [`cycle`]) combine core logic with collaborators to implement each
//! act-phase variant and the multi-cycle driver.

pub mod asynch;
pub mod core;
pub mod cycle;
pub mod dispatch;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod phase;
pub mod simple;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
