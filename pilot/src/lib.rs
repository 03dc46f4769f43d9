//! Decision layer for an agent that plays a tile-based console RPG.
//!
//! Each step turns an observation into one button press:
//! classify the scene, fold the observation into memory, advance the goal
//! plan, then decide. The crate is split the same way throughout:
//!
//! - **[`core`]**: Pure logic (scene rules, goal tracking, action queue,
//!   walkability, reply parsing). No I/O, fully testable in isolation.
//! - **[`io`]**: Side effects (config, persisted state, telemetry, oracle
//!   processes, observation sources).
//!
//! Orchestration modules ([`perception`], [`decision`], [`step`], [`looping`])
//! coordinate the two.

pub mod core;
pub mod decision;
pub mod io;
pub mod logging;
pub mod looping;
pub mod perception;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
