//! Deterministic, pure logic of the decision layer.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod action_queue;
pub mod frame_dialogue;
pub mod goal_rules;
pub mod goals;
pub mod memory;
pub mod navigation;
pub mod observation;
pub mod plan;
pub mod reply;
pub mod scene_rules;
pub mod types;
pub mod walkability;
