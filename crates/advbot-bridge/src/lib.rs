//! Line bridge to an interactive child process
//!
//! This crate provides:
//! - `ProcessBridge`, which owns the child and exposes non-blocking reads
//!   and fire-and-forget writes
//! - Background reader and writer workers over the child's pipes

pub mod bridge;
pub mod worker;

pub use bridge::{BridgeState, ProcessBridge, ReadOutcome};
pub use worker::{OutputEvent, reader_task, writer_task};
