//! # quine — a language model as a POSIX process
//!
//! The runtime drives one inference/tool-dispatch cycle per turn: it
//! acquires a cross-process concurrency slot, calls the configured LLM
//! with the tape's messages and the four tool schemas, dispatches the
//! returned tool calls (`sh`, `fork`, `exec`, `exit`) against real OS
//! primitives, and appends every message to an append-only audit tape.
//!
//! The binary in `main.rs` is a thin shell over [`orchestrator::Runtime`];
//! everything else lives here so the turn loop can be driven end to end
//! by tests with a scripted provider.

pub mod cli;
pub mod oplog;
pub mod orchestrator;
pub mod prompt;
pub mod semaphore;
pub mod session;
pub mod signal;
pub mod tools;
