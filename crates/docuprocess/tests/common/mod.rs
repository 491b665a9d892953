//! Shared utilities for docuprocess integration tests.
//!
//! - `SessionHarness` wires an upload manager to recording collaborators
//! - `RecordingStore` / `ScriptedClassifier` stand in for the external services

pub mod harness;

pub use harness::*;
