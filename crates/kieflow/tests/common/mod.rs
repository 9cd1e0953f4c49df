//! Shared helpers for kieflow integration tests.
//!
//! - `fakes`: in-process OCR and extraction services
//! - `harness`: a workspace over a temporary local store

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::TestHarness;
