//! Deterministic, pure logic shared by the loop controller.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod commit_message;
pub mod machine;
pub mod plan;
pub mod promise;
pub mod types;
