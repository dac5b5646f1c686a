//! Plan-driven "re-prompt until done" loop controller.
//!
//! A host development tool notifies the controller every time an agent session
//! goes idle. The controller decides whether to stop, advance to the next task
//! of a markdown plan, or resend a prompt. The architecture keeps a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (plan parsing, promise detection,
//!   commit message derivation, loop transitions). No I/O.
//! - **[`io`]**: Side-effecting operations (state file, plan file, git, host
//!   commands, config).
//!
//! Orchestration modules ([`start`], [`idle`], [`cancel`], [`status`],
//! [`tasks`]) coordinate core logic with I/O to implement CLI commands.

pub mod cancel;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod idle;
pub mod io;
pub mod logging;
pub mod start;
pub mod status;
pub mod tasks;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
