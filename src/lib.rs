// Forbid unsafe code in production, but allow in tests for env var manipulation
#![cfg_attr(not(test), forbid(unsafe_code))]
//! Command Safety Gate (csg) library.
//!
//! A short-lived decision service for AI coding agent hooks: given one
//! candidate shell command, file path, or captured output, it answers allow,
//! ask, or deny — silently for allow, with a human-readable reason otherwise.
//!
//! # Architecture
//!
//! ```text
//! raw command ──► heredoc body strip
//!                      │
//!        ┌─────────────┴─────────────┐
//!        ▼                           ▼
//!  OpaqueSplitter             TransparentSplitter
//!  (substitutions kept        (substitution/backtick
//!   atomic)                    interiors surfaced)
//!        │                           │
//!        └──────► normalize ◄────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//!   PolicyEngine            PathClassifier
//!   (fail-open)             (fail-closed)
//!          └───────────┬───────────┘
//!                      ▼
//!                   Verdict
//! ```
//!
//! The secret scanner is a separate data path: it runs on previously
//! captured output and only ever produces a non-blocking advisory.
//!
//! # Usage
//!
//! ```ignore
//! use command_safety_gate::config::GateConfig;
//! use command_safety_gate::gate::Gate;
//!
//! let gate = Gate::new(GateConfig::load());
//! let verdict = gate.evaluate_command("cat /etc/shadow");
//! if !verdict.is_allow() {
//!     println!("blocked: {}", verdict.reason.unwrap_or_default());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod gate;
pub mod heredoc;
pub mod hook;
pub mod normalize;
pub mod paths;
pub mod policy;
pub mod secrets;
pub mod splitter;
pub mod tracker;
pub mod transparent;
pub mod verdict;

pub use config::GateConfig;
pub use gate::Gate;
pub use verdict::{Decision, Verdict};
