//! Document transformation capabilities.
//!
//! This crate provides:
//! - The `Capability` trait every tool implements
//! - `ToolRegistry`, the exact-match dispatch table built per worker kind
//! - An external command runner with optional timeout
//! - The tools themselves, grouped by worker kind

pub mod capability;
pub mod command;
pub mod error;
pub mod kind;
pub mod registry;
pub mod tools;

pub use capability::{collect_outputs, ensure_output, Arity, Capability, FromOptions, ToolContext};
pub use command::{check_program, CommandOutput, CommandRunner, ToolCommand};
pub use error::{ToolError, ToolResult};
pub use kind::{ParseKindError, WorkerKind};
pub use registry::ToolRegistry;
