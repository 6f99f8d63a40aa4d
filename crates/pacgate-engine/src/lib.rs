//! pacgate Engine
//!
//! The contract every PAC evaluation engine fulfils, plus `ScriptEngine`,
//! a concrete engine backed by the boa JavaScript interpreter.
//!
//! Engines are stateful and non-reentrant: one loaded document at a time,
//! diagnostics written to a shared text buffer instead of being returned.

mod builtins;
mod diagnostics;
mod engine;
mod error;
mod script;

pub use diagnostics::DiagnosticBuffer;
pub use engine::{EngineContext, PacEngine};
pub use error::EngineError;
pub use script::ScriptEngine;

pub type Result<T> = std::result::Result<T, EngineError>;
