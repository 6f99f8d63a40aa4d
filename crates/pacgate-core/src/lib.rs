//! pacgate Core
//!
//! Safe concurrent access to a stateful, non-reentrant PAC engine.
//! Sessions submit parse and evaluate requests to a dispatcher whose single
//! worker thread is the only code that ever touches the engine. Engine
//! diagnostics come back as structured per-call errors, and ambiguous raw
//! results are resolved into a definite verdict.
//!
//! ```no_run
//! use pacgate_core::Session;
//!
//! let mut session = Session::new(
//!     r#"function FindProxyForURL(url, host) { return "DIRECT"; }"#,
//! );
//! if !session.parse() {
//!     eprintln!("parse failed: {:?}", session.last_error());
//! }
//! let (matched, directive) = session.evaluate("http://www.example.com/");
//! ```

mod address;
mod config;
mod dispatcher;
mod error;
mod normalizer;
mod request;
mod session;
mod translator;

#[cfg(test)]
mod testing;

pub use address::{canonical_address, default_client_address, resolve_default_address};
pub use config::{DispatcherConfig, DEFAULT_QUEUE_CAPACITY};
pub use dispatcher::Dispatcher;
pub use error::PacError;
pub use normalizer::{normalize, Verdict};
pub use session::{Session, TEST_URL};
pub use translator::translate as translate_diagnostics;

pub use pacgate_engine::{DiagnosticBuffer, EngineContext, EngineError, PacEngine, ScriptEngine};

pub type Result<T> = std::result::Result<T, PacError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
