//! Result normalizer
//!
//! The engine returns `""`, `"undefined"` or a proxy directive from the same
//! call. This is the only place that interprets those raw strings.

use crate::error::PacError;
use crate::request::Response;

const UNDEFINED: &str = "undefined";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// A proxy directive such as `DIRECT` or `PROXY host:port; DIRECT`
    Directive(String),
    /// The document reached no routing decision
    NoDecision,
}

pub fn normalize(raw: &str) -> Verdict {
    if raw.is_empty() || raw == UNDEFINED {
        Verdict::NoDecision
    } else {
        Verdict::Directive(raw.to_string())
    }
}

/// Combine a raw evaluation result with the diagnostic emitted while
/// producing it. An engine diagnostic always wins over the local verdict.
pub(crate) fn evaluation_response(raw: &str, diagnostic: Option<String>) -> Response {
    if let Some(message) = diagnostic {
        return Response::failure(PacError::EvaluationFailure(message));
    }

    match normalize(raw) {
        Verdict::Directive(directive) => Response::success(directive),
        Verdict::NoDecision => Response::failure(PacError::InvalidProxyResult),
    }
}
