//! Requests and responses exchanged with the dispatcher worker

use std::sync::Arc;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::PacError;

/// Outcome of one engine operation. `error` is only ever set when
/// `matched` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Response {
    pub matched: bool,
    pub proxy_directive: String,
    pub error: Option<PacError>,
}

impl Response {
    pub fn success(proxy_directive: String) -> Self {
        Self {
            matched: true,
            proxy_directive,
            error: None,
        }
    }

    pub fn failure(error: PacError) -> Self {
        Self {
            matched: false,
            proxy_directive: String::new(),
            error: Some(error),
        }
    }
}

pub(crate) struct ParseRequest {
    pub id: Uuid,
    pub document: Arc<str>,
    pub reply: oneshot::Sender<Response>,
}

pub(crate) struct EvaluateRequest {
    pub id: Uuid,
    pub document: Arc<str>,
    pub client_address: String,
    pub url: String,
    pub host: String,
    pub reply: oneshot::Sender<Response>,
}

pub(crate) enum Request {
    Parse(ParseRequest),
    Evaluate(EvaluateRequest),
}

impl Request {
    pub fn id(&self) -> Uuid {
        match self {
            Request::Parse(req) => req.id,
            Request::Evaluate(req) => req.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Request::Parse(_) => "parse",
            Request::Evaluate(_) => "evaluate",
        }
    }
}
