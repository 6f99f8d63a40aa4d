//! Request dispatcher
//!
//! The single serialization point in front of the engine. One worker
//! thread owns the engine and serves parse and evaluate requests one at a
//! time from two bounded queues; callers wait on a per-request reply
//! channel. No two engine operations ever overlap.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use once_cell::sync::Lazy;
use pacgate_engine::{EngineContext, PacEngine, ScriptEngine};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::address;
use crate::config::DispatcherConfig;
use crate::error::PacError;
use crate::normalizer;
use crate::request::{EvaluateRequest, ParseRequest, Request, Response};
use crate::translator;

const SILENT_LOAD_FAILURE: &str = "PAC document failed to load";

static GLOBAL_DISPATCHER: Lazy<Dispatcher> = Lazy::new(|| {
    // Resolve before any session asks for it
    address::default_client_address();

    match Dispatcher::spawn(DispatcherConfig::default(), ScriptEngine::new) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start PAC dispatcher");
            Dispatcher::disconnected()
        }
    }
});

/// Handle to a dispatcher worker. Cheap to clone; the worker stops once
/// every handle is gone and the queues are drained.
#[derive(Clone)]
pub struct Dispatcher {
    parse_tx: mpsc::Sender<ParseRequest>,
    evaluate_tx: mpsc::Sender<EvaluateRequest>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Dispatcher {
    /// Process-wide dispatcher driving a `ScriptEngine`, started on first use
    pub fn global() -> &'static Dispatcher {
        &GLOBAL_DISPATCHER
    }

    /// Start a worker thread. The engine is built on that thread by `factory`.
    pub fn spawn<E, F>(config: DispatcherConfig, factory: F) -> std::io::Result<Self>
    where
        E: PacEngine + 'static,
        F: FnOnce() -> E + Send + 'static,
    {
        let capacity = config.effective_capacity();
        let (parse_tx, parse_rx) = mpsc::channel(capacity);
        let (evaluate_tx, evaluate_rx) = mpsc::channel(capacity);

        let runtime = tokio::runtime::Builder::new_current_thread().build()?;

        let handle = std::thread::Builder::new()
            .name(config.worker_name.clone())
            .spawn(move || {
                let worker = Worker {
                    engine: factory(),
                    parse_rx,
                    evaluate_rx,
                };
                runtime.block_on(worker.run());
            })?;

        tracing::info!(
            worker = %config.worker_name,
            queue_capacity = capacity,
            "Started PAC dispatcher"
        );

        Ok(Self {
            parse_tx,
            evaluate_tx,
            worker: Arc::new(Mutex::new(Some(handle))),
        })
    }

    /// A dispatcher with no worker behind it; every request is `Unavailable`
    fn disconnected() -> Self {
        let (parse_tx, _) = mpsc::channel(1);
        let (evaluate_tx, _) = mpsc::channel(1);

        Self {
            parse_tx,
            evaluate_tx,
            worker: Arc::new(Mutex::new(None)),
        }
    }

    /// Drop this handle. When it is the last one, wait for the worker to
    /// finish the queued requests and exit.
    pub fn shutdown(self) {
        let Dispatcher {
            parse_tx,
            evaluate_tx,
            worker,
        } = self;
        drop(parse_tx);
        drop(evaluate_tx);

        let Some(worker) = Arc::into_inner(worker) else {
            return;
        };

        if let Some(handle) = worker.into_inner() {
            if handle.join().is_err() {
                tracing::error!("PAC dispatcher worker panicked");
            }
        }
    }

    pub(crate) fn parse_blocking(&self, document: Arc<str>) -> Response {
        let (reply, response) = oneshot::channel();
        let request = ParseRequest {
            id: Uuid::new_v4(),
            document,
            reply,
        };

        if self.parse_tx.blocking_send(request).is_err() {
            return Response::failure(PacError::Unavailable);
        }
        response
            .blocking_recv()
            .unwrap_or_else(|_| Response::failure(PacError::Unavailable))
    }

    pub(crate) async fn parse(&self, document: Arc<str>) -> Response {
        let (reply, response) = oneshot::channel();
        let request = ParseRequest {
            id: Uuid::new_v4(),
            document,
            reply,
        };

        if self.parse_tx.send(request).await.is_err() {
            return Response::failure(PacError::Unavailable);
        }
        response
            .await
            .unwrap_or_else(|_| Response::failure(PacError::Unavailable))
    }

    pub(crate) fn evaluate_blocking(&self, target: EvaluationTarget) -> Response {
        let (reply, response) = oneshot::channel();

        if self
            .evaluate_tx
            .blocking_send(target.into_request(reply))
            .is_err()
        {
            return Response::failure(PacError::Unavailable);
        }
        response
            .blocking_recv()
            .unwrap_or_else(|_| Response::failure(PacError::Unavailable))
    }

    pub(crate) async fn evaluate(&self, target: EvaluationTarget) -> Response {
        let (reply, response) = oneshot::channel();

        if self
            .evaluate_tx
            .send(target.into_request(reply))
            .await
            .is_err()
        {
            return Response::failure(PacError::Unavailable);
        }
        response
            .await
            .unwrap_or_else(|_| Response::failure(PacError::Unavailable))
    }
}

/// Everything an evaluate request needs, minus its reply channel
pub(crate) struct EvaluationTarget {
    pub document: Arc<str>,
    pub client_address: String,
    pub url: String,
    pub host: String,
}

impl EvaluationTarget {
    fn into_request(self, reply: oneshot::Sender<Response>) -> EvaluateRequest {
        EvaluateRequest {
            id: Uuid::new_v4(),
            document: self.document,
            client_address: self.client_address,
            url: self.url,
            host: self.host,
            reply,
        }
    }
}

struct Worker<E> {
    engine: E,
    parse_rx: mpsc::Receiver<ParseRequest>,
    evaluate_rx: mpsc::Receiver<EvaluateRequest>,
}

impl<E: PacEngine> Worker<E> {
    async fn run(mut self) {
        loop {
            // Unbiased select: both queues get served, in no particular order
            let request = tokio::select! {
                Some(req) = self.parse_rx.recv() => Request::Parse(req),
                Some(req) = self.evaluate_rx.recv() => Request::Evaluate(req),
                else => break,
            };
            self.serve(request);
        }

        tracing::info!("PAC dispatcher stopped");
    }

    fn serve(&mut self, request: Request) {
        let id = request.id();
        let kind = request.kind();
        let engine = &mut self.engine;

        let (response, reply) = match request {
            Request::Parse(req) => {
                let response = guarded(engine, PacError::ParseFailure, |engine| {
                    parse(engine, &req.document)
                });
                (response, req.reply)
            }
            Request::Evaluate(req) => {
                let response = guarded(engine, PacError::EvaluationFailure, |engine| {
                    evaluate(engine, &req)
                });
                (response, req.reply)
            }
        };

        tracing::debug!(
            request_id = %id,
            kind,
            matched = response.matched,
            error = ?response.error,
            "Served PAC request"
        );

        if reply.send(response).is_err() {
            tracing::debug!(request_id = %id, "Caller went away before the response");
        }
    }
}

/// Run one request, turning an engine panic into a failure of the given kind
fn guarded<E, F>(engine: &mut E, failure: fn(String) -> PacError, op: F) -> Response
where
    E: PacEngine,
    F: FnOnce(&mut E) -> Response,
{
    match panic::catch_unwind(AssertUnwindSafe(|| op(&mut *engine))) {
        Ok(response) => response,
        Err(_) => {
            tracing::error!("PAC engine panicked while serving a request");
            engine.clear_diagnostics();
            Response::failure(failure("PAC engine panicked".to_string()))
        }
    }
}

/// Load outcome as an error, if any. Diagnostics from a successful load
/// are only logged.
fn load_error(loaded: bool, diagnostic: Option<String>) -> Option<PacError> {
    match (loaded, diagnostic) {
        (true, None) => None,
        (true, Some(message)) => {
            tracing::warn!(message = %message, "PAC document loaded with diagnostics");
            None
        }
        (false, Some(message)) => Some(PacError::ParseFailure(message)),
        (false, None) => Some(PacError::ParseFailure(SILENT_LOAD_FAILURE.to_string())),
    }
}

fn parse<E: PacEngine>(engine: &mut E, document: &str) -> Response {
    let mut ctx = match EngineContext::acquire(engine) {
        Ok(ctx) => ctx,
        Err(e) => return Response::failure(PacError::ParseFailure(e.to_string())),
    };

    let loaded = ctx.load_document(document);
    let diagnostic = translator::drain(&mut *ctx);

    match load_error(loaded, diagnostic) {
        Some(error) => Response::failure(error),
        None => Response::success(String::new()),
    }
}

fn evaluate<E: PacEngine>(engine: &mut E, req: &EvaluateRequest) -> Response {
    let mut ctx = match EngineContext::acquire(engine) {
        Ok(ctx) => ctx,
        Err(e) => return Response::failure(PacError::EvaluationFailure(e.to_string())),
    };

    // The context starts empty, so the document is loaded on every call
    let loaded = ctx.load_document(&req.document);
    let diagnostic = translator::drain(&mut *ctx);
    if let Some(error) = load_error(loaded, diagnostic) {
        return Response::failure(error);
    }

    ctx.set_client_address(&req.client_address);
    let raw = ctx.evaluate(&req.url, &req.host);
    let diagnostic = translator::drain(&mut *ctx);

    normalizer::evaluation_response(&raw, diagnostic)
}
