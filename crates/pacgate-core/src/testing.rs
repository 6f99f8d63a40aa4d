//! In-memory engine for exercising the dispatcher without JavaScript
//!
//! Documents are single keywords selecting a behaviour:
//!
//! - `echo`: returns `PROXY <host>:80`
//! - `address`: returns `PROXY <client address>:80`
//! - `direct-local`: `DIRECT` for `*.local`, `PROXY 1.2.3.4:8080` otherwise
//! - `undefined` / `empty`: no decision
//! - `throw`: evaluation writes diagnostics and returns nothing
//! - `panic`: evaluation panics
//! - `warn-load`: loads, but leaves a diagnostic behind
//! - `fail` / `fail-silent`: load fails, with or without diagnostics

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use pacgate_engine::{DiagnosticBuffer, EngineError, PacEngine};

const COMPONENT: &str = "fake";

/// Shared counters the test thread inspects while the worker owns the engine
#[derive(Default)]
pub(crate) struct EngineProbe {
    active: AtomicUsize,
    overlaps: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
    evaluations: AtomicUsize,
    refuse_acquire: AtomicBool,
}

impl EngineProbe {
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }

    pub fn refuse_acquire(&self, refuse: bool) {
        self.refuse_acquire.store(refuse, Ordering::SeqCst);
    }
}

pub(crate) struct FakeEngine {
    probe: Arc<EngineProbe>,
    document: Option<String>,
    client_address: String,
    diagnostics: DiagnosticBuffer,
}

impl FakeEngine {
    pub fn new(probe: Arc<EngineProbe>) -> Self {
        Self {
            probe,
            document: None,
            client_address: "127.0.0.1".to_string(),
            diagnostics: DiagnosticBuffer::new(),
        }
    }
}

impl PacEngine for FakeEngine {
    fn component(&self) -> &str {
        COMPONENT
    }

    fn acquire(&mut self) -> Result<(), EngineError> {
        if self.probe.refuse_acquire.load(Ordering::SeqCst) {
            return Err(EngineError::Init("refused by test".to_string()));
        }
        if self.probe.active.fetch_add(1, Ordering::SeqCst) != 0 {
            self.probe.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.probe.acquired.fetch_add(1, Ordering::SeqCst);
        self.document = None;
        self.client_address = "127.0.0.1".to_string();
        Ok(())
    }

    fn release(&mut self) {
        self.document = None;
        self.probe.active.fetch_sub(1, Ordering::SeqCst);
        self.probe.released.fetch_add(1, Ordering::SeqCst);
    }

    fn load_document(&mut self, text: &str) -> bool {
        match text.trim() {
            "fail" => {
                self.diagnostics
                    .append_line(COMPONENT, "load_document", "broken document.");
                self.diagnostics
                    .append_line(COMPONENT, "load_document", "Failed to load.");
                false
            }
            "fail-silent" => false,
            other => {
                if other == "warn-load" {
                    self.diagnostics
                        .append_line(COMPONENT, "load_document", "deprecated syntax.");
                }
                self.document = Some(other.to_string());
                true
            }
        }
    }

    fn set_client_address(&mut self, address: &str) {
        self.client_address = address.to_string();
    }

    fn evaluate(&mut self, _url: &str, host: &str) -> String {
        self.probe.evaluations.fetch_add(1, Ordering::SeqCst);

        match self.document.as_deref() {
            Some("echo") | Some("warn-load") => format!("PROXY {host}:80"),
            Some("address") => format!("PROXY {}:80", self.client_address),
            Some("direct-local") if host.ends_with(".local") => "DIRECT".to_string(),
            Some("direct-local") => "PROXY 1.2.3.4:8080".to_string(),
            Some("undefined") => "undefined".to_string(),
            Some("throw") => {
                self.diagnostics.append_line(
                    COMPONENT,
                    "find_proxy",
                    "ReferenceError: nope is not defined",
                );
                self.diagnostics.append_line(
                    COMPONENT,
                    "find_proxy",
                    "Problem in executing FindProxyForURL.",
                );
                String::new()
            }
            Some("panic") => panic!("fake engine blew up"),
            Some(_) => String::new(),
            None => {
                self.diagnostics
                    .append_line(COMPONENT, "find_proxy", "No PAC document loaded.");
                String::new()
            }
        }
    }

    fn read_diagnostics(&self) -> String {
        self.diagnostics.contents().to_string()
    }

    fn clear_diagnostics(&mut self) {
        self.diagnostics.clear();
    }
}
