//! boa-backed PAC engine
//!
//! Every acquisition builds a brand new JavaScript context with the PAC
//! helper functions registered; release throws it away. Problems are
//! reported as two diagnostic lines: the specific failure, then a summary.

use boa_engine::{js_string, Context, JsNativeError, JsResult, JsString, JsValue, Source};

use crate::builtins::{self, CLIENT_ADDRESS_GLOBAL};
use crate::diagnostics::DiagnosticBuffer;
use crate::engine::PacEngine;
use crate::error::EngineError;
use crate::Result;

const COMPONENT: &str = "pacscript";
const ENTRY_POINT: &str = "FindProxyForURL";

#[derive(Default)]
pub struct ScriptEngine {
    context: Option<Context>,
    loaded: bool,
    diagnostics: DiagnosticBuffer,
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn report(&mut self, origin: &str, detail: &str, summary: &str) {
        self.diagnostics.append_line(COMPONENT, origin, detail);
        self.diagnostics.append_line(COMPONENT, origin, summary);
    }
}

impl PacEngine for ScriptEngine {
    fn component(&self) -> &str {
        COMPONENT
    }

    fn acquire(&mut self) -> Result<()> {
        if self.context.is_some() {
            return Err(EngineError::AlreadyAcquired);
        }

        let mut context = Context::default();
        builtins::register(&mut context).map_err(|e| EngineError::Init(e.to_string()))?;

        self.context = Some(context);
        self.loaded = false;
        Ok(())
    }

    fn release(&mut self) {
        self.context = None;
        self.loaded = false;
    }

    fn load_document(&mut self, text: &str) -> bool {
        self.loaded = false;

        let outcome = match self.context.as_mut() {
            Some(context) => run_document(context, text).map_err(|e| e.to_string()),
            None => Err("No engine context acquired.".to_string()),
        };

        match outcome {
            Ok(()) => {
                self.loaded = true;
                tracing::debug!(component = COMPONENT, bytes = text.len(), "Loaded PAC document");
                true
            }
            Err(detail) => {
                self.report(
                    "load_document",
                    &detail,
                    "Failed to evaluate the PAC document.",
                );
                false
            }
        }
    }

    fn set_client_address(&mut self, address: &str) {
        let outcome = match self.context.as_mut() {
            Some(context) => {
                let global = context.global_object();
                global
                    .set(
                        js_string!(CLIENT_ADDRESS_GLOBAL),
                        JsString::from(address),
                        false,
                        context,
                    )
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
            None => Err("No engine context acquired.".to_string()),
        };

        if let Err(detail) = outcome {
            self.report(
                "set_client_address",
                &detail,
                "Failed to set the client address.",
            );
        }
    }

    fn evaluate(&mut self, url: &str, host: &str) -> String {
        let outcome = match self.context.as_mut() {
            Some(context) if self.loaded => {
                call_entry_point(context, url, host).map_err(|e| e.to_string())
            }
            _ => Err("No PAC document loaded.".to_string()),
        };

        outcome.unwrap_or_else(|detail| {
            self.report(
                "find_proxy",
                &detail,
                "Problem in executing FindProxyForURL.",
            );
            String::new()
        })
    }

    fn read_diagnostics(&self) -> String {
        self.diagnostics.contents().to_string()
    }

    fn clear_diagnostics(&mut self) {
        self.diagnostics.clear();
    }
}

fn run_document(context: &mut Context, text: &str) -> JsResult<()> {
    context.eval(Source::from_bytes(text.as_bytes()))?;

    let global = context.global_object();
    let entry = global.get(js_string!(ENTRY_POINT), context)?;
    if entry.as_callable().is_none() {
        return Err(JsNativeError::typ()
            .with_message("FindProxyForURL is not defined as a function")
            .into());
    }

    Ok(())
}

fn call_entry_point(context: &mut Context, url: &str, host: &str) -> JsResult<String> {
    let global = context.global_object();
    let entry = global.get(js_string!(ENTRY_POINT), context)?;
    let function = entry.as_callable().ok_or_else(|| {
        JsNativeError::typ().with_message("FindProxyForURL is not a function")
    })?;

    let args = [
        JsValue::from(JsString::from(url)),
        JsValue::from(JsString::from(host)),
    ];
    let result = function.call(&JsValue::undefined(), &args, context)?;

    Ok(result.to_string(context)?.to_std_string_escaped())
}
