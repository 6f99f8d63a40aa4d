//! Engine contract
//!
//! A `PacEngine` holds at most one loaded PAC document inside a context
//! that is acquired and released around every operation. Nothing survives
//! a release: the next acquisition starts from a clean context.

use std::ops::{Deref, DerefMut};

use crate::Result;

pub trait PacEngine {
    /// Name used as the prefix of every diagnostic line
    fn component(&self) -> &str;

    /// Set up a fresh evaluation context
    fn acquire(&mut self) -> Result<()>;

    /// Tear down the current context, if any
    fn release(&mut self);

    /// Load `text` as the active document. Failure leaves no active document.
    fn load_document(&mut self, text: &str) -> bool;

    /// Value returned by the document's `myIpAddress()` primitive
    fn set_client_address(&mut self, address: &str);

    /// Run `FindProxyForURL(url, host)` and return its raw string result
    fn evaluate(&mut self, url: &str, host: &str) -> String;

    fn read_diagnostics(&self) -> String;

    fn clear_diagnostics(&mut self);
}

/// Scoped engine context. Releases the engine when dropped.
pub struct EngineContext<'a, E: PacEngine + ?Sized> {
    engine: &'a mut E,
}

impl<'a, E: PacEngine + ?Sized> EngineContext<'a, E> {
    pub fn acquire(engine: &'a mut E) -> Result<Self> {
        engine.acquire()?;
        Ok(Self { engine })
    }
}

impl<E: PacEngine + ?Sized> Deref for EngineContext<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.engine
    }
}

impl<E: PacEngine + ?Sized> DerefMut for EngineContext<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.engine
    }
}

impl<E: PacEngine + ?Sized> Drop for EngineContext<'_, E> {
    fn drop(&mut self) {
        self.engine.release();
    }
}
