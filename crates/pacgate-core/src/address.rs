//! Client address handling
//!
//! The process-wide default is computed once: the first non-loopback
//! address the local hostname resolves to, or `127.0.0.1`.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use once_cell::sync::Lazy;

use crate::error::PacError;
use crate::Result;

const FALLBACK_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

static DEFAULT_CLIENT_ADDRESS: Lazy<String> = Lazy::new(|| {
    let address = resolve_default_address();
    tracing::debug!(address = %address, "Resolved default client address");
    address.to_string()
});

/// Process-wide default client address
pub fn default_client_address() -> &'static str {
    &DEFAULT_CLIENT_ADDRESS
}

/// Best-effort lookup of a non-loopback local address. Never fails.
pub fn resolve_default_address() -> IpAddr {
    let Some(name) = hostname::get().ok().and_then(|h| h.into_string().ok()) else {
        return FALLBACK_ADDRESS;
    };

    let candidates = (name.as_str(), 0)
        .to_socket_addrs()
        .map(|addrs| addrs.map(|addr| addr.ip()).collect::<Vec<_>>())
        .unwrap_or_default();

    first_non_loopback(candidates).unwrap_or(FALLBACK_ADDRESS)
}

fn first_non_loopback(candidates: impl IntoIterator<Item = IpAddr>) -> Option<IpAddr> {
    candidates.into_iter().find(|ip| !ip.is_loopback())
}

/// Validate an IP literal and return its canonical text form
pub fn canonical_address(input: &str) -> Result<String> {
    input
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| PacError::InvalidAddress(input.to_string()))
}
