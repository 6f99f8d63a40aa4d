//! PAC session
//!
//! A caller-owned handle binding one PAC document and one client address.
//! Every `parse`/`evaluate` overwrites `last_error`, so inspect it right
//! after the call you care about.

use std::sync::Arc;

use url::{Host, Url};

use crate::address::{canonical_address, default_client_address};
use crate::dispatcher::{Dispatcher, EvaluationTarget};
use crate::error::PacError;
use crate::request::Response;
use crate::Result;

/// URL used by `is_valid` to smoke-test a document
pub const TEST_URL: &str = "http://www.google.com/";

pub struct Session {
    document: Arc<str>,
    client_address: String,
    last_error: Option<PacError>,
    dispatcher: Dispatcher,
}

impl Session {
    /// Session served by the process-wide dispatcher
    pub fn new(document: impl Into<String>) -> Self {
        Self::with_dispatcher(document, Dispatcher::global().clone())
    }

    pub fn with_dispatcher(document: impl Into<String>, dispatcher: Dispatcher) -> Self {
        let document: String = document.into();
        Self {
            document: Arc::from(document),
            client_address: default_client_address().to_string(),
            last_error: None,
            dispatcher,
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn client_address(&self) -> &str {
        &self.client_address
    }

    /// Override the address `myIpAddress()` reports. An invalid literal is
    /// rejected and leaves both the address and `last_error` untouched.
    pub fn set_client_address(&mut self, address: &str) -> Result<()> {
        self.client_address = canonical_address(address)?;
        Ok(())
    }

    /// Restore the default client address and clear the last error
    pub fn reset(&mut self) {
        self.client_address = default_client_address().to_string();
        self.last_error = None;
    }

    pub fn last_error(&self) -> Option<&PacError> {
        self.last_error.as_ref()
    }

    /// Load the document into the engine. Returns whether it loaded.
    ///
    /// Blocks until the dispatcher answers; must not be called from inside
    /// an async runtime (use [`Session::parse_async`] there).
    pub fn parse(&mut self) -> bool {
        let response = self.dispatcher.parse_blocking(Arc::clone(&self.document));
        self.record(response).0
    }

    pub async fn parse_async(&mut self) -> bool {
        let response = self.dispatcher.parse(Arc::clone(&self.document)).await;
        self.record(response).0
    }

    /// Find the proxy directive for `url`. Returns `(matched, directive)`;
    /// the directive is empty unless matched.
    ///
    /// Blocks like [`Session::parse`].
    pub fn evaluate(&mut self, url: &str) -> (bool, String) {
        match self.target_for_url(url) {
            Ok(target) => {
                let response = self.dispatcher.evaluate_blocking(target);
                self.record(response)
            }
            Err(e) => self.record(Response::failure(e)),
        }
    }

    pub async fn evaluate_async(&mut self, url: &str) -> (bool, String) {
        match self.target_for_url(url) {
            Ok(target) => {
                let response = self.dispatcher.evaluate(target).await;
                self.record(response)
            }
            Err(e) => self.record(Response::failure(e)),
        }
    }

    /// Like `evaluate`, with the host supplied by the caller instead of
    /// taken from the URL
    pub fn evaluate_with_host(&mut self, url: &str, host: &str) -> (bool, String) {
        let target = self.target(url.to_string(), host.to_string());
        let response = self.dispatcher.evaluate_blocking(target);
        self.record(response)
    }

    /// Smoke test: the document parses and yields a directive for `TEST_URL`
    pub fn is_valid(&mut self) -> bool {
        if !self.parse() {
            return false;
        }
        self.evaluate(TEST_URL).0
    }

    pub async fn is_valid_async(&mut self) -> bool {
        if !self.parse_async().await {
            return false;
        }
        self.evaluate_async(TEST_URL).await.0
    }

    fn target_for_url(&self, url: &str) -> Result<EvaluationTarget> {
        let host = host_of(url)?;
        Ok(self.target(url.to_string(), host))
    }

    fn target(&self, url: String, host: String) -> EvaluationTarget {
        EvaluationTarget {
            document: Arc::clone(&self.document),
            client_address: self.client_address.clone(),
            url,
            host,
        }
    }

    fn record(&mut self, response: Response) -> (bool, String) {
        self.last_error = response.error;
        (response.matched, response.proxy_directive)
    }
}

/// Host part of `url`, without port or IPv6 brackets
fn host_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| PacError::InvalidUrl(format!("{url}: {e}")))?;

    match parsed.host() {
        Some(Host::Domain(domain)) => Ok(domain.to_string()),
        Some(Host::Ipv4(ip)) => Ok(ip.to_string()),
        Some(Host::Ipv6(ip)) => Ok(ip.to_string()),
        None => Err(PacError::InvalidUrl(format!("{url}: no host"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatcherConfig;
    use crate::testing::{EngineProbe, FakeEngine};

    fn dispatcher() -> (Dispatcher, Arc<EngineProbe>) {
        let probe = Arc::new(EngineProbe::default());
        let engine_probe = Arc::clone(&probe);
        let dispatcher = Dispatcher::spawn(DispatcherConfig::default(), move || {
            FakeEngine::new(engine_probe)
        })
        .unwrap();
        (dispatcher, probe)
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("http://test.local/").unwrap(), "test.local");
        assert_eq!(host_of("https://example.com:8443/x?y=1").unwrap(), "example.com");
        assert_eq!(host_of("http://10.1.2.3:8080/").unwrap(), "10.1.2.3");
        assert_eq!(host_of("http://[::1]:8080/").unwrap(), "::1");
        assert!(matches!(host_of("not a url"), Err(PacError::InvalidUrl(_))));
        assert!(matches!(host_of("mailto:someone"), Err(PacError::InvalidUrl(_))));
    }

    #[test]
    fn test_new_session_defaults() {
        let (dispatcher, _probe) = dispatcher();
        let session = Session::with_dispatcher("echo", dispatcher);

        assert_eq!(session.document(), "echo");
        assert_eq!(session.client_address(), default_client_address());
        assert_eq!(session.last_error(), None);
    }

    #[test]
    fn test_evaluate_direct_local() {
        let (dispatcher, _probe) = dispatcher();
        let mut session = Session::with_dispatcher("direct-local", dispatcher);

        assert!(session.parse());
        assert_eq!(session.last_error(), None);

        assert_eq!(
            session.evaluate("http://test.local/"),
            (true, "DIRECT".to_string())
        );
        assert_eq!(session.last_error(), None);

        assert_eq!(
            session.evaluate("http://example.com/"),
            (true, "PROXY 1.2.3.4:8080".to_string())
        );
        assert_eq!(session.last_error(), None);
    }

    #[test]
    fn test_failed_document() {
        let (dispatcher, _probe) = dispatcher();
        let mut session = Session::with_dispatcher("fail", dispatcher);

        assert!(!session.parse());
        assert!(session.last_error().is_some());

        assert_eq!(session.evaluate("http://www.google.com/"), (false, String::new()));
        assert!(matches!(session.last_error(), Some(PacError::ParseFailure(_))));
        assert!(!session.is_valid());
    }

    #[test]
    fn test_no_decision() {
        let (dispatcher, _probe) = dispatcher();
        let mut session = Session::with_dispatcher("undefined", dispatcher);

        assert!(session.parse());
        assert_eq!(session.evaluate("http://a.example/"), (false, String::new()));
        assert_eq!(session.last_error(), Some(&PacError::InvalidProxyResult));
        assert!(!session.is_valid());
    }

    #[test]
    fn test_success_clears_previous_error() {
        let (dispatcher, _probe) = dispatcher();
        let mut session = Session::with_dispatcher("echo", dispatcher);

        session.evaluate("::bad::");
        assert!(matches!(session.last_error(), Some(PacError::InvalidUrl(_))));

        assert!(session.evaluate("http://a.example/").0);
        assert_eq!(session.last_error(), None);
    }

    #[test]
    fn test_invalid_url_skips_engine() {
        let (dispatcher, probe) = dispatcher();
        let mut session = Session::with_dispatcher("echo", dispatcher);

        assert_eq!(session.evaluate("no scheme here"), (false, String::new()));
        assert!(matches!(session.last_error(), Some(PacError::InvalidUrl(_))));
        assert_eq!(probe.acquired(), 0);
    }

    #[test]
    fn test_client_address() {
        let (dispatcher, _probe) = dispatcher();
        let mut session = Session::with_dispatcher("address", dispatcher);

        session.set_client_address("10.10.5.6").unwrap();
        assert_eq!(session.client_address(), "10.10.5.6");
        assert_eq!(
            session.evaluate("http://a.example/"),
            (true, "PROXY 10.10.5.6:80".to_string())
        );

        session.set_client_address("0:0:0:0:0:0:0:1").unwrap();
        assert_eq!(session.client_address(), "::1");
    }

    #[test]
    fn test_invalid_client_address_keeps_state() {
        let (dispatcher, _probe) = dispatcher();
        let mut session = Session::with_dispatcher("throw", dispatcher);

        session.set_client_address("10.10.5.6").unwrap();
        session.evaluate("http://a.example/");
        let previous_error = session.last_error().cloned();
        assert!(previous_error.is_some());

        assert_eq!(
            session.set_client_address("10.10.5"),
            Err(PacError::InvalidAddress("10.10.5".to_string()))
        );
        assert_eq!(session.client_address(), "10.10.5.6");
        assert_eq!(session.last_error().cloned(), previous_error);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (dispatcher, _probe) = dispatcher();
        let mut session = Session::with_dispatcher("fail", dispatcher);

        session.set_client_address("10.10.5.6").unwrap();
        session.parse();
        assert!(session.last_error().is_some());

        for _ in 0..2 {
            session.reset();
            assert_eq!(session.client_address(), default_client_address());
            assert_eq!(session.last_error(), None);
        }
    }

    #[test]
    fn test_evaluate_with_host() {
        let (dispatcher, _probe) = dispatcher();
        let mut session = Session::with_dispatcher("echo", dispatcher);

        assert_eq!(
            session.evaluate_with_host("http://ignored/", "given.example"),
            (true, "PROXY given.example:80".to_string())
        );
    }

    #[test]
    fn test_is_valid() {
        let (dispatcher, _probe) = dispatcher();
        let mut session = Session::with_dispatcher("echo", dispatcher);
        assert!(session.is_valid());
        assert_eq!(session.last_error(), None);
    }

    #[test]
    fn test_concurrent_sessions_no_cross_talk() {
        let (dispatcher, probe) = dispatcher();

        std::thread::scope(|scope| {
            for caller in 0..16 {
                let dispatcher = dispatcher.clone();
                scope.spawn(move || {
                    let document = if caller % 2 == 0 { "echo" } else { "address" };
                    let mut session = Session::with_dispatcher(document, dispatcher);
                    let address = format!("10.0.{caller}.1");
                    session.set_client_address(&address).unwrap();

                    for call in 0..20 {
                        let host = format!("s{caller}-{call}.example");
                        let (matched, directive) = session.evaluate(&format!("http://{host}/"));
                        assert!(matched);
                        assert_eq!(session.last_error(), None);

                        let expected = if document == "echo" { &host } else { &address };
                        assert_eq!(directive, format!("PROXY {expected}:80"));
                    }
                });
            }
        });

        assert_eq!(probe.overlaps(), 0);
        assert_eq!(probe.evaluations(), 16 * 20);
    }

    #[tokio::test]
    async fn test_async_session() {
        let (dispatcher, _probe) = dispatcher();
        let mut session = Session::with_dispatcher("direct-local", dispatcher);

        assert!(session.parse_async().await);
        assert_eq!(
            session.evaluate_async("http://printer.local/").await,
            (true, "DIRECT".to_string())
        );

        assert_eq!(session.evaluate_async("bogus").await, (false, String::new()));
        assert!(matches!(session.last_error(), Some(PacError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_is_valid_async() {
        let (dispatcher, _probe) = dispatcher();
        let mut session = Session::with_dispatcher("echo", dispatcher.clone());
        assert!(session.is_valid_async().await);
        assert_eq!(session.last_error(), None);

        let mut broken = Session::with_dispatcher("fail", dispatcher);
        assert!(!broken.is_valid_async().await);
        assert!(matches!(broken.last_error(), Some(PacError::ParseFailure(_))));
    }

    const SCRIPT: &str = r#"
        function FindProxyForURL(url, host) {
            if (dnsDomainIs(host, ".local")) {
                return "DIRECT";
            }
            if (isInNet(myIpAddress(), "10.10.0.0", "255.255.0.0")) {
                return "PROXY office.example:3128";
            }
            return "PROXY 1.2.3.4:8080";
        }
    "#;

    #[test]
    fn test_script_engine_end_to_end() {
        let mut session = Session::new(SCRIPT);
        session.set_client_address("192.0.2.10").unwrap();

        assert!(session.is_valid());
        assert_eq!(
            session.evaluate("http://test.local/"),
            (true, "DIRECT".to_string())
        );
        assert_eq!(
            session.evaluate("http://example.com/"),
            (true, "PROXY 1.2.3.4:8080".to_string())
        );

        session.set_client_address("10.10.5.6").unwrap();
        assert_eq!(
            session.evaluate("http://example.com/"),
            (true, "PROXY office.example:3128".to_string())
        );
        assert_eq!(session.last_error(), None);
    }

    #[test]
    fn test_script_engine_bad_documents() {
        let mut session = Session::new("function FindProxyForURL(url, host) {");
        assert!(!session.parse());
        assert!(matches!(session.last_error(), Some(PacError::ParseFailure(_))));
        assert_eq!(session.evaluate(TEST_URL), (false, String::new()));
        assert!(session.last_error().is_some());

        let mut session = Session::new("function FindProxyForURL(url, host) { return undefinedThing; }");
        assert!(session.parse());
        assert_eq!(session.evaluate(TEST_URL), (false, String::new()));
        assert!(matches!(
            session.last_error(),
            Some(PacError::EvaluationFailure(message)) if message.contains("undefinedThing")
        ));

        let mut session = Session::new("function FindProxyForURL(url, host) {}");
        assert_eq!(session.evaluate(TEST_URL), (false, String::new()));
        assert_eq!(session.last_error(), Some(&PacError::InvalidProxyResult));
    }

    #[test]
    fn test_script_sessions_share_one_engine() {
        std::thread::scope(|scope| {
            for caller in 0..6 {
                scope.spawn(move || {
                    let document = format!(
                        "function FindProxyForURL(url, host) {{ return \"PROXY p{caller}:\" + host.length; }}"
                    );
                    let mut session = Session::new(document);
                    for call in 0..5 {
                        let host = format!("h{call}.example");
                        assert_eq!(
                            session.evaluate(&format!("http://{host}/")),
                            (true, format!("PROXY p{caller}:{}", host.len()))
                        );
                    }
                });
            }
        });
    }

    #[test]
    fn test_session_handle_keeps_worker_alive() {
        let dispatcher = Dispatcher::spawn(DispatcherConfig::default(), || {
            FakeEngine::new(Arc::new(EngineProbe::default()))
        })
        .unwrap();
        let mut session = Session::with_dispatcher("echo", dispatcher.clone());
        dispatcher.shutdown();

        // The session's own handle keeps the worker alive
        assert!(session.parse());
    }

    #[test]
    fn test_out_of_range_time_range_is_false() {
        let mut session = Session::new(
            r#"function FindProxyForURL(url, host) {
                if (timeRange(4294967295, 0, 0, 0, 0, 0) || timeRange(-1)) {
                    return "PROXY a:1";
                }
                return "DIRECT";
            }"#,
        );

        assert!(session.parse());
        assert_eq!(
            session.evaluate("http://example.com/"),
            (true, "DIRECT".to_string())
        );
        assert_eq!(session.last_error(), None);
    }
}
