//! Testing utilities for code built on larder.
//!
//! [`ScriptedTransport`] stands in for the network: responses are queued per
//! URL fragment and every request is recorded for later inspection. The
//! assertion macros check error kinds and step advisories.
//!
//! # Examples
//!
//! ## Scripted responses
//!
//! ```rust
//! use larder::testing::ScriptedTransport;
//! use larder::transport::{HttpRequest, HttpResponse, Transport};
//!
//! let transport = ScriptedTransport::new()
//!     .push("findByIngredients", HttpResponse::new(200, "[]"));
//!
//! # tokio_test::block_on(async {
//! let response = transport
//!     .send(HttpRequest::get("https://api.example.com/recipes/findByIngredients"))
//!     .await
//!     .unwrap();
//! assert_eq!(response.body, "[]");
//! assert_eq!(transport.request_count("findByIngredients"), 1);
//! # });
//! ```
//!
//! ## Assertion Macros
//!
//! ```rust
//! use larder::{assert_error_kind, Error, ErrorKind};
//!
//! let result: Result<(), Error> = Err(Error::invalid_input("empty"));
//! assert_error_kind!(result, ErrorKind::InvalidInput);
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use futures::future::{self, BoxFuture};
use futures::FutureExt;

use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

type Scripted = Result<HttpResponse, TransportError>;

#[derive(Debug)]
struct Route {
    fragment: String,
    queue: VecDeque<Scripted>,
    repeat: Option<Scripted>,
}

#[derive(Debug, Default)]
struct Script {
    routes: Vec<Route>,
    requests: Vec<HttpRequest>,
}

/// [`Transport`] that replays scripted responses.
///
/// A request is answered by the first route whose fragment occurs in its URL
/// and that still has a response left. Queued responses are used once, in
/// order; a route set with [`always`](Self::always) answers every request
/// once its queue is empty. Requests no route answers fail with a
/// [`TransportError`].
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    /// Create a transport with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `response` for requests whose URL contains `fragment`.
    pub fn push(self, fragment: &str, response: HttpResponse) -> Self {
        self.route(fragment, |route| route.queue.push_back(Ok(response)));
        self
    }

    /// Queue a connection failure for requests whose URL contains `fragment`.
    pub fn push_failure(self, fragment: &str, message: &str) -> Self {
        let error = TransportError::new(message);
        self.route(fragment, |route| route.queue.push_back(Err(error)));
        self
    }

    /// Answer every otherwise unanswered request matching `fragment` with
    /// `response`.
    pub fn always(self, fragment: &str, response: HttpResponse) -> Self {
        self.route(fragment, |route| route.repeat = Some(Ok(response)));
        self
    }

    /// Requests sent so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    /// Requests sent so far whose URL contains `fragment`.
    pub fn requests_to(&self, fragment: &str) -> Vec<HttpRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.url.contains(fragment))
            .cloned()
            .collect()
    }

    /// Number of requests sent whose URL contains `fragment`.
    pub fn request_count(&self, fragment: &str) -> usize {
        self.requests_to(fragment).len()
    }

    fn route(&self, fragment: &str, edit: impl FnOnce(&mut Route)) {
        let mut script = self.lock();
        let index = match script.routes.iter().position(|r| r.fragment == fragment) {
            Some(index) => index,
            None => {
                script.routes.push(Route {
                    fragment: fragment.to_string(),
                    queue: VecDeque::new(),
                    repeat: None,
                });
                script.routes.len() - 1
            }
        };
        edit(&mut script.routes[index]);
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn answer(&self, request: HttpRequest) -> Scripted {
        let mut script = self.lock();
        let url = request.url.clone();
        script.requests.push(request);

        let matching = script
            .routes
            .iter_mut()
            .filter(|route| url.contains(&route.fragment));
        for route in matching {
            if let Some(response) = route.queue.pop_front() {
                return response;
            }
            if let Some(response) = &route.repeat {
                return response.clone();
            }
        }
        Err(TransportError::new(format!("no scripted response for {url}")))
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        future::ready(self.answer(request)).boxed()
    }
}

/// Assert that a result failed with a given [`ErrorKind`](crate::ErrorKind).
///
/// # Example
///
/// ```rust
/// use larder::{assert_error_kind, Error, ErrorKind, Service};
///
/// let result: Result<(), Error> = Err(Error::network(Service::Chat, "reset"));
/// assert_error_kind!(result, ErrorKind::NetworkTransient);
/// ```
#[macro_export]
macro_rules! assert_error_kind {
    ($result:expr, $kind:expr) => {
        match $result {
            Err(e) => {
                let e: $crate::Error = e;
                assert_eq!(e.kind(), $kind, "unexpected error: {:?}", e);
            }
            Ok(v) => {
                panic!("Expected error of kind {:?}, got Ok: {:?}", $kind, v);
            }
        }
    };
}

/// Assert that a step report carries an advisory.
///
/// # Example
///
/// ```rust
/// use larder::{assert_advisory, Advisory, StepReport};
///
/// let report = StepReport::new(()).with_advisory(Advisory::EstimatedIngredients);
/// assert_advisory!(report, Advisory::EstimatedIngredients);
/// ```
#[macro_export]
macro_rules! assert_advisory {
    ($report:expr, $advisory:expr) => {{
        let report = &$report;
        let wanted = $advisory;
        assert!(
            report.advisories.contains(&wanted),
            "advisory {:?} missing from {:?}",
            wanted,
            report.advisories
        );
    }};
}
