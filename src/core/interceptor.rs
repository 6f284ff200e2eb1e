//! Purpose: Request/response hooks layered over a `Transport`.
//! Exports: `Interceptor`, `InterceptedTransport`, `BearerAuth`, `ForbiddenEviction`, `RequestLog`.
//! Role: Cross-cutting concerns (auth header, 403 eviction, logging) applied to every call.
//! Invariants: Request hooks run in registration order; response hooks run in reverse.
//! Invariants: The bearer token is read at request time, never captured at construction.
//! Invariants: A 403 clears the session before the response reaches the caller.
#![allow(clippy::result_large_err)]

use crate::core::error::Error;
use crate::core::session::SessionStore;
use crate::core::transport::{ApiRequest, RawResponse, Transport};
use std::sync::Arc;

pub trait Interceptor: Send + Sync {
    fn on_request(&self, _request: &mut ApiRequest) {}

    fn on_response(&self, _request: &ApiRequest, _response: &RawResponse) {}

    fn on_error(&self, _request: &ApiRequest, _error: &Error) {}
}

pub struct InterceptedTransport<T> {
    inner: T,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl<T: Transport> InterceptedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            interceptors: Vec::new(),
        }
    }

    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> Transport for InterceptedTransport<T> {
    fn execute(&self, request: &ApiRequest) -> Result<RawResponse, Error> {
        let mut request = request.clone();
        for interceptor in &self.interceptors {
            interceptor.on_request(&mut request);
        }
        match self.inner.execute(&request) {
            Ok(response) => {
                for interceptor in self.interceptors.iter().rev() {
                    interceptor.on_response(&request, &response);
                }
                Ok(response)
            }
            Err(err) => {
                for interceptor in self.interceptors.iter().rev() {
                    interceptor.on_error(&request, &err);
                }
                Err(err)
            }
        }
    }
}

/// Attaches `Authorization: Bearer <token>` when the session holds a token.
pub struct BearerAuth {
    session: SessionStore,
}

impl BearerAuth {
    pub fn new(session: SessionStore) -> Self {
        Self { session }
    }
}

impl Interceptor for BearerAuth {
    fn on_request(&self, request: &mut ApiRequest) {
        if let Some(token) = self.session.token() {
            request.set_header("Authorization", format!("Bearer {token}"));
        }
    }
}

/// Clears the session when the server answers 403.
pub struct ForbiddenEviction {
    session: SessionStore,
}

impl ForbiddenEviction {
    pub fn new(session: SessionStore) -> Self {
        Self { session }
    }
}

impl Interceptor for ForbiddenEviction {
    fn on_response(&self, request: &ApiRequest, response: &RawResponse) {
        if response.status == 403 {
            tracing::debug!(path = %request.path(), "forbidden response");
            self.session.evict();
        }
    }
}

/// Emits tracing events for each round trip.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestLog;

impl Interceptor for RequestLog {
    fn on_request(&self, request: &mut ApiRequest) {
        tracing::debug!(method = request.method.as_str(), path = %request.path(), "request");
    }

    fn on_response(&self, request: &ApiRequest, response: &RawResponse) {
        tracing::debug!(
            method = request.method.as_str(),
            path = %request.path(),
            status = response.status,
            "response"
        );
    }

    fn on_error(&self, request: &ApiRequest, error: &Error) {
        tracing::debug!(
            method = request.method.as_str(),
            path = %request.path(),
            error = %error,
            "request failed"
        );
    }
}
