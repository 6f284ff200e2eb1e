//! Purpose: Blocking HTTP transport for the storefront REST API.
//! Exports: `Transport`, `HttpTransport`, `ApiRequest`, `Method`, `RawResponse`, `DEFAULT_TIMEOUT`.
//! Role: Performs exactly one round trip per call; knows nothing about sessions or states.
//! Invariants: Every HTTP status (2xx or not) is returned as `RawResponse`.
//! Invariants: Only connect/timeout/io/encoding problems surface as `Err`.
//! Invariants: Every agent carries a request timeout (120s unless configured).
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use serde::Serialize;
use serde_json::Value;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, segments: &[&str]) -> Self {
        Self {
            method,
            segments: segments.iter().map(|segment| segment.to_string()).collect(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(segments: &[&str]) -> Self {
        Self::new(Method::Get, segments)
    }

    pub fn post(segments: &[&str]) -> Self {
        Self::new(Method::Post, segments)
    }

    pub fn patch(segments: &[&str]) -> Self {
        Self::new(Method::Patch, segments)
    }

    pub fn delete(segments: &[&str]) -> Self {
        Self::new(Method::Delete, segments)
    }

    pub fn with_query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }

    pub fn with_optional_query(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.with_query(name, value),
            None => self,
        }
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(body).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode request json")
                .with_source(err)
        })?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    /// Path for logs and tests, e.g. `/product/search/`.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    pub fn url(&self, base_url: &Url) -> Result<Url, Error> {
        let mut url = base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                Error::new(ErrorKind::Usage).with_message("api base url cannot be a base")
            })?;
            path.pop_if_empty();
            for segment in &self.segments {
                path.push(segment);
            }
        }
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Transport: Send + Sync {
    fn execute(&self, request: &ApiRequest) -> Result<RawResponse, Error>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: &ApiRequest) -> Result<RawResponse, Error> {
        (**self).execute(request)
    }
}

#[derive(Clone)]
pub struct HttpTransport {
    base_url: Url,
    timeout: Duration,
    tls_config: Option<Arc<ureq::rustls::ClientConfig>>,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            agent: build_agent(DEFAULT_TIMEOUT, None),
            base_url,
            timeout: DEFAULT_TIMEOUT,
            tls_config: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.agent = build_agent(self.timeout, self.tls_config.clone());
        self
    }

    pub fn with_tls_ca_file(mut self, path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let cert_bytes = std::fs::read(path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("failed to read TLS CA/certificate file")
                .with_path(path)
                .with_source(err)
        })?;
        let mut cert_reader = Cursor::new(cert_bytes);
        let certs = rustls_pemfile::certs(&mut cert_reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message("failed to parse TLS CA/certificate file")
                    .with_path(path)
                    .with_source(err)
            })?;

        let _ = ureq::rustls::crypto::aws_lc_rs::default_provider().install_default();
        let mut root_store = ureq::rustls::RootCertStore::empty();
        let (added, _) = root_store.add_parsable_certificates(certs);
        if added == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("TLS CA/certificate file contains no parsable certificates")
                .with_path(path));
        }

        let tls_config = ureq::rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        self.tls_config = Some(Arc::new(tls_config));
        self.agent = build_agent(self.timeout, self.tls_config.clone());
        Ok(self)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &ApiRequest) -> Result<RawResponse, Error> {
        let url = request.url(&self.base_url)?;
        let mut call = self
            .agent
            .request(request.method.as_str(), url.as_str())
            .set("Accept", "application/json");
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }

        let response = match &request.body {
            Some(body) => {
                let payload = serde_json::to_string(body).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode request json")
                        .with_source(err)
                })?;
                call.set("Content-Type", "application/json")
                    .send_string(&payload)
            }
            None => call.call(),
        };

        match response {
            Ok(resp) => read_raw_response(resp),
            Err(ureq::Error::Status(_, resp)) => read_raw_response(resp),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("request failed")
                .with_source(err)),
        }
    }
}

fn build_agent(
    timeout: Duration,
    tls_config: Option<Arc<ureq::rustls::ClientConfig>>,
) -> ureq::Agent {
    let builder = ureq::AgentBuilder::new().timeout(timeout);
    match tls_config {
        Some(config) => builder.tls_config(config).build(),
        None => builder.build(),
    }
}

fn read_raw_response(response: ureq::Response) -> Result<RawResponse, Error> {
    let status = response.status();
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    Ok(RawResponse { status, body })
}

pub(crate) fn normalize_base_url(raw: String) -> Result<Url, Error> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid api base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(
            Error::new(ErrorKind::Usage).with_message("api base url must use http or https scheme")
        );
    }
    if url.cannot_be_a_base() {
        return Err(Error::new(ErrorKind::Usage).with_message("api base url cannot be a base"));
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(raw: &str) -> Url {
        normalize_base_url(raw.to_string()).expect("url")
    }

    #[test]
    fn normalize_base_url_drops_query_and_fragment() {
        let url = base("http://localhost:8000/?x=1#frag");
        assert_eq!(url.as_str(), "http://localhost:8000/");
    }

    #[test]
    fn normalize_base_url_rejects_other_schemes() {
        let err = normalize_base_url("ftp://localhost".to_string()).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn request_url_joins_segments_and_query() {
        let request = ApiRequest::get(&["product", "get-related-products", "p1"])
            .with_optional_query("location", Some("Lagos"))
            .with_optional_query("max_price", None::<String>)
            .with_query("category_id", "c 9");
        let url = request.url(&base("http://localhost:8000")).expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/product/get-related-products/p1?location=Lagos&category_id=c+9"
        );
    }

    #[test]
    fn request_url_keeps_base_prefix_and_trailing_slash() {
        let request = ApiRequest::get(&["product", "search", ""]).with_query("name", "shoe");
        let url = request.url(&base("https://shop.example/api/")).expect("url");
        assert_eq!(url.as_str(), "https://shop.example/api/product/search/?name=shoe");
        assert_eq!(request.path(), "/product/search/");
    }

    #[test]
    fn path_segments_are_escaped() {
        let request = ApiRequest::get(&["product", "a/b"]);
        let url = request.url(&base("http://localhost:8000")).expect("url");
        assert_eq!(url.as_str(), "http://localhost:8000/product/a%2Fb");
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut request = ApiRequest::get(&["cart", "get-user-cart"]);
        request.set_header("authorization", "Bearer a");
        request.set_header("Authorization", "Bearer b");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("AUTHORIZATION"), Some("Bearer b"));
    }

    #[test]
    fn transport_error_for_unreachable_host() {
        let transport = HttpTransport::new("http://127.0.0.1:9")
            .expect("transport")
            .with_timeout(Duration::from_secs(2));
        let err = transport
            .execute(&ApiRequest::get(&["product", "all-categories"]))
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
