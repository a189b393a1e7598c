use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;

use crate::headers::HeaderSet;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Page,
    Script,
}

#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    pub headers: &'a HeaderSet,
    pub kind: FetchKind,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs the HTTP GETs behind page and script loads.
///
/// Implementations report transport failures as [`Error::Fetch`]; status and
/// content checks belong to the caller.
pub trait Fetcher {
    fn get(&self, request: &FetchRequest<'_>) -> Result<FetchResponse>;
}

/// Blocking network fetcher.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder().build().map_err(|err| Error::Fetch {
            url: String::new(),
            message: format!("failed to build http client: {err}"),
        })?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HttpFetcher")
    }
}

impl Fetcher for HttpFetcher {
    fn get(&self, request: &FetchRequest<'_>) -> Result<FetchResponse> {
        let fetch_error = |err: reqwest::Error| Error::Fetch {
            url: request.url.to_string(),
            message: err.to_string(),
        };
        let mut builder = self.client.get(request.url);
        for (name, value) in request.headers {
            // Content decoding is negotiated by the client itself.
            if name.eq_ignore_ascii_case("accept-encoding") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder.send().map_err(fetch_error)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().map_err(fetch_error)?.to_vec();
        Ok(FetchResponse {
            status,
            content_type,
            body,
        })
    }
}

/// In-memory fetcher serving canned responses by exact URL.
///
/// Unknown URLs fail like an unreachable host. Every request is recorded.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: RefCell<HashMap<String, FetchResponse>>,
    calls: RefCell<Vec<(FetchKind, String)>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, content_type: Option<&str>, body: &str) {
        self.respond_bytes(url, status, content_type, body.as_bytes());
    }

    pub fn respond_bytes(&self, url: &str, status: u16, content_type: Option<&str>, body: &[u8]) {
        self.responses.borrow_mut().insert(
            url.to_string(),
            FetchResponse {
                status,
                content_type: content_type.map(str::to_string),
                body: body.to_vec(),
            },
        );
    }

    pub fn html(&self, url: &str, body: &str) {
        self.respond(url, 200, Some("text/html; charset=utf-8"), body);
    }

    pub fn script(&self, url: &str, body: &str) {
        self.respond(url, 200, Some("application/javascript"), body);
    }

    pub fn remove(&self, url: &str) {
        self.responses.borrow_mut().remove(url);
    }

    pub fn calls(&self) -> Vec<(FetchKind, String)> {
        self.calls.borrow().clone()
    }

    pub fn take_calls(&self) -> Vec<(FetchKind, String)> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }
}

impl Fetcher for MockFetcher {
    fn get(&self, request: &FetchRequest<'_>) -> Result<FetchResponse> {
        self.calls
            .borrow_mut()
            .push((request.kind, request.url.to_string()));
        self.responses
            .borrow()
            .get(request.url)
            .cloned()
            .ok_or_else(|| Error::Fetch {
                url: request.url.to_string(),
                message: "no mock response registered (host unreachable)".into(),
            })
    }
}
