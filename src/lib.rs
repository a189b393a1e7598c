//! Minimal headless browser.
//!
//! A [`Browser`] opens [`Window`]s. Each window owns one isolated JavaScript
//! context with a few host globals bound into it, fetches pages over HTTP,
//! and runs their `<script>` elements one by one in document order.

use std::error::Error as StdError;
use std::fmt;

mod browser;
mod builtins;
mod capability;
mod fetch;
mod headers;
mod page_loader;
mod script_context;
mod trace;
pub mod url_policy;
mod window;

pub use browser::Browser;
pub use builtins::{
    Console, ConsoleLevel, DOCUMENT_GLOBAL_NAME, EVENT_INIT_GLOBAL_NAME, document_capability,
    event_init_capability,
};
pub use capability::{Capability, HostFunction, HostValue, Member, ObjectKind};
pub use fetch::{FetchKind, FetchRequest, FetchResponse, Fetcher, HttpFetcher, MockFetcher};
pub use headers::{HeaderSet, chrome_headers, header_set};
pub use page_loader::{
    AssembledScript, PageDocument, PageLoader, ScriptElement, discover_scripts, external_banner,
    inline_banner, label_fragment,
};
pub use script_context::ScriptContext;
pub use trace::{DebugSink, SharedBuffer};
pub use window::{DEFAULT_SCRIPT_TIMEOUT, Window, WindowBuilder, WindowConfig};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    DuplicateName(String),
    CapabilityInit { name: String, source: Box<Error> },
    ContextClosed,
    Fetch { url: String, message: String },
    HttpStatus { url: String, status: u16 },
    Parse(String),
    ScriptExecution(String),
    InvalidConfig(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName(msg) => write!(f, "duplicate global name: {msg}"),
            Self::CapabilityInit { name, source } => {
                write!(f, "failed to initialize capability {name}: {source}")
            }
            Self::ContextClosed => write!(f, "script context is closed"),
            Self::Fetch { url, message } => write!(f, "fetch failed for {url}: {message}"),
            Self::HttpStatus { url, status } => write!(f, "http status {status} for {url}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::ScriptExecution(msg) => write!(f, "script execution error: {msg}"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::CapabilityInit { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests;
