//! URL handling for page loads and external scripts.
//!
//! External script sources that are neither absolute nor protocol-relative
//! resolve against the page authority's root, never against the page path:
//! `s.js` on `https://example.org/a/page` becomes `https://example.org/s.js`.

use std::sync::OnceLock;

use fancy_regex::Regex;
use url::Url;

use crate::{Error, Result};

pub const DEFAULT_SCHEME: &str = "https";

static SCHEME_PREFIX: OnceLock<Regex> = OnceLock::new();
static SCHEME_WITH_AUTHORITY: OnceLock<Regex> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> Result<&'static Regex> {
    if let Some(regex) = cell.get() {
        return Ok(regex);
    }
    let regex = Regex::new(pattern)
        .map_err(|err| Error::Parse(format!("invalid url pattern {pattern}: {err}")))?;
    Ok(cell.get_or_init(|| regex))
}

fn matches(cell: &'static OnceLock<Regex>, pattern: &str, input: &str) -> Result<bool> {
    compiled(cell, pattern)?
        .is_match(input)
        .map_err(|err| Error::Parse(format!("url pattern failed on {input}: {err}")))
}

/// `scheme:` prefix, as on `https:`, `data:` or `blob:` URLs.
pub fn has_scheme(input: &str) -> Result<bool> {
    matches(&SCHEME_PREFIX, r"^[A-Za-z][A-Za-z0-9+.\-]*:", input)
}

/// `scheme://` prefix. `localhost:8080` has a scheme by URL grammar but no
/// authority marker, so page URLs are checked with this instead.
pub fn has_scheme_and_authority(input: &str) -> Result<bool> {
    matches(&SCHEME_WITH_AUTHORITY, r"^[A-Za-z][A-Za-z0-9+.\-]*://", input)
}

/// Parses a page URL, prefixing [`DEFAULT_SCHEME`] when none is given.
pub fn normalize_page_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Parse("page url is empty".into()));
    }
    let candidate = if has_scheme_and_authority(trimmed)? {
        trimmed.to_string()
    } else {
        format!("{DEFAULT_SCHEME}://{trimmed}")
    };
    let url = Url::parse(&candidate)
        .map_err(|err| Error::Parse(format!("invalid page url {candidate}: {err}")))?;
    if url.host_str().is_none() {
        return Err(Error::Parse(format!("page url has no host: {candidate}")));
    }
    Ok(url)
}

/// `host[:port]` of `url`; the port appears only when it is not the
/// scheme's default.
pub fn authority(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::Parse(format!("url has no host: {url}")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Joins `src` onto the page. The result is not parsed, so `..` and `.`
/// segments are kept as written; [`validate_script_url`] checks it right
/// before the fetch.
pub fn resolve_script_src(scheme: &str, authority: &str, src: &str) -> Result<String> {
    let src = src.trim();
    Ok(if src.starts_with("//") {
        format!("{scheme}:{src}")
    } else if src.starts_with('/') {
        format!("{scheme}://{authority}{src}")
    } else if has_scheme(src)? {
        src.to_string()
    } else {
        format!("{scheme}://{authority}/{src}")
    })
}

pub fn validate_script_url(resolved: &str) -> Result<()> {
    Url::parse(resolved)
        .map(drop)
        .map_err(|err| Error::Parse(format!("invalid script url {resolved}: {err}")))
}
