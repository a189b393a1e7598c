use std::fmt;
use std::time::Duration;

use encoding_rs::{Encoding, UTF_8};
use scraper::{Html, Selector};
use url::Url;

use crate::fetch::{FetchKind, FetchRequest, FetchResponse, Fetcher};
use crate::headers::HeaderSet;
use crate::url_policy;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptElement {
    External { resolved_url: String },
    /// `index` counts inline elements only.
    Inline { index: usize, source_text: String },
}

/// A fetched and parsed page.
#[derive(Clone)]
pub struct PageDocument {
    url: Url,
    authority: String,
    html: Html,
    script_elements: Vec<ScriptElement>,
}

impl PageDocument {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn script_elements(&self) -> &[ScriptElement] {
        &self.script_elements
    }

    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.html
            .select(&selector)
            .next()
            .map(|title| title.text().collect::<String>().trim().to_string())
    }
}

impl fmt::Debug for PageDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageDocument")
            .field("url", &self.url.as_str())
            .field("authority", &self.authority)
            .field("script_elements", &self.script_elements)
            .finish()
    }
}

/// Script text collected from a page, one labelled fragment per element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledScript {
    fragments: Vec<String>,
}

impl AssembledScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: String) {
        self.fragments.push(fragment);
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn source(&self) -> String {
        self.fragments.concat()
    }
}

impl fmt::Display for AssembledScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            f.write_str(fragment)?;
        }
        Ok(())
    }
}

pub fn external_banner(url: &str) -> String {
    format!("\n//\n// Following lines are external JS-Code from {url}\n//\n\n")
}

pub fn inline_banner(index: usize) -> String {
    format!("\n//\n// Following lines are JS-Code from <script> number {index}\n//\n\n")
}

/// Banner plus source text for one element.
pub fn label_fragment(element: &ScriptElement, source_text: &str) -> String {
    let banner = match element {
        ScriptElement::External { resolved_url } => external_banner(resolved_url),
        ScriptElement::Inline { index, .. } => inline_banner(*index),
    };
    format!("{banner}{source_text}")
}

/// Fetches pages and their external scripts through a [`Fetcher`].
pub struct PageLoader<'a> {
    fetcher: &'a dyn Fetcher,
    headers: &'a HeaderSet,
    timeout: Option<Duration>,
}

impl<'a> PageLoader<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, headers: &'a HeaderSet, timeout: Option<Duration>) -> Self {
        Self {
            fetcher,
            headers,
            timeout,
        }
    }

    pub fn fetch(&self, raw_url: &str) -> Result<PageDocument> {
        let url = url_policy::normalize_page_url(raw_url)?;
        let authority = url_policy::authority(&url)?;
        let response = self.get(url.as_str(), FetchKind::Page)?;
        if !is_parseable_content_type(response.content_type.as_deref()) {
            return Err(Error::Parse(format!(
                "unsupported content type {} for page {url}",
                response.content_type.as_deref().unwrap_or_default()
            )));
        }
        let text = decode_page_body(&response.body, response.content_type.as_deref());
        let html = Html::parse_document(&text);
        let script_elements = discover_scripts(&html, url.scheme(), &authority)?;
        Ok(PageDocument {
            url,
            authority,
            html,
            script_elements,
        })
    }

    /// Body of an external script decoded as UTF-8, whatever its declared
    /// content type.
    pub fn fetch_script(&self, url: &str) -> Result<String> {
        url_policy::validate_script_url(url)?;
        let response = self.get(url, FetchKind::Script)?;
        Ok(String::from_utf8_lossy(&response.body).into_owned())
    }

    fn get(&self, url: &str, kind: FetchKind) -> Result<FetchResponse> {
        let response = self.fetcher.get(&FetchRequest {
            url,
            headers: self.headers,
            kind,
            timeout: self.timeout,
        })?;
        if !response.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }
}

/// Script elements of `html` in document order. Data blocks such as
/// `type="application/json"` are skipped. External sources are joined onto
/// the page but only validated when fetched, so a bad `src` fails the load
/// in document order.
pub fn discover_scripts(html: &Html, scheme: &str, authority: &str) -> Result<Vec<ScriptElement>> {
    let selector = Selector::parse("script")
        .map_err(|err| Error::Parse(format!("invalid script selector: {err:?}")))?;
    let mut elements = Vec::new();
    let mut inline_count = 0usize;
    for script in html.select(&selector) {
        let attrs = script.value();
        if !is_executable_script_type(attrs.attr("type")) {
            continue;
        }
        match attrs.attr("src") {
            Some(src) => elements.push(ScriptElement::External {
                resolved_url: url_policy::resolve_script_src(scheme, authority, src)?,
            }),
            None => {
                elements.push(ScriptElement::Inline {
                    index: inline_count,
                    source_text: script.text().collect(),
                });
                inline_count += 1;
            }
        }
    }
    Ok(elements)
}

fn is_executable_script_type(raw_type: Option<&str>) -> bool {
    let Some(raw_type) = raw_type else {
        return true;
    };

    let media_type = raw_type
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .to_ascii_lowercase();

    if media_type.is_empty() {
        return true;
    }

    matches!(
        media_type.as_str(),
        "text/javascript" | "application/javascript" | "application/ecmascript" | "text/ecmascript"
    )
}

/// Decodes with the `charset` declared in `content_type`, or UTF-8 when none
/// is declared or the label is unknown. A byte-order mark wins over both.
fn decode_page_body(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then_some(value.trim().trim_matches(['"', '\'']))
    })
}

fn is_parseable_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };
    let media_type = content_type
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .to_ascii_lowercase();
    media_type.is_empty()
        || media_type.starts_with("text/")
        || media_type == "application/xml"
        || media_type == "application/xhtml+xml"
        || (media_type.starts_with("application/") && media_type.ends_with("+xml"))
}
