use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::browser::Browser;
use crate::builtins::{Console, document_capability, event_init_capability};
use crate::capability::{Capability, HostValue};
use crate::headers::{HeaderSet, chrome_headers};
use crate::page_loader::{AssembledScript, PageDocument, PageLoader, ScriptElement, label_fragment};
use crate::script_context::ScriptContext;
use crate::trace::{DebugSink, Tracer};
use crate::{Error, Result};

pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options captured when a window is built. Nothing changes them afterwards.
///
/// The browser-process fields (`headless`, `user_data_dir`, `devtools`,
/// `debugging_port`, `additional_startup_args`, `make_undetectable`,
/// `temporary_user_data_dir`) are carried for hosts that drive a real
/// browser; page loading ignores them.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub enable_script_execution: bool,
    /// Replaces the default header preset wholesale when set.
    pub custom_headers: Option<HeaderSet>,
    /// Receives trace lines and console output that has no handler.
    pub debug_sink: DebugSink,
    /// Per-request timeout for page and script fetches. Script evaluation
    /// itself is never interrupted.
    pub script_timeout: Option<Duration>,
    pub headless: bool,
    pub user_data_dir: PathBuf,
    pub temporary_user_data_dir: bool,
    pub devtools: bool,
    pub debugging_port: u16,
    pub additional_startup_args: Vec<String>,
    pub make_undetectable: bool,
}

impl WindowConfig {
    pub fn new(main_directory: &Path) -> Self {
        Self {
            enable_script_execution: true,
            custom_headers: None,
            debug_sink: DebugSink::discard(),
            script_timeout: Some(DEFAULT_SCRIPT_TIMEOUT),
            headless: true,
            user_data_dir: main_directory.join("user-data"),
            temporary_user_data_dir: false,
            devtools: false,
            debugging_port: 0,
            additional_startup_args: Vec::new(),
            make_undetectable: false,
        }
    }

    /// Headers sent with every fetch made by the window.
    pub fn request_headers(&self) -> HeaderSet {
        self.custom_headers.clone().unwrap_or_else(chrome_headers)
    }
}

#[derive(Debug)]
pub struct WindowBuilder {
    browser: Browser,
    config: WindowConfig,
    capabilities: Vec<(Capability, bool)>,
}

impl WindowBuilder {
    pub(crate) fn new(browser: Browser) -> Self {
        let config = WindowConfig::new(browser.main_directory());
        Self {
            browser,
            config,
            capabilities: Vec::new(),
        }
    }

    /// Binds `capability` during construction, after the built-ins and any
    /// capability added before it.
    pub fn capability(mut self, capability: Capability, allow_override: bool) -> Self {
        self.capabilities.push((capability, allow_override));
        self
    }

    pub fn enable_script_execution(mut self, enabled: bool) -> Self {
        self.config.enable_script_execution = enabled;
        self
    }

    pub fn custom_headers(mut self, headers: HeaderSet) -> Self {
        self.config.custom_headers = Some(headers);
        self
    }

    pub fn debug_sink(mut self, sink: DebugSink) -> Self {
        self.config.debug_sink = sink;
        self
    }

    /// `None` disables the fetch timeout.
    pub fn script_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.script_timeout = timeout;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn user_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.user_data_dir = dir.into();
        self
    }

    pub fn temporary_user_data_dir(mut self, enabled: bool) -> Self {
        self.config.temporary_user_data_dir = enabled;
        self
    }

    /// Turning devtools on also turns headless off at build time.
    pub fn devtools(mut self, enabled: bool) -> Self {
        self.config.devtools = enabled;
        self
    }

    pub fn debugging_port(mut self, port: u16) -> Self {
        self.config.debugging_port = port;
        self
    }

    pub fn additional_startup_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.additional_startup_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn make_undetectable(mut self, enabled: bool) -> Self {
        self.config.make_undetectable = enabled;
        self
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn build(self) -> Result<Window> {
        let mut config = self.config;
        if config.devtools {
            config.headless = false;
        }
        Window::with_capabilities(self.browser, config, self.capabilities)
    }
}

/// A headless window: one script context plus the last page loaded into it.
///
/// Dropping the window releases its context.
#[derive(Debug)]
pub struct Window {
    browser: Browser,
    config: WindowConfig,
    context: ScriptContext,
    console: Console,
    tracer: Tracer,
    document: Option<PageDocument>,
    loaded_script: Option<AssembledScript>,
}

impl Window {
    pub fn new(browser: Browser, config: WindowConfig) -> Result<Self> {
        Self::with_capabilities(browser, config, Vec::new())
    }

    /// Creates the window and binds the built-in globals `console`,
    /// `EventInit` (which also defines `Event`) and `document`, in that
    /// order, followed by `extra`. Any binding failure aborts construction
    /// with [`Error::CapabilityInit`].
    pub fn with_capabilities(
        browser: Browser,
        config: WindowConfig,
        extra: Vec<(Capability, bool)>,
    ) -> Result<Self> {
        let tracer = Tracer::new(config.debug_sink.clone());
        let mut context = ScriptContext::new(tracer.clone());
        let console = Console::new(config.debug_sink.clone());

        let builtins = vec![
            // The engine may ship its own console; ours replaces it.
            (console.capability(), true),
            (event_init_capability(), false),
            (document_capability(), false),
        ];
        for (capability, allow_override) in builtins.iter().chain(&extra) {
            context
                .bind_capability(capability, *allow_override)
                .map_err(|err| Error::CapabilityInit {
                    name: capability.global_name().to_string(),
                    source: Box::new(err),
                })?;
        }
        tracer.line(format!(
            "[window] ready bound={}",
            context.bound_names().join(",")
        ));

        Ok(Self {
            browser,
            config,
            context,
            console,
            tracer,
            document: None,
            loaded_script: None,
        })
    }

    /// Fetches `url`, then evaluates its scripts one element at a time in
    /// document order.
    ///
    /// The first failure stops the load. Scripts evaluated before it keep
    /// their effects, but the stored document and script text stay those of
    /// the last successful load.
    pub fn load(&mut self, url: &str) -> Result<&mut Self> {
        if self.context.is_released() {
            return Err(Error::ContextClosed);
        }
        let headers = self.config.request_headers();
        let loader = PageLoader::new(
            self.browser.fetcher(),
            &headers,
            self.config.script_timeout,
        );

        self.tracer.line(format!("[load] fetch url={url}"));
        let document = loader.fetch(url)?;
        self.tracer.line(format!(
            "[load] parsed url={} scripts={}",
            document.url(),
            document.script_elements().len()
        ));

        let mut assembled = AssembledScript::new();
        if self.config.enable_script_execution {
            for element in document.script_elements() {
                let source_text = match element {
                    ScriptElement::External { resolved_url } => {
                        self.tracer
                            .line(format!("[load] fetch script url={resolved_url}"));
                        loader.fetch_script(resolved_url)?
                    }
                    ScriptElement::Inline { source_text, .. } => source_text.clone(),
                };
                let fragment = label_fragment(element, &source_text);
                self.tracer.line(format!(
                    "[script] eval {} bytes={}",
                    describe(element),
                    source_text.len()
                ));
                self.context.execute(&fragment)?;
                assembled.push(fragment);
            }
        }

        self.document = Some(document);
        self.loaded_script = Some(assembled);
        Ok(self)
    }

    pub fn execute_script(&mut self, source: &str) -> Result<HostValue> {
        self.context.evaluate(source)
    }

    /// Releases the script context. Further calls do nothing.
    pub fn close(&mut self) {
        if self.context.release_if_open() {
            self.tracer.line("[window] closed".into());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.context.is_released()
    }

    /// Document from the last successful load.
    pub fn document(&self) -> Option<&PageDocument> {
        self.document.as_ref()
    }

    /// Script fragments from the last successful load.
    pub fn loaded_script(&self) -> Option<&AssembledScript> {
        self.loaded_script.as_ref()
    }

    pub fn authority(&self) -> Option<&str> {
        self.document.as_ref().map(PageDocument::authority)
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn context(&self) -> &ScriptContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ScriptContext {
        &mut self.context
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn parent_browser(&self) -> &Browser {
        &self.browser
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.tracer.set_enabled(enabled);
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.tracer.set_to_stderr(enabled);
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        self.tracer.set_log_limit(max_entries)
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.tracer.take_logs()
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        self.close();
    }
}

fn describe(element: &ScriptElement) -> String {
    match element {
        ScriptElement::External { resolved_url } => format!("external url={resolved_url}"),
        ScriptElement::Inline { index, .. } => format!("inline index={index}"),
    }
}
