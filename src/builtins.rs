use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::capability::{Capability, HostValue};
use crate::trace::DebugSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleLevel {
    Log,
    Debug,
    Error,
    Warn,
}

impl ConsoleLevel {
    pub const ALL: [ConsoleLevel; 4] = [Self::Log, Self::Debug, Self::Error, Self::Warn];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Debug => "debug",
            Self::Error => "error",
            Self::Warn => "warn",
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::Log => 0,
            Self::Debug => 1,
            Self::Error => 2,
            Self::Warn => 3,
        }
    }
}

type ConsoleHandler = Rc<dyn Fn(&str)>;

struct ConsoleState {
    handlers: [Option<ConsoleHandler>; 4],
    fallback: DebugSink,
}

/// Host side of the script `console` object.
///
/// Each level forwards its message to the most recently registered handler
/// for that level, or to the fallback sink when none is registered.
#[derive(Clone)]
pub struct Console {
    state: Rc<RefCell<ConsoleState>>,
}

impl Console {
    pub const GLOBAL_NAME: &'static str = "console";

    pub fn new(fallback: DebugSink) -> Self {
        Self {
            state: Rc::new(RefCell::new(ConsoleState {
                handlers: [None, None, None, None],
                fallback,
            })),
        }
    }

    pub fn on(&self, level: ConsoleLevel, handler: impl Fn(&str) + 'static) -> &Self {
        self.state.borrow_mut().handlers[level.slot()] = Some(Rc::new(handler));
        self
    }

    pub fn on_log(&self, handler: impl Fn(&str) + 'static) -> &Self {
        self.on(ConsoleLevel::Log, handler)
    }

    pub fn on_debug(&self, handler: impl Fn(&str) + 'static) -> &Self {
        self.on(ConsoleLevel::Debug, handler)
    }

    pub fn on_error(&self, handler: impl Fn(&str) + 'static) -> &Self {
        self.on(ConsoleLevel::Error, handler)
    }

    pub fn on_warn(&self, handler: impl Fn(&str) + 'static) -> &Self {
        self.on(ConsoleLevel::Warn, handler)
    }

    /// Drops the handler for `level`, restoring the fallback sink.
    pub fn clear(&self, level: ConsoleLevel) {
        self.state.borrow_mut().handlers[level.slot()] = None;
    }

    pub fn emit(&self, level: ConsoleLevel, message: &str) {
        // Release the borrow before calling out; a handler may register another.
        let handler = self.state.borrow().handlers[level.slot()].clone();
        match handler {
            Some(handler) => handler(message),
            None => {
                let fallback = self.state.borrow().fallback.clone();
                fallback.write_line(&format!("[console.{}] {message}", level.as_str()));
            }
        }
    }

    pub fn capability(&self) -> Capability {
        ConsoleLevel::ALL
            .into_iter()
            .fold(Capability::new(Self::GLOBAL_NAME), |capability, level| {
                let console = self.clone();
                capability.method(level.as_str(), 1, move |args| {
                    let message = args
                        .first()
                        .map(HostValue::to_display_string)
                        .unwrap_or_default();
                    console.emit(level, &message);
                    Ok(HostValue::Undefined)
                })
            })
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        let registered = ConsoleLevel::ALL
            .into_iter()
            .filter(|level| state.handlers[level.slot()].is_some())
            .map(ConsoleLevel::as_str)
            .collect::<Vec<_>>();
        f.debug_struct("Console")
            .field("handlers", &registered)
            .finish()
    }
}

pub const EVENT_INIT_GLOBAL_NAME: &str = "EventInit";

/// `EventInit` defaults plus a bootstrap that defines an `Event` constructor
/// reading its flags from them.
pub fn event_init_capability() -> Capability {
    Capability::new(EVENT_INIT_GLOBAL_NAME)
        .field("bubbles", false)
        .field("cancelable", false)
        .field("composed", false)
        .bootstrap(EVENT_BOOTSTRAP)
}

const EVENT_BOOTSTRAP: &str = r#"
(function (global) {
  function Event(type, init) {
    if (arguments.length === 0) {
      throw new TypeError("Event constructor requires a type");
    }
    var options = init || {};
    this.type = String(type);
    this.bubbles = options.bubbles === undefined ? EventInit.bubbles : !!options.bubbles;
    this.cancelable = options.cancelable === undefined ? EventInit.cancelable : !!options.cancelable;
    this.composed = options.composed === undefined ? EventInit.composed : !!options.composed;
    this.defaultPrevented = false;
  }
  Event.prototype.preventDefault = function () {
    if (this.cancelable) {
      this.defaultPrevented = true;
    }
  };
  global.Event = Event;
})(globalThis);
"#;

pub const DOCUMENT_GLOBAL_NAME: &str = "document";

/// Placeholder `document`; the page DOM is not exposed to scripts.
pub fn document_capability() -> Capability {
    Capability::new(DOCUMENT_GLOBAL_NAME)
}
