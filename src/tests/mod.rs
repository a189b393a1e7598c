use super::*;

use crate::trace::Tracer;

mod console_and_trace;

fn fresh_context() -> ScriptContext {
    ScriptContext::new(Tracer::new(DebugSink::discard()))
}
