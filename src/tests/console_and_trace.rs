use super::*;

use std::cell::RefCell;
use std::rc::Rc;

fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |message: &str| sink.borrow_mut().push(message.to_string()))
}

#[test]
fn console_forwards_each_level_to_its_handler() -> Result<()> {
    let console = Console::new(DebugSink::discard());
    let mut context = fresh_context();
    context.bind_capability(&console.capability(), true)?;

    let (logs, on_log) = recorder();
    let (warnings, on_warn) = recorder();
    console.on_log(on_log).on_warn(on_warn);

    context.evaluate("console.log('log'); console.warn('warn'); console.error('error');")?;
    assert_eq!(*logs.borrow(), ["log"]);
    assert_eq!(*warnings.borrow(), ["warn"]);
    Ok(())
}

#[test]
fn console_uses_only_the_most_recent_handler() -> Result<()> {
    let console = Console::new(DebugSink::discard());
    let mut context = fresh_context();
    context.bind_capability(&console.capability(), true)?;

    let (first, on_first) = recorder();
    let (second, on_second) = recorder();
    console.on_debug(on_first);
    console.on_debug(on_second);

    context.evaluate("console.debug('john stamos')")?;
    assert!(first.borrow().is_empty());
    assert_eq!(*second.borrow(), ["john stamos"]);
    Ok(())
}

#[test]
fn console_without_handler_writes_to_fallback_sink() -> Result<()> {
    let buffer = SharedBuffer::new();
    let console = Console::new(DebugSink::new(buffer.clone()));
    let mut context = fresh_context();
    context.bind_capability(&console.capability(), true)?;

    context.evaluate("console.log(42); console.error();")?;
    assert_eq!(buffer.contents(), "[console.log] 42\n[console.error] \n");

    let (logs, on_log) = recorder();
    console.on_log(on_log);
    console.clear(ConsoleLevel::Error);
    buffer.clear();
    context.evaluate("console.log('handled'); console.error('fallback');")?;
    assert_eq!(*logs.borrow(), ["handled"]);
    assert_eq!(buffer.contents(), "[console.error] fallback\n");
    Ok(())
}

#[test]
fn console_capability_declares_four_single_argument_methods() {
    let capability = Console::new(DebugSink::discard()).capability();
    assert_eq!(capability.global_name(), Console::GLOBAL_NAME);
    let names = capability
        .members()
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, ["log", "debug", "error", "warn"]);
    for (_, member) in capability.members() {
        assert!(matches!(member, Member::Method { arity: 1, .. }));
    }
}

#[test]
fn event_constructor_reads_defaults_from_event_init() -> Result<()> {
    let mut context = fresh_context();
    context.bind_capability(&event_init_capability(), false)?;

    assert_eq!(
        context.evaluate("EventInit.bubbles + ':' + EventInit.cancelable + ':' + EventInit.composed")?,
        HostValue::from("false:false:false")
    );
    assert_eq!(
        context.evaluate(
            "var plain = new Event('click'); plain.type + ':' + plain.bubbles + ':' + plain.composed"
        )?,
        HostValue::from("click:false:false")
    );
    assert_eq!(
        context.evaluate(
            "var e = new Event('submit', { bubbles: true, cancelable: true }); e.preventDefault(); e.bubbles + ':' + e.defaultPrevented"
        )?,
        HostValue::from("true:true")
    );
    assert!(matches!(
        context.evaluate("new Event()"),
        Err(Error::ScriptExecution(_))
    ));
    Ok(())
}

#[test]
fn document_placeholder_is_an_empty_object() -> Result<()> {
    let mut context = fresh_context();
    context.bind_capability(&document_capability(), false)?;
    assert_eq!(
        context.evaluate("typeof document + ':' + Object.keys(document).length")?,
        HostValue::from("object:0")
    );
    Ok(())
}

#[test]
fn tracer_writes_sink_and_keeps_bounded_log() -> Result<()> {
    let buffer = SharedBuffer::new();
    let tracer = Tracer::new(DebugSink::new(buffer.clone()));
    tracer.set_log_limit(2)?;
    tracer.line("[test] one".into());
    tracer.line("[test] two".into());
    tracer.line("[test] three".into());

    assert_eq!(tracer.take_logs(), ["[test] two", "[test] three"]);
    assert!(tracer.take_logs().is_empty());
    assert_eq!(buffer.contents(), "[test] one\n[test] two\n[test] three\n");

    tracer.set_enabled(false);
    tracer.line("[test] hidden".into());
    assert!(tracer.take_logs().is_empty());
    assert!(!buffer.contents().contains("hidden"));
    Ok(())
}

#[test]
fn tracer_rejects_zero_log_limit() {
    let tracer = Tracer::new(DebugSink::discard());
    assert!(matches!(tracer.set_log_limit(0), Err(Error::InvalidConfig(_))));
}

#[test]
fn context_traces_bindings_and_release() -> Result<()> {
    let tracer = Tracer::new(DebugSink::discard());
    let mut context = ScriptContext::new(tracer.clone());
    context.bind_capability(&Capability::new("api").field("a", 1), false)?;
    context.release()?;

    assert_eq!(
        tracer.take_logs(),
        [
            "[context] created",
            "[capability] bound name=api members=1 override=false",
            "[context] released bound=1",
        ]
    );
    Ok(())
}

#[test]
fn console_summarizes_object_arguments_without_calling_them() -> Result<()> {
    let console = Console::new(DebugSink::discard());
    let mut context = fresh_context();
    context.bind_capability(&console.capability(), true)?;
    let (logs, on_log) = recorder();
    console.on_log(on_log);

    context.evaluate(
        "var touched = false; console.log({ toString() { touched = true; return 'x'; } }); console.log([1, 2]);",
    )?;
    assert_eq!(*logs.borrow(), ["[object Object]", "[object Array]"]);
    assert_eq!(context.evaluate("touched")?, HostValue::Bool(false));
    Ok(())
}
