use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use headless_browser::{
    Browser, Capability, DEFAULT_SCRIPT_TIMEOUT, Error, HostValue, MockFetcher, Result,
};

fn offline_browser() -> Browser {
    Browser::with_fetcher(Rc::new(MockFetcher::new()))
}

#[test]
fn new_window_binds_builtins_in_order() -> Result<()> {
    let mut window = offline_browser().open_window()?;
    assert_eq!(window.context().bound_names(), ["console", "EventInit", "document"]);
    assert_eq!(window.execute_script("void 0")?, HostValue::Undefined);
    assert_eq!(
        window.execute_script("typeof console.log + ':' + typeof Event + ':' + typeof document")?,
        HostValue::from("function:function:object")
    );
    Ok(())
}

#[test]
fn console_log_reaches_latest_window_handler() -> Result<()> {
    let mut window = offline_browser().open_window()?;
    let seen = Rc::new(RefCell::new(Vec::new()));
    let first = seen.clone();
    window
        .console()
        .on_log(move |message| first.borrow_mut().push(format!("first:{message}")));
    let second = seen.clone();
    window
        .console()
        .on_log(move |message| second.borrow_mut().push(format!("second:{message}")));

    window.execute_script("console.log('john stamos');")?;
    assert_eq!(*seen.borrow(), ["second:john stamos"]);
    Ok(())
}

#[test]
fn windows_do_not_share_globals() -> Result<()> {
    let browser = offline_browser();
    let mut left = browser.open_window()?;
    let mut right = browser.open_window()?;

    left.execute_script("var secret = 'left';")?;
    assert_eq!(right.execute_script("typeof secret")?, HostValue::from("undefined"));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    left.console().on_log(move |message| sink.borrow_mut().push(message.to_string()));
    right.execute_script("console.log('right only')")?;
    assert!(seen.borrow().is_empty());
    Ok(())
}

#[test]
fn rebinding_builtin_without_override_fails() -> Result<()> {
    let mut window = offline_browser().open_window()?;
    assert!(matches!(
        window
            .context_mut()
            .bind_capability(&Capability::new("console"), false),
        Err(Error::DuplicateName(_))
    ));
    assert_eq!(window.context().bound_names().len(), 3);
    Ok(())
}

#[test]
fn construction_failure_wraps_the_binding_error() {
    let result = offline_browser()
        .open_custom_window()
        .capability(Capability::new("document"), false)
        .build();
    match result {
        Err(Error::CapabilityInit { name, source }) => {
            assert_eq!(name, "document");
            assert!(matches!(*source, Error::DuplicateName(_)));
        }
        other => panic!("expected capability init error, got: {other:?}"),
    }

    let result = offline_browser()
        .open_custom_window()
        .capability(Capability::new("broken").bootstrap("throw new Error('no');"), false)
        .build();
    assert!(matches!(
        result,
        Err(Error::CapabilityInit { source, .. }) if matches!(*source, Error::ScriptExecution(_))
    ));
}

#[test]
fn capability_init_error_exposes_its_source() {
    use std::error::Error as _;

    let err = Error::CapabilityInit {
        name: "console".into(),
        source: Box::new(Error::DuplicateName("console".into())),
    };
    assert!(err.to_string().contains("console"));
    assert_eq!(
        err.source().map(ToString::to_string),
        Some(Error::DuplicateName("console".into()).to_string())
    );
}

#[test]
fn close_is_idempotent_and_blocks_further_work() -> Result<()> {
    let mut window = offline_browser().open_window()?;
    window.close();
    window.close();

    assert!(window.is_closed());
    assert_eq!(window.execute_script("1"), Err(Error::ContextClosed));
    assert!(matches!(
        window.load("https://example.org/"),
        Err(Error::ContextClosed)
    ));
    assert_eq!(window.context_mut().release(), Err(Error::ContextClosed));
    Ok(())
}

#[test]
fn close_after_failed_load_is_safe() -> Result<()> {
    let browser = offline_browser();
    let mut window = browser.open_window()?;
    assert!(window.load("https://unreachable.test/").is_err());
    browser.close_window(window);
    Ok(())
}

#[test]
fn builder_defaults_and_overrides() -> Result<()> {
    let mut browser = offline_browser();
    browser.set_main_directory("/tmp/hb-main");
    assert_eq!(browser.main_directory(), Path::new("/tmp/hb-main"));

    let window = browser.open_window()?;
    let config = window.config();
    assert!(config.enable_script_execution);
    assert!(config.custom_headers.is_none());
    assert_eq!(config.script_timeout, Some(DEFAULT_SCRIPT_TIMEOUT));
    assert!(config.headless);
    assert_eq!(config.user_data_dir, Path::new("/tmp/hb-main/user-data"));
    assert_eq!(window.parent_browser().main_directory(), Path::new("/tmp/hb-main"));
    assert!(window.document().is_none());
    assert!(window.loaded_script().is_none());

    let window = browser
        .open_custom_window()
        .script_timeout(Some(Duration::from_secs(5)))
        .devtools(true)
        .debugging_port(9222)
        .user_data_dir("/tmp/profile")
        .temporary_user_data_dir(true)
        .additional_startup_args(["--mute-audio"])
        .make_undetectable(true)
        .build()?;
    let config = window.config();
    assert_eq!(config.script_timeout, Some(Duration::from_secs(5)));
    assert!(config.devtools);
    assert!(!config.headless);
    assert_eq!(config.debugging_port, 9222);
    assert_eq!(config.user_data_dir, Path::new("/tmp/profile"));
    assert!(config.temporary_user_data_dir);
    assert_eq!(config.additional_startup_args, ["--mute-audio"]);
    assert!(config.make_undetectable);
    Ok(())
}

#[test]
fn trace_log_limit_is_validated() -> Result<()> {
    let mut window = offline_browser().open_window()?;
    assert!(window.take_trace_logs().iter().any(|line| line == "[context] created"));
    assert!(matches!(window.set_trace_log_limit(0), Err(Error::InvalidConfig(_))));

    window.set_trace_log_limit(1)?;
    window.execute_script("throw new Error('traced');").ok();
    let logs = window.take_trace_logs();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with("[script] error"));

    window.enable_trace(false);
    window.close();
    assert!(window.take_trace_logs().is_empty());
    Ok(())
}
