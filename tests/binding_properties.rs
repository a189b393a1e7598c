use std::collections::BTreeSet;
use std::rc::Rc;

use headless_browser::{Browser, Capability, Error, HostValue, MockFetcher};
use proptest::collection::btree_set;
use proptest::prelude::*;
use proptest::test_runner::TestCaseResult;

const DEFAULT_BINDING_PROPTEST_CASES: u32 = 32;

fn binding_cases() -> u32 {
    std::env::var("BINDING_PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_BINDING_PROPTEST_CASES)
}

// Prefixed so generated names never collide with engine globals.
fn global_names() -> impl Strategy<Value = BTreeSet<String>> {
    btree_set("[a-z][a-z0-9_]{0,8}", 1..8)
        .prop_map(|names| names.into_iter().map(|name| format!("host_{name}")).collect())
}

fn check_distinct_names_bind_in_order(names: Vec<String>) -> TestCaseResult {
    let browser = Browser::with_fetcher(Rc::new(MockFetcher::new()));
    let mut window = browser
        .open_window()
        .map_err(|err| TestCaseError::fail(err.to_string()))?;
    let context = window.context_mut();
    let before = context.bound_names().to_vec();

    for (position, name) in names.iter().enumerate() {
        context
            .bind_capability(&Capability::new(name.as_str()).field("position", position as f64), false)
            .map_err(|err| TestCaseError::fail(err.to_string()))?;
    }
    let expected = before.iter().chain(&names).cloned().collect::<Vec<_>>();
    prop_assert_eq!(context.bound_names(), expected.as_slice());

    for name in &names {
        let result = context.bind_capability(&Capability::new(name.as_str()), false);
        prop_assert!(matches!(result, Err(Error::DuplicateName(_))));
    }
    prop_assert_eq!(context.bound_names(), expected.as_slice());

    let last = names.last().cloned().unwrap_or_default();
    context
        .bind_capability(&Capability::new(last.as_str()).field("position", -1.0), true)
        .map_err(|err| TestCaseError::fail(err.to_string()))?;
    let value = context
        .evaluate(&format!("{last}.position"))
        .map_err(|err| TestCaseError::fail(err.to_string()))?;
    prop_assert_eq!(value, HostValue::Number(-1.0));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: binding_cases(),
        .. ProptestConfig::default()
    })]

    #[test]
    fn distinct_bindings_keep_call_order_and_reject_repeats(names in global_names()) {
        check_distinct_names_bind_in_order(names.into_iter().collect())?;
    }
}
