//! Unit tests for host containers.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rstest::{fixture, rstest};
use serde_json::json;
use statebridge_diff::Value;
use statebridge_protocol::{Action, PathSpec};

use crate::path::{self, ParsedPath, SelectorCall, StorePath};
use crate::{
    Container, Filter, Handlers, HostContainer, HostError, ReducerStore, Responder, Selector,
    Store, Subscription,
};


type Seen = Rc<RefCell<Vec<Option<Value>>>>;

pub(super) fn profile() -> Value {
    Value::from(json!({
        "name": "ExampleName",
        "age": 20,
        "locale": {"city": "Wuhan", "delay": 1}
    }))
}

pub(super) fn profile_store() -> ReducerStore {
    let initial = profile();
    let reset = initial.clone();
    Handlers::new()
        .on("SET_NAME", |state, name| state.set_in(&["name"], name.clone()))
        .on("SET_AGE", |state, age| state.set_in(&["age"], age.clone()))
        .on("SET_CITY", |state, city| {
            state.set_in(&["locale", "city"], city.clone())
        })
        .on("SET_DELAY", |state, delay| {
            state.set_in(&["locale", "delay"], delay.clone())
        })
        .on("SET_IDENTITY", |state, identity| {
            let named = state.set_in(&["name"], identity.get("name").cloned().unwrap_or_default());
            named.set_in(&["age"], identity.get("age").cloned().unwrap_or_default())
        })
        .on("RESET", move |_, _| reset.clone())
        .into_store(initial)
}

pub(super) fn recorder() -> (Seen, impl Fn(Option<&Value>) + 'static) {
    let seen: Seen = Rc::default();
    let sink = Rc::clone(&seen);
    (seen, move |value: Option<&Value>| {
        sink.borrow_mut().push(value.cloned());
    })
}

pub(super) fn some(raw: serde_json::Value) -> Option<Value> {
    Some(Value::from(raw))
}

#[fixture]
fn host() -> HostContainer {
    HostContainer::single("main", profile_store())
}

#[fixture]
fn multi_host() -> HostContainer {
    HostContainer::builder()
        .store("storeA", profile_store())
        .store("storeB", profile_store())
        .build()
        .expect("build host")
}

// ----------------------------------------------------------------------------
// Paths
// ----------------------------------------------------------------------------

fn store_path(store: Option<&str>, segments: &[&str]) -> ParsedPath {
    ParsedPath::Store(StorePath {
        store: store.map(str::to_owned),
        segments: segments.iter().map(|segment| (*segment).to_owned()).collect(),
    })
}

#[rstest]
#[case("age", store_path(None, &["age"]))]
#[case("main#locale.city", store_path(Some("main"), &["locale", "city"]))]
#[case("#locale", store_path(None, &["locale"]))]
#[case("#", store_path(None, &[]))]
#[case("storeA#", store_path(Some("storeA"), &[]))]
fn parses_store_paths(#[case] text: &str, #[case] expected: ParsedPath) {
    assert_eq!(path::parse(text).expect("parse"), expected);
}

#[rstest]
#[case(r#"$describe("-")"#, "describe", vec![Value::from("-")], vec![])]
#[case("$count()", "count", vec![], vec![])]
#[case(r#"$pick(1, [2, 3], {"k": ")"}).a.b"#, "pick", vec![
    Value::from(1),
    Value::from(json!([2, 3])),
    Value::from(json!({"k": ")"})),
], vec!["a", "b"])]
fn parses_selector_calls(
    #[case] text: &str,
    #[case] name: &str,
    #[case] args: Vec<Value>,
    #[case] segments: Vec<&str>,
) {
    let expected = ParsedPath::Selector(SelectorCall {
        name: name.to_owned(),
        args,
        segments: segments.into_iter().map(str::to_owned).collect(),
    });
    assert_eq!(path::parse(text).expect("parse"), expected);
}

#[rstest]
#[case("$")]
#[case("$(1)")]
#[case("$name")]
#[case("$name(1")]
#[case("$name(1)x")]
#[case("$name(1).")]
fn rejects_malformed_selectors(#[case] text: &str) {
    let result = path::parse(text);
    assert!(
        matches!(result, Err(HostError::SelectorSyntax { .. })),
        "expected a syntax error, got {result:?}"
    );
}

#[test]
fn rejects_selector_arguments_that_are_not_json() {
    let result = path::parse("$name(bare words)");
    assert!(
        matches!(&result, Err(HostError::SelectorArgs { args, .. }) if args == "bare words"),
        "expected an argument error, got {result:?}"
    );
}

// ----------------------------------------------------------------------------
// Stores
// ----------------------------------------------------------------------------

#[test]
fn reducer_store_notifies_every_dispatch_until_unsubscribed() {
    let store = profile_store();
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let subscription = store.subscribe(Rc::new(move || counter.set(counter.get() + 1)));

    store.dispatch(&Action::new("SET_AGE", 21));
    store.dispatch(&Action::bare("UNKNOWN"));
    assert_eq!(calls.get(), 2);

    subscription.unsubscribe();
    store.dispatch(&Action::new("SET_AGE", 22));
    assert_eq!(calls.get(), 2);
    assert_eq!(store.subscriber_count(), 0);
}

#[test]
fn unknown_actions_keep_state_identity() {
    let store = profile_store();
    let before = store.state();
    store.dispatch(&Action::bare("UNKNOWN"));
    assert!(store.state().is_identical(&before));
}

#[test]
fn persistent_collections_seed_stores() {
    let mut people = im::HashMap::new();
    people.insert("jack".to_owned(), 20);
    let seeded = Value::from_serialize(&people).expect("normalise");
    let store = Handlers::new().into_store(seeded);
    assert_eq!(store.state(), Value::from(json!({"jack": 20})));
}

#[test]
fn subscription_teardown_runs_once() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let subscription = Subscription::new(move || counter.set(counter.get() + 1));
    let clone = subscription.clone();

    assert!(subscription.is_active());
    subscription.unsubscribe();
    clone.unsubscribe();
    assert_eq!(calls.get(), 1);
    assert!(!clone.is_active());
    assert!(!Subscription::inactive().is_active());
}

// ----------------------------------------------------------------------------
// Observation
// ----------------------------------------------------------------------------

#[rstest]
fn observe_delivers_immediately_then_on_change(host: HostContainer) {
    let (seen, listener) = recorder();
    let _subscription = host.observe("locale.city", listener).expect("observe");

    host.dispatch(&Action::new("SET_CITY", "Shanghai")).expect("dispatch");
    host.dispatch(&Action::new("SET_DELAY", 2)).expect("dispatch");

    assert_eq!(*seen.borrow(), [some(json!("Wuhan")), some(json!("Shanghai"))]);
}

#[rstest]
fn missing_segments_observe_as_absent(host: HostContainer) {
    let (seen, listener) = recorder();
    let _subscription = host.observe("main#avatar.url", listener).expect("observe");
    assert_eq!(*seen.borrow(), [None]);
}

#[rstest]
fn combined_observation_fires_once_per_transition(host: HostContainer) {
    let (seen, listener) = recorder();
    let paths = PathSpec::combined([("name", "#name"), ("age", "#age")]);
    let _subscription = host.observe(paths, listener).expect("observe");

    host.dispatch(&Action::new(
        "SET_IDENTITY",
        Value::from(json!({"name": "Grown", "age": 21})),
    ))
    .expect("dispatch");

    assert_eq!(
        *seen.borrow(),
        [
            some(json!({"name": "ExampleName", "age": 20})),
            some(json!({"name": "Grown", "age": 21})),
        ]
    );
}

#[rstest]
fn combined_observation_reports_absent_members_as_null(host: HostContainer) {
    let (seen, listener) = recorder();
    let paths = PathSpec::combined([("avatar", "#avatar")]);
    let _subscription = host.observe(paths, listener).expect("observe");
    assert_eq!(*seen.borrow(), [some(json!({"avatar": null}))]);
}

#[rstest]
fn unsubscribe_is_terminal(host: HostContainer) {
    let (seen, listener) = recorder();
    let subscription = host.observe("age", listener).expect("observe");
    assert_eq!(host.observable_count(), 1);

    subscription.unsubscribe();
    subscription.unsubscribe();
    host.dispatch(&Action::new("SET_AGE", 21)).expect("dispatch");

    assert_eq!(*seen.borrow(), [some(json!(20))]);
    assert_eq!(host.observable_count(), 0);
}

#[rstest]
fn listener_removed_mid_pass_never_fires(host: HostContainer) {
    let later: Rc<RefCell<Option<Subscription>>> = Rc::default();
    let handle = Rc::clone(&later);
    let _first = host
        .observe("age", move |_: Option<&Value>| {
            if let Some(subscription) = handle.borrow().as_ref() {
                subscription.unsubscribe();
            }
        })
        .expect("observe first");
    let (seen, listener) = recorder();
    *later.borrow_mut() = Some(host.observe("age", listener).expect("observe second"));

    host.dispatch(&Action::new("SET_AGE", 21)).expect("dispatch");
    assert_eq!(*seen.borrow(), [some(json!(20))]);
}

#[rstest]
fn listeners_may_dispatch_reentrantly(host: HostContainer) {
    let nested = host.clone();
    let _subscription = host
        .observe("age", move |age: Option<&Value>| {
            if age.and_then(Value::as_i64) == Some(21) {
                nested
                    .dispatch(&Action::new("SET_NAME", "Grown"))
                    .expect("nested dispatch");
            }
        })
        .expect("observe");

    host.dispatch(&Action::new("SET_AGE", 21)).expect("dispatch");
    assert_eq!(host.get_state("name").expect("read"), some(json!("Grown")));
}

#[rstest]
fn nested_dispatches_deliver_in_store_order(host: HostContainer) {
    let nested = host.clone();
    let _age = host
        .observe("age", move |age: Option<&Value>| {
            if age.and_then(Value::as_i64) == Some(21) {
                nested
                    .dispatch(&Action::new("SET_NAME", "Grown"))
                    .expect("nested dispatch");
            }
        })
        .expect("observe age");
    let (names, listener) = recorder();
    let _name = host.observe("name", listener).expect("observe name");

    host.dispatch(&Action::new(
        "SET_IDENTITY",
        Value::from(json!({"name": "X", "age": 21})),
    ))
    .expect("dispatch");

    assert_eq!(
        *names.borrow(),
        [some(json!("ExampleName")), some(json!("X")), some(json!("Grown"))]
    );
    assert_eq!(names.borrow().last().cloned().flatten(), host.get_state("name").expect("read"));
}

#[rstest]
fn dispatch_without_observers_updates_state(host: HostContainer) {
    host.dispatch(&Action::new("SET_AGE", 21).with_store("main"))
        .expect("dispatch");
    assert_eq!(host.get_state("main#age").expect("read"), some(json!(21)));
    assert_eq!(host.state().expect("state").get("age"), Some(&Value::from(21)));
}

#[rstest]
fn get_state_reads_combined_paths(host: HostContainer) {
    let paths = PathSpec::combined([("city", "#locale.city"), ("missing", "#avatar")]);
    assert_eq!(
        host.get_state(paths).expect("read"),
        some(json!({"city": "Wuhan", "missing": null}))
    );
}

// ----------------------------------------------------------------------------
// Store resolution
// ----------------------------------------------------------------------------

#[rstest]
fn unknown_stores_are_named(multi_host: HostContainer) {
    let error = multi_host.get_state("storeX#a").expect_err("unknown store");
    assert_eq!(error, HostError::store_not_found("storeX"));
    assert!(error.to_string().contains("storeX"));

    let dispatched = multi_host.dispatch(&Action::bare("RESET").with_store("storeX"));
    assert_eq!(dispatched, Err(HostError::store_not_found("storeX")));

    let observed = multi_host.observe("storeX#age", |_: Option<&Value>| {});
    assert!(matches!(observed, Err(HostError::StoreNotFound { store }) if store == "storeX"));
}

#[rstest]
fn default_store_is_required_without_a_key(multi_host: HostContainer) {
    assert_eq!(multi_host.get_state("age"), Err(HostError::NoDefaultStore));
    assert_eq!(
        multi_host.dispatch(&Action::bare("RESET")),
        Err(HostError::NoDefaultStore)
    );
    let watched = multi_host.watch("SET_AGE", |_, _| {});
    assert!(matches!(watched, Err(HostError::NoDefaultStore)));
    assert_eq!(
        multi_host.get_state("storeB#age").expect("read"),
        some(json!(20))
    );
}

#[test]
fn builder_rejects_an_unknown_default_store() {
    let result = HostContainer::builder()
        .store("storeA", profile_store())
        .default_store("storeB")
        .build();
    assert!(matches!(result, Err(HostError::StoreNotFound { store }) if store == "storeB"));
}

// ----------------------------------------------------------------------------
// Selectors
// ----------------------------------------------------------------------------

fn describe_selector() -> Selector {
    Selector::new(|reader, args| {
        let state = reader.state(Some("storeA"))?;
        let name = state.get("name")?.as_str()?.to_owned();
        let age = state.get("age")?.as_i64()?;
        let separator = args.first().and_then(Value::as_str).unwrap_or(" ");
        Some(Value::from(format!("{name}{separator}{age}")))
    })
    .with_affected(["storeA#age", "storeA#name"])
}

#[rstest]
fn selector_observation_dedups_by_value(multi_host: HostContainer) {
    multi_host
        .define_selectors([("computedDescribe", describe_selector())])
        .expect("define");
    let (seen, listener) = recorder();
    let _subscription = multi_host
        .observe(r#"$computedDescribe("-")"#, listener)
        .expect("observe");

    let age = |value: i32| Action::new("SET_AGE", value).with_store("storeA");
    multi_host.dispatch(&age(21)).expect("dispatch");
    multi_host.dispatch(&age(21)).expect("dispatch");
    multi_host
        .dispatch(&Action::new("SET_CITY", "Shanghai").with_store("storeA"))
        .expect("dispatch");

    assert_eq!(
        *seen.borrow(),
        [some(json!("ExampleName-20")), some(json!("ExampleName-21"))]
    );
}

#[rstest]
fn selectors_without_affected_paths_watch_every_store(multi_host: HostContainer) {
    let cities = Selector::new(|reader, _| {
        let first = reader.get("storeA#locale.city")?;
        let second = reader.get("storeB#locale.city")?;
        Some(Value::array([first, second]))
    });
    multi_host
        .define_selectors([("cities", cities)])
        .expect("define");
    let (seen, listener) = recorder();
    let _subscription = multi_host.observe("$cities().1", listener).expect("observe");

    multi_host
        .dispatch(&Action::new("SET_AGE", 30).with_store("storeB"))
        .expect("dispatch");
    multi_host
        .dispatch(&Action::new("SET_CITY", "Shanghai").with_store("storeB"))
        .expect("dispatch");

    assert_eq!(*seen.borrow(), [some(json!("Wuhan")), some(json!("Shanghai"))]);
}

#[rstest]
fn get_state_evaluates_selectors(multi_host: HostContainer) {
    multi_host
        .define_selectors([("computedDescribe", describe_selector())])
        .expect("define");
    assert_eq!(
        multi_host
            .get_state(r#"$computedDescribe(":")"#)
            .expect("read"),
        some(json!("ExampleName:20"))
    );
}

#[rstest]
fn unknown_selectors_are_rejected(host: HostContainer) {
    let result = host.observe("$nothing()", |_: Option<&Value>| {});
    assert!(matches!(result, Err(HostError::SelectorNotRegistered { name }) if name == "nothing"));
    assert_eq!(host.observable_count(), 0);
}

// ----------------------------------------------------------------------------
// Watchers
// ----------------------------------------------------------------------------

#[rstest]
fn watchers_run_before_the_store_transition(host: HostContainer) {
    let reader = host.clone();
    let seen: Rc<RefCell<Vec<(Value, Option<Value>)>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let _watch = host
        .watch("SET_AGE", move |payload, _| {
            let age = reader.get_state("age").expect("read age");
            sink.borrow_mut().push((payload.clone(), age));
        })
        .expect("watch");

    host.dispatch(&Action::new("SET_AGE", 30)).expect("dispatch");
    host.dispatch(&Action::new("SET_NAME", "ignored")).expect("dispatch");

    assert_eq!(*seen.borrow(), [(Value::from(30), some(json!(20)))]);
}

#[rstest]
fn first_watcher_response_wins(host: HostContainer) {
    let _first = host
        .watch("SET_AGE", |_, responder| responder.respond("first"))
        .expect("watch");
    let _second = host
        .watch("SET_AGE", |_, responder| responder.respond("second"))
        .expect("watch");
    let responses: Rc<RefCell<Vec<Value>>> = Rc::default();
    let sink = Rc::clone(&responses);

    host.dispatch_with_response(&Action::new("SET_AGE", 21), move |value| {
        sink.borrow_mut().push(value);
    })
    .expect("dispatch");

    assert_eq!(*responses.borrow(), [Value::from("first")]);
}

#[test]
fn responder_without_sink_ignores_responses() {
    let responder = Responder::discard();
    assert!(!responder.wants_response());
    responder.respond(1);

    let delivered = Rc::new(Cell::new(0));
    let counter = Rc::clone(&delivered);
    let responder = Responder::new(move |_| counter.set(counter.get() + 1));
    let clone = responder.clone();
    responder.respond(1);
    clone.respond(2);
    assert_eq!(delivered.get(), 1);
    assert!(!clone.wants_response());
}

#[test]
fn watchers_only_see_default_store_actions() {
    let host = HostContainer::builder()
        .store("main", profile_store())
        .store("other", profile_store())
        .default_store("main")
        .build()
        .expect("build host");
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let _watch = host
        .watch("SET_AGE", move |_, _| counter.set(counter.get() + 1))
        .expect("watch");

    host.dispatch(&Action::new("SET_AGE", 21).with_store("other"))
        .expect("dispatch");
    host.dispatch(&Action::new("SET_AGE", 22).with_store("main"))
        .expect("dispatch");
    host.dispatch(&Action::new("SET_AGE", 23)).expect("dispatch");

    assert_eq!(calls.get(), 2);
}

#[rstest]
fn dispatch_thunk_runs_synchronously(host: HostContainer) {
    let age = host.dispatch_thunk(|container| {
        container
            .dispatch(&Action::new("SET_AGE", 40))
            .expect("dispatch");
        container.get_state("age").expect("read")
    });
    assert_eq!(age, some(json!(40)));
}

// ----------------------------------------------------------------------------
// Interceptor and teardown
// ----------------------------------------------------------------------------

#[rstest]
fn interceptor_filters_and_removes_its_watches(host: HostContainer) {
    let adults: Filter = Rc::new(|payload: &Value| payload.as_i64().is_some_and(|age| age >= 18));
    let interceptor = host.create_interceptor(Some(adults));
    let seen: Rc<RefCell<Vec<Value>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let _watch = interceptor
        .watch("SET_AGE", move |payload, _| sink.borrow_mut().push(payload.clone()))
        .expect("watch");
    let _other = interceptor.watch("SET_NAME", |_, _| {}).expect("watch");
    assert_eq!(interceptor.active_count(), 2);

    host.dispatch(&Action::new("SET_AGE", 10)).expect("dispatch");
    host.dispatch(&Action::new("SET_AGE", 30)).expect("dispatch");
    interceptor.destroy();
    host.dispatch(&Action::new("SET_AGE", 40)).expect("dispatch");

    assert_eq!(*seen.borrow(), [Value::from(30)]);
    assert_eq!(host.watcher_count(), 0);
    assert_eq!(interceptor.active_count(), 0);
}

#[rstest]
fn unfiltered_interceptor_forwards_everything(host: HostContainer) {
    let interceptor = host.create_interceptor(None);
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let _watch = interceptor
        .watch("SET_AGE", move |_, _| counter.set(counter.get() + 1))
        .expect("watch");
    host.dispatch(&Action::new("SET_AGE", 1)).expect("dispatch");
    host.dispatch(&Action::new("SET_AGE", Value::Null)).expect("dispatch");
    assert_eq!(calls.get(), 2);
}

#[rstest]
fn destroy_detaches_observers_and_watchers(host: HostContainer) {
    let (seen, listener) = recorder();
    let _subscription = host.observe("age", listener).expect("observe");
    let _watch = host.watch("SET_AGE", |_, _| {}).expect("watch");

    host.destroy();
    host.dispatch(&Action::new("SET_AGE", 21)).expect("dispatch");

    assert_eq!(*seen.borrow(), [some(json!(20))]);
    assert_eq!(host.observable_count(), 0);
    assert_eq!(host.watcher_count(), 0);
    assert_eq!(host.get_state("age").expect("read"), some(json!(21)));
}
