//! Unit and behaviour tests for the diff codec.

use rstest::{fixture, rstest};
use serde_json::json;

use crate::{DiffError, MoveRun, Patch, PatchError, PatchOp, Value, apply_patch, diff};


fn value(raw: serde_json::Value) -> Value {
    Value::from(raw)
}

fn encoded(patch: &Patch) -> String {
    serde_json::to_string(patch).expect("encode patch")
}

fn assert_round_trip(lhs: Option<&Value>, rhs: Option<&Value>) {
    let patch = diff(lhs, rhs).expect("diff");
    let rebuilt = apply_patch(lhs, &patch).expect("apply");
    assert_eq!(rebuilt.as_ref(), rhs, "patch {} did not round-trip", encoded(&patch));

    let wire: Patch = serde_json::from_str(&encoded(&patch)).expect("decode patch");
    let over_wire = apply_patch(lhs, &wire).expect("apply decoded");
    assert_eq!(
        over_wire.unwrap_or_default(),
        rhs.cloned().unwrap_or_default()
    );
}

#[fixture]
fn people() -> [Value; 3] {
    [
        value(json!({"name": "jack"})),
        value(json!({"name": "rose"})),
        value(json!({"name": "ming"})),
    ]
}

#[test]
fn identical_values_produce_empty_patch() {
    let state = value(json!({"a": [1, 2, 3]}));
    let patch = diff(Some(&state), Some(&state.clone())).expect("diff");
    assert!(patch.is_empty());
}

#[test]
fn structurally_equal_copies_are_walked_not_skipped() {
    let lhs = value(json!({"a": {"b": 1}}));
    let rhs = value(json!({"a": {"b": 1}}));
    let patch = diff(Some(&lhs), Some(&rhs)).expect("diff");
    assert!(patch.is_empty(), "equal leaves are retained: {}", encoded(&patch));
}

#[rstest]
#[case(json!(1), json!(2), "[[4,2]]")]
#[case(json!({"name": "jack"}), json!("jack"), r#"[[4,"jack"]]"#)]
#[case(json!("jack"), json!({"name": "jack"}), r#"[[4,{"name":"jack"}]]"#)]
#[case(json!({"a": 1}), json!([1]), "[[4,[1]]]")]
fn primitive_and_kind_changes_assign(
    #[case] lhs: serde_json::Value,
    #[case] rhs: serde_json::Value,
    #[case] expected: &str,
) {
    let lhs = value(lhs);
    let rhs = value(rhs);
    let patch = diff(Some(&lhs), Some(&rhs)).expect("diff");
    assert_eq!(encoded(&patch), expected);
    assert_round_trip(Some(&lhs), Some(&rhs));
}

#[test]
fn array_replaced_by_object_is_rejected() {
    let lhs = value(json!([1, 2]));
    let rhs = value(json!({"a": 1}));
    let err = diff(Some(&lhs), Some(&rhs)).expect_err("mismatch");
    assert_eq!(err, DiffError::type_mismatch("object"));
}

#[rstest]
fn single_move(people: [Value; 3]) {
    let [a, b, c] = people;
    let lhs = Value::array([a, b.clone(), c.clone()]);
    let rhs = Value::array([c.clone(), b, c]);
    let patch = diff(Some(&lhs), Some(&rhs)).expect("diff");
    assert_eq!(patch.ops(), [PatchOp::Move(vec![MoveRun::new(0, 2, 1)])]);
    assert_eq!(encoded(&patch), "[[0,0,2,1]]");
    assert_round_trip(Some(&lhs), Some(&rhs));
}

#[rstest]
fn consecutive_moves_merge(people: [Value; 3]) {
    let [a, b, c] = people;
    let lhs = Value::array([a, b.clone(), c.clone()]);
    let rhs = Value::array([b, c.clone(), c]);
    let patch = diff(Some(&lhs), Some(&rhs)).expect("diff");
    assert_eq!(patch.ops(), [PatchOp::Move(vec![MoveRun::new(0, 1, 2)])]);
    assert_round_trip(Some(&lhs), Some(&rhs));
}

#[rstest]
fn appended_elements_merge_into_one_add(people: [Value; 3]) {
    let lhs = Value::array(people.clone());
    let mut items = people.to_vec();
    items.extend([Value::from(1), Value::from(2)]);
    let rhs = Value::from(items);
    let patch = diff(Some(&lhs), Some(&rhs)).expect("diff");
    assert_eq!(encoded(&patch), "[[1,3,[[4,1]],[[4,2]]]]");
    assert_round_trip(Some(&lhs), Some(&rhs));
}

#[rstest]
fn shortened_array_truncates(people: [Value; 3]) {
    let [a, b, c] = people;
    let lhs = Value::array([a.clone(), b.clone(), c]);
    let rhs = Value::array([a, b]);
    let patch = diff(Some(&lhs), Some(&rhs)).expect("diff");
    assert_eq!(patch.ops(), [PatchOp::Truncate(2)]);
}

#[rstest]
fn mixed_array_edits_round_trip(people: [Value; 3]) {
    let [a, b, c] = people;
    let lhs = Value::array([a.clone(), b.clone(), c.clone(), a.clone(), b.clone(), c.clone()]);
    let rhs = Value::array([Value::from(1), a, b.clone(), Value::from(2), c]);
    assert_round_trip(Some(&lhs), Some(&rhs));

    let replaced = Value::array([
        value(json!({"name": "uzi"})),
        value(json!({"age": 20})),
        b,
    ]);
    assert_round_trip(Some(&lhs), Some(&replaced));
}

#[rstest]
#[case(json!({"name": "jack", "age": 20, "avatar": "..."}), json!({"name": "jack"}), r#"[[5,"name"]]"#)]
#[case(json!({"name": "jack", "age": 20, "avatar": "..."}), json!({"name": "jack", "age": 20}), r#"[[6,"avatar"]]"#)]
#[case(json!({"a": 1, "b": 2}), json!({"c": 3}), r#"[[5],[4,{"c":3}]]"#)]
fn deletions_pick_the_shorter_key_list(
    #[case] lhs: serde_json::Value,
    #[case] rhs: serde_json::Value,
    #[case] expected: &str,
) {
    let lhs = value(lhs);
    let rhs = value(rhs);
    let patch = diff(Some(&lhs), Some(&rhs)).expect("diff");
    assert_eq!(encoded(&patch), expected);
    assert_round_trip(Some(&lhs), Some(&rhs));
}

#[test]
fn full_replacement_of_a_child_is_hoisted() {
    let lhs = value(json!({"a": {"b": 1}}));
    let rhs = value(json!({"a": {"b": 2}}));
    let patch = diff(Some(&lhs), Some(&rhs)).expect("diff");
    assert_eq!(encoded(&patch), r#"[[4,{"a":{"b":2}}]]"#);
    assert_round_trip(Some(&lhs), Some(&rhs));
}

#[test]
fn partial_child_merge_stays_nested() {
    let lhs = value(json!({"locale": {"city": "Wuhan", "delay": 1}}));
    let rhs = lhs.set_in(&["locale", "city"], Value::from("Shanghai"));
    let patch = diff(Some(&lhs), Some(&rhs)).expect("diff");
    assert_eq!(
        encoded(&patch),
        r#"[[3,{"locale":[[4,{"city":"Shanghai"}]]}]]"#
    );
    let rebuilt = apply_patch(Some(&lhs), &patch).expect("apply");
    assert_eq!(
        rebuilt.and_then(|v| v.get_in(&["locale", "delay"]).cloned()),
        Some(Value::from(1))
    );
}

#[test]
fn nested_structural_edits_use_keys() {
    let lhs = value(json!({"a": {"b": 1, "c": 0}}));
    let rhs = value(json!({"a": {"b": 2}}));
    let patch = diff(Some(&lhs), Some(&rhs)).expect("diff");
    assert_eq!(encoded(&patch), r#"[[3,{"a":[[5],[4,{"b":2}]]}]]"#);
    assert_round_trip(Some(&lhs), Some(&rhs));
}

#[rstest]
#[case(None, None)]
#[case(None, Some(json!({"a": 1})))]
#[case(Some(json!({"a": 1})), None)]
#[case(Some(json!(null)), Some(json!([1, 2])))]
#[case(
    Some(json!({"a": {"b": {"say": "hello world"}, "c": 0}, "b": {"a": "uzi", "b": false}, "c": "jack"})),
    Some(json!({"a": {"c": 100}, "c": "???", "d": "what?"}))
)]
#[case(
    Some(json!({"a": [{"name": "jack"}], "b": {"c": "hello world"}})),
    Some(json!({"a": [{"name": "uzi"}, {"age": 20}], "b": {"c": {"d": 1}}}))
)]
fn round_trips(#[case] lhs: Option<serde_json::Value>, #[case] rhs: Option<serde_json::Value>) {
    let lhs = lhs.map(value);
    let rhs = rhs.map(value);
    assert_round_trip(lhs.as_ref(), rhs.as_ref());
}

#[test]
fn unchanged_siblings_keep_identity_through_apply() {
    let lhs = value(json!({"name": "x", "locale": {"city": "Wuhan"}}));
    let rhs = lhs.set_in(&["name"], Value::from("y"));
    let patch = diff(Some(&lhs), Some(&rhs)).expect("diff");
    let rebuilt = apply_patch(Some(&lhs), &patch)
        .expect("apply")
        .expect("present");
    let before = lhs.get("locale").expect("locale");
    let after = rebuilt.get("locale").expect("locale");
    assert!(before.is_identical(after));
    assert!(!rebuilt.is_identical(&lhs));
}

#[test]
fn persistent_collections_normalise() {
    let list: im::Vector<i64> = im::vector![3, 1, 2];
    let mut map: im::HashMap<String, i64> = im::HashMap::new();
    map.insert("k".to_owned(), 7);

    assert_eq!(
        Value::from_serialize(&list).expect("vector"),
        value(json!([3, 1, 2]))
    );
    assert_eq!(
        Value::from_serialize(&map).expect("map"),
        value(json!({"k": 7}))
    );
}

#[test]
fn removal_travels_as_a_null_assignment() {
    let lhs = value(json!("ExampleName"));
    let patch = diff(Some(&lhs), None).expect("diff");
    assert_eq!(patch, Patch::assign(None));
    assert_eq!(encoded(&patch), "[[4,null]]");

    let decoded: Patch = serde_json::from_str("[[4,null]]").expect("decode");
    assert_eq!(
        apply_patch(Some(&lhs), &decoded).expect("apply"),
        Some(Value::Null)
    );
}

#[rstest]
#[case("[[9]]", PatchError::UnknownOp { tag: 9 })]
#[case("[[0,1,2]]", PatchError::malformed("move arguments are not triples"))]
#[case("[[2]]", PatchError::malformed("truncate expects one length"))]
#[case("{}", PatchError::malformed("patch is not an array"))]
fn malformed_wire_patches_are_rejected(#[case] raw: &str, #[case] expected: PatchError) {
    let json: serde_json::Value = serde_json::from_str(raw).expect("json");
    assert_eq!(Patch::from_json(&json), Err(expected));
}

#[test]
fn move_past_the_source_fails() {
    let lhs = value(json!([1]));
    let patch = Patch::from(vec![PatchOp::Move(vec![MoveRun::new(0, 4, 1)])]);
    assert_eq!(
        apply_patch(Some(&lhs), &patch),
        Err(PatchError::move_out_of_range(4, 1))
    );
}

#[test]
fn assign_merge_requires_an_object() {
    let lhs = value(json!({"a": 1}));
    let patch = Patch::from(vec![
        PatchOp::Delete(vec!["a".to_owned()]),
        PatchOp::Assign(Some(Value::from(3))),
    ]);
    assert_eq!(
        apply_patch(Some(&lhs), &patch),
        Err(PatchError::not_an_object("number"))
    );
}

#[test]
fn set_and_remove_rebuild_only_the_path() {
    let state = value(json!({"a": {"b": 1}, "c": [1, 2]}));
    let updated = state.set_in(&["c", "3"], Value::from(9));
    assert_eq!(updated.get("c"), Some(&value(json!([1, 2, null, 9]))));
    assert!(updated.get("a").expect("a").is_identical(state.get("a").expect("a")));

    let removed = state.remove_in(&["a", "b"]);
    assert_eq!(removed, value(json!({"a": {}, "c": [1, 2]})));
    assert!(state.remove_in(&["missing"]).is_identical(&state));
}
