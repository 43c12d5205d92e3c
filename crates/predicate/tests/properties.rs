#![forbid(unsafe_code)]

use proptest::prelude::*;
use quell_core::Unstructured;
use quell_predicate::{DependentPredicate, NullSink, Predicate, PredicateConfig};
use serde_json::{json, Value as Json};

fn predicate() -> DependentPredicate<NullSink> {
    DependentPredicate::with_sink(&PredicateConfig::default(), NullSink)
}

/// Arbitrary tree-shaped value: scalars, sequences and maps.
fn arb_json() -> impl Strategy<Value = Json> {
    let leaf = prop_oneof![
        Just(Json::Null),
        any::<bool>().prop_map(Json::Bool),
        any::<i64>().prop_map(|n| Json::from(n)),
        "[a-z0-9]{0,8}".prop_map(Json::String),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Json::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Json::Object(m.into_iter().collect())),
        ]
    })
}

/// Object with identity, labels, spec, optional status and a resourceVersion.
fn arb_object() -> impl Strategy<Value = Json> {
    (
        "[a-z]{1,10}",
        proptest::option::of("[a-z]{1,10}"),
        prop::collection::btree_map("[a-z]{1,5}", "[a-z0-9]{0,5}", 0..3),
        arb_json(),
        proptest::option::of(arb_json()),
        "[0-9]{1,6}",
    )
        .prop_map(|(name, namespace, labels, spec, status, rv)| {
            let mut obj = json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": { "name": name, "labels": labels, "resourceVersion": rv },
                "spec": spec,
            });
            if let Some(ns) = namespace {
                obj["metadata"]["namespace"] = json!(ns);
            }
            if let Some(status) = status {
                obj["status"] = status;
            }
            obj
        })
}

fn with_status(obj: &Json, status: Option<Json>) -> Json {
    let mut out = obj.clone();
    if let Some(map) = out.as_object_mut() {
        match status {
            Some(s) => {
                map.insert("status".into(), s);
            }
            None => {
                map.remove("status");
            }
        }
    }
    out
}

fn with_rv(obj: &Json, rv: &str) -> Json {
    let mut out = obj.clone();
    out["metadata"]["resourceVersion"] = json!(rv);
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn create_and_generic_are_always_suppressed(obj in arb_object()) {
        let o = Unstructured::new(obj);
        prop_assert!(!predicate().create(&o));
        prop_assert!(!predicate().generic(&o));
    }

    #[test]
    fn delete_is_always_admitted(obj in arb_object()) {
        prop_assert!(predicate().delete(&Unstructured::new(obj)));
    }

    #[test]
    fn identical_update_is_suppressed(obj in arb_object()) {
        let o = Unstructured::new(obj);
        prop_assert!(!predicate().update(&o, &o));
    }

    #[test]
    fn status_only_change_is_suppressed(obj in arb_object(), status in proptest::option::of(arb_json())) {
        let old = Unstructured::new(obj.clone());
        let new = Unstructured::new(with_status(&obj, status));
        prop_assert!(!predicate().update(&old, &new));
    }

    #[test]
    fn version_only_change_is_suppressed(obj in arb_object(), rv in "[0-9]{1,6}") {
        let old = Unstructured::new(obj.clone());
        let new = Unstructured::new(with_rv(&obj, &rv));
        prop_assert!(!predicate().update(&old, &new));
    }

    #[test]
    fn spec_change_is_admitted_even_with_status_churn(obj in arb_object(), status in arb_json()) {
        let mut changed = with_status(&obj, Some(status));
        changed["spec"] = json!({ "wrapped": obj["spec"].clone() });
        let old = Unstructured::new(obj);
        let new = Unstructured::new(changed);
        prop_assert!(predicate().update(&old, &new));
    }

    #[test]
    fn update_leaves_inputs_untouched(a in arb_object(), b in arb_object()) {
        let old = Unstructured::new(a.clone());
        let new = Unstructured::new(b.clone());
        let first = predicate().update(&old, &new);
        prop_assert_eq!(old.document().as_value(), &a);
        prop_assert_eq!(new.document().as_value(), &b);
        // same input, same answer
        prop_assert_eq!(first, predicate().update(&old, &new));
    }
}
