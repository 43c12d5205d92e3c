#![forbid(unsafe_code)]

use std::sync::Arc;

use quell_core::{LifecycleEvent, Unstructured};
use quell_predicate::{DependentPredicate, Predicate, PredicateConfig, RecordingSink};
use serde_json::json;

fn obj(i: usize, replicas: usize, rv: usize) -> Unstructured {
    Unstructured::new(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": format!("d-{i}"), "namespace": "ns", "resourceVersion": rv.to_string() },
        "spec": { "replicas": replicas },
        "status": { "observed": rv }
    }))
}

fn event(i: usize) -> LifecycleEvent<Unstructured> {
    match i % 5 {
        0 => LifecycleEvent::Created(obj(i, 1, i)),
        1 => LifecycleEvent::Deleted(obj(i, 1, i)),
        2 => LifecycleEvent::Generic(obj(i, 1, i)),
        3 => LifecycleEvent::Updated { old: obj(i, 1, i), new: obj(i, 1, i + 1) },
        _ => LifecycleEvent::Updated { old: obj(i, 1, i), new: obj(i, 2, i + 1) },
    }
}

fn expected(i: usize) -> bool {
    matches!(i % 5, 1 | 4)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_predicate_is_consistent_across_tasks() {
    let sink = Arc::new(RecordingSink::new());
    let pred = Arc::new(DependentPredicate::with_sink(&PredicateConfig::default(), Arc::clone(&sink)));

    let mut handles = Vec::new();
    for t in 0..8usize {
        let pred = Arc::clone(&pred);
        handles.push(tokio::spawn(async move {
            let mut out = Vec::new();
            for i in (t..200).step_by(8) {
                out.push((i, pred.evaluate(&event(i))));
            }
            out
        }));
    }

    let mut seen = 0usize;
    for h in handles {
        for (i, admit) in h.await.expect("task panicked") {
            assert_eq!(admit, expected(i), "event {i}");
            seen += 1;
        }
    }
    assert_eq!(seen, 200);

    // create/delete/generic and admitted updates trace once each; suppressed updates do not
    let traced = (0..200usize).filter(|i| i % 5 != 3).count();
    assert_eq!(sink.len(), traced);
}

#[test]
fn threads_agree_with_sequential_evaluation() {
    let pred = DependentPredicate::with_sink(&PredicateConfig::default(), RecordingSink::new());
    let sequential: Vec<bool> = (0..100).map(|i| pred.evaluate(&event(i))).collect();

    let parallel: Vec<Vec<bool>> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..4)
            .map(|_| s.spawn(|| (0..100).map(|i| pred.evaluate(&event(i))).collect::<Vec<bool>>()))
            .collect();
        workers.into_iter().map(|w| w.join().expect("worker panicked")).collect()
    });

    for run in parallel {
        assert_eq!(run, sequential);
    }
}
