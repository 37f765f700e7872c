//! Store-backed lifecycle flows through the public API.

use std::collections::BTreeSet;
use std::fs;

use sdd_core::gate::{self, CheckSpec, CheckStatus, GateConfig, Signals};
use sdd_core::graph::deps::insert_item;
use sdd_core::lifecycle::{self, branch::GitFacts, branch::GitWorkflow};
use sdd_core::model::{Priority, SessionOutcome, Status, WorkItem, WorkItemType};
use sdd_core::{SddError, WorkItemStore};

fn create(store: &WorkItemStore, id: &str, deps: &[&str]) {
    store
        .mutate(|items, now| {
            let item = WorkItem::new(id, WorkItemType::Feature, id, Priority::High, now);
            let deps: BTreeSet<String> = deps.iter().map(|d| (*d).to_string()).collect();
            insert_item(items, item, deps)
        })
        .unwrap();
}

fn three_checks() -> GateConfig {
    GateConfig::with_checks(vec![
        CheckSpec::required("tests"),
        CheckSpec::required("lint"),
        CheckSpec::optional("coverage"),
    ])
}

#[test]
fn required_failure_keeps_item_in_progress() {
    let dir = tempfile::tempdir().unwrap();
    let store = WorkItemStore::init(dir.path()).unwrap();
    create(&store, "feature_login", &[]);
    store
        .mutate(|items, now| lifecycle::begin_session(items, "feature_login", now))
        .unwrap();

    let signals: Signals = [
        ("tests".to_string(), CheckStatus::Pass),
        ("lint".to_string(), CheckStatus::Fail),
        ("coverage".to_string(), CheckStatus::Pass),
    ]
    .into_iter()
    .collect();
    let verdict = gate::evaluate(&three_checks(), &signals);
    assert!(!verdict.passed);
    assert_eq!(verdict.failing_names(), ["lint"]);

    let before = fs::read(store.store_path()).unwrap();
    let ended = store
        .mutate(|items, now| lifecycle::end_session(items, "feature_login", &verdict, Some(true), now))
        .unwrap();
    assert_eq!(ended.status, Status::InProgress);
    assert_eq!(fs::read(store.store_path()).unwrap(), before);

    let file = store.load().unwrap();
    assert_eq!(file.work_items["feature_login"].status(), Status::InProgress);
    assert!(file.work_items["feature_login"].active_session().is_some());
}

#[test]
fn full_flow_completes_and_persists_history() {
    let dir = tempfile::tempdir().unwrap();
    let store = WorkItemStore::init(dir.path()).unwrap();
    create(&store, "a", &[]);
    create(&store, "b", &["a"]);

    let all_pass: Signals = [
        ("tests".to_string(), CheckStatus::Pass),
        ("lint".to_string(), CheckStatus::Pass),
    ]
    .into_iter()
    .collect();
    let verdict = gate::evaluate(&three_checks(), &all_pass);

    store
        .mutate(|items, now| {
            lifecycle::begin_session(items, "a", now)?;
            lifecycle::observe_branch(
                items,
                "a",
                &GitFacts {
                    ahead: 1,
                    commits: vec!["0a1b2c".into()],
                    ..GitFacts::default()
                },
                GitWorkflow::LocalMerge,
                now,
            )?;
            lifecycle::end_session(items, "a", &verdict, Some(true), now)
        })
        .unwrap();

    let err = store
        .mutate(|items, now| lifecycle::end_session(items, "b", &verdict, Some(true), now))
        .unwrap_err();
    assert!(matches!(err, SddError::InvalidTransition { .. }));

    store
        .mutate(|items, now| lifecycle::begin_session(items, "b", now))
        .unwrap();

    let file = store.load().unwrap();
    let a = &file.work_items["a"];
    assert_eq!(a.status(), Status::Completed);
    assert_eq!(a.sessions()[0].outcome, Some(SessionOutcome::Completed));
    assert_eq!(a.git().commits()[0].sha, "0a1b2c");
    assert_eq!(file.metadata.completed, 1);
    assert_eq!(file.metadata.in_progress, 1);
    assert!(file.metadata.matches(&file.work_items));
}

#[test]
fn concurrent_writers_serialize_through_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let store = WorkItemStore::init(dir.path()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..5 {
                    create(&store, &format!("item_{t}_{i}"), &[]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let file = store.load().unwrap();
    assert_eq!(file.work_items.len(), 20);
    assert_eq!(file.metadata.total_items, 20);
}
