//! End-to-end onboarding lifecycle against the JSON file store.

use std::cell::Cell;
use std::fs;
use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};
use process_tracker::{
    DocumentStore, JsonFileStore, ProcessKind, ProcessService, ProcessStatus, StoreConfig,
    TemplateRepair, TemplateState,
};

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, day, 9, 0, 0).unwrap()
}

const SETTINGS: &str = r#"{
  "stages": [
    {"id": "paperwork", "title": "Paperwork", "icon": "file",
     "tasks": [
       {"id": "contract", "title": "Sign contract", "policyId": "pol-contract"},
       {"id": "nda", "title": "Sign NDA"}
     ]},
    {"id": "equipment", "title": "Equipment",
     "tasks": [
       {"id": "laptop", "title": "Collect laptop"},
       {"title": "Collect badge"}
     ]},
    {"id": "engineering", "title": "Engineering setup",
     "tasks": [{"id": "repo-access", "title": "Repository access"}]}
  ]
}"#;

#[test]
fn test_onboarding_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path());
    fs::write(config.template_path(ProcessKind::Onboarding), SETTINGS).unwrap();
    fs::write(
        config.position_path("designer"),
        r#"{"id":"designer","allowedTaskIds":["contract","nda","laptop","equipment-task-2"]}"#,
    )
    .unwrap();

    let completions = Rc::new(Cell::new(0));
    let counter = Rc::clone(&completions);
    let mut service = ProcessService::new(JsonFileStore::open(config).unwrap());
    service.subscribe(move |_: ProcessKind, _: &str| counter.set(counter.get() + 1));

    // First visit materializes; the engineering stage is filtered away.
    let loaded = service
        .load_or_initialize(ProcessKind::Onboarding, "ana", Some("designer"), at(1))
        .unwrap();
    assert!(loaded.created);
    assert_eq!(loaded.template_state, TemplateState::Configured);
    assert_eq!(
        loaded.repairs,
        vec![TemplateRepair::GeneratedTaskId {
            stage_id: "equipment".into(),
            index: 1,
            id: "equipment-task-2".into(),
        }]
    );
    let stage_ids: Vec<_> = loaded.instance.stages.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(stage_ids, ["paperwork", "equipment"]);
    assert_eq!(loaded.instance.stages[0].tasks[0].policy_id.as_deref(), Some("pol-contract"));

    service
        .toggle_task(ProcessKind::Onboarding, "ana", "paperwork", "contract", true, at(2))
        .unwrap();

    // HR renames a task and adds a new one.
    let mut live = service.store().load_template(ProcessKind::Onboarding).unwrap().unwrap();
    live.stages[0].tasks[0].title = "Sign employment contract".into();
    live.stages[0].tasks.push(process_tracker::TaskTemplate {
        id: "handbook".into(),
        title: "Read handbook".into(),
        description: None,
        policy_id: None,
    });
    service.store_mut().save_template(ProcessKind::Onboarding, &live).unwrap();

    // The new task is not on the designer allow-list, so only the rename shows.
    let resynced = service.resync(ProcessKind::Onboarding, "ana", at(3)).unwrap();
    let contract = &resynced.stages[0].tasks[0];
    assert!(contract.completed);
    assert_eq!(contract.completed_at, Some(at(2)));
    assert_eq!(contract.title, "Sign employment contract");
    assert_eq!(resynced.stages[0].tasks.len(), 2);
    assert_eq!(resynced.progress, 25);

    for (stage, task) in [("paperwork", "nda"), ("equipment", "laptop"), ("equipment", "equipment-task-2")] {
        service
            .toggle_task(ProcessKind::Onboarding, "ana", stage, task, true, at(4))
            .unwrap();
    }
    assert_eq!(completions.get(), 1);

    // State survives a fresh store over the same directory.
    let reopened = JsonFileStore::open(StoreConfig::new(dir.path())).unwrap();
    let stored = reopened.load_instance(ProcessKind::Onboarding, "ana").unwrap().unwrap();
    assert_eq!(stored.status, ProcessStatus::Completed);
    assert_eq!(stored.progress, 100);
    assert!(stored.stages.iter().all(|s| s.completed && s.completed_at == Some(at(4))));
    assert_eq!(stored.created_at, at(1));
    assert_eq!(stored.updated_at, at(4));
}

#[test]
fn test_offboarding_without_settings() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = ProcessService::new(JsonFileStore::open(StoreConfig::new(dir.path())).unwrap());
    let loaded = service
        .load_or_initialize(ProcessKind::Offboarding, "leaver", None, at(1))
        .unwrap();
    assert_eq!(loaded.template_state, TemplateState::NotConfigured);
    assert!(loaded.instance.stages.is_empty());
    assert_eq!(loaded.instance.status, ProcessStatus::InProgress);
}
