//! Settings documents: process templates and positions.
//!
//! Templates are authored by hand and are frequently incomplete, so they are
//! read through a lenient raw shape and normalised once at the boundary. Any
//! stage or task lacking an id or title is filled in, and each fill-in is
//! recorded as a [`TemplateRepair`] so callers can surface it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::task::{StageTemplate, TaskTemplate};

pub const UNTITLED_STAGE: &str = "Untitled Stage";
pub const UNTITLED_TASK: &str = "Untitled Task";

/// A default applied while normalising a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRepair {
    GeneratedStageId { index: usize, id: String },
    /// A stage repeated an id already used by an earlier stage.
    RenamedDuplicateStageId { index: usize, original: String, id: String },
    DefaultedStageTitle { stage_id: String },
    GeneratedTaskId { stage_id: String, index: usize, id: String },
    RenamedDuplicateTaskId { stage_id: String, index: usize, original: String, id: String },
    DefaultedTaskTitle { stage_id: String, task_id: String },
}

/// The settings document for one process kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawProcessTemplate")]
pub struct ProcessTemplate {
    pub stages: Vec<StageTemplate>,
    /// Defaults applied when this template was read. Never persisted.
    #[serde(skip)]
    pub repairs: Vec<TemplateRepair>,
}

impl ProcessTemplate {
    pub fn new(stages: Vec<StageTemplate>) -> Self {
        ProcessTemplate { stages, repairs: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn task_count(&self) -> usize {
        self.stages.iter().map(|s| s.tasks.len()).sum()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawProcessTemplate {
    #[serde(default)]
    stages: Vec<RawStageTemplate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStageTemplate {
    id: Option<String>,
    title: Option<String>,
    icon: Option<String>,
    #[serde(default)]
    tasks: Vec<RawTaskTemplate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTaskTemplate {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    policy_id: Option<String>,
}

/// Treat absent and blank strings alike.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<RawProcessTemplate> for ProcessTemplate {
    fn from(mut raw: RawProcessTemplate) -> Self {
        for stage in &mut raw.stages {
            stage.id = present(stage.id.take());
        }
        let mut ids = IdScope::new(raw.stages.iter().filter_map(|s| s.id.as_deref()));
        let mut repairs = Vec::new();
        let stages = raw
            .stages
            .into_iter()
            .enumerate()
            .map(|(index, stage)| normalise_stage(index, stage, &mut ids, &mut repairs))
            .collect();
        ProcessTemplate { stages, repairs }
    }
}

/// Ids handed out within one scope: the stage list, or one stage's tasks.
///
/// Every authored id in the scope is reserved up front, so a generated id
/// never takes one that a later entry spells out.
struct IdScope {
    used: HashSet<String>,
    claimed: HashSet<String>,
}

enum Assigned {
    Kept(String),
    Renamed { original: String, id: String },
}

impl IdScope {
    fn new<'a>(authored: impl IntoIterator<Item = &'a str>) -> Self {
        IdScope {
            used: authored.into_iter().map(str::to_string).collect(),
            claimed: HashSet::new(),
        }
    }

    /// Keep an authored id unless an earlier entry already claimed it.
    fn authored(&mut self, id: String) -> Assigned {
        if self.claimed.contains(&id) {
            let fresh = self.free(&id);
            self.claim(fresh.clone());
            Assigned::Renamed { original: id, id: fresh }
        } else {
            self.claim(id.clone());
            Assigned::Kept(id)
        }
    }

    /// `candidate` if nothing reserved it, else the first free `-<n>` suffix.
    fn generated(&mut self, candidate: String) -> String {
        let id = if self.used.contains(&candidate) {
            self.free(&candidate)
        } else {
            candidate
        };
        self.claim(id.clone());
        id
    }

    fn free(&self, base: &str) -> String {
        let mut n = 2;
        loop {
            let id = format!("{base}-{n}");
            if !self.used.contains(&id) {
                return id;
            }
            n += 1;
        }
    }

    fn claim(&mut self, id: String) {
        self.used.insert(id.clone());
        self.claimed.insert(id);
    }
}

// Generated ids are positional so that re-reading the same document yields
// the same ids and resync keeps matching them.
fn normalise_stage(
    index: usize,
    mut raw: RawStageTemplate,
    ids: &mut IdScope,
    repairs: &mut Vec<TemplateRepair>,
) -> StageTemplate {
    let id = match raw.id {
        Some(authored) => match ids.authored(authored) {
            Assigned::Kept(id) => id,
            Assigned::Renamed { original, id } => {
                repairs.push(TemplateRepair::RenamedDuplicateStageId { index, original, id: id.clone() });
                id
            }
        },
        None => {
            let id = ids.generated(format!("stage-{}", index + 1));
            repairs.push(TemplateRepair::GeneratedStageId { index, id: id.clone() });
            id
        }
    };
    let title = present(raw.title).unwrap_or_else(|| {
        repairs.push(TemplateRepair::DefaultedStageTitle { stage_id: id.clone() });
        UNTITLED_STAGE.to_string()
    });

    for task in &mut raw.tasks {
        task.id = present(task.id.take());
    }
    let mut task_ids = IdScope::new(raw.tasks.iter().filter_map(|t| t.id.as_deref()));
    let tasks = raw
        .tasks
        .into_iter()
        .enumerate()
        .map(|(task_index, task)| {
            let task_id = match task.id {
                Some(authored) => match task_ids.authored(authored) {
                    Assigned::Kept(task_id) => task_id,
                    Assigned::Renamed { original, id: task_id } => {
                        repairs.push(TemplateRepair::RenamedDuplicateTaskId {
                            stage_id: id.clone(),
                            index: task_index,
                            original,
                            id: task_id.clone(),
                        });
                        task_id
                    }
                },
                None => {
                    let generated = task_ids.generated(format!("{}-task-{}", id, task_index + 1));
                    repairs.push(TemplateRepair::GeneratedTaskId {
                        stage_id: id.clone(),
                        index: task_index,
                        id: generated.clone(),
                    });
                    generated
                }
            };
            let title = present(task.title).unwrap_or_else(|| {
                repairs.push(TemplateRepair::DefaultedTaskTitle {
                    stage_id: id.clone(),
                    task_id: task_id.clone(),
                });
                UNTITLED_TASK.to_string()
            });
            TaskTemplate {
                id: task_id,
                title,
                description: task.description,
                policy_id: task.policy_id,
            }
        })
        .collect();
    StageTemplate { id, title, icon: raw.icon, tasks }
}

/// A position record. Only the fields that shape a process are modelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_task_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_program_ids: Option<Vec<String>>,
}

impl Position {
    /// The task allow-list, or `None` when absent or empty (keep all tasks).
    pub fn allow_list(&self) -> Option<HashSet<String>> {
        self.allowed_task_ids
            .as_ref()
            .filter(|ids| !ids.is_empty())
            .map(|ids| ids.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_template_needs_no_repair() {
        let json = r#"{"stages":[{"id":"s1","title":"Paperwork","icon":"doc",
            "tasks":[{"id":"t1","title":"Contract","policyId":"p9"}]}]}"#;
        let template: ProcessTemplate = serde_json::from_str(json).unwrap();
        assert!(template.repairs.is_empty());
        assert_eq!(template.stages[0].icon.as_deref(), Some("doc"));
        assert_eq!(template.stages[0].tasks[0].policy_id.as_deref(), Some("p9"));
        assert_eq!(template.task_count(), 1);
    }

    #[test]
    fn test_malformed_template_is_default_filled() {
        let json = r#"{"stages":[{"title":"","tasks":[{"title":"Badge"},{"id":"t2"}]}]}"#;
        let template: ProcessTemplate = serde_json::from_str(json).unwrap();
        let stage = &template.stages[0];
        assert_eq!(stage.id, "stage-1");
        assert_eq!(stage.title, UNTITLED_STAGE);
        assert_eq!(stage.tasks[0].id, "stage-1-task-1");
        assert_eq!(stage.tasks[0].title, "Badge");
        assert_eq!(stage.tasks[1].title, UNTITLED_TASK);
        assert_eq!(
            template.repairs,
            vec![
                TemplateRepair::GeneratedStageId { index: 0, id: "stage-1".into() },
                TemplateRepair::DefaultedStageTitle { stage_id: "stage-1".into() },
                TemplateRepair::GeneratedTaskId {
                    stage_id: "stage-1".into(),
                    index: 0,
                    id: "stage-1-task-1".into(),
                },
                TemplateRepair::DefaultedTaskTitle {
                    stage_id: "stage-1".into(),
                    task_id: "t2".into(),
                },
            ]
        );
    }

    #[test]
    fn test_generated_ids_are_stable_across_reads() {
        let json = r#"{"stages":[{"tasks":[{}]}]}"#;
        let a: ProcessTemplate = serde_json::from_str(json).unwrap();
        let b: ProcessTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(a.stages, b.stages);
    }

    #[test]
    fn test_generated_id_skips_authored_id() {
        let json = r#"{"stages":[
            {"title":"A","tasks":[{"id":"a1"}]},
            {"id":"stage-1","title":"B","tasks":[{"id":"b1"}]}]}"#;
        let template: ProcessTemplate = serde_json::from_str(json).unwrap();
        let ids: Vec<_> = template.stages.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["stage-1-2", "stage-1"]);
        assert_eq!(template.stages[1].tasks[0].id, "b1");
        assert!(template
            .repairs
            .contains(&TemplateRepair::GeneratedStageId { index: 0, id: "stage-1-2".into() }));
    }

    #[test]
    fn test_duplicate_ids_are_renamed() {
        let json = r#"{"stages":[
            {"id":"s1","title":"A","tasks":[{"id":"t1","title":"x"},{"id":"t1","title":"y"},{"title":"z"}]},
            {"id":"s1","title":"B","tasks":[{"id":"t1","title":"w"}]}]}"#;
        let template: ProcessTemplate = serde_json::from_str(json).unwrap();
        let ids: Vec<_> = template.stages.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["s1", "s1-2"]);
        let task_ids: Vec<_> = template.stages[0].tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(task_ids, ["t1", "t1-2", "s1-task-3"]);
        assert_eq!(template.stages[1].tasks[0].id, "t1");
        assert_eq!(
            template.repairs,
            vec![
                TemplateRepair::RenamedDuplicateTaskId {
                    stage_id: "s1".into(),
                    index: 1,
                    original: "t1".into(),
                    id: "t1-2".into(),
                },
                TemplateRepair::GeneratedTaskId {
                    stage_id: "s1".into(),
                    index: 2,
                    id: "s1-task-3".into(),
                },
                TemplateRepair::RenamedDuplicateStageId {
                    index: 1,
                    original: "s1".into(),
                    id: "s1-2".into(),
                },
            ]
        );
    }

    #[test]
    fn test_missing_stages_reads_as_empty() {
        let template: ProcessTemplate = serde_json::from_str("{}").unwrap();
        assert!(template.is_empty());
    }

    #[test]
    fn test_repairs_are_not_persisted() {
        let template: ProcessTemplate = serde_json::from_str(r#"{"stages":[{"tasks":[]}]}"#).unwrap();
        assert_eq!(template.repairs.len(), 2);
        let json = serde_json::to_value(&template).unwrap();
        assert!(json.get("repairs").is_none());
    }

    #[test]
    fn test_position_allow_list() {
        let mut position = Position { id: "dev".into(), ..Default::default() };
        assert!(position.allow_list().is_none());
        position.allowed_task_ids = Some(Vec::new());
        assert!(position.allow_list().is_none());
        position.allowed_task_ids = Some(vec!["t1".into()]);
        assert!(position.allow_list().unwrap().contains("t1"));
    }
}
