//! Per-subject process instances.
//!
//! A `ProcessInstance` is the document stored for one subject's onboarding or
//! offboarding. Its stage list is mutated in place; every mutation goes
//! through [`ProcessInstance::refresh`] so that the derived `progress` and
//! `status` fields never drift from the tasks.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fields::{ProcessKind, ProcessStatus};
use crate::progress::overall_progress;
use crate::sync::{materialize, merge_with_allow_list, AllowList};
use crate::task::{StageInstance, StageTemplate, TaskInstance};

/// Change in overall status caused by a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Completed,
    Reopened,
}

/// Metadata edits for a task. Completion is never touched here.
#[derive(Debug, Clone, Default)]
pub struct TaskDetails {
    pub due_date: Option<NaiveDate>,
    pub clear_due_date: bool,
    pub assignee_id: Option<String>,
    pub clear_assignee: bool,
    pub mentor_id: Option<String>,
    pub clear_mentor: bool,
}

/// Counts describing an instance at a glance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSummary {
    pub stages: usize,
    pub completed_stages: usize,
    pub tasks: usize,
    pub completed_tasks: usize,
    pub progress: u8,
}

/// An open task past its due date, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueTask {
    pub stage_id: String,
    pub task_id: String,
    pub title: String,
    pub assignee_id: Option<String>,
    pub due_date: NaiveDate,
    /// e.g. "3d late"
    pub label: String,
}

/// One subject's process document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstance {
    pub subject_id: String,
    pub kind: ProcessKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,
    #[serde(default)]
    pub stages: Vec<StageInstance>,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub status: ProcessStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessInstance {
    /// Build a new instance from the current template snapshot.
    pub fn materialize(
        kind: ProcessKind,
        subject_id: &str,
        position_id: Option<&str>,
        template: &[StageTemplate],
        allowed: Option<&AllowList>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut instance = ProcessInstance {
            subject_id: subject_id.to_string(),
            kind,
            position_id: position_id.map(str::to_string),
            stages: materialize(template, allowed),
            progress: 0,
            status: ProcessStatus::InProgress,
            created_at: now,
            updated_at: now,
        };
        instance.refresh();
        instance
    }

    /// Recompute overall progress and status from the stages.
    ///
    /// An instance with no stages is never considered complete: there is
    /// nothing configured to finish.
    pub fn refresh(&mut self) -> Transition {
        self.progress = overall_progress(self.stages.iter().map(|s| s.progress));
        let before = self.status;
        self.status = if !self.stages.is_empty() && self.progress == 100 {
            ProcessStatus::Completed
        } else {
            ProcessStatus::InProgress
        };
        match (before, self.status) {
            (ProcessStatus::InProgress, ProcessStatus::Completed) => Transition::Completed,
            (ProcessStatus::Completed, ProcessStatus::InProgress) => Transition::Reopened,
            _ => Transition::Unchanged,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProcessStatus::Completed
    }

    pub fn stage(&self, stage_id: &str) -> Option<&StageInstance> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    fn task_slot(&self, stage_id: &str, task_id: &str) -> Result<(usize, usize)> {
        let stage_idx = self
            .stages
            .iter()
            .position(|s| s.id == stage_id)
            .ok_or_else(|| Error::StageNotFound(stage_id.to_string()))?;
        let task_idx = self.stages[stage_idx]
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| Error::TaskNotFound {
                stage_id: stage_id.to_string(),
                task_id: task_id.to_string(),
            })?;
        Ok((stage_idx, task_idx))
    }

    /// Set a task's completion and recompute its stage and the process.
    pub fn toggle_task(
        &mut self,
        stage_id: &str,
        task_id: &str,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        let (stage_idx, task_idx) = self.task_slot(stage_id, task_id)?;
        let stage = &mut self.stages[stage_idx];
        stage.tasks[task_idx].set_completed(completed, now);
        stage.recompute(now);
        self.updated_at = now;
        Ok(self.refresh())
    }

    /// Edit due date, assignee or mentor of a task.
    pub fn update_task_details(
        &mut self,
        stage_id: &str,
        task_id: &str,
        details: TaskDetails,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let (stage_idx, task_idx) = self.task_slot(stage_id, task_id)?;
        let task = &mut self.stages[stage_idx].tasks[task_idx];
        if details.clear_due_date {
            task.due_date = None;
        } else if details.due_date.is_some() {
            task.due_date = details.due_date;
        }
        if details.clear_assignee {
            task.assignee_id = None;
        } else if details.assignee_id.is_some() {
            task.assignee_id = details.assignee_id;
        }
        if details.clear_mentor {
            task.mentor_id = None;
        } else if details.mentor_id.is_some() {
            task.mentor_id = details.mentor_id;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Merge the live template into this instance, keeping recorded progress.
    pub fn resync(
        &mut self,
        template: &[StageTemplate],
        allowed: Option<&AllowList>,
        now: DateTime<Utc>,
    ) -> Transition {
        self.stages = merge_with_allow_list(template, &self.stages, allowed, now);
        self.updated_at = now;
        self.refresh()
    }

    pub fn summary(&self) -> ProcessSummary {
        ProcessSummary {
            stages: self.stages.len(),
            completed_stages: self.stages.iter().filter(|s| s.completed).count(),
            tasks: self.stages.iter().map(|s| s.tasks.len()).sum(),
            completed_tasks: self.stages.iter().map(StageInstance::completed_tasks).sum(),
            progress: self.progress,
        }
    }

    /// Open tasks whose due date lies before `today`, in process order.
    pub fn overdue_tasks(&self, today: NaiveDate) -> Vec<(&StageInstance, &TaskInstance)> {
        self.stages
            .iter()
            .flat_map(|stage| stage.tasks.iter().map(move |task| (stage, task)))
            .filter(|(_, task)| task.is_overdue(today))
            .collect()
    }

    /// Overdue tasks with their lateness rendered relative to `today`.
    pub fn overdue_report(&self, today: NaiveDate) -> Vec<OverdueTask> {
        self.overdue_tasks(today)
            .into_iter()
            .filter_map(|(stage, task)| {
                Some(OverdueTask {
                    stage_id: stage.id.clone(),
                    task_id: task.id.clone(),
                    title: task.title.clone(),
                    assignee_id: task.assignee_id.clone(),
                    due_date: task.due_date?,
                    label: task.due_label(today),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskTemplate;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, hour, 0, 0).unwrap()
    }

    fn stage(id: &str, task_ids: &[&str]) -> StageTemplate {
        StageTemplate {
            id: id.into(),
            title: id.to_uppercase(),
            icon: None,
            tasks: task_ids
                .iter()
                .map(|t| TaskTemplate {
                    id: t.to_string(),
                    title: t.to_uppercase(),
                    description: None,
                    policy_id: None,
                })
                .collect(),
        }
    }

    fn instance(template: &[StageTemplate]) -> ProcessInstance {
        ProcessInstance::materialize(ProcessKind::Onboarding, "emp-1", None, template, None, at(8))
    }

    #[test]
    fn test_toggle_scenario() {
        let template = vec![stage("s1", &["t1", "t2"])];
        let mut process = instance(&template);
        assert_eq!(process.progress, 0);

        assert_eq!(process.toggle_task("s1", "t1", true, at(9)).unwrap(), Transition::Unchanged);
        assert_eq!(process.stages[0].progress, 50);
        assert!(!process.stages[0].completed);
        assert_eq!(process.progress, 50);

        assert_eq!(process.toggle_task("s1", "t2", true, at(10)).unwrap(), Transition::Completed);
        assert_eq!(process.stages[0].progress, 100);
        assert!(process.stages[0].completed);
        assert_eq!(process.stages[0].completed_at, Some(at(10)));
        assert!(process.is_completed());

        assert_eq!(process.toggle_task("s1", "t2", false, at(11)).unwrap(), Transition::Reopened);
        assert_eq!(process.stages[0].progress, 50);
        assert!(!process.stages[0].completed);
        assert_eq!(process.stages[0].completed_at, None);
        assert_eq!(process.status, ProcessStatus::InProgress);
        assert_eq!(process.updated_at, at(11));
    }

    #[test]
    fn test_overall_progress_averages_stages() {
        let template = vec![stage("small", &["a"]), stage("large", &["b", "c", "d", "e"])];
        let mut process = instance(&template);
        process.toggle_task("small", "a", true, at(9)).unwrap();
        // 100 and 0 average to 50 even though only 1 of 5 tasks is done.
        assert_eq!(process.progress, 50);
    }

    #[test]
    fn test_toggle_unknown_ids() {
        let mut process = instance(&[stage("s1", &["t1"])]);
        assert!(matches!(
            process.toggle_task("nope", "t1", true, at(9)),
            Err(Error::StageNotFound(_))
        ));
        assert!(matches!(
            process.toggle_task("s1", "nope", true, at(9)),
            Err(Error::TaskNotFound { .. })
        ));
    }

    #[test]
    fn test_toggle_reaches_authored_stage_beside_generated_one() {
        let json = r#"{"stages":[
            {"title":"A","tasks":[{"id":"a1","title":"a"}]},
            {"id":"stage-1","title":"B","tasks":[{"id":"b1","title":"b"}]}]}"#;
        let template: crate::template::ProcessTemplate = serde_json::from_str(json).unwrap();
        let mut process = instance(&template.stages);

        process.toggle_task("stage-1", "b1", true, at(9)).unwrap();
        assert!(process.stage("stage-1").unwrap().completed);
        assert!(!process.stage("stage-1-2").unwrap().completed);
        assert_eq!(process.progress, 50);
    }

    #[test]
    fn test_empty_process_is_not_completed() {
        let process = instance(&[]);
        assert!(process.stages.is_empty());
        assert_eq!(process.status, ProcessStatus::InProgress);
    }

    #[test]
    fn test_update_task_details() {
        let mut process = instance(&[stage("s1", &["t1"])]);
        let due = NaiveDate::from_ymd_opt(2024, 7, 5);
        process
            .update_task_details(
                "s1",
                "t1",
                TaskDetails {
                    due_date: due,
                    assignee_id: Some("it-desk".into()),
                    ..Default::default()
                },
                at(9),
            )
            .unwrap();
        let t = &process.stages[0].tasks[0];
        assert_eq!(t.due_date, due);
        assert_eq!(t.assignee_id.as_deref(), Some("it-desk"));
        assert!(!t.completed);

        process
            .update_task_details("s1", "t1", TaskDetails { clear_due_date: true, ..Default::default() }, at(10))
            .unwrap();
        let t = &process.stages[0].tasks[0];
        assert_eq!(t.due_date, None);
        assert_eq!(t.assignee_id.as_deref(), Some("it-desk"));
    }

    #[test]
    fn test_resync_preserves_completion() {
        let mut template = vec![stage("s1", &["t1", "t2"])];
        let mut process = instance(&template);
        process.toggle_task("s1", "t1", true, at(9)).unwrap();

        template[0].tasks[0].title = "Renamed".into();
        process.resync(&template, None, at(10));
        let t1 = &process.stages[0].tasks[0];
        assert!(t1.completed);
        assert_eq!(t1.title, "Renamed");
        assert_eq!(process.progress, 50);
        assert_eq!(process.updated_at, at(10));
    }

    #[test]
    fn test_resync_removing_last_open_task_completes() {
        let mut template = vec![stage("s1", &["t1", "t2"])];
        let mut process = instance(&template);
        process.toggle_task("s1", "t1", true, at(9)).unwrap();
        template[0].tasks.pop();
        assert_eq!(process.resync(&template, None, at(10)), Transition::Completed);
        assert_eq!(process.stages[0].completed_at, Some(at(10)));
    }

    #[test]
    fn test_summary_and_overdue() {
        let mut process = instance(&[stage("s1", &["t1", "t2"]), stage("s2", &["t3"])]);
        process.toggle_task("s2", "t3", true, at(9)).unwrap();
        let late = NaiveDate::from_ymd_opt(2024, 6, 28);
        for task in ["t1", "t2"] {
            process
                .update_task_details("s1", task, TaskDetails { due_date: late, ..Default::default() }, at(9))
                .unwrap();
        }
        process.toggle_task("s1", "t2", true, at(9)).unwrap();

        let summary = process.summary();
        assert_eq!(summary.stages, 2);
        assert_eq!(summary.completed_stages, 1);
        assert_eq!(summary.tasks, 3);
        assert_eq!(summary.completed_tasks, 2);
        assert_eq!(summary.progress, 75);

        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let overdue = process.overdue_tasks(today);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].0.id, "s1");
        assert_eq!(overdue[0].1.id, "t1");

        let report = process.overdue_report(today);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].task_id, "t1");
        assert_eq!(report[0].due_date, NaiveDate::from_ymd_opt(2024, 6, 28).unwrap());
        assert_eq!(report[0].label, "3d late");
    }

    #[test]
    fn test_document_shape() {
        let process = instance(&[stage("s1", &["t1"])]);
        let json = serde_json::to_value(&process).unwrap();
        assert_eq!(json["subjectId"], "emp-1");
        assert_eq!(json["kind"], "onboarding");
        assert_eq!(json["status"], "IN_PROGRESS");
        assert_eq!(json["stages"][0]["tasks"][0]["completed"], false);
        let back: ProcessInstance = serde_json::from_value(json).unwrap();
        assert_eq!(back, process);
    }
}
