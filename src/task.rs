//! Task and stage data structures.
//!
//! Templates describe the shape of a process and are owned by a settings
//! document. Instances are the per-subject copies that record completion.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::progress::stage_progress;

/// A configured task inside a stage template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
}

impl TaskTemplate {
    /// Author a new task with a freshly generated id.
    pub fn new(title: &str) -> Self {
        TaskTemplate {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: None,
            policy_id: None,
        }
    }
}

/// A configured stage: an ordered list of task templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTemplate {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskTemplate>,
}

impl StageTemplate {
    /// Author a new, empty stage with a freshly generated id.
    pub fn new(title: &str) -> Self {
        StageTemplate {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            icon: None,
            tasks: Vec::new(),
        }
    }
}

/// A task as tracked for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstance {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
}

impl TaskInstance {
    /// Fresh, incomplete task copied from its template.
    pub fn from_template(template: &TaskTemplate) -> Self {
        TaskInstance {
            id: template.id.clone(),
            title: template.title.clone(),
            description: template.description.clone(),
            completed: false,
            completed_at: None,
            due_date: None,
            assignee_id: None,
            mentor_id: None,
            policy_id: template.policy_id.clone(),
        }
    }

    /// Take the template's text fields, leaving completion and metadata alone.
    pub fn apply_template(&mut self, template: &TaskTemplate) {
        self.title = template.title.clone();
        self.description = template.description.clone();
        self.policy_id = template.policy_id.clone();
    }

    /// Flip completion, stamping or clearing `completed_at`.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        if completed && !self.completed {
            self.completed_at = Some(now);
        } else if !completed {
            self.completed_at = None;
        }
        self.completed = completed;
    }

    /// True when the task is open and its due date lies before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|d| d < today)
    }

    /// Due date relative to `today`, or `-` when none is set.
    pub fn due_label(&self, today: NaiveDate) -> String {
        format_due_relative(self.due_date, today)
    }
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<NaiveDate>, today: NaiveDate) -> String {
    let Some(d) = due else {
        return "-".into();
    };
    match (d - today).num_days() {
        0 => "today".into(),
        1 => "tomorrow".into(),
        days if days > 1 => format!("in {days}d"),
        days => format!("{}d late", -days),
    }
}

/// A stage as tracked for one subject. `progress` and `completed` are derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageInstance {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tasks: Vec<TaskInstance>,
}

impl StageInstance {
    /// Fresh stage for `template` holding the given (already filtered) tasks.
    pub fn from_template(template: &StageTemplate, tasks: Vec<TaskInstance>) -> Self {
        StageInstance {
            id: template.id.clone(),
            title: template.title.clone(),
            icon: template.icon.clone(),
            completed: false,
            progress: 0,
            completed_at: None,
            tasks,
        }
    }

    pub fn completed_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskInstance> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut TaskInstance> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// Recompute `progress` and `completed` from the tasks.
    ///
    /// `completed_at` is stamped on the first transition to 100%, kept while
    /// the stage stays complete, and cleared when it regresses.
    pub fn recompute(&mut self, now: DateTime<Utc>) {
        self.progress = stage_progress(self.completed_tasks(), self.tasks.len());
        self.completed = self.progress == 100;
        if self.completed {
            if self.completed_at.is_none() {
                self.completed_at = Some(now);
            }
        } else {
            self.completed_at = None;
        }
    }
}
