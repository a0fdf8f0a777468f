//! Template materialization and resync.
//!
//! Both functions are pure: the caller passes the fetched template and, for a
//! resync, the existing stages, and persists whatever comes back. The result
//! is always template-shaped: stages and tasks follow template order, anything
//! the template no longer lists is dropped, and stages left without tasks are
//! pruned.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::task::{StageInstance, StageTemplate, TaskInstance, TaskTemplate};

/// A set of task ids a position is restricted to.
pub type AllowList = HashSet<String>;

fn effective(allowed: Option<&AllowList>) -> Option<&AllowList> {
    allowed.filter(|ids| !ids.is_empty())
}

fn is_allowed(allowed: Option<&AllowList>, task: &TaskTemplate) -> bool {
    allowed.map_or(true, |ids| ids.contains(&task.id))
}

/// Build fresh, incomplete stages from a template.
///
/// When `allowed` is given and non-empty only the listed tasks are kept.
pub fn materialize(template: &[StageTemplate], allowed: Option<&AllowList>) -> Vec<StageInstance> {
    let allowed = effective(allowed);
    template
        .iter()
        .filter_map(|stage| {
            let tasks: Vec<TaskInstance> = stage
                .tasks
                .iter()
                .filter(|task| is_allowed(allowed, task))
                .map(TaskInstance::from_template)
                .collect();
            if tasks.is_empty() {
                None
            } else {
                Some(StageInstance::from_template(stage, tasks))
            }
        })
        .collect()
}

/// Re-apply the live template onto existing stages without an allow-list.
///
/// `now` only stamps `completed_at` on a stage that becomes complete during
/// the merge; nothing else in the result depends on it.
pub fn merge(
    template: &[StageTemplate],
    existing: &[StageInstance],
    now: DateTime<Utc>,
) -> Vec<StageInstance> {
    merge_with_allow_list(template, existing, None, now)
}

/// Re-apply the live template onto existing stages.
///
/// Matching tasks keep `completed`, `completed_at`, `due_date`, `assignee_id`
/// and `mentor_id`; their text and policy link come from the template. New
/// stages and tasks start incomplete. Stage progress is recomputed.
///
/// A stage that was already complete keeps its `completed_at`. `now` is used
/// only for a stage that reaches 100% through the merge, for instance when
/// its last open task was removed from the template.
pub fn merge_with_allow_list(
    template: &[StageTemplate],
    existing: &[StageInstance],
    allowed: Option<&AllowList>,
    now: DateTime<Utc>,
) -> Vec<StageInstance> {
    let allowed = effective(allowed);
    template
        .iter()
        .filter_map(|stage| {
            let current = existing.iter().find(|s| s.id == stage.id);
            let tasks: Vec<TaskInstance> = stage
                .tasks
                .iter()
                .filter(|task| is_allowed(allowed, task))
                .map(|task| match current.and_then(|s| s.task(&task.id)) {
                    Some(previous) => {
                        let mut merged = previous.clone();
                        merged.apply_template(task);
                        merged
                    }
                    None => TaskInstance::from_template(task),
                })
                .collect();
            if tasks.is_empty() {
                return None;
            }
            let mut merged = StageInstance::from_template(stage, tasks);
            if let Some(previous) = current {
                merged.completed_at = previous.completed_at;
            }
            merged.recompute(now);
            Some(merged)
        })
        .collect()
}
