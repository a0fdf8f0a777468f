//! Completion weights and progress aggregation.
//!
//! Two aggregations exist side by side:
//!
//! - the weighted variant, used for onboarding programs whose tasks carry a
//!   [`TaskStatus`], producing a percentage with one decimal place;
//! - the boolean per-stage variant, used for process instances, producing an
//!   integer percentage per stage and an unweighted mean of those per process.
//!
//! The per-process mean gives every stage the same say regardless of how many
//! tasks it holds. Existing documents depend on that figure, so it is kept.

use crate::fields::TaskStatus;

/// Completion credit in `[0, 1]` for a task status.
pub fn weight(status: TaskStatus, requires_verification: bool) -> f64 {
    match status {
        TaskStatus::Verified => 1.0,
        TaskStatus::Done if requires_verification => 0.8,
        TaskStatus::Done => 1.0,
        TaskStatus::InProgress => 0.4,
        TaskStatus::Todo => 0.0,
    }
}

/// Completion credit for the two-state model.
pub fn completion_weight(completed: bool) -> f64 {
    if completed {
        1.0
    } else {
        0.0
    }
}

/// A task that can be scored by the weighted aggregator.
pub trait WeightedTask {
    fn status(&self) -> TaskStatus;

    fn requires_verification(&self) -> bool {
        false
    }

    fn weight(&self) -> f64 {
        weight(self.status(), self.requires_verification())
    }
}

/// Weighted progress over stages of tasks, rounded to one decimal place.
///
/// Returns `0.0` when there are no tasks at all.
pub fn calculate_progress<'a, T, I>(stages: I) -> f64
where
    T: WeightedTask + 'a,
    I: IntoIterator<Item = &'a [T]>,
{
    let mut total_tasks = 0usize;
    let mut completed_weight = 0.0;
    for tasks in stages {
        total_tasks += tasks.len();
        completed_weight += tasks.iter().map(WeightedTask::weight).sum::<f64>();
    }
    if total_tasks == 0 {
        return 0.0;
    }
    round_one_decimal(completed_weight / total_tasks as f64 * 100.0)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Integer progress of a single stage. A stage with no tasks counts as done.
pub fn stage_progress(completed_tasks: usize, total_tasks: usize) -> u8 {
    if total_tasks == 0 {
        return 100;
    }
    (completed_tasks as f64 * 100.0 / total_tasks as f64).round() as u8
}

/// Rounded mean of per-stage progress values; `100` when there are no stages.
pub fn overall_progress<I>(stage_progresses: I) -> u8
where
    I: IntoIterator<Item = u8>,
{
    let (sum, count) = stage_progresses
        .into_iter()
        .fold((0u32, 0u32), |(sum, count), p| (sum + u32::from(p), count + 1));
    if count == 0 {
        return 100;
    }
    (f64::from(sum) / f64::from(count)).round() as u8
}
