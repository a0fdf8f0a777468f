//! Onboarding programs: status-tracked checklists scored by weight.
//!
//! Unlike process instances, program tasks move through a status lifecycle
//! (`TODO` → `IN_PROGRESS` → `DONE` → `VERIFIED`) and some of them need a
//! verification step before they earn full credit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fields::TaskStatus;
use crate::progress::{calculate_progress, WeightedTask};
use crate::template::Position;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramTask {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub requires_verification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WeightedTask for ProgramTask {
    fn status(&self) -> TaskStatus {
        self.status
    }

    fn requires_verification(&self) -> bool {
        self.requires_verification
    }
}

impl ProgramTask {
    /// Move the task to `to`.
    ///
    /// `VERIFIED` is only reachable from `DONE`, and only for tasks that
    /// require verification. Every other move is allowed.
    pub fn advance(&mut self, to: TaskStatus, now: DateTime<Utc>) -> Result<()> {
        if to == self.status {
            return Ok(());
        }
        if to == TaskStatus::Verified
            && (!self.requires_verification || self.status != TaskStatus::Done)
        {
            return Err(Error::InvalidTransition {
                task_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Some(now);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramStage {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<ProgramTask>,
}

/// An onboarding program assigned through a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub stages: Vec<ProgramStage>,
}

impl Program {
    /// Weighted completion, one decimal place.
    pub fn progress(&self) -> f64 {
        calculate_progress(self.stages.iter().map(|s| s.tasks.as_slice()))
    }

    pub fn task_mut(&mut self, stage_id: &str, task_id: &str) -> Result<&mut ProgramTask> {
        let stage = self
            .stages
            .iter_mut()
            .find(|s| s.id == stage_id)
            .ok_or_else(|| Error::StageNotFound(stage_id.to_string()))?;
        stage
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| Error::TaskNotFound {
                stage_id: stage_id.to_string(),
                task_id: task_id.to_string(),
            })
    }

    /// Tasks done but still waiting on verification.
    pub fn awaiting_verification(&self) -> impl Iterator<Item = &ProgramTask> {
        self.stages
            .iter()
            .flat_map(|s| &s.tasks)
            .filter(|t| t.requires_verification && t.status == TaskStatus::Done)
    }
}

/// Programs a position lists in `onboardingProgramIds`, in the position's order.
pub fn programs_for_position<'a>(position: &Position, programs: &'a [Program]) -> Vec<&'a Program> {
    position
        .onboarding_program_ids
        .iter()
        .flatten()
        .filter_map(|id| programs.iter().find(|p| &p.id == id))
        .collect()
}
