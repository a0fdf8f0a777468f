//! Process orchestration over a document store.
//!
//! `ProcessService` performs the read-modify-write sequences around the pure
//! functions in [`crate::sync`] and [`crate::process`]: lazily initialising an
//! instance, toggling tasks, editing task details and resyncing against the
//! live template. None of these are transactional. Concurrent writers race
//! and the last write wins.
//!
//! When a process reaches 100% every registered [`ProcessObserver`] is told,
//! after the instance has been written. Updating the subject's own record is
//! left to the observer.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::db::DocumentStore;
use crate::error::{Error, Result};
use crate::fields::ProcessKind;
use crate::process::{OverdueTask, ProcessInstance, TaskDetails, Transition};
use crate::program::{programs_for_position, Program};
use crate::sync::AllowList;
use crate::template::{ProcessTemplate, TemplateRepair};

/// Notified when a subject's process completes.
pub trait ProcessObserver {
    fn on_process_completed(&self, kind: ProcessKind, subject_id: &str);
}

impl<F> ProcessObserver for F
where
    F: Fn(ProcessKind, &str),
{
    fn on_process_completed(&self, kind: ProcessKind, subject_id: &str) {
        self(kind, subject_id)
    }
}

/// Whether a settings document exists for a process kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateState {
    Configured,
    /// No settings document; the instance was built from zero stages.
    NotConfigured,
}

/// Result of [`ProcessService::load_or_initialize`].
#[derive(Debug, Clone)]
pub struct LoadedProcess {
    pub instance: ProcessInstance,
    pub template_state: TemplateState,
    /// True when this call materialized and stored the instance.
    pub created: bool,
    /// Defaults applied to the template while reading it.
    pub repairs: Vec<TemplateRepair>,
}

pub struct ProcessService<S: DocumentStore> {
    store: S,
    observers: Vec<Box<dyn ProcessObserver>>,
}

impl<S: DocumentStore> ProcessService<S> {
    pub fn new(store: S) -> Self {
        ProcessService {
            store,
            observers: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Register a completion observer.
    pub fn subscribe(&mut self, observer: impl ProcessObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn template(&self, kind: ProcessKind) -> Result<(ProcessTemplate, TemplateState)> {
        match self.store.load_template(kind)? {
            Some(template) => {
                for repair in &template.repairs {
                    warn!(%kind, ?repair, "template defaulted a missing field");
                }
                Ok((template, TemplateState::Configured))
            }
            None => {
                debug!(%kind, "no template configured");
                Ok((ProcessTemplate::default(), TemplateState::NotConfigured))
            }
        }
    }

    fn allow_list(&self, position_id: Option<&str>) -> Result<Option<AllowList>> {
        let Some(position_id) = position_id else {
            return Ok(None);
        };
        match self.store.load_position(position_id)? {
            Some(position) => Ok(position.allow_list()),
            None => {
                debug!(position_id, "position not found, keeping all tasks");
                Ok(None)
            }
        }
    }

    fn instance(&self, kind: ProcessKind, subject_id: &str) -> Result<ProcessInstance> {
        self.store
            .load_instance(kind, subject_id)?
            .ok_or_else(|| Error::InstanceNotFound {
                kind,
                subject_id: subject_id.to_string(),
            })
    }

    /// Persist `instance` and announce a completion transition.
    fn commit(&mut self, instance: &ProcessInstance, transition: Transition) -> Result<()> {
        self.store.save_instance(instance)?;
        match transition {
            Transition::Completed => {
                info!(kind = %instance.kind, subject_id = %instance.subject_id, "process completed");
                for observer in &self.observers {
                    observer.on_process_completed(instance.kind, &instance.subject_id);
                }
            }
            Transition::Reopened => {
                info!(kind = %instance.kind, subject_id = %instance.subject_id, "process reopened");
            }
            Transition::Unchanged => {}
        }
        Ok(())
    }

    /// Return the subject's instance, materializing and storing it on first use.
    pub fn load_or_initialize(
        &mut self,
        kind: ProcessKind,
        subject_id: &str,
        position_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<LoadedProcess> {
        let (template, template_state) = self.template(kind)?;
        if let Some(instance) = self.store.load_instance(kind, subject_id)? {
            return Ok(LoadedProcess {
                instance,
                template_state,
                created: false,
                repairs: template.repairs,
            });
        }

        let allowed = self.allow_list(position_id)?;
        let instance = ProcessInstance::materialize(
            kind,
            subject_id,
            position_id,
            &template.stages,
            allowed.as_ref(),
            now,
        );
        self.store.save_instance(&instance)?;
        info!(
            %kind,
            subject_id,
            stages = instance.stages.len(),
            "materialized process instance"
        );
        Ok(LoadedProcess {
            instance,
            template_state,
            created: true,
            repairs: template.repairs,
        })
    }

    /// Mark a task complete or incomplete.
    pub fn toggle_task(
        &mut self,
        kind: ProcessKind,
        subject_id: &str,
        stage_id: &str,
        task_id: &str,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<ProcessInstance> {
        let mut instance = self.instance(kind, subject_id)?;
        let transition = instance.toggle_task(stage_id, task_id, completed, now)?;
        debug!(%kind, subject_id, stage_id, task_id, completed, progress = instance.progress, "task toggled");
        self.commit(&instance, transition)?;
        Ok(instance)
    }

    /// Edit a task's due date, assignee or mentor.
    pub fn update_task_details(
        &mut self,
        kind: ProcessKind,
        subject_id: &str,
        stage_id: &str,
        task_id: &str,
        details: TaskDetails,
        now: DateTime<Utc>,
    ) -> Result<ProcessInstance> {
        let mut instance = self.instance(kind, subject_id)?;
        instance.update_task_details(stage_id, task_id, details, now)?;
        self.store.save_instance(&instance)?;
        Ok(instance)
    }

    /// Merge the live template into the stored instance.
    ///
    /// A missing template merges as zero stages, which empties the instance.
    pub fn resync(&mut self, kind: ProcessKind, subject_id: &str, now: DateTime<Utc>) -> Result<ProcessInstance> {
        let (template, state) = self.template(kind)?;
        if state == TemplateState::NotConfigured {
            warn!(%kind, subject_id, "resync against a missing template");
        }
        let mut instance = self.instance(kind, subject_id)?;
        let allowed = self.allow_list(instance.position_id.as_deref())?;
        let transition = instance.resync(&template.stages, allowed.as_ref(), now);
        info!(%kind, subject_id, progress = instance.progress, "process resynced");
        self.commit(&instance, transition)?;
        Ok(instance)
    }

    /// Open tasks of a stored instance that are past due on `today`.
    pub fn overdue_tasks(&self, kind: ProcessKind, subject_id: &str, today: NaiveDate) -> Result<Vec<OverdueTask>> {
        Ok(self.instance(kind, subject_id)?.overdue_report(today))
    }

    /// Remove a subject's instance together with the subject.
    pub fn delete(&mut self, kind: ProcessKind, subject_id: &str) -> Result<bool> {
        let removed = self.store.delete_instance(kind, subject_id)?;
        if removed {
            info!(%kind, subject_id, "process instance deleted");
        }
        Ok(removed)
    }

    /// Programs assigned to a position, in the position's order.
    pub fn assigned_programs<'a>(&self, position_id: &str, programs: &'a [Program]) -> Result<Vec<&'a Program>> {
        Ok(match self.store.load_position(position_id)? {
            Some(position) => programs_for_position(&position, programs),
            None => Vec::new(),
        })
    }
}
