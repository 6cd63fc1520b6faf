//! Task workflow: detail, reconciled form page, claim, submit and process start.

pub mod state;
pub mod submission;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::core::engine::{EngineClient, Lookup, ProcessDefinition};
use crate::core::forms::{self, Catalog, FormModel, ValueSources};
use crate::core::history::{HistoryReader, TaskDetail, UserTaskFilter, UserTaskRow, UserTaskStats};

pub use state::{ActionDenied, TaskAction, TaskStatus, can_transition, check_action};
pub use submission::{SubmittedForm, UPLOAD_PREFIX, start_variables, task_properties};

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Unknown, or not visible to the requesting user.
    #[error("Task not found or not assigned to you.")]
    NotFound,

    #[error(transparent)]
    Denied(#[from] ActionDenied),

    /// The engine refused the call; the message is shown as-is.
    #[error("{0}")]
    Engine(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Everything the task form screen needs.
#[derive(Debug, Clone, Serialize)]
pub struct FormPage {
    pub task: TaskDetail,
    pub form: Option<FormModel>,
    pub engine_link: String,
    pub submit_error: Option<String>,
    pub submit_success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartPage {
    pub process_definition_id: String,
    pub process_definition: Option<ProcessDefinition>,
    pub form: Option<FormModel>,
}

/// Filters for the user's task list. Site and name match by substring,
/// activity exactly, status by name.
#[derive(Debug, Clone, Default)]
pub struct TaskListFilter {
    pub site: Option<String>,
    pub activity: Option<String>,
    pub status: Option<TaskStatus>,
    pub name: Option<String>,
}

impl TaskListFilter {
    fn keeps(&self, row: &UserTaskRow) -> bool {
        if let Some(status) = self.status
            && row.status != status
        {
            return false;
        }
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            let needle = name.to_lowercase();
            return row
                .name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&needle));
        }
        true
    }
}

#[derive(Clone)]
pub struct TaskService {
    engine: EngineClient,
    history: HistoryReader,
    catalog: Arc<Catalog>,
}

impl TaskService {
    pub fn new(engine: EngineClient, history: HistoryReader, catalog: Arc<Catalog>) -> Self {
        Self {
            engine,
            history,
            catalog,
        }
    }

    pub async fn detail(&self, user_id: &str, task_id: &str) -> Result<TaskDetail, TaskError> {
        self.history
            .task_detail(user_id, task_id)
            .await?
            .ok_or(TaskError::NotFound)
    }

    pub async fn list(&self, user_id: &str, filter: &TaskListFilter) -> UserTaskStats {
        let history_filter = UserTaskFilter {
            site: filter.site.clone(),
            activity: filter.activity.clone(),
        };
        let stats = self.history.user_task_stats(user_id, &history_filter).await;
        UserTaskStats::from_rows(stats.tasks.into_iter().filter(|t| filter.keeps(t)).collect())
    }

    /// The flat form for the task: the submitted snapshot once completed,
    /// the runtime form while pending.
    async fn flat_form(&self, task: &TaskDetail) -> Option<FormModel> {
        let lookup = match task.status {
            TaskStatus::Completed => self.engine.historic_task_form(&task.id).await,
            TaskStatus::Pending => self.engine.task_form(&task.id).await,
        };
        match lookup {
            Lookup::Found(form) => Some(form),
            Lookup::NotFound => None,
            Lookup::Failed(e) => {
                warn!("Flat form for task {} unavailable: {}", task.id, e);
                None
            }
        }
    }

    async fn value_sources(&self, task: &TaskDetail, flat: Option<FormModel>) -> ValueSources {
        let proc_id = task.proc_inst_id.clone().unwrap_or_default();
        let (historic_forms, task_variables, process_variables, historic_variables) =
            if proc_id.is_empty() {
                let task_variables = self.engine.task_variables(&task.id).await;
                (Vec::new(), task_variables, Default::default(), Default::default())
            } else {
                tokio::join!(
                    self.engine.historic_form_instances(&proc_id),
                    self.engine.task_variables(&task.id),
                    self.engine.process_variables(&proc_id),
                    self.engine.historic_variables(&proc_id),
                )
            };
        ValueSources {
            historic_forms,
            history_variables: task.variables.clone(),
            task_variables,
            process_variables,
            historic_variables,
            form_snapshot: flat,
        }
    }

    /// Rebuilds the task's form from live sources and reconciles its values.
    async fn build_page(&self, task: TaskDetail) -> FormPage {
        let flat = self.flat_form(&task).await;
        let layout = self.engine.task_layout(&task.id, flat.as_ref()).await;
        let mut form = layout.or_else(|| flat.clone());
        let sources = self.value_sources(&task, flat).await;

        if let Some(model) = form.as_mut() {
            let resolved = forms::reconcile(model, &sources, &self.catalog);
            info!(
                "Reconciled form for task {} from {} values",
                task.id,
                resolved.map().len()
            );
        }

        FormPage {
            engine_link: self.engine.task_app_link(&task.id),
            task,
            form,
            submit_error: None,
            submit_success: false,
        }
    }

    pub async fn form_page(&self, user_id: &str, task_id: &str) -> Result<FormPage, TaskError> {
        let task = self.detail(user_id, task_id).await?;
        Ok(self.build_page(task).await)
    }

    pub async fn claim(&self, user_id: &str, task_id: &str) -> Result<(), TaskError> {
        let task = self.detail(user_id, task_id).await?;
        check_action(
            TaskAction::Claim,
            task.status,
            task.is_assignee,
            task.assignee.is_some(),
            task.can_claim,
        )?;
        self.engine
            .claim_task(task_id, user_id)
            .await
            .map_err(|e| TaskError::Engine(e.to_string()))
    }

    /// Uploads files, submits the values and rebuilds the page from scratch.
    ///
    /// Upload or engine failures come back on the page as `submit_error`
    /// with nothing else changed.
    pub async fn submit(
        &self,
        user_id: &str,
        task_id: &str,
        submitted: SubmittedForm,
    ) -> Result<FormPage, TaskError> {
        let task = self.detail(user_id, task_id).await?;
        check_action(
            TaskAction::Submit,
            task.status,
            task.is_assignee,
            task.assignee.is_some(),
            task.can_claim,
        )?;

        let mut upload_errors = Vec::new();
        for upload in submitted.uploads {
            let file_name = upload.file_name.clone();
            if let Err(e) = self.engine.upload_content(task_id, upload).await {
                upload_errors.push(format!("Error uploading {}: {}", file_name, e));
            }
        }
        if !upload_errors.is_empty() {
            let mut page = self.build_page(task).await;
            page.submit_error = Some(upload_errors.join("; "));
            return Ok(page);
        }

        let flat = self.flat_form(&task).await;
        let layout = match flat.as_ref().filter(|f| !f.is_empty()) {
            Some(_) => None,
            None => self.engine.task_layout(task_id, flat.as_ref()).await,
        };
        let submission = crate::core::engine::FormSubmission {
            task_id: task_id.to_string(),
            properties: task_properties(flat.as_ref(), layout.as_ref(), &submitted.values),
            outcome: submitted.outcome,
        };

        if let Err(e) = self.engine.submit_form(&submission).await {
            warn!("Submit of task {} rejected: {}", task_id, e);
            let mut page = self.build_page(task).await;
            page.submit_error = Some(e.to_string());
            return Ok(page);
        }
        info!("Task {} submitted by {}", task_id, user_id);

        let reloaded = match self.history.task_detail(user_id, task_id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => task,
            Err(e) => {
                warn!("Reload of task {} failed: {}", task_id, e);
                task
            }
        };
        let mut page = self.build_page(reloaded).await;
        page.submit_success = true;
        Ok(page)
    }

    pub async fn start_page(&self, definition_id: &str) -> StartPage {
        let (definition, form) = tokio::join!(
            self.engine.process_definition(definition_id),
            self.engine.start_form(definition_id),
        );
        let form = form.found().map(|mut f| {
            f.normalize();
            f
        });
        StartPage {
            process_definition_id: definition_id.to_string(),
            process_definition: definition.found(),
            form,
        }
    }

    /// Starts a process from its start form on behalf of `user_id`.
    pub async fn start_process(
        &self,
        user_id: &str,
        definition_id: &str,
        submitted: &SubmittedForm,
    ) -> Result<String, TaskError> {
        let form = self.engine.start_form(definition_id).await.found();
        let variables = start_variables(form.as_ref(), &submitted.values);
        self.engine
            .start_process(definition_id, variables, user_id)
            .await
            .map_err(|e| TaskError::Engine(e.to_string()))
    }
}

#[cfg(test)]
mod tests;
