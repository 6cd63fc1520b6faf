use reqwest::{Method, StatusCode};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{DataPage, DeleteStatus, EngineClient, EngineError, IdOnly, Lookup, ProcessDefinition};
use super::{RuntimeTask, Variable, segment};
use crate::core::forms::FormModel;

impl EngineClient {
    pub async fn claim_task(&self, task_id: &str, user_id: &str) -> Result<(), EngineError> {
        let path = format!("/process-api/runtime/tasks/{}", segment(task_id));
        let body = json!({ "action": "claim", "assignee": user_id });
        self.send_json_unit(Method::POST, &path, &body, self.config.standard_timeout())
            .await?;
        info!("Task {} claimed by {}", task_id, user_id);
        Ok(())
    }

    /// Latest, active process definitions sorted by name.
    pub async fn process_definitions(&self) -> Result<Vec<ProcessDefinition>, EngineError> {
        let path = "/process-api/repository/process-definitions?latest=true&suspended=false&sort=name";
        let page: DataPage<ProcessDefinition> =
            self.get_json(path, self.config.standard_timeout()).await?;
        Ok(page.data)
    }

    pub async fn process_definition(&self, definition_id: &str) -> Lookup<ProcessDefinition> {
        let path = format!(
            "/process-api/repository/process-definitions/{}",
            segment(definition_id)
        );
        Lookup::from(
            self.get_json::<ProcessDefinition>(&path, self.config.standard_timeout())
                .await,
        )
    }

    pub async fn start_form(&self, definition_id: &str) -> Lookup<FormModel> {
        let path = format!(
            "/process-api/repository/process-definitions/{}/start-form",
            segment(definition_id)
        );
        Lookup::from(
            self.get_json::<FormModel>(&path, self.config.standard_timeout())
                .await,
        )
    }

    /// Starts a process on behalf of `user_id` and returns the instance id.
    ///
    /// The engine records the service account as starter, so afterwards the
    /// `initiator` variable is rewritten and tasks the service account holds
    /// are handed to the user. Those follow-ups are best effort.
    pub async fn start_process(
        &self,
        definition_id: &str,
        mut variables: Vec<Variable>,
        user_id: &str,
    ) -> Result<String, EngineError> {
        variables.push(Variable::new("initiator", user_id));
        variables.push(Variable::new("startUserId", user_id));
        let body = json!({
            "processDefinitionId": definition_id,
            "returnVariables": true,
            "variables": variables,
            "startUserId": user_id,
        });
        let started: IdOnly = self
            .send_json(
                Method::POST,
                "/process-api/runtime/process-instances",
                &body,
                self.config.standard_timeout(),
            )
            .await?;
        let instance_id = started
            .id
            .ok_or_else(|| EngineError::Decode("process start returned no id".into()))?;
        info!("Started process {} from {} for {}", instance_id, definition_id, user_id);

        self.hand_over_started_process(&instance_id, user_id).await;
        Ok(instance_id)
    }

    async fn hand_over_started_process(&self, instance_id: &str, user_id: &str) {
        let timeout = self.config.light_timeout();
        let path = format!(
            "/process-api/runtime/process-instances/{}/variables",
            segment(instance_id)
        );
        let initiator = [Variable::new("initiator", user_id)];
        if let Err(e) = self.send_json_unit(Method::PUT, &path, &initiator, timeout).await {
            warn!("Could not set initiator on {}: {}", instance_id, e);
        }

        let path = format!(
            "/process-api/runtime/tasks?processInstanceId={}",
            urlencoding::encode(instance_id)
        );
        let tasks = match self.get_json::<DataPage<RuntimeTask>>(&path, timeout).await {
            Ok(page) => page.data,
            Err(e) => {
                warn!("Could not list tasks of {}: {}", instance_id, e);
                return;
            }
        };
        let service_user = self.config.username.as_str();
        for task in tasks
            .iter()
            .filter(|t| t.assignee.as_deref() == Some(service_user))
        {
            let path = format!("/process-api/runtime/tasks/{}", segment(&task.id));
            let body = json!({ "assignee": user_id });
            match self.send_json_unit(Method::PUT, &path, &body, timeout).await {
                Ok(()) => debug!("Task {} reassigned to {}", task.id, user_id),
                Err(e) => warn!("Could not reassign task {}: {}", task.id, e),
            }
        }
    }

    /// Starts a process by definition key without the hand-over step. Used
    /// by bulk uploads.
    pub async fn start_process_by_key(
        &self,
        key: &str,
        variables: Vec<Variable>,
    ) -> Result<String, EngineError> {
        let body = json!({
            "processDefinitionKey": key,
            "variables": variables,
            "returnVariables": false,
        });
        let started: IdOnly = self
            .send_json(
                Method::POST,
                "/process-api/runtime/process-instances",
                &body,
                self.config.light_timeout(),
            )
            .await?;
        Ok(started.id.unwrap_or_default())
    }

    /// Deletes a running instance, or its history when it has already ended.
    /// Error statuses carry the engine's response body as sent.
    pub async fn delete_process_instance(&self, instance_id: &str) -> DeleteStatus {
        let timeout = self.config.heavy_timeout();
        let runtime = format!(
            "/process-api/runtime/process-instances/{}?deleteReason=BulkCleanup",
            segment(instance_id)
        );
        match self.delete_raw(&runtime, timeout).await {
            Ok((StatusCode::OK | StatusCode::NO_CONTENT, _)) => return DeleteStatus::DeletedRuntime,
            Ok((StatusCode::NOT_FOUND, _)) => {}
            Ok((_, body)) => return DeleteStatus::RuntimeError(body),
            Err(e) => warn!("Runtime delete of {} failed: {}", instance_id, e),
        }

        let history = format!(
            "/process-api/history/historic-process-instances/{}",
            segment(instance_id)
        );
        match self.delete_raw(&history, timeout).await {
            Ok((StatusCode::OK | StatusCode::NO_CONTENT, _)) => DeleteStatus::DeletedHistory,
            Ok((StatusCode::NOT_FOUND, _)) => DeleteStatus::NotFound,
            Ok((_, body)) => DeleteStatus::HistoryError(body),
            Err(e) => {
                warn!("History delete of {} failed: {}", instance_id, e);
                DeleteStatus::ConnectionError
            }
        }
    }

    async fn delete_raw(
        &self,
        path: &str,
        timeout: std::time::Duration,
    ) -> Result<(StatusCode, String), EngineError> {
        let res = self.request(Method::DELETE, path, timeout)?.send().await?;
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        Ok((status, body))
    }

    /// Ids of historic process instances started inside the window, paged
    /// until the engine returns an empty page.
    pub async fn historic_process_ids(
        &self,
        started_after: Option<&str>,
        started_before: Option<&str>,
    ) -> Result<Vec<String>, EngineError> {
        let size = self.config.page_size.max(1);
        let mut ids = Vec::new();
        let mut start = 0;
        loop {
            let mut body = json!({ "start": start, "size": size });
            if let Some(after) = started_after {
                body["startedAfter"] = json!(after);
            }
            if let Some(before) = started_before {
                body["startedBefore"] = json!(before);
            }
            let page: DataPage<IdOnly> = self
                .send_json(
                    Method::POST,
                    "/process-api/query/historic-process-instances",
                    &body,
                    self.config.heavy_timeout(),
                )
                .await?;
            if page.data.is_empty() {
                break;
            }
            let fetched = page.data.len();
            ids.extend(page.data.into_iter().filter_map(|p| p.id));
            start += fetched;
        }
        debug!("Historic process query returned {} ids", ids.len());
        Ok(ids)
    }
}
