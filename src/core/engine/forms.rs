use indexmap::IndexMap;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, warn};

use super::{DataPage, EngineClient, EngineError, FormSubmission, IdOnly, Lookup, RuntimeTask};
use super::{first_found, segment, variables_from_json};
use crate::core::forms::{FieldValue, FormModel};

/// Prefixes under which the form-repository model endpoint may be mounted.
const MODEL_PREFIXES: [&str; 3] = ["/form-api", "/process-api", "/app-api"];

impl EngineClient {
    /// Flat form of a runtime task.
    pub async fn task_form(&self, task_id: &str) -> Lookup<FormModel> {
        let path = format!("/process-api/runtime/tasks/{}/form", segment(task_id));
        Lookup::from(self.get_json::<FormModel>(&path, self.config.standard_timeout()).await)
    }

    /// Flat form of a completed task, with the values it was submitted with.
    pub async fn historic_task_form(&self, task_id: &str) -> Lookup<FormModel> {
        let path = format!(
            "/process-api/history/historic-task-instances/{}/form",
            segment(task_id)
        );
        Lookup::from(self.get_json::<FormModel>(&path, self.config.standard_timeout()).await)
    }

    pub async fn runtime_task(&self, task_id: &str) -> Lookup<RuntimeTask> {
        let path = format!("/process-api/runtime/tasks/{}", segment(task_id));
        Lookup::from(self.get_json::<RuntimeTask>(&path, self.config.light_timeout()).await)
    }

    /// Finds the form definition behind a task: the flat form's own id, then
    /// the task's form key, then the form runtime's view of the task.
    pub async fn form_definition_id(&self, task_id: &str, flat: Option<&FormModel>) -> Option<String> {
        if let Some(id) = flat.and_then(|f| f.form_definition_id.clone()) {
            return Some(id);
        }

        if let Some(form_key) = self.runtime_task(task_id).await.found().and_then(|t| t.form_key) {
            let path = format!(
                "/form-api/form-repository/form-definitions?key={}&latest=true",
                urlencoding::encode(&form_key)
            );
            let page = Lookup::from(
                self.get_json::<DataPage<IdOnly>>(&path, self.config.light_timeout())
                    .await,
            );
            if let Some(id) = page
                .found()
                .and_then(|p| p.data.into_iter().next())
                .and_then(|d| d.id)
            {
                return Some(id);
            }
        }

        let path = format!("/form-api/form-runtime/tasks/{}", segment(task_id));
        let runtime = Lookup::from(
            self.get_json::<serde_json::Value>(&path, self.config.light_timeout())
                .await,
        );
        runtime
            .found()
            .and_then(|v| v.get("formDefinitionId").and_then(|id| id.as_str()).map(String::from))
    }

    /// Layout model of a form definition, probing each API prefix.
    pub async fn form_model(&self, definition_id: &str) -> Lookup<FormModel> {
        let candidates = MODEL_PREFIXES
            .iter()
            .map(|prefix| {
                format!(
                    "{}/form-repository/form-definitions/{}/model",
                    prefix,
                    segment(definition_id)
                )
            })
            .collect();
        let timeout = self.config.standard_timeout();
        first_found(candidates, |path| async move {
            Lookup::from(self.get_json::<FormModel>(&path, timeout).await)
        })
        .await
    }

    /// Rows/cols layout for a task. Outcomes missing from the model are
    /// taken from the flat form.
    pub async fn task_layout(&self, task_id: &str, flat: Option<&FormModel>) -> Option<FormModel> {
        let definition_id = self.form_definition_id(task_id, flat).await?;
        match self.form_model(&definition_id).await {
            Lookup::Found(mut model) => {
                if model.outcomes.is_empty()
                    && let Some(flat) = flat
                {
                    model.outcomes = flat.outcomes.clone();
                }
                if model.form_definition_id.is_none() {
                    model.form_definition_id = Some(definition_id);
                }
                Some(model)
            }
            Lookup::NotFound => None,
            Lookup::Failed(e) => {
                warn!("Form model {} for task {} unavailable: {}", definition_id, task_id, e);
                None
            }
        }
    }

    /// Posts form values for a task. A 404 on the process API retries on the form API.
    pub async fn submit_form(&self, submission: &FormSubmission) -> Result<(), EngineError> {
        let timeout = self.config.standard_timeout();
        match self
            .send_json_unit(Method::POST, "/process-api/form/form-data", submission, timeout)
            .await
        {
            Err(e) if e.is_not_found() => {
                debug!("Process form endpoint missing, retrying on form API");
                self.send_json_unit(Method::POST, "/form-api/form-data", submission, timeout)
                    .await
            }
            other => other,
        }
    }

    /// Values of every form submitted in a process, oldest first.
    pub async fn historic_form_instances(&self, proc_inst_id: &str) -> Vec<IndexMap<String, FieldValue>> {
        let path = format!(
            "/form-api/form-history/form-instances?processInstanceId={}&sort=submittedDate&order=asc",
            urlencoding::encode(proc_inst_id)
        );
        let page: DataPage<serde_json::Value> =
            match self.get_json(&path, self.config.standard_timeout()).await {
                Ok(page) => page,
                Err(e) => {
                    debug!("No historic form instances for {}: {}", proc_inst_id, e);
                    return Vec::new();
                }
            };

        let mut snapshots = Vec::new();
        for item in page.data {
            let Some(id) = item.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            let values = match item.get("values").filter(|v| has_values(v)) {
                Some(values) => Some(values.clone()),
                None => self.form_instance_values(id).await,
            };
            if let Some(serde_json::Value::Object(map)) = values {
                snapshots.push(
                    map.into_iter()
                        .map(|(k, v)| (k, FieldValue::from(v)))
                        .collect(),
                );
            }
        }
        snapshots
    }

    async fn form_instance_values(&self, instance_id: &str) -> Option<serde_json::Value> {
        let path = format!("/form-api/form-history/form-instances/{}", segment(instance_id));
        let detail = Lookup::from(
            self.get_json::<serde_json::Value>(&path, self.config.light_timeout())
                .await,
        );
        detail
            .found()
            .and_then(|d| d.get("values").cloned())
            .filter(has_values)
    }

    pub async fn task_variables(&self, task_id: &str) -> IndexMap<String, FieldValue> {
        let path = format!("/process-api/runtime/tasks/{}/variables", segment(task_id));
        self.variable_list(&path).await
    }

    pub async fn process_variables(&self, proc_inst_id: &str) -> IndexMap<String, FieldValue> {
        let path = format!(
            "/process-api/runtime/process-instances/{}/variables",
            segment(proc_inst_id)
        );
        self.variable_list(&path).await
    }

    /// Historic variables of a process; falls back to the query endpoint
    /// when the listing is unavailable or empty.
    pub async fn historic_variables(&self, proc_inst_id: &str) -> IndexMap<String, FieldValue> {
        let timeout = self.config.standard_timeout();
        let path = format!(
            "/process-api/history/historic-variable-instances?processInstanceId={}&size=1000",
            urlencoding::encode(proc_inst_id)
        );
        match self.get_json::<DataPage<serde_json::Value>>(&path, timeout).await {
            Ok(page) => {
                let listed = variables_from_json(&page.data);
                if !listed.is_empty() {
                    return listed;
                }
                debug!("Historic variable listing empty for {}", proc_inst_id);
            }
            Err(e) => debug!("Historic variable listing failed for {}: {}", proc_inst_id, e),
        }

        let body = json!({ "processInstanceId": proc_inst_id, "size": 1000 });
        match self
            .send_json::<_, DataPage<serde_json::Value>>(
                Method::POST,
                "/process-api/query/historic-variable-instances",
                &body,
                timeout,
            )
            .await
        {
            Ok(page) => variables_from_json(&page.data),
            Err(e) => {
                debug!("Historic variable query failed for {}: {}", proc_inst_id, e);
                IndexMap::new()
            }
        }
    }

    async fn variable_list(&self, path: &str) -> IndexMap<String, FieldValue> {
        match self
            .get_json::<Vec<serde_json::Value>>(path, self.config.standard_timeout())
            .await
        {
            Ok(items) => variables_from_json(&items),
            Err(e) => {
                debug!("Variable fetch {} failed: {}", path, e);
                IndexMap::new()
            }
        }
    }
}

fn has_values(v: &serde_json::Value) -> bool {
    v.as_object().is_some_and(|m| !m.is_empty())
}
