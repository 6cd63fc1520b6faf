use anyhow::Result;
use indexmap::IndexMap;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, warn};

use super::types::{ContentItem, TaskDetail};
use super::variables::{VariableRow, resolve_variable};
use super::{HistoryReader, placeholders};
use crate::core::forms::NamedValue;
use crate::core::tasks::TaskStatus;

struct TaskRow {
    id: String,
    name: Option<String>,
    start: Option<String>,
    end: Option<String>,
    proc_inst_id: Option<String>,
    assignee: Option<String>,
}

impl HistoryReader {
    /// Loads a task for `user_id`, or `None` when it does not exist or the
    /// user may not see it (assigned elsewhere, or not a candidate).
    pub async fn task_detail(&self, user_id: &str, task_id: &str) -> Result<Option<TaskDetail>> {
        let user_id = user_id.to_string();
        let task_id = task_id.to_string();
        self.with_conn(move |conn| load_task_detail(conn, &user_id, &task_id))
            .await
    }

    pub async fn task_variables(&self, proc_inst_id: &str, task_id: &str) -> Result<Vec<NamedValue>> {
        let proc_inst_id = proc_inst_id.to_string();
        let task_id = task_id.to_string();
        self.with_conn(move |conn| load_variables(conn, &proc_inst_id, &task_id))
            .await
    }
}

fn load_task_detail(conn: &Connection, user_id: &str, task_id: &str) -> Result<Option<TaskDetail>> {
    let task = conn
        .query_row(
            "SELECT T.ID_, T.NAME_, T.START_TIME_, T.END_TIME_, T.PROC_INST_ID_, T.ASSIGNEE_
             FROM ACT_HI_TASKINST T WHERE T.ID_ = ?1",
            params![task_id],
            |row| {
                Ok(TaskRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    start: row.get(2)?,
                    end: row.get(3)?,
                    proc_inst_id: row.get(4)?,
                    assignee: row.get(5)?,
                })
            },
        )
        .optional()?;
    let Some(task) = task else {
        return Ok(None);
    };

    let is_assignee = task.assignee.as_deref() == Some(user_id);
    let mut can_claim = false;
    if !is_assignee {
        if task.assignee.as_deref().is_some_and(|a| !a.is_empty()) {
            debug!(task_id, "Task assigned to another user");
            return Ok(None);
        }
        let groups = super::identity::load_groups(conn, user_id)?;
        can_claim = is_candidate(conn, &task.id, user_id, &groups)?;
        if !can_claim {
            debug!(task_id, user_id, "User is not a candidate");
            return Ok(None);
        }
    }

    let proc_inst_id = task.proc_inst_id.clone().unwrap_or_default();
    let variables = load_variables(conn, &proc_inst_id, &task.id)?;
    let content_items = match load_content_items(conn, &proc_inst_id) {
        Ok(items) => items,
        Err(e) => {
            warn!(task_id, "Failed to load content items: {}", e);
            Vec::new()
        }
    };

    Ok(Some(TaskDetail {
        status: TaskStatus::from_end_time(task.end.as_deref()),
        id: task.id,
        name: task.name,
        start: task.start,
        end: task.end,
        proc_inst_id: task.proc_inst_id,
        assignee: task.assignee.filter(|a| !a.is_empty()),
        can_claim,
        is_assignee,
        variables,
        content_items,
    }))
}

/// Live identity links first, history links as the fallback.
pub(crate) fn is_candidate(
    conn: &Connection,
    task_id: &str,
    user_id: &str,
    groups: &[String],
) -> Result<bool> {
    let mut condition = String::from("USER_ID_ = ?");
    if !groups.is_empty() {
        condition.push_str(&format!(" OR GROUP_ID_ IN ({})", placeholders(groups.len())));
    }
    let mut args: Vec<&str> = vec![task_id, user_id];
    args.extend(groups.iter().map(String::as_str));

    let runtime = format!(
        "SELECT 1 FROM ACT_RU_IDENTITYLINK WHERE TASK_ID_ = ? AND TYPE_ = 'candidate' AND ({condition}) LIMIT 1"
    );
    match conn
        .query_row(&runtime, params_from_iter(args.iter()), |_| Ok(()))
        .optional()
    {
        Ok(Some(())) => return Ok(true),
        Ok(None) => {}
        Err(e) => debug!(task_id, "Runtime identity links unavailable: {}", e),
    }

    let history = format!(
        "SELECT 1 FROM ACT_HI_IDENTITYLINK WHERE TASK_ID_ = ? AND TYPE_ = 'candidate' AND ({condition}) LIMIT 1"
    );
    let found = conn
        .query_row(&history, params_from_iter(args.iter()), |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Process and task scoped variables; a task-scoped value replaces a
/// process-scoped one of the same name.
fn load_variables(conn: &Connection, proc_inst_id: &str, task_id: &str) -> Result<Vec<NamedValue>> {
    let mut stmt = conn.prepare(
        "SELECT V.NAME_, V.VAR_TYPE_, V.TEXT_, V.LONG_, V.DOUBLE_, BA.BYTES_, V.TASK_ID_
         FROM ACT_HI_VARINST V
         LEFT JOIN ACT_GE_BYTEARRAY BA ON V.BYTEARRAY_ID_ = BA.ID_
         WHERE V.PROC_INST_ID_ = ?1 OR V.TASK_ID_ = ?2",
    )?;
    let rows = stmt.query_map(params![proc_inst_id, task_id], |row| {
        Ok(VariableRow {
            name: row.get(0)?,
            var_type: row.get(1)?,
            text: row.get(2)?,
            long: row.get(3)?,
            double: row.get(4)?,
            bytes: row.get(5)?,
            task_id: row.get(6)?,
        })
    })?;

    let mut resolved: IndexMap<String, NamedValue> = IndexMap::new();
    for row in rows {
        let row = row?;
        let Some(value) = resolve_variable(&row) else {
            continue;
        };
        let is_task_var = row.task_id.as_deref() == Some(task_id);
        if is_task_var || !resolved.contains_key(&row.name) {
            resolved.insert(
                row.name.clone(),
                NamedValue {
                    name: row.name,
                    value,
                },
            );
        }
    }
    Ok(resolved.into_values().collect())
}

fn load_content_items(conn: &Connection, proc_inst_id: &str) -> Result<Vec<ContentItem>> {
    let mut stmt = conn.prepare(
        "SELECT ID_, NAME_, MIME_TYPE_, CREATED_, CREATED_BY_, FIELD_
         FROM ACT_CO_CONTENT_ITEM
         WHERE PROC_INST_ID_ = ?1
         ORDER BY CREATED_ DESC",
    )?;
    let rows = stmt.query_map(params![proc_inst_id], |row| {
        Ok(ContentItem {
            id: row.get(0)?,
            name: row.get(1)?,
            mime_type: row.get(2)?,
            created: row.get(3)?,
            created_by: row.get(4)?,
            field: row.get(5)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
