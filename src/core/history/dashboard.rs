use anyhow::Result;
use rusqlite::{Connection, params, params_from_iter};
use tracing::warn;

use super::types::{
    ActivitySites, CircleHeadSummary, DesignTeamSummary, SummaryFilter, UserTaskFilter,
    UserTaskRow, UserTaskStats,
};
use super::{HistoryReader, placeholders};
use crate::core::tasks::TaskStatus;

/// Process instances started in the window that carry a job id.
const BASE_INSTANCES: &str = "
    WITH base AS (
        SELECT DISTINCT P.ID_
        FROM ACT_HI_PROCINST P
        WHERE DATE(P.START_TIME_) BETWEEN ?1 AND ?2
          AND EXISTS (
            SELECT 1 FROM ACT_HI_VARINST V2
            WHERE V2.PROC_INST_ID_ = P.ID_
              AND V2.NAME_ = 'qacajobid'
              AND V2.TEXT_ IS NOT NULL
          )
    )";

const CIRCLE_HEAD_SUMMARY: &str = "
    SELECT
        SUM(CASE WHEN allot IS NOT NULL AND asurvey IS NULL THEN 1 ELSE 0 END),
        SUM(CASE WHEN allot IS NOT NULL AND asurvey IS NOT NULL THEN 1 ELSE 0 END),
        SUM(CASE WHEN allot IS NULL THEN 1 ELSE 0 END)
    FROM (
        SELECT
            MAX(CASE WHEN V.NAME_ IN ('allotmentdate', 'allocationdate') THEN COALESCE(V.LONG_, V.BYTEARRAY_ID_) END) AS allot,
            MAX(CASE WHEN V.NAME_ = 'actualsurveydate' THEN COALESCE(V.LONG_, V.BYTEARRAY_ID_) END) AS asurvey,
            MAX(CASE WHEN V.NAME_ = 'circle' THEN V.TEXT_ END) AS circle,
            MAX(CASE WHEN V.NAME_ = 'activitytype' THEN V.TEXT_ END) AS activity
        FROM base B
        JOIN ACT_HI_VARINST V ON B.ID_ = V.PROC_INST_ID_
        GROUP BY B.ID_
    ) X
    WHERE (?3 = '' OR circle = ?3)
      AND (?4 = '' OR activity = ?4)";

const DESIGN_TEAM_SUMMARY: &str = "
    SELECT
        SUM(CASE WHEN srecv IS NOT NULL AND rcomp IS NULL THEN 1 ELSE 0 END),
        SUM(CASE WHEN srecv IS NOT NULL AND rcomp IS NOT NULL THEN 1 ELSE 0 END)
    FROM (
        SELECT
            MAX(CASE WHEN V.NAME_ = 'surveydatereceived' THEN COALESCE(V.LONG_, V.BYTEARRAY_ID_) END) AS srecv,
            MAX(CASE WHEN V.NAME_ = 'reviewcompletiondate' THEN COALESCE(V.LONG_, V.BYTEARRAY_ID_) END) AS rcomp,
            MAX(CASE WHEN V.NAME_ = 'circle' THEN V.TEXT_ END) AS circle,
            MAX(CASE WHEN V.NAME_ = 'activitytype' THEN V.TEXT_ END) AS activity
        FROM base B
        JOIN ACT_HI_VARINST V ON B.ID_ = V.PROC_INST_ID_
        GROUP BY B.ID_
    ) X
    WHERE (?3 = '' OR circle = ?3)
      AND (?4 = '' OR activity = ?4)";

fn window(filter: &SummaryFilter) -> (String, String) {
    let start = if filter.start.is_empty() {
        "1900-01-01".to_string()
    } else {
        filter.start.clone()
    };
    let end = if filter.end.is_empty() {
        "9999-12-31".to_string()
    } else {
        filter.end.clone()
    };
    (start, end)
}

impl HistoryReader {
    /// Pending, completed and flagged counts for circle heads. Zeros on error.
    pub async fn circle_head_summary(&self, filter: &SummaryFilter) -> CircleHeadSummary {
        let (start, end) = window(filter);
        let (circle, activity) = (filter.circle.clone(), filter.activity.clone());
        let sql = format!("{BASE_INSTANCES} {CIRCLE_HEAD_SUMMARY}");
        let result = self
            .with_conn(move |conn| {
                let summary = conn.query_row(&sql, params![start, end, circle, activity], |row| {
                    Ok(CircleHeadSummary {
                        pending: row.get::<_, Option<i64>>(0)?.unwrap_or(0),
                        completed: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                        flag: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                    })
                })?;
                Ok(summary)
            })
            .await;
        result.unwrap_or_else(|e| {
            warn!("Circle head summary failed: {}", e);
            CircleHeadSummary::default()
        })
    }

    /// Pending and completed counts for the design team. Zeros on error.
    pub async fn design_team_summary(&self, filter: &SummaryFilter) -> DesignTeamSummary {
        let (start, end) = window(filter);
        let (circle, activity) = (filter.circle.clone(), filter.activity.clone());
        let sql = format!("{BASE_INSTANCES} {DESIGN_TEAM_SUMMARY}");
        let result = self
            .with_conn(move |conn| {
                let summary = conn.query_row(&sql, params![start, end, circle, activity], |row| {
                    Ok(DesignTeamSummary {
                        pending: row.get::<_, Option<i64>>(0)?.unwrap_or(0),
                        completed: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                    })
                })?;
                Ok(summary)
            })
            .await;
        result.unwrap_or_else(|e| {
            warn!("Design team summary failed: {}", e);
            DesignTeamSummary::default()
        })
    }

    /// Distinct completed sites per activity for processes the user started
    /// or initiated.
    pub async fn user_activity_sites(&self, user_id: &str) -> Vec<ActivitySites> {
        let user_id = user_id.to_string();
        let result = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT activity, COUNT(DISTINCT siteid) AS completed_sites
                     FROM (
                        SELECT P.ID_,
                            MAX(CASE WHEN V.NAME_ = 'activitytype' THEN V.TEXT_ END) AS activity,
                            MAX(CASE WHEN V.NAME_ = 'siteid' THEN V.TEXT_ END) AS siteid,
                            MAX(CASE WHEN V.NAME_ = 'initiator' THEN V.TEXT_ END) AS initiator,
                            P.START_USER_ID_ AS start_user
                        FROM ACT_HI_PROCINST P
                        JOIN ACT_HI_VARINST V ON V.PROC_INST_ID_ = P.ID_
                        WHERE P.END_TIME_ IS NOT NULL
                        GROUP BY P.ID_
                     ) X
                     WHERE activity IS NOT NULL AND siteid IS NOT NULL
                       AND (start_user = ?1 OR initiator = ?1)
                     GROUP BY activity
                     ORDER BY completed_sites DESC",
                )?;
                let rows = stmt.query_map(params![user_id], |row| {
                    Ok(ActivitySites {
                        activity: row.get(0)?,
                        completed_sites: row.get(1)?,
                    })
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await;
        result.unwrap_or_else(|e| {
            warn!("User activity sites failed: {}", e);
            Vec::new()
        })
    }

    pub async fn activity_types(&self) -> Vec<String> {
        self.distinct_text(
            "SELECT DISTINCT TEXT_ FROM ACT_HI_VARINST
             WHERE NAME_ = 'activitytype' AND TEXT_ IS NOT NULL AND TEXT_ != ''
             ORDER BY TEXT_ ASC",
        )
        .await
    }

    pub async fn site_ids(&self) -> Vec<String> {
        self.distinct_text(
            "SELECT DISTINCT TEXT_ FROM ACT_HI_VARINST
             WHERE NAME_ = 'siteid' AND TEXT_ IS NOT NULL AND TEXT_ != ''
             ORDER BY TEXT_ ASC",
        )
        .await
    }

    async fn distinct_text(&self, sql: &'static str) -> Vec<String> {
        let result = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(sql)?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await;
        result.unwrap_or_else(|e| {
            warn!("Distinct value query failed: {}", e);
            Vec::new()
        })
    }

    /// Tasks the user holds or may claim, pending first. Empty on error.
    pub async fn user_task_stats(&self, user_id: &str, filter: &UserTaskFilter) -> UserTaskStats {
        let user_id = user_id.to_string();
        let filter = filter.clone();
        let result = self
            .with_conn(move |conn| {
                let groups = super::identity::load_groups(conn, &user_id)?;
                load_user_tasks(conn, &user_id, &groups, &filter)
            })
            .await;
        match result {
            Ok(rows) => UserTaskStats::from_rows(rows),
            Err(e) => {
                warn!("User task stats failed: {}", e);
                UserTaskStats::default()
            }
        }
    }
}

fn load_user_tasks(
    conn: &Connection,
    user_id: &str,
    groups: &[String],
    filter: &UserTaskFilter,
) -> Result<Vec<UserTaskRow>> {
    let mut candidate = String::from("USER_ID_ = ?");
    if !groups.is_empty() {
        candidate.push_str(&format!(" OR GROUP_ID_ IN ({})", placeholders(groups.len())));
    }
    let mut args: Vec<String> = vec![user_id.to_string(), user_id.to_string()];
    args.extend(groups.iter().cloned());

    let mut where_clause = format!(
        "WHERE (
            T.ASSIGNEE_ = ?
            OR (
                T.ASSIGNEE_ IS NULL
                AND T.ID_ IN (
                    SELECT TASK_ID_ FROM ACT_HI_IDENTITYLINK
                    WHERE TYPE_ = 'candidate' AND ({candidate})
                )
            )
        )"
    );
    if let Some(site) = filter.site.as_deref().filter(|s| !s.is_empty()) {
        where_clause.push_str(" AND siteid LIKE ?");
        args.push(format!("%{site}%"));
    }
    if let Some(activity) = filter.activity.as_deref().filter(|s| !s.is_empty()) {
        where_clause.push_str(" AND activitytype = ?");
        args.push(activity.to_string());
    }

    let sql = format!(
        "SELECT T.ID_, T.NAME_, T.START_TIME_, T.END_TIME_, V.siteid, V.activitytype, T.PROC_INST_ID_
         FROM ACT_HI_TASKINST T
         JOIN (
            SELECT PROC_INST_ID_,
                   MAX(CASE WHEN NAME_ = 'siteid' THEN TEXT_ END) AS siteid,
                   MAX(CASE WHEN NAME_ = 'activitytype' THEN TEXT_ END) AS activitytype
            FROM ACT_HI_VARINST
            GROUP BY PROC_INST_ID_
         ) V ON V.PROC_INST_ID_ = T.PROC_INST_ID_
         {where_clause}
         ORDER BY (T.END_TIME_ IS NULL) DESC, T.END_TIME_ DESC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
        let start: Option<String> = row.get(2)?;
        let end: Option<String> = row.get(3)?;
        Ok(UserTaskRow {
            id: row.get(0)?,
            name: row.get(1)?,
            siteid: row.get(4)?,
            activity: row.get(5)?,
            status: TaskStatus::from_end_time(end.as_deref()),
            date: display_minute(end.as_deref().or(start.as_deref())),
            proc_inst_id: row.get(6)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// `YYYY-MM-DD HH:MM` from a stored timestamp, or `-`.
fn display_minute(ts: Option<&str>) -> String {
    match ts.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.replacen('T', " ", 1).chars().take(16).collect(),
        None => "-".to_string(),
    }
}
