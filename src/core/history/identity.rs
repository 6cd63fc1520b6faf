use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{info, warn};

use super::HistoryReader;
use super::types::{GroupRecord, IdentityUser, UserRecord};

impl HistoryReader {
    /// Checks credentials against the engine identity table. The id match
    /// is case-insensitive; the stored id is returned.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<IdentityUser>> {
        if username.is_empty() || password.is_empty() {
            return Ok(None);
        }
        let username = username.to_string();
        let password = password.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT ID_, FIRST_, LAST_, EMAIL_ FROM ACT_ID_USER
                     WHERE LOWER(ID_) = LOWER(?1) AND PWD_ = ?2",
                    params![username, password],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, Option<String>>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, Option<String>>(3)?,
                        ))
                    },
                )
                .optional()?;
            let Some((id, first, last, email)) = row else {
                return Ok(None);
            };
            let groups = load_groups(conn, &id)?;
            info!(user = %id, groups = groups.len(), "Authenticated engine user");
            Ok(Some(IdentityUser {
                id,
                first_name: first.unwrap_or_default(),
                last_name: last.unwrap_or_default(),
                email: email.unwrap_or_default(),
                groups,
            }))
        })
        .await
    }

    pub async fn user_groups(&self, user_id: &str) -> Vec<String> {
        let user_id = user_id.to_string();
        let uid = user_id.clone();
        match self.with_conn(move |conn| load_groups(conn, &uid)).await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(user = %user_id, "Failed to load groups: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn users(&self) -> Vec<UserRecord> {
        let result = self
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT ID_, COALESCE(FIRST_, '') || ' ' || COALESCE(LAST_, ''), EMAIL_
                     FROM ACT_ID_USER ORDER BY FIRST_, LAST_",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(UserRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
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
            warn!("Failed to list engine users: {}", e);
            Vec::new()
        })
    }

    pub async fn groups(&self) -> Vec<GroupRecord> {
        let result = self
            .with_conn(|conn| {
                let mut stmt = conn.prepare("SELECT ID_, NAME_ FROM ACT_ID_GROUP ORDER BY NAME_")?;
                let rows = stmt.query_map([], |row| {
                    Ok(GroupRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
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
            warn!("Failed to list engine groups: {}", e);
            Vec::new()
        })
    }
}

pub(crate) fn load_groups(conn: &Connection, user_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT GROUP_ID_ FROM ACT_ID_MEMBERSHIP WHERE USER_ID_ = ?1")?;
    let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
