
use rusqlite::{Connection, params};
use tempfile::TempDir;

use super::HistoryReader;

const SCHEMA: &str = "
    CREATE TABLE ACT_HI_PROCINST (
        ID_ TEXT PRIMARY KEY, START_TIME_ TEXT, END_TIME_ TEXT, START_USER_ID_ TEXT
    );
    CREATE TABLE ACT_HI_TASKINST (
        ID_ TEXT PRIMARY KEY, NAME_ TEXT, START_TIME_ TEXT, END_TIME_ TEXT,
        PROC_INST_ID_ TEXT, ASSIGNEE_ TEXT
    );
    CREATE TABLE ACT_HI_VARINST (
        ID_ INTEGER PRIMARY KEY AUTOINCREMENT, PROC_INST_ID_ TEXT, TASK_ID_ TEXT, NAME_ TEXT,
        VAR_TYPE_ TEXT, TEXT_ TEXT, LONG_ INTEGER, DOUBLE_ REAL, BYTEARRAY_ID_ TEXT
    );
    CREATE TABLE ACT_GE_BYTEARRAY (ID_ TEXT PRIMARY KEY, BYTES_ BLOB);
    CREATE TABLE ACT_HI_IDENTITYLINK (TASK_ID_ TEXT, TYPE_ TEXT, USER_ID_ TEXT, GROUP_ID_ TEXT);
    CREATE TABLE ACT_CO_CONTENT_ITEM (
        ID_ TEXT PRIMARY KEY, NAME_ TEXT, MIME_TYPE_ TEXT, CREATED_ TEXT, CREATED_BY_ TEXT,
        FIELD_ TEXT, PROC_INST_ID_ TEXT
    );
    CREATE TABLE ACT_ID_USER (ID_ TEXT PRIMARY KEY, FIRST_ TEXT, LAST_ TEXT, EMAIL_ TEXT, PWD_ TEXT);
    CREATE TABLE ACT_ID_GROUP (ID_ TEXT PRIMARY KEY, NAME_ TEXT);
    CREATE TABLE ACT_ID_MEMBERSHIP (USER_ID_ TEXT, GROUP_ID_ TEXT);
";

/// A throwaway history database. The directory lives as long as the fixture.
pub(crate) struct HistoryFixture {
    _dir: TempDir,
    pub conn: Connection,
    pub reader: HistoryReader,
}

impl HistoryFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        Self {
            reader: HistoryReader::new(&path),
            conn,
            _dir: dir,
        }
    }

    pub fn with_runtime_links(self) -> Self {
        self.conn
            .execute_batch(
                "CREATE TABLE ACT_RU_IDENTITYLINK (TASK_ID_ TEXT, TYPE_ TEXT, USER_ID_ TEXT, GROUP_ID_ TEXT);",
            )
            .unwrap();
        self
    }

    pub fn process(&self, id: &str, start: &str, end: Option<&str>, starter: Option<&str>) {
        self.conn
            .execute(
                "INSERT INTO ACT_HI_PROCINST (ID_, START_TIME_, END_TIME_, START_USER_ID_) VALUES (?1, ?2, ?3, ?4)",
                params![id, start, end, starter],
            )
            .unwrap();
    }

    pub fn task(&self, id: &str, name: &str, proc_id: &str, assignee: Option<&str>, end: Option<&str>) {
        self.conn
            .execute(
                "INSERT INTO ACT_HI_TASKINST (ID_, NAME_, START_TIME_, END_TIME_, PROC_INST_ID_, ASSIGNEE_)
                 VALUES (?1, ?2, '2025-01-10 09:00:00', ?3, ?4, ?5)",
                params![id, name, end, proc_id, assignee],
            )
            .unwrap();
    }

    pub fn text_var(&self, proc_id: &str, name: &str, value: &str) {
        self.conn
            .execute(
                "INSERT INTO ACT_HI_VARINST (PROC_INST_ID_, NAME_, VAR_TYPE_, TEXT_) VALUES (?1, ?2, 'string', ?3)",
                params![proc_id, name, value],
            )
            .unwrap();
    }

    pub fn task_text_var(&self, proc_id: &str, task_id: &str, name: &str, value: &str) {
        self.conn
            .execute(
                "INSERT INTO ACT_HI_VARINST (PROC_INST_ID_, TASK_ID_, NAME_, VAR_TYPE_, TEXT_)
                 VALUES (?1, ?2, ?3, 'string', ?4)",
                params![proc_id, task_id, name, value],
            )
            .unwrap();
    }

    pub fn date_var(&self, proc_id: &str, name: &str, millis: i64) {
        self.conn
            .execute(
                "INSERT INTO ACT_HI_VARINST (PROC_INST_ID_, NAME_, VAR_TYPE_, LONG_) VALUES (?1, ?2, 'date', ?3)",
                params![proc_id, name, millis],
            )
            .unwrap();
    }

    pub fn blob_var(&self, proc_id: &str, name: &str, bytes: &[u8]) {
        let blob_id = format!("ba-{proc_id}-{name}");
        self.conn
            .execute(
                "INSERT INTO ACT_GE_BYTEARRAY (ID_, BYTES_) VALUES (?1, ?2)",
                params![blob_id, bytes],
            )
            .unwrap();
        self.conn
            .execute(
                "INSERT INTO ACT_HI_VARINST (PROC_INST_ID_, NAME_, VAR_TYPE_, BYTEARRAY_ID_)
                 VALUES (?1, ?2, 'serializable', ?3)",
                params![proc_id, name, blob_id],
            )
            .unwrap();
    }

    pub fn candidate_group(&self, task_id: &str, group: &str) {
        self.conn
            .execute(
                "INSERT INTO ACT_HI_IDENTITYLINK (TASK_ID_, TYPE_, GROUP_ID_) VALUES (?1, 'candidate', ?2)",
                params![task_id, group],
            )
            .unwrap();
    }

    pub fn candidate_user(&self, task_id: &str, user: &str) {
        self.conn
            .execute(
                "INSERT INTO ACT_HI_IDENTITYLINK (TASK_ID_, TYPE_, USER_ID_) VALUES (?1, 'candidate', ?2)",
                params![task_id, user],
            )
            .unwrap();
    }

    pub fn user(&self, id: &str, password: &str, groups: &[&str]) {
        self.conn
            .execute(
                "INSERT INTO ACT_ID_USER (ID_, FIRST_, LAST_, EMAIL_, PWD_) VALUES (?1, 'Test', 'User', ?2, ?3)",
                params![id, format!("{id}@example.com"), password],
            )
            .unwrap();
        for group in groups {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO ACT_ID_GROUP (ID_, NAME_) VALUES (?1, ?1)",
                    params![group],
                )
                .unwrap();
            self.conn
                .execute(
                    "INSERT INTO ACT_ID_MEMBERSHIP (USER_ID_, GROUP_ID_) VALUES (?1, ?2)",
                    params![id, group],
                )
                .unwrap();
        }
    }

    pub fn content(&self, id: &str, proc_id: &str, created: &str) {
        self.conn
            .execute(
                "INSERT INTO ACT_CO_CONTENT_ITEM (ID_, NAME_, MIME_TYPE_, CREATED_, CREATED_BY_, FIELD_, PROC_INST_ID_)
                 VALUES (?1, ?1, 'application/pdf', ?2, 'alice', 'report', ?3)",
                params![id, created, proc_id],
            )
            .unwrap();
    }
}

/// Serialized legacy date: header, marker, big-endian millis.
pub(crate) fn legacy_date_blob(millis: i64) -> Vec<u8> {
    let mut bytes = b"\xac\xed\x00\x05sr\x00\x17org.joda.time.LocalDate".to_vec();
    bytes.extend_from_slice(&[0x78, 0x70]);
    bytes.extend_from_slice(&millis.to_be_bytes());
    bytes
}

#[tokio::test]
async fn ping_counts_task_rows() {
    let fx = HistoryFixture::new();
    fx.task("t1", "Review", "p1", None, None);
    assert_eq!(fx.reader.ping().await.unwrap(), 1);
}

#[tokio::test]
async fn missing_database_is_an_error() {
    let reader = HistoryReader::new("/nonexistent/dir/history.db");
    assert!(reader.ping().await.is_err());
}
