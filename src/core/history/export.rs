use std::collections::BTreeSet;

use anyhow::Result;
use indexmap::IndexMap;
use rusqlite::{Connection, params, params_from_iter};

use super::{HistoryReader, placeholders};
use crate::core::forms::dates::format_epoch_millis;

pub const NOT_AVAILABLE: &str = "N/A";
const EXPORT_DATE_FORMAT: &str = "%d-%m-%Y";

/// Variables whose long column holds epoch milliseconds.
const DATE_VARIABLES: [&str; 13] = [
    "surveytargetdate",
    "surveysenttodesign",
    "allotmentdate",
    "allocationdate",
    "finalduedate",
    "actualsurveydate",
    "surveydatereceived",
    "surveyvalidationdate",
    "reportcompletiondate",
    "reportcompletiondate1",
    "layoutpreparationdate",
    "strdetailcompletiondate",
    "reviewcompletiondate",
];

pub const INSTANCE_COLUMNS: [&str; 4] = ["Process Instance ID", "Start Date", "End Date", "Status"];

/// Report header and the variables feeding it, first present wins.
pub const VARIABLE_COLUMNS: &[(&str, &[&str])] = &[
    ("Circle Head Name", &["initiator"]),
    ("QACA Job ID", &["qacajobid"]),
    ("Odoo ID", &["odooid"]),
    ("Site ID", &["siteid"]),
    ("Site Name", &["sitename"]),
    ("Circle", &["circle"]),
    ("Client", &["client"]),
    ("Activity Type", &["activitytype"]),
    ("Rate of Audit", &["rateofaudit"]),
    ("Allocation Type", &["allocationtype"]),
    ("Assigned Survey Co-ordinator", &["assignsurveycoordinator"]),
    ("Assigned Survey Engineer", &["surveyengineername"]),
    ("Survey Upload Client Portal", &["surveyupload-clientportal"]),
    ("Is Survey Included", &["issurveyincluded"]),
    ("Survey Target Date", &["surveytargetdate"]),
    ("Survey Sent To Design", &["surveysenttodesign"]),
    ("Allocation Date", &["allotmentdate", "allocationdate"]),
    ("Final Due Date", &["finalduedate"]),
    ("Assigned Design Lead", &["assigndesignlead"]),
    ("Actual Survey Date", &["actualsurveydate"]),
    ("Survey Date Received", &["surveydatereceived"]),
    ("Report Category Only For BFS", &["reportcategoryonlyforbfs"]),
    ("Survey Validator", &["assignsurveyvalidator"]),
    ("Time Taken - Survey Validator", &["timetaken"]),
    ("Survey Validation Date", &["surveyvalidationdate"]),
    ("Design Engineer Str", &["assigndesignstr"]),
    ("Time Taken - Design Engineer Str", &["timetaken3"]),
    ("Report Completion Date Design Eng Str", &["reportcompletiondate"]),
    ("Design Engineer", &["assigndesignengineer"]),
    ("Time Taken - Design Engineer", &["timetaken0"]),
    ("Report Completion Date", &["reportcompletiondate1"]),
    ("Draftperson Layout", &["assigndraftpersonlayout"]),
    ("Time Taken - Draftperson Layout", &["timetaken2"]),
    ("Layout Preparation Date", &["layoutpreparationdate"]),
    ("Draftperson Str/Detail", &["assigndraftpersonstrdetail"]),
    ("Time Taken - Draftperson Str/Detail", &["timetaken1"]),
    ("STR /Detail Completion Date", &["strdetailcompletiondate"]),
    ("Survey-FTR", &["surveyftr"]),
    ("Assigned Quality Checker", &["assignqualitychecker"]),
    ("Review Completion Date", &["reviewcompletiondate"]),
    ("Reason Behind Delay in TAT", &["reasonbehindtatinlay"]),
    ("Site Status", &["sitestatus"]),
    ("Approval Status", &["approvalstatus"]),
    ("Work Done In", &["workdonein"]),
    ("Mail sent to Circle Head", &["mailsenttocirclehead"]),
    ("Rejection By Design Lead", &["rejectioncomment"]),
    ("Remark from Design coordinator", &["remarkfromdesigncoordinator"]),
    ("Rejection By Quality Checker", &["rejectionreason"]),
    ("Assign Design STR-Lead", &["assigndesignstrlead1"]),
    ("Assigned Design-STR", &["assigndesignstr1"]),
    ("Design STR Approval", &["strapprovalstatus"]),
    ("Assigned DraftPerson STR/Detail-Lead", &["assigndraftpersonstrdetaillead1"]),
    ("Assigned Draftperson STR/Detail", &["assigndraftpersondetail"]),
];

/// Every export header in output order.
pub fn export_headers() -> Vec<&'static str> {
    INSTANCE_COLUMNS
        .iter()
        .copied()
        .chain(VARIABLE_COLUMNS.iter().map(|(header, _)| *header))
        .collect()
}

pub type ExportRow = IndexMap<String, String>;

/// Filterable variables for the process data view.
pub const PROCESS_FILTERS: [&str; 4] = ["qacajobid", "siteid", "circle", "activitytype"];

struct InstanceRow {
    id: String,
    start: Option<String>,
    end: Option<String>,
    completed: bool,
}

/// Text for a history variable in report form, or `None` when every column is empty.
pub fn export_value(
    name: &str,
    text: Option<String>,
    long: Option<i64>,
    double: Option<f64>,
) -> Option<String> {
    if DATE_VARIABLES.contains(&name)
        && let Some(ms) = long
        && let Some(date) = format_epoch_millis(ms, EXPORT_DATE_FORMAT)
    {
        return Some(date);
    }
    text.or_else(|| double.map(|d| d.to_string()))
        .or_else(|| long.map(|l| l.to_string()))
}

impl HistoryReader {
    /// Report rows for `instance_ids`, newest start first.
    pub async fn export_rows(&self, instance_ids: &[String]) -> Result<Vec<ExportRow>> {
        if instance_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = instance_ids.to_vec();
        self.with_conn(move |conn| load_export_rows(conn, &ids)).await
    }

    /// Distinct non-null text values for each process-data filter.
    pub async fn process_filter_values(&self) -> Result<IndexMap<String, Vec<String>>> {
        self.with_conn(|conn| {
            let mut out = IndexMap::new();
            let mut stmt = conn.prepare(
                "SELECT DISTINCT TEXT_ FROM ACT_HI_VARINST
                 WHERE NAME_ = ?1 AND TEXT_ IS NOT NULL ORDER BY TEXT_",
            )?;
            for name in PROCESS_FILTERS {
                let rows = stmt.query_map(params![name], |row| row.get::<_, String>(0))?;
                let mut values = Vec::new();
                for row in rows {
                    values.push(row?);
                }
                out.insert(name.to_string(), values);
            }
            Ok(out)
        })
        .await
    }

    /// Instances matching every provided filter. No filters means no rows.
    pub async fn instance_ids_matching(&self, filters: &IndexMap<String, String>) -> Result<Vec<String>> {
        let active: Vec<(String, String)> = PROCESS_FILTERS
            .iter()
            .filter_map(|name| {
                filters
                    .get(*name)
                    .filter(|v| !v.is_empty())
                    .map(|v| (name.to_string(), v.clone()))
            })
            .collect();
        if active.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT PROC_INST_ID_ FROM ACT_HI_VARINST WHERE NAME_ = ?1 AND TEXT_ = ?2",
            )?;
            let mut matched: Option<BTreeSet<String>> = None;
            for (name, value) in &active {
                let rows = stmt.query_map(params![name, value], |row| row.get::<_, String>(0))?;
                let mut ids = BTreeSet::new();
                for row in rows {
                    ids.insert(row?);
                }
                matched = Some(match matched {
                    Some(prev) => prev.intersection(&ids).cloned().collect(),
                    None => ids,
                });
            }
            Ok(matched.unwrap_or_default().into_iter().collect())
        })
        .await
    }
}

fn load_export_rows(conn: &Connection, ids: &[String]) -> Result<Vec<ExportRow>> {
    let marks = placeholders(ids.len());

    let mut stmt = conn.prepare(&format!(
        "SELECT ID_, DATE(START_TIME_), DATE(END_TIME_), END_TIME_ IS NOT NULL
         FROM ACT_HI_PROCINST WHERE ID_ IN ({marks}) ORDER BY START_TIME_ DESC"
    ))?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        Ok(InstanceRow {
            id: row.get(0)?,
            start: row.get(1)?,
            end: row.get(2)?,
            completed: row.get(3)?,
        })
    })?;
    let mut instances = Vec::new();
    for row in rows {
        instances.push(row?);
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT PROC_INST_ID_, NAME_, TEXT_, LONG_, DOUBLE_
         FROM ACT_HI_VARINST WHERE PROC_INST_ID_ IN ({marks})"
    ))?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<i64>>(3)?,
            row.get::<_, Option<f64>>(4)?,
        ))
    })?;
    let mut pivot: IndexMap<String, IndexMap<String, String>> = IndexMap::new();
    for row in rows {
        let (proc_id, name, text, long, double) = row?;
        let Some(value) = export_value(&name, text, long, double) else {
            continue;
        };
        pivot.entry(proc_id).or_default().entry(name).or_insert(value);
    }

    Ok(instances
        .into_iter()
        .map(|inst| build_row(inst, &pivot))
        .collect())
}

fn build_row(inst: InstanceRow, pivot: &IndexMap<String, IndexMap<String, String>>) -> ExportRow {
    let vars = pivot.get(&inst.id);
    let mut row = ExportRow::new();
    let status = if inst.completed { "Completed" } else { "Pending" };
    row.insert(INSTANCE_COLUMNS[0].to_string(), inst.id.clone());
    row.insert(INSTANCE_COLUMNS[1].to_string(), or_na(inst.start));
    row.insert(INSTANCE_COLUMNS[2].to_string(), or_na(inst.end));
    row.insert(INSTANCE_COLUMNS[3].to_string(), status.to_string());
    for (header, sources) in VARIABLE_COLUMNS {
        let value = vars.and_then(|v| sources.iter().find_map(|s| v.get(*s).cloned()));
        row.insert(header.to_string(), or_na(value));
    }
    row
}

fn or_na(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => NOT_AVAILABLE.to_string(),
    }
}
