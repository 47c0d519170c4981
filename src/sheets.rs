//! One-way projection of the directory into spreadsheet ranges.
//!
//! Every sync rebuilds the Students, Colleges, and Companies ranges from
//! scratch and overwrites them wholesale, plus rewrites the Audit Log header
//! row. The audit-log append is the only non-overwriting write in the whole
//! system. No pagination, no incremental diffing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::json;
use thiserror::Error;

use crate::models::Directory;

pub const STUDENTS_RANGE: &str = "Students!A1";
pub const COLLEGES_RANGE: &str = "Colleges!A1";
pub const COMPANIES_RANGE: &str = "Companies!A1";
pub const AUDIT_HEADER_RANGE: &str = "Audit Log!A1:F1";
pub const AUDIT_APPEND_RANGE: &str = "Audit Log!A:F";

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("spreadsheet request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("spreadsheet returned status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeUpdate {
    pub range: String,
    pub values: Vec<Vec<String>>,
}

#[async_trait]
pub trait SheetSink: Send + Sync + 'static {
    /// Overwrites each range with exactly the given values.
    async fn batch_update(&self, updates: &[RangeUpdate]) -> Result<(), SheetError>;

    /// Appends one row after the last filled row of the range.
    async fn append_row(&self, range: &str, row: &[String]) -> Result<(), SheetError>;
}

/// Google Sheets v4 REST sink (`values:batchUpdate` / `values/{range}:append`,
/// RAW input, bearer token).
pub struct SheetsClient {
    client: reqwest::Client,
    spreadsheet_id: String,
    token: String,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            spreadsheet_id: spreadsheet_id.into(),
            token: token.into(),
        }
    }

    pub fn spreadsheet_url(&self) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}",
            self.spreadsheet_id
        )
    }

    fn check_status(status: reqwest::StatusCode) -> Result<(), SheetError> {
        if status.is_success() {
            Ok(())
        } else {
            Err(SheetError::Status(status))
        }
    }
}

#[async_trait]
impl SheetSink for SheetsClient {
    async fn batch_update(&self, updates: &[RangeUpdate]) -> Result<(), SheetError> {
        let url = format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values:batchUpdate",
            self.spreadsheet_id
        );
        let data: Vec<_> = updates
            .iter()
            .map(|update| json!({ "range": update.range, "values": update.values }))
            .collect();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "valueInputOption": "RAW", "data": data }))
            .send()
            .await?;
        Self::check_status(response.status())
    }

    async fn append_row(&self, range: &str, row: &[String]) -> Result<(), SheetError> {
        let encoded = utf8_percent_encode(range, NON_ALPHANUMERIC);
        let url = format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}:append?valueInputOption=RAW",
            self.spreadsheet_id, encoded
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "values": [row] }))
            .send()
            .await?;
        Self::check_status(response.status())
    }
}

pub fn students_rows(directory: &Directory, synced_at: DateTime<Utc>) -> Vec<Vec<String>> {
    let stamp = synced_at.to_rfc3339();
    let mut rows = vec![header(&[
        "Student ID",
        "Name",
        "Email",
        "LinkedIn",
        "College Domain",
        "College Name",
        "Registered At",
        "Selections",
        "Last Updated",
    ])];
    for college in directory.values() {
        for student in &college.students {
            rows.push(vec![
                student.id.to_string(),
                student.name.clone(),
                student.email.clone(),
                student.linkedin.clone(),
                student.college_domain.clone(),
                college.name.clone(),
                student.registered_at.to_rfc3339(),
                student.selections.len().to_string(),
                stamp.clone(),
            ]);
        }
    }
    rows
}

pub fn colleges_rows(directory: &Directory, synced_at: DateTime<Utc>) -> Vec<Vec<String>> {
    let stamp = synced_at.to_rfc3339();
    let mut rows = vec![header(&[
        "College Domain",
        "College Name",
        "Total Students",
        "Total Companies",
        "Created At",
        "Last Updated",
    ])];
    for college in directory.values() {
        rows.push(vec![
            college.domain.clone(),
            college.name.clone(),
            college.students.len().to_string(),
            college.companies.len().to_string(),
            college.created_at.to_rfc3339(),
            stamp.clone(),
        ]);
    }
    rows
}

pub fn companies_rows(directory: &Directory, synced_at: DateTime<Utc>) -> Vec<Vec<String>> {
    let stamp = synced_at.to_rfc3339();
    let mut rows = vec![header(&[
        "Company ID",
        "Company Name",
        "College Domain",
        "Added By",
        "Visit Date",
        "Selections",
        "Job Roles",
        "Added At",
        "Last Updated",
    ])];
    for college in directory.values() {
        for company in &college.companies {
            rows.push(vec![
                company.id.to_string(),
                company.name.clone(),
                college.domain.clone(),
                company.added_by.to_string(),
                company
                    .visit_date
                    .map(|date| date.to_string())
                    .unwrap_or_default(),
                // The manually entered count is the displayed figure, not the
                // derived selectedStudents length.
                company.total_selections.unwrap_or(0).to_string(),
                company
                    .job_roles
                    .as_ref()
                    .map(|roles| roles.join(", "))
                    .unwrap_or_default(),
                company.added_at.to_rfc3339(),
                stamp.clone(),
            ]);
        }
    }
    rows
}

pub fn audit_header() -> Vec<Vec<String>> {
    vec![header(&[
        "Timestamp",
        "Sync Number",
        "Students Count",
        "Colleges Count",
        "Companies Count",
        "Event Type",
    ])]
}

fn header(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

#[derive(Debug, Clone, Copy)]
pub struct SyncReport {
    pub sync_number: u64,
    pub students: usize,
    pub colleges: usize,
    pub companies: usize,
}

/// Rewrites the four ranges wholesale, then appends one audit row carrying
/// the run's sync-sequence number.
pub struct SheetSync<S: SheetSink> {
    sink: S,
    sync_count: u64,
    last_synced_at: Option<DateTime<Utc>>,
}

impl<S: SheetSink> SheetSync<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            sync_count: 0,
            last_synced_at: None,
        }
    }

    /// When the last sync fully completed, including the audit append.
    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    pub async fn sync(
        &mut self,
        directory: &Directory,
        event_type: &str,
    ) -> Result<SyncReport, SheetError> {
        self.sync_count += 1;
        let synced_at = Utc::now();

        let students = students_rows(directory, synced_at);
        let colleges = colleges_rows(directory, synced_at);
        let companies = companies_rows(directory, synced_at);
        let report = SyncReport {
            sync_number: self.sync_count,
            students: students.len() - 1,
            colleges: colleges.len() - 1,
            companies: companies.len() - 1,
        };

        self.sink
            .batch_update(&[
                RangeUpdate {
                    range: STUDENTS_RANGE.to_string(),
                    values: students,
                },
                RangeUpdate {
                    range: COLLEGES_RANGE.to_string(),
                    values: colleges,
                },
                RangeUpdate {
                    range: COMPANIES_RANGE.to_string(),
                    values: companies,
                },
                RangeUpdate {
                    range: AUDIT_HEADER_RANGE.to_string(),
                    values: audit_header(),
                },
            ])
            .await?;

        self.sink
            .append_row(
                AUDIT_APPEND_RANGE,
                &[
                    synced_at.to_rfc3339(),
                    report.sync_number.to_string(),
                    report.students.to_string(),
                    report.colleges.to_string(),
                    report.companies.to_string(),
                    event_type.to_string(),
                ],
            )
            .await?;

        self.last_synced_at = Some(synced_at);
        tracing::info!(
            sync_number = report.sync_number,
            students = report.students,
            colleges = report.colleges,
            companies = report.companies,
            "synced directory to spreadsheet"
        );
        Ok(report)
    }
}
