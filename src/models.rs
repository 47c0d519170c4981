use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The whole directory as stored remotely: one `College` per domain key.
/// `BTreeMap` keeps serialization order stable across full-document writes.
pub type Directory = BTreeMap<String, College>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct College {
    pub name: String,
    /// Dotted human-readable domain, regardless of the store key form.
    pub domain: String,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub companies: Vec<CompanyVisit>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Wall-clock-derived at creation; not guaranteed globally unique under
    /// concurrent registration.
    pub id: i64,
    pub name: String,
    pub email: String,
    pub linkedin: String,
    pub college_domain: String,
    #[serde(default)]
    pub selections: Vec<CompanySelection>,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySelection {
    /// Free-text match key, not a foreign key into `companies`.
    pub company_name: String,
    pub selected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyVisit {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_roles: Option<Vec<String>>,
    pub added_by: i64,
    #[serde(default)]
    pub selected_students: Vec<i64>,
    /// Manually entered count; may diverge from `selected_students.len()` and
    /// is never reconciled with it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_selections: Option<u32>,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStats {
    pub colleges: usize,
    pub students: usize,
    pub companies: usize,
}

impl DirectoryStats {
    pub fn of(directory: &Directory) -> Self {
        Self {
            colleges: directory.len(),
            students: directory.values().map(|c| c.students.len()).sum(),
            companies: directory.values().map(|c| c.companies.len()).sum(),
        }
    }
}

impl College {
    pub fn student_by_id(&self, id: i64) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn company_by_name(&self, name: &str) -> Option<&CompanyVisit> {
        self.companies.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_records_default_missing_collections() {
        // Old records sometimes lack the companies/selections arrays; serde
        // defaults absorb them on read.
        let raw = serde_json::json!({
            "name": "IIT Delhi",
            "domain": "iitd.ac.in",
            "createdAt": "2025-01-01T00:00:00Z",
            "students": [{
                "id": 1,
                "name": "Rahul Sharma",
                "email": "rahul@iitd.ac.in",
                "linkedin": "linkedin.com/in/rahul-sharma",
                "collegeDomain": "iitd.ac.in",
                "registeredAt": "2025-01-01T00:00:00Z"
            }]
        });
        let college: College = serde_json::from_value(raw).unwrap();
        assert!(college.companies.is_empty());
        assert!(college.students[0].selections.is_empty());
    }

    #[test]
    fn wire_names_are_camel_case() {
        let visit = CompanyVisit {
            id: 7,
            name: "Google".into(),
            visit_date: None,
            job_roles: Some(vec!["SDE-1".into()]),
            added_by: 1,
            selected_students: vec![1],
            total_selections: Some(3),
            added_at: "2025-01-15T00:00:00Z".parse().unwrap(),
        };
        let value = serde_json::to_value(&visit).unwrap();
        assert!(value.get("selectedStudents").is_some());
        assert!(value.get("totalSelections").is_some());
        assert!(value.get("addedBy").is_some());
        // Unset optional metadata stays off the wire entirely.
        assert!(value.get("visitDate").is_none());
    }

    #[test]
    fn stats_sum_per_college_lengths() {
        let mut directory = Directory::new();
        directory.insert(
            "a_edu".into(),
            College {
                name: "A".into(),
                domain: "a.edu".into(),
                students: vec![],
                companies: vec![],
                created_at: Utc::now(),
            },
        );
        let stats = DirectoryStats::of(&directory);
        assert_eq!(stats.colleges, 1);
        assert_eq!(stats.students, 0);
        assert_eq!(stats.companies, 0);
    }
}
