//! Directory state manager: the single in-memory source of truth for
//! colleges, students, and company visits.
//!
//! Mutations are reducer-style: every operation builds a [`DirectoryAction`]
//! and runs it through [`apply`], which returns a fresh snapshot. Each
//! transition runs start to end under the write lock, so in-process mutations
//! are strictly serialized; replication to the remote store is one
//! full-document write (last writer wins across processes; accepted boundary
//! condition at this scale, not conflict-resolved).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::LOAD_TIMEOUT_SECS;
use crate::keys::{domain_to_key, extract_domain, is_valid_email, is_valid_linkedin};
use crate::models::{College, CompanySelection, CompanyVisit, Directory, Student};
use crate::store::RemoteStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("please enter a valid email address")]
    InvalidEmail,
    #[error("please enter a valid LinkedIn profile URL (e.g., linkedin.com/in/yourprofile)")]
    InvalidLinkedin,
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("company {0:?} already added to this college")]
    DuplicateCompany(String),
    #[error("no college registered for {0:?}")]
    UnknownCollege(String),
    #[error("no student {0} in this college")]
    UnknownStudent(i64),
}

/// Registration details validated once and carried through the
/// new-college handshake.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub email: String,
    pub name: String,
    pub linkedin: String,
}

impl PendingRegistration {
    /// Rejects malformed input synchronously, before any state is touched.
    /// Returns the dotted email domain on success.
    pub fn validate(&self) -> Result<&str, DirectoryError> {
        if self.name.trim().is_empty() {
            return Err(DirectoryError::MissingField("name"));
        }
        if !is_valid_email(&self.email) {
            return Err(DirectoryError::InvalidEmail);
        }
        if !is_valid_linkedin(&self.linkedin) {
            return Err(DirectoryError::InvalidLinkedin);
        }
        extract_domain(&self.email).ok_or(DirectoryError::InvalidEmail)
    }
}

/// One auditable state transition. Ids and timestamps are precomputed by the
/// caller so applying an action is deterministic.
#[derive(Clone, Debug)]
pub enum DirectoryAction {
    AddStudent {
        college_key: String,
        student: Student,
    },
    CreateCollege {
        college_key: String,
        college: College,
    },
    /// The visit append and the actor's own selection (when self-selected)
    /// land in one snapshot so no observer sees a half-updated state.
    AddCompanyVisit {
        college_key: String,
        visit: CompanyVisit,
        self_selection: Option<CompanySelection>,
    },
    ToggleSelection {
        college_key: String,
        student_id: i64,
        company_name: String,
        at: DateTime<Utc>,
    },
}

pub fn apply(directory: &Directory, action: &DirectoryAction) -> Result<Directory, DirectoryError> {
    let mut next = directory.clone();
    match action {
        DirectoryAction::AddStudent {
            college_key,
            student,
        } => {
            let college = next
                .get_mut(college_key)
                .ok_or_else(|| DirectoryError::UnknownCollege(college_key.clone()))?;
            college.students.push(student.clone());
        }
        DirectoryAction::CreateCollege {
            college_key,
            college,
        } => {
            next.insert(college_key.clone(), college.clone());
        }
        DirectoryAction::AddCompanyVisit {
            college_key,
            visit,
            self_selection,
        } => {
            let college = next
                .get_mut(college_key)
                .ok_or_else(|| DirectoryError::UnknownCollege(college_key.clone()))?;
            if college
                .companies
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&visit.name))
            {
                return Err(DirectoryError::DuplicateCompany(visit.name.clone()));
            }
            college.companies.push(visit.clone());
            if let Some(selection) = self_selection {
                let student = college
                    .students
                    .iter_mut()
                    .find(|s| s.id == visit.added_by)
                    .ok_or(DirectoryError::UnknownStudent(visit.added_by))?;
                student.selections.push(selection.clone());
            }
        }
        DirectoryAction::ToggleSelection {
            college_key,
            student_id,
            company_name,
            at,
        } => {
            let college = next
                .get_mut(college_key)
                .ok_or_else(|| DirectoryError::UnknownCollege(college_key.clone()))?;
            let Some(visit) = college
                .companies
                .iter_mut()
                .find(|c| &c.name == company_name)
            else {
                // Unknown company is a silent no-op, not an error.
                return Ok(next);
            };
            let was_selected = visit.selected_students.contains(student_id);
            if was_selected {
                visit.selected_students.retain(|id| id != student_id);
            } else {
                visit.selected_students.push(*student_id);
            }
            let student = college
                .students
                .iter_mut()
                .find(|s| s.id == *student_id)
                .ok_or(DirectoryError::UnknownStudent(*student_id))?;
            // Both sides of the selection relation are rewritten from the
            // same membership flip, so they cannot diverge in one transition.
            if was_selected {
                student
                    .selections
                    .retain(|s| &s.company_name != company_name);
            } else {
                student.selections.push(CompanySelection {
                    company_name: company_name.clone(),
                    selected_at: *at,
                });
            }
        }
    }
    Ok(next)
}

/// Rewrites legacy dotted top-level keys to store-safe keys. Returns the
/// corrected mapping and whether anything changed.
pub fn migrate_legacy_keys(data: Directory) -> (Directory, bool) {
    let mut migrated = Directory::new();
    let mut needs_migration = false;
    for (key, college) in data {
        if key.contains('.') {
            needs_migration = true;
            migrated.insert(domain_to_key(&key), college);
        } else {
            migrated.insert(key, college);
        }
    }
    (migrated, needs_migration)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    College,
    Company,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySearchResult {
    pub college: College,
    pub companies: Vec<CompanyVisit>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum SearchResults {
    Colleges(Vec<College>),
    Companies(Vec<CompanySearchResult>),
}

/// Case-insensitive substring search. Company mode groups matching visits by
/// college and omits colleges with no matches.
pub fn search(directory: &Directory, query: &str, mode: SearchMode) -> SearchResults {
    let query = query.to_lowercase();
    if query.is_empty() {
        return match mode {
            SearchMode::College => SearchResults::Colleges(Vec::new()),
            SearchMode::Company => SearchResults::Companies(Vec::new()),
        };
    }
    match mode {
        SearchMode::College => SearchResults::Colleges(
            directory
                .values()
                .filter(|college| college.name.to_lowercase().contains(&query))
                .cloned()
                .collect(),
        ),
        SearchMode::Company => SearchResults::Companies(
            directory
                .values()
                .filter_map(|college| {
                    let companies: Vec<CompanyVisit> = college
                        .companies
                        .iter()
                        .filter(|company| company.name.to_lowercase().contains(&query))
                        .cloned()
                        .collect();
                    (!companies.is_empty()).then(|| CompanySearchResult {
                        college: college.clone(),
                        companies,
                    })
                })
                .collect(),
        ),
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegisterOutcome {
    /// Email already registered under this college; treated as a login.
    LoggedIn { student: Student },
    Registered { student: Student },
    /// No college for this domain yet; the caller must supply a name first.
    NewCollegeNeeded { domain: String },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCompanyVisit {
    pub name: String,
    #[serde(default)]
    pub visit_date: Option<NaiveDate>,
    #[serde(default)]
    pub job_roles: Option<Vec<String>>,
    #[serde(default)]
    pub total_selections: Option<u32>,
    #[serde(default)]
    pub self_selected: bool,
}

fn wall_clock_id() -> i64 {
    Utc::now().timestamp_millis()
}

pub struct DirectoryService {
    store: Arc<dyn RemoteStore>,
    directory: RwLock<Directory>,
    loaded: AtomicBool,
    degraded: AtomicBool,
    migrated: AtomicBool,
}

impl DirectoryService {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            directory: RwLock::new(Directory::new()),
            loaded: AtomicBool::new(false),
            degraded: AtomicBool::new(false),
            migrated: AtomicBool::new(false),
        }
    }

    /// One-time initial load, bounded by a fixed 3-second ceiling. Timeouts
    /// and store errors degrade to an empty local state instead of blocking;
    /// remote writes stay off while degraded.
    pub async fn load(&self) {
        let read = tokio::time::timeout(
            Duration::from_secs(LOAD_TIMEOUT_SECS),
            self.store.read_once(),
        )
        .await;
        match read {
            Ok(Ok(Some(data))) => {
                self.adopt_remote(data).await;
            }
            Ok(Ok(None)) => {
                tracing::info!("remote collection is empty, starting with an empty directory");
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "remote store unavailable, continuing on local state");
                self.degraded.store(true, Ordering::SeqCst);
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = LOAD_TIMEOUT_SECS,
                    "remote store load timed out, continuing on local state"
                );
                self.degraded.store(true, Ordering::SeqCst);
            }
        }
        self.loaded.store(true, Ordering::SeqCst);
    }

    /// Adopts remote change notifications for the rest of the process
    /// lifetime. The remote value replaces local state wholesale.
    pub fn spawn_watch(self: &Arc<Self>) {
        let service = self.clone();
        let mut rx = service.store.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                match snapshot.data {
                    Some(data) => service.adopt_remote(data).await,
                    None => {
                        *service.directory.write().await = Directory::new();
                    }
                }
            }
        });
    }

    async fn adopt_remote(&self, data: Directory) {
        let (data, needs_migration) = migrate_legacy_keys(data);
        // At most one migration write-back per process lifetime; a concurrent
        // migrator can still race us and one full write wins arbitrarily.
        if needs_migration && !self.migrated.swap(true, Ordering::SeqCst) {
            tracing::info!("migrating legacy dotted keys to store-safe keys");
            if let Err(err) = self.store.write_all(&data).await {
                tracing::warn!(error = %err, "legacy key migration write failed, keeping local copy");
            }
        }
        *self.directory.write().await = data;
        self.degraded.store(false, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> Directory {
        self.directory.read().await.clone()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Runs one transition start to end under the write lock: concurrent
    /// operations cannot clone the same pre-state and erase each other's
    /// updates. The remote write stays inside the critical section so
    /// replicated snapshots leave in transition order; it is skipped before
    /// the initial load completes and while degraded, and a failed write is
    /// logged while the local transition stands. `None` means no mutation.
    async fn transact<T>(
        &self,
        transition: impl FnOnce(&Directory) -> Result<(Option<Directory>, T), DirectoryError>,
    ) -> Result<T, DirectoryError> {
        let mut current = self.directory.write().await;
        let (next, output) = transition(&current)?;
        if let Some(next) = next {
            *current = next.clone();
            if self.loaded.load(Ordering::SeqCst) && !self.degraded.load(Ordering::SeqCst) {
                if let Err(err) = self.store.write_all(&next).await {
                    tracing::warn!(error = %err, "remote persist failed, local state retained");
                }
            }
        }
        Ok(output)
    }

    pub async fn register(
        &self,
        pending: &PendingRegistration,
    ) -> Result<RegisterOutcome, DirectoryError> {
        let domain = pending.validate()?.to_string();
        let college_key = domain_to_key(&domain);

        self.transact(|current| {
            let Some(college) = current.get(&college_key) else {
                return Ok((None, RegisterOutcome::NewCollegeNeeded { domain }));
            };
            if let Some(existing) = college.students.iter().find(|s| s.email == pending.email) {
                return Ok((
                    None,
                    RegisterOutcome::LoggedIn {
                        student: existing.clone(),
                    },
                ));
            }

            let student = Student {
                id: wall_clock_id(),
                name: pending.name.clone(),
                email: pending.email.clone(),
                linkedin: pending.linkedin.clone(),
                college_domain: domain,
                selections: Vec::new(),
                registered_at: Utc::now(),
            };
            let next = apply(
                current,
                &DirectoryAction::AddStudent {
                    college_key,
                    student: student.clone(),
                },
            )?;
            Ok((Some(next), RegisterOutcome::Registered { student }))
        })
        .await
    }

    pub async fn create_college(
        &self,
        name: &str,
        pending: &PendingRegistration,
    ) -> Result<Student, DirectoryError> {
        if name.trim().is_empty() {
            return Err(DirectoryError::MissingField("college name"));
        }
        let domain = pending.validate()?.to_string();
        let college_key = domain_to_key(&domain);

        let now = Utc::now();
        let student = Student {
            id: wall_clock_id(),
            name: pending.name.clone(),
            email: pending.email.clone(),
            linkedin: pending.linkedin.clone(),
            college_domain: domain.clone(),
            selections: Vec::new(),
            registered_at: now,
        };
        let college = College {
            name: name.trim().to_string(),
            domain,
            students: vec![student.clone()],
            companies: Vec::new(),
            created_at: now,
        };

        self.transact(|current| {
            let next = apply(
                current,
                &DirectoryAction::CreateCollege {
                    college_key,
                    college,
                },
            )?;
            Ok((Some(next), ()))
        })
        .await?;
        Ok(student)
    }

    pub async fn add_company_visit(
        &self,
        college_key: &str,
        actor_student_id: i64,
        request: NewCompanyVisit,
    ) -> Result<CompanyVisit, DirectoryError> {
        if request.name.trim().is_empty() {
            return Err(DirectoryError::MissingField("company name"));
        }
        let now = Utc::now();
        let visit = CompanyVisit {
            id: wall_clock_id(),
            name: request.name.trim().to_string(),
            visit_date: request.visit_date,
            job_roles: request
                .job_roles
                .map(|roles| {
                    roles
                        .into_iter()
                        .map(|role| role.trim().to_string())
                        .filter(|role| !role.is_empty())
                        .collect::<Vec<_>>()
                })
                .filter(|roles: &Vec<String>| !roles.is_empty()),
            added_by: actor_student_id,
            selected_students: if request.self_selected {
                vec![actor_student_id]
            } else {
                Vec::new()
            },
            total_selections: request.total_selections,
            added_at: now,
        };
        let self_selection = request.self_selected.then(|| CompanySelection {
            company_name: visit.name.clone(),
            selected_at: now,
        });

        self.transact(|current| {
            let next = apply(
                current,
                &DirectoryAction::AddCompanyVisit {
                    college_key: college_key.to_string(),
                    visit: visit.clone(),
                    self_selection,
                },
            )?;
            Ok((Some(next), ()))
        })
        .await?;
        Ok(visit)
    }

    /// Flips the actor's membership for the named company. Returns the
    /// updated student, or `None` when the company does not exist in the
    /// actor's college (silent no-op).
    pub async fn toggle_selection(
        &self,
        college_key: &str,
        actor_student_id: i64,
        company_name: &str,
    ) -> Result<Option<Student>, DirectoryError> {
        self.transact(|current| {
            let college = current
                .get(college_key)
                .ok_or_else(|| DirectoryError::UnknownCollege(college_key.to_string()))?;
            if college.company_by_name(company_name).is_none() {
                return Ok((None, None));
            }

            let next = apply(
                current,
                &DirectoryAction::ToggleSelection {
                    college_key: college_key.to_string(),
                    student_id: actor_student_id,
                    company_name: company_name.to_string(),
                    at: Utc::now(),
                },
            )?;
            let student = next
                .get(college_key)
                .and_then(|c| c.student_by_id(actor_student_id))
                .cloned();
            Ok((Some(next), student))
        })
        .await
    }

    pub async fn search(&self, query: &str, mode: SearchMode) -> SearchResults {
        search(&*self.directory.read().await, query, mode)
    }
}
