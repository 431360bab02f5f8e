use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::TrackerError;
use crate::models::{PeriodRecord, Student, StudentFilter, StudentProfile};
use crate::store::{Store, StoreTx};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    students: BTreeMap<i64, Student>,
    periods: BTreeMap<(i64, String), PeriodRecord>,
    next_id: i64,
    writes: u64,
}

/// A transaction holds the store-wide lock and works on a private copy,
/// so transactions are fully serialized and an uncommitted one leaves no
/// trace.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed row writes (inserts, updates, deletes).
    pub async fn write_count(&self) -> u64 {
        self.state.lock().await.writes
    }

    pub async fn student_count(&self) -> usize {
        self.state.lock().await.students.len()
    }

    pub async fn period_record_count(&self) -> usize {
        self.state.lock().await.periods.len()
    }
}

impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, TrackerError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx { guard, working })
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl StoreTx for MemoryTx {
    async fn find_student(&mut self, id: i64) -> Result<Option<Student>, TrackerError> {
        Ok(self.working.students.get(&id).cloned())
    }

    async fn find_student_by_email(
        &mut self,
        email: &str,
    ) -> Result<Option<Student>, TrackerError> {
        Ok(self
            .working
            .students
            .values()
            .find(|s| s.email == email)
            .cloned())
    }

    async fn lock_student(&mut self, id: i64) -> Result<bool, TrackerError> {
        Ok(self.working.students.contains_key(&id))
    }

    async fn list_students(
        &mut self,
        filter: &StudentFilter,
    ) -> Result<Vec<Student>, TrackerError> {
        let after = filter.cursor.unwrap_or(0).saturating_add(1);
        Ok(self
            .working
            .students
            .range(after..)
            .map(|(_, student)| student)
            .filter(|s| filter.matches(s))
            .take(filter.page_size())
            .cloned()
            .collect())
    }

    async fn insert_student(
        &mut self,
        email: &str,
        profile: &StudentProfile,
    ) -> Result<i64, TrackerError> {
        if self.working.students.values().any(|s| s.email == email) {
            return Err(TrackerError::DuplicateKey(email.to_string()));
        }
        self.working.next_id += 1;
        let id = self.working.next_id;
        let now = Utc::now();
        self.working.students.insert(
            id,
            Student {
                id,
                email: email.to_string(),
                profile: profile.clone(),
                overall_score: None,
                created_at: now,
                updated_at: now,
            },
        );
        self.working.writes += 1;
        Ok(id)
    }

    async fn update_student(
        &mut self,
        id: i64,
        profile: &StudentProfile,
    ) -> Result<bool, TrackerError> {
        let Some(student) = self.working.students.get_mut(&id) else {
            return Ok(false);
        };
        student.profile = profile.clone();
        student.updated_at = Utc::now();
        self.working.writes += 1;
        Ok(true)
    }

    async fn delete_student(&mut self, id: i64) -> Result<bool, TrackerError> {
        if self.working.students.remove(&id).is_none() {
            return Ok(false);
        }
        self.working.periods.retain(|(owner, _), _| *owner != id);
        self.working.writes += 1;
        Ok(true)
    }

    async fn list_period_records(
        &mut self,
        student_id: i64,
    ) -> Result<Vec<PeriodRecord>, TrackerError> {
        Ok(self
            .working
            .periods
            .values()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn find_period_record(
        &mut self,
        student_id: i64,
        period: &str,
    ) -> Result<Option<PeriodRecord>, TrackerError> {
        Ok(self
            .working
            .periods
            .get(&(student_id, period.to_string()))
            .cloned())
    }

    async fn insert_period_record(
        &mut self,
        student_id: i64,
        period: &str,
        score: f64,
    ) -> Result<(), TrackerError> {
        if !self.working.students.contains_key(&student_id) {
            return Err(TrackerError::NotFound("student"));
        }
        let key = (student_id, period.to_string());
        if self.working.periods.contains_key(&key) {
            return Err(TrackerError::StorageFailure(format!(
                "period record ({student_id}, {period}) already exists"
            )));
        }
        self.working.periods.insert(
            key,
            PeriodRecord {
                student_id,
                period: period.to_string(),
                score,
                recorded_at: Utc::now(),
            },
        );
        self.working.writes += 1;
        Ok(())
    }

    async fn update_period_score(
        &mut self,
        student_id: i64,
        period: &str,
        score: f64,
    ) -> Result<bool, TrackerError> {
        let key = (student_id, period.to_string());
        let Some(record) = self.working.periods.get_mut(&key) else {
            return Ok(false);
        };
        record.score = score;
        record.recorded_at = Utc::now();
        self.working.writes += 1;
        Ok(true)
    }

    async fn delete_period_record(
        &mut self,
        student_id: i64,
        period: &str,
    ) -> Result<bool, TrackerError> {
        let key = (student_id, period.to_string());
        if self.working.periods.remove(&key).is_none() {
            return Ok(false);
        }
        self.working.writes += 1;
        Ok(true)
    }

    async fn set_overall_score(
        &mut self,
        student_id: i64,
        score: Option<f64>,
    ) -> Result<(), TrackerError> {
        let student = self
            .working
            .students
            .get_mut(&student_id)
            .ok_or(TrackerError::NotFound("student"))?;
        student.overall_score = score;
        self.working.writes += 1;
        Ok(())
    }

    async fn commit(self) -> Result<(), TrackerError> {
        let MemoryTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}
