use std::collections::BTreeSet;

use tracing::Instrument;
use uuid::Uuid;

use crate::aggregate;
use crate::batch::validate_batch;
use crate::error::TrackerError;
use crate::models::{
    Candidate, PeriodRecord, RawRow, RowRejection, Student, StudentFilter, StudentProfile,
};
use crate::normalize::{split_tags, LEGACY_PERIOD};
use crate::periods;
use crate::store::{Store, StoreTx};
use crate::upsert::{self, MergeSummary};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub students: MergeSummary,
    /// Period records inserted or overwritten.
    pub period_writes: usize,
    /// Students whose aggregate was recomputed.
    pub recomputed: usize,
}

impl BatchSummary {
    pub fn is_noop(&self) -> bool {
        self.students.inserted == 0 && self.students.updated == 0 && self.period_writes == 0
    }
}

/// What a batch upload reports back. Rejections are always present, even
/// when applying the accepted rows failed as a whole.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batch_id: Uuid,
    pub accepted_count: usize,
    pub rejected: Vec<RowRejection>,
    pub applied: Result<BatchSummary, TrackerError>,
}

pub struct Tracker<S> {
    store: S,
}

impl<S: Store> Tracker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate every row, then merge all accepted rows in one transaction.
    pub async fn validate_and_upsert_batch(&self, rows: &[RawRow]) -> BatchOutcome {
        let batch_id = Uuid::new_v4();
        let span = tracing::info_span!("batch", %batch_id, rows = rows.len());

        async move {
            let validated = validate_batch(rows);
            let applied = self.apply_batch(&validated.accepted).await;

            match &applied {
                Ok(summary) => tracing::info!(
                    accepted = validated.accepted.len(),
                    rejected = validated.rejected.len(),
                    inserted = summary.students.inserted,
                    updated = summary.students.updated,
                    unchanged = summary.students.unchanged,
                    period_writes = summary.period_writes,
                    "batch applied"
                ),
                Err(err) => tracing::error!(
                    accepted = validated.accepted.len(),
                    rejected = validated.rejected.len(),
                    error = %err,
                    "batch aborted, no rows applied"
                ),
            }

            BatchOutcome {
                batch_id,
                accepted_count: validated.accepted.len(),
                rejected: validated.rejected,
                applied,
            }
        }
        .instrument(span)
        .await
    }

    /// A batch only ever fails as a whole, so any abort is reported as a
    /// storage failure. A unique violation here means a concurrent writer
    /// inserted the same email after the lookup.
    async fn apply_batch(&self, accepted: &[Candidate]) -> Result<BatchSummary, TrackerError> {
        self.merge_and_commit(accepted)
            .await
            .map_err(|err| match err {
                TrackerError::StorageFailure(_) => err,
                other => TrackerError::StorageFailure(other.to_string()),
            })
    }

    async fn merge_and_commit(&self, accepted: &[Candidate]) -> Result<BatchSummary, TrackerError> {
        let mut tx = self.store.begin().await?;
        let (outcomes, students) = upsert::merge_candidates(&mut tx, accepted).await?;

        let mut touched = BTreeSet::new();
        let mut period_writes = 0;
        for (candidate, outcome) in accepted.iter().zip(outcomes) {
            let Some(score) = candidate.score else {
                continue;
            };
            let student_id = outcome.student_id();
            let period = candidate.period.as_deref().unwrap_or(LEGACY_PERIOD);
            let change = periods::upsert_period(&mut tx, student_id, period, score).await?;
            if change.is_write() {
                period_writes += 1;
                touched.insert(student_id);
            }
        }

        for &student_id in &touched {
            aggregate::recompute(&mut tx, student_id).await?;
        }

        tx.commit().await?;
        Ok(BatchSummary {
            students,
            period_writes,
            recomputed: touched.len(),
        })
    }

    /// Upsert one period score and return the student's new overall score.
    pub async fn record_period_score(
        &self,
        student_id: i64,
        period: &str,
        score: f64,
    ) -> Result<Option<f64>, TrackerError> {
        let mut tx = self.store.begin().await?;
        let overall = periods::record_score(&mut tx, student_id, period, score).await?;
        tx.commit().await?;
        tracing::info!(student_id, period, score, ?overall, "period score recorded");
        Ok(overall)
    }

    /// Delete one period score and return the student's new overall score.
    pub async fn delete_period_score(
        &self,
        student_id: i64,
        period: &str,
    ) -> Result<Option<f64>, TrackerError> {
        let mut tx = self.store.begin().await?;
        let overall = periods::remove_score(&mut tx, student_id, period).await?;
        tx.commit().await?;
        tracing::info!(student_id, period, ?overall, "period score deleted");
        Ok(overall)
    }

    pub async fn get_student(&self, id: i64) -> Result<Student, TrackerError> {
        let mut tx = self.store.begin().await?;
        tx.find_student(id)
            .await?
            .ok_or(TrackerError::NotFound("student"))
    }

    pub async fn get_student_by_email(&self, email: &str) -> Result<Student, TrackerError> {
        let mut tx = self.store.begin().await?;
        tx.find_student_by_email(email.trim())
            .await?
            .ok_or(TrackerError::NotFound("student"))
    }

    /// One page of matching students in id order, see [`StudentFilter::page_size`].
    pub async fn list_students(
        &self,
        filter: &StudentFilter,
    ) -> Result<Vec<Student>, TrackerError> {
        let mut tx = self.store.begin().await?;
        tx.list_students(filter).await
    }

    pub async fn period_records(&self, student_id: i64) -> Result<Vec<PeriodRecord>, TrackerError> {
        let mut tx = self.store.begin().await?;
        if tx.find_student(student_id).await?.is_none() {
            return Err(TrackerError::NotFound("student"));
        }
        tx.list_period_records(student_id).await
    }

    /// Direct insert, outside of batch merging. An existing email is a
    /// `DuplicateKey` error rather than a merge.
    pub async fn create_student(
        &self,
        email: &str,
        profile: StudentProfile,
    ) -> Result<Student, TrackerError> {
        let email = check_email(email)?;
        let profile = check_profile(profile)?;

        let mut tx = self.store.begin().await?;
        let id = tx.insert_student(email, &profile).await?;
        let student = tx
            .find_student(id)
            .await?
            .ok_or(TrackerError::NotFound("student"))?;
        tx.commit().await?;
        tracing::info!(student_id = id, email, "student created");
        Ok(student)
    }

    /// Direct profile edit, the only path that sets projects. Returns
    /// whether anything was written. The overall score is never touched.
    pub async fn update_student(
        &self,
        id: i64,
        profile: StudentProfile,
    ) -> Result<bool, TrackerError> {
        let profile = check_profile(profile)?;

        let mut tx = self.store.begin().await?;
        if !tx.lock_student(id).await? {
            return Err(TrackerError::NotFound("student"));
        }
        let stored = tx
            .find_student(id)
            .await?
            .ok_or(TrackerError::NotFound("student"))?;
        let written = upsert::write_if_changed(&mut tx, id, &stored.profile, &profile).await?;
        tx.commit().await?;
        Ok(written)
    }

    /// Delete a student together with its period records.
    pub async fn delete_student(&self, id: i64) -> Result<(), TrackerError> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_student(id).await? {
            return Err(TrackerError::NotFound("student"));
        }
        tx.commit().await?;
        tracing::info!(student_id = id, "student deleted");
        Ok(())
    }
}

fn check_email(email: &str) -> Result<&str, TrackerError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(TrackerError::InvalidField("email"));
    }
    Ok(email)
}

fn check_profile(mut profile: StudentProfile) -> Result<StudentProfile, TrackerError> {
    profile.name = profile.name.trim().to_string();
    if profile.name.is_empty() {
        return Err(TrackerError::MissingField("name"));
    }
    profile.phone = trimmed(profile.phone);
    profile.bio = trimmed(profile.bio);
    profile.skills = clean_tags(profile.skills);
    profile.internships = clean_tags(profile.internships);
    Ok(profile)
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.iter().flat_map(|tag| split_tags(Some(tag.as_str()))).collect()
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
