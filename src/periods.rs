use crate::aggregate;
use crate::error::TrackerError;
use crate::store::StoreTx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodChange {
    Inserted,
    Updated,
    Unchanged,
}

impl PeriodChange {
    pub fn is_write(self) -> bool {
        !matches!(self, PeriodChange::Unchanged)
    }
}

pub fn check_period(period: &str) -> Result<&str, TrackerError> {
    let period = period.trim();
    if period.is_empty() {
        return Err(TrackerError::MissingField("period"));
    }
    Ok(period)
}

pub fn check_score(score: f64) -> Result<f64, TrackerError> {
    if !score.is_finite() {
        return Err(TrackerError::InvalidField("score"));
    }
    Ok(score)
}

/// Insert the (student, period) record or overwrite its score. An equal
/// score is left alone.
pub(crate) async fn upsert_period<T: StoreTx>(
    tx: &mut T,
    student_id: i64,
    period: &str,
    score: f64,
) -> Result<PeriodChange, TrackerError> {
    match tx.find_period_record(student_id, period).await? {
        Some(existing) if existing.score == score => Ok(PeriodChange::Unchanged),
        Some(_) => {
            tx.update_period_score(student_id, period, score).await?;
            Ok(PeriodChange::Updated)
        }
        None => {
            tx.insert_period_record(student_id, period, score).await?;
            Ok(PeriodChange::Inserted)
        }
    }
}

/// Record a score for one period and return the recomputed aggregate.
pub async fn record_score<T: StoreTx>(
    tx: &mut T,
    student_id: i64,
    period: &str,
    score: f64,
) -> Result<Option<f64>, TrackerError> {
    let period = check_period(period)?;
    let score = check_score(score)?;
    if !tx.lock_student(student_id).await? {
        return Err(TrackerError::NotFound("student"));
    }

    let change = upsert_period(tx, student_id, period, score).await?;
    tracing::debug!(student_id, period, score, ?change, "period score recorded");
    aggregate::recompute(tx, student_id).await
}

/// Remove one period record and return the recomputed aggregate.
pub async fn remove_score<T: StoreTx>(
    tx: &mut T,
    student_id: i64,
    period: &str,
) -> Result<Option<f64>, TrackerError> {
    let period = check_period(period)?;
    if !tx.lock_student(student_id).await? {
        return Err(TrackerError::NotFound("student"));
    }
    if !tx.delete_period_record(student_id, period).await? {
        return Err(TrackerError::NotFound("period record"));
    }

    tracing::debug!(student_id, period, "period score removed");
    aggregate::recompute(tx, student_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::StudentProfile;
    use crate::store::Store;

    async fn seeded() -> (MemoryStore, i64) {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let profile = StudentProfile {
            name: "Jules Moreno".to_string(),
            phone: None,
            bio: None,
            skills: Vec::new(),
            internships: Vec::new(),
            projects: Vec::new(),
            placed: false,
        };
        let id = tx.insert_student("jules@example.com", &profile).await.unwrap();
        tx.commit().await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn upsert_reports_each_kind_of_change() {
        let (store, id) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        assert_eq!(upsert_period(&mut tx, id, "S1", 7.5).await.unwrap(), PeriodChange::Inserted);
        assert_eq!(upsert_period(&mut tx, id, "S1", 7.5).await.unwrap(), PeriodChange::Unchanged);
        assert_eq!(upsert_period(&mut tx, id, "S1", 8.0).await.unwrap(), PeriodChange::Updated);
        let records = tx.list_period_records(id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].score, 8.0);
    }

    #[tokio::test]
    async fn record_and_remove_keep_aggregate_current() {
        let (store, id) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        assert_eq!(record_score(&mut tx, id, "S1", 8.0).await.unwrap(), Some(8.0));
        assert_eq!(record_score(&mut tx, id, " S2 ", 9.0).await.unwrap(), Some(8.5));
        assert_eq!(remove_score(&mut tx, id, "S1").await.unwrap(), Some(9.0));
        assert_eq!(remove_score(&mut tx, id, "S2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_targets_are_not_found() {
        let (store, id) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            remove_score(&mut tx, id, "S9").await.unwrap_err(),
            TrackerError::NotFound("period record")
        );
        assert_eq!(
            record_score(&mut tx, id + 100, "S1", 5.0).await.unwrap_err(),
            TrackerError::NotFound("student")
        );
    }

    #[tokio::test]
    async fn bad_inputs_are_rejected_before_touching_storage() {
        let (store, id) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            record_score(&mut tx, id, "  ", 5.0).await.unwrap_err(),
            TrackerError::MissingField("period")
        );
        assert_eq!(
            record_score(&mut tx, id, "S1", f64::NAN).await.unwrap_err(),
            TrackerError::InvalidField("score")
        );
        assert!(tx.list_period_records(id).await.unwrap().is_empty());
    }
}
