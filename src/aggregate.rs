use crate::error::TrackerError;
use crate::models::PeriodRecord;
use crate::store::StoreTx;

/// Arithmetic mean of the period scores, `None` for an empty set.
pub fn mean_score(records: &[PeriodRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    // Scale before summing so no partial sum can exceed f64::MAX.
    let n = records.len() as f64;
    Some(records.iter().map(|r| r.score / n).sum())
}

/// Recompute a student's overall score from its period records and write
/// it back. Must run as the last step of every period-record mutation,
/// inside the same transaction.
pub async fn recompute<T: StoreTx>(
    tx: &mut T,
    student_id: i64,
) -> Result<Option<f64>, TrackerError> {
    let records = tx.list_period_records(student_id).await?;
    let overall = mean_score(&records);
    tx.set_overall_score(student_id, overall).await?;
    tracing::debug!(student_id, periods = records.len(), ?overall, "aggregate recomputed");
    Ok(overall)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::StudentProfile;
    use crate::store::Store;
    use chrono::Utc;

    fn record(period: &str, score: f64) -> PeriodRecord {
        PeriodRecord {
            student_id: 1,
            period: period.to_string(),
            score,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn mean_of_empty_set_is_unset() {
        assert_eq!(mean_score(&[]), None);
    }

    #[test]
    fn mean_is_exact_average() {
        assert_eq!(mean_score(&[record("S1", 8.0), record("S2", 9.0)]), Some(8.5));
        assert_eq!(mean_score(&[record("S2", 9.0)]), Some(9.0));
        let three = mean_score(&[record("S1", 7.0), record("S2", 8.0), record("S3", 10.0)]);
        assert!((three.unwrap() - 25.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn mean_of_huge_scores_stays_finite() {
        let huge = mean_score(&[record("S1", 1e308), record("S2", 1e308)]);
        assert_eq!(huge, Some(1e308));
        let mixed = mean_score(&[record("S1", f64::MAX), record("S2", -f64::MAX)]);
        assert_eq!(mixed, Some(0.0));
    }

    #[tokio::test]
    async fn recompute_writes_mean_and_clears_when_empty() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let profile = StudentProfile {
            name: "A".to_string(),
            phone: None,
            bio: None,
            skills: Vec::new(),
            internships: Vec::new(),
            projects: Vec::new(),
            placed: false,
        };
        let id = tx.insert_student("a@x.com", &profile).await.unwrap();
        tx.insert_period_record(id, "S1", 6.0).await.unwrap();
        tx.insert_period_record(id, "S2", 7.0).await.unwrap();

        assert_eq!(recompute(&mut tx, id).await.unwrap(), Some(6.5));
        let student = tx.find_student(id).await.unwrap().unwrap();
        assert_eq!(student.overall_score, Some(6.5));

        tx.delete_period_record(id, "S1").await.unwrap();
        tx.delete_period_record(id, "S2").await.unwrap();
        assert_eq!(recompute(&mut tx, id).await.unwrap(), None);
        let student = tx.find_student(id).await.unwrap().unwrap();
        assert_eq!(student.overall_score, None);
    }
}
