use std::future::Future;

use crate::error::TrackerError;
use crate::models::{PeriodRecord, Student, StudentFilter, StudentProfile};

pub trait Store: Send + Sync {
    type Tx: StoreTx;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, TrackerError>> + Send;
}

/// Dropping a transaction without committing discards all of its writes.
pub trait StoreTx: Send {
    fn find_student(
        &mut self,
        id: i64,
    ) -> impl Future<Output = Result<Option<Student>, TrackerError>> + Send;

    fn find_student_by_email(
        &mut self,
        email: &str,
    ) -> impl Future<Output = Result<Option<Student>, TrackerError>> + Send;

    /// Lock a student row for the rest of the transaction. Returns `false`
    /// if the student does not exist.
    fn lock_student(&mut self, id: i64) -> impl Future<Output = Result<bool, TrackerError>> + Send;

    /// At most `filter.page_size()` matches with ids above `filter.cursor`,
    /// in id order.
    fn list_students(
        &mut self,
        filter: &StudentFilter,
    ) -> impl Future<Output = Result<Vec<Student>, TrackerError>> + Send;

    /// Insert a student with a null aggregate. Fails with `DuplicateKey`
    /// on an email collision.
    fn insert_student(
        &mut self,
        email: &str,
        profile: &StudentProfile,
    ) -> impl Future<Output = Result<i64, TrackerError>> + Send;

    /// Overwrite every profile field. Returns `false` if no row matched.
    fn update_student(
        &mut self,
        id: i64,
        profile: &StudentProfile,
    ) -> impl Future<Output = Result<bool, TrackerError>> + Send;

    /// Delete a student and, by cascade, its period records.
    fn delete_student(
        &mut self,
        id: i64,
    ) -> impl Future<Output = Result<bool, TrackerError>> + Send;

    /// Ordered by period label.
    fn list_period_records(
        &mut self,
        student_id: i64,
    ) -> impl Future<Output = Result<Vec<PeriodRecord>, TrackerError>> + Send;

    fn find_period_record(
        &mut self,
        student_id: i64,
        period: &str,
    ) -> impl Future<Output = Result<Option<PeriodRecord>, TrackerError>> + Send;

    fn insert_period_record(
        &mut self,
        student_id: i64,
        period: &str,
        score: f64,
    ) -> impl Future<Output = Result<(), TrackerError>> + Send;

    fn update_period_score(
        &mut self,
        student_id: i64,
        period: &str,
        score: f64,
    ) -> impl Future<Output = Result<bool, TrackerError>> + Send;

    fn delete_period_record(
        &mut self,
        student_id: i64,
        period: &str,
    ) -> impl Future<Output = Result<bool, TrackerError>> + Send;

    /// Write the derived aggregate. Only `aggregate::recompute` calls this.
    fn set_overall_score(
        &mut self,
        student_id: i64,
        score: Option<f64>,
    ) -> impl Future<Output = Result<(), TrackerError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), TrackerError>> + Send;
}
