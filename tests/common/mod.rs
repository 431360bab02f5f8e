#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use placement_tracker::memory::MemoryTx;
use placement_tracker::models::{PeriodRecord, RawRow, Student, StudentFilter, StudentProfile};
use placement_tracker::{MemoryStore, Store, StoreTx, TrackerError};
use serde_json::Value;

pub fn rows(values: Vec<Value>) -> Vec<RawRow> {
    values
        .into_iter()
        .map(|value| match value {
            Value::Object(map) => map,
            other => panic!("expected an object row, got {other}"),
        })
        .collect()
}

/// Wraps a [`MemoryStore`] and fails the Nth student insert, counting
/// across all transactions.
#[derive(Clone)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_on_insert: usize,
    failure: TrackerError,
    inserts: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn failing_on_insert(inner: MemoryStore, n: usize) -> Self {
        let failure = TrackerError::StorageFailure("connection reset".to_string());
        Self::failing_on_insert_with(inner, n, failure)
    }

    pub fn failing_on_insert_with(inner: MemoryStore, n: usize, failure: TrackerError) -> Self {
        Self {
            inner,
            fail_on_insert: n,
            failure,
            inserts: Arc::new(AtomicUsize::new(0)),
        }
    }
}

pub struct FlakyTx {
    inner: MemoryTx,
    fail_on_insert: usize,
    failure: TrackerError,
    inserts: Arc<AtomicUsize>,
}

impl Store for FlakyStore {
    type Tx = FlakyTx;

    async fn begin(&self) -> Result<FlakyTx, TrackerError> {
        Ok(FlakyTx {
            inner: self.inner.begin().await?,
            fail_on_insert: self.fail_on_insert,
            failure: self.failure.clone(),
            inserts: self.inserts.clone(),
        })
    }
}

impl StoreTx for FlakyTx {
    async fn find_student(&mut self, id: i64) -> Result<Option<Student>, TrackerError> {
        self.inner.find_student(id).await
    }

    async fn find_student_by_email(
        &mut self,
        email: &str,
    ) -> Result<Option<Student>, TrackerError> {
        self.inner.find_student_by_email(email).await
    }

    async fn lock_student(&mut self, id: i64) -> Result<bool, TrackerError> {
        self.inner.lock_student(id).await
    }

    async fn list_students(
        &mut self,
        filter: &StudentFilter,
    ) -> Result<Vec<Student>, TrackerError> {
        self.inner.list_students(filter).await
    }

    async fn insert_student(
        &mut self,
        email: &str,
        profile: &StudentProfile,
    ) -> Result<i64, TrackerError> {
        let n = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on_insert {
            return Err(self.failure.clone());
        }
        self.inner.insert_student(email, profile).await
    }

    async fn update_student(
        &mut self,
        id: i64,
        profile: &StudentProfile,
    ) -> Result<bool, TrackerError> {
        self.inner.update_student(id, profile).await
    }

    async fn delete_student(&mut self, id: i64) -> Result<bool, TrackerError> {
        self.inner.delete_student(id).await
    }

    async fn list_period_records(
        &mut self,
        student_id: i64,
    ) -> Result<Vec<PeriodRecord>, TrackerError> {
        self.inner.list_period_records(student_id).await
    }

    async fn find_period_record(
        &mut self,
        student_id: i64,
        period: &str,
    ) -> Result<Option<PeriodRecord>, TrackerError> {
        self.inner.find_period_record(student_id, period).await
    }

    async fn insert_period_record(
        &mut self,
        student_id: i64,
        period: &str,
        score: f64,
    ) -> Result<(), TrackerError> {
        self.inner
            .insert_period_record(student_id, period, score)
            .await
    }

    async fn update_period_score(
        &mut self,
        student_id: i64,
        period: &str,
        score: f64,
    ) -> Result<bool, TrackerError> {
        self.inner.update_period_score(student_id, period, score).await
    }

    async fn delete_period_record(
        &mut self,
        student_id: i64,
        period: &str,
    ) -> Result<bool, TrackerError> {
        self.inner.delete_period_record(student_id, period).await
    }

    async fn set_overall_score(
        &mut self,
        student_id: i64,
        score: Option<f64>,
    ) -> Result<(), TrackerError> {
        self.inner.set_overall_score(student_id, score).await
    }

    async fn commit(self) -> Result<(), TrackerError> {
        self.inner.commit().await
    }
}
