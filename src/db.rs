use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::postgres::Postgres;
use sqlx::types::Json;
use sqlx::{PgPool, Transaction};

use crate::error::TrackerError;
use crate::models::{PeriodRecord, Project, RawRow, Student, StudentFilter, StudentProfile};
use crate::service::{BatchSummary, Tracker};
use crate::store::{Store, StoreTx};

pub async fn init_db(pool: &PgPool) -> Result<(), TrackerError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Load a small cohort through the regular batch path, so seeded overall
/// scores are derived the same way as uploaded ones.
pub async fn seed(pool: &PgPool) -> anyhow::Result<BatchSummary> {
    let tracker = Tracker::new(PgStore::new(pool.clone()));
    let outcome = tracker.validate_and_upsert_batch(&seed_rows()).await;
    if let Some(rejection) = outcome.rejected.first() {
        anyhow::bail!("seed row {} rejected: {}", rejection.row_index, rejection.reason);
    }
    Ok(outcome.applied?)
}

pub fn seed_rows() -> Vec<RawRow> {
    let rows = json!([
        {
            "name": "Avery Lee",
            "email": "avery.lee@example.edu",
            "phone": "555-0101",
            "skills": "Rust, SQL, Distributed Systems",
            "internships": "Acme Robotics",
            "placed": "yes",
            "period": "S1",
            "score": "8.4"
        },
        {
            "name": "Avery Lee",
            "email": "avery.lee@example.edu",
            "phone": "555-0101",
            "skills": "Rust, SQL, Distributed Systems",
            "internships": "Acme Robotics",
            "placed": "yes",
            "period": "S2",
            "score": "8.9"
        },
        {
            "name": "Jules Moreno",
            "email": "jules.moreno@example.edu",
            "skills": "Python, Data Analysis",
            "internships": "",
            "placed": "no",
            "period": "S1",
            "score": "7.2"
        },
        {
            "name": "Kiara Patel",
            "email": "kiara.patel@example.edu",
            "phone": "555-0103",
            "bio": "Frontend developer interested in accessibility.",
            "skills": "TypeScript, React, Go",
            "internships": "Northwind, Contoso",
            "placed": "false"
        }
    ]);

    match rows {
        serde_json::Value::Array(values) => values
            .into_iter()
            .filter_map(|value| match value {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Postgres-backed [`Store`]. Transactions run at SERIALIZABLE isolation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, TrackerError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(PgTx { tx })
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

const STUDENT_COLUMNS: &str = "id, email, name, phone, bio, skills, internships, projects, \
                               placed, overall_score, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: i64,
    email: String,
    name: String,
    phone: Option<String>,
    bio: Option<String>,
    skills: Vec<String>,
    internships: Vec<String>,
    projects: Json<Vec<Project>>,
    placed: bool,
    overall_score: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Student {
            id: row.id,
            email: row.email,
            profile: StudentProfile {
                name: row.name,
                phone: row.phone,
                bio: row.bio,
                skills: row.skills,
                internships: row.internships,
                projects: row.projects.0,
                placed: row.placed,
            },
            overall_score: row.overall_score,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PeriodRow {
    student_id: i64,
    period: String,
    score: f64,
    recorded_at: DateTime<Utc>,
}

impl From<PeriodRow> for PeriodRecord {
    fn from(row: PeriodRow) -> Self {
        PeriodRecord {
            student_id: row.student_id,
            period: row.period,
            score: row.score,
            recorded_at: row.recorded_at,
        }
    }
}

impl StoreTx for PgTx {
    async fn find_student(&mut self, id: i64) -> Result<Option<Student>, TrackerError> {
        let query =
            format!("SELECT {STUDENT_COLUMNS} FROM placement_tracker.students WHERE id = $1");
        let row = sqlx::query_as::<_, StudentRow>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Student::from))
    }

    async fn find_student_by_email(
        &mut self,
        email: &str,
    ) -> Result<Option<Student>, TrackerError> {
        let query =
            format!("SELECT {STUDENT_COLUMNS} FROM placement_tracker.students WHERE email = $1");
        let row = sqlx::query_as::<_, StudentRow>(&query)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Student::from))
    }

    async fn lock_student(&mut self, id: i64) -> Result<bool, TrackerError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM placement_tracker.students WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(row.is_some())
    }

    async fn list_students(
        &mut self,
        filter: &StudentFilter,
    ) -> Result<Vec<Student>, TrackerError> {
        let mut query =
            format!("SELECT {STUDENT_COLUMNS} FROM placement_tracker.students WHERE TRUE");
        let mut param = 0;

        if filter.search.is_some() {
            param += 1;
            query.push_str(&format!(" AND (name ILIKE ${param} OR email ILIKE ${param})"));
        }
        if filter.skill.is_some() {
            param += 1;
            query.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM unnest(skills) AS s WHERE lower(s) = lower(${param}))"
            ));
        }
        if filter.placed.is_some() {
            param += 1;
            query.push_str(&format!(" AND placed = ${param}"));
        }
        if filter.min_score.is_some() {
            param += 1;
            query.push_str(&format!(" AND overall_score >= ${param}"));
        }
        if filter.cursor.is_some() {
            param += 1;
            query.push_str(&format!(" AND id > ${param}"));
        }
        param += 1;
        query.push_str(&format!(" ORDER BY id LIMIT ${param}"));

        let mut rows = sqlx::query_as::<_, StudentRow>(&query);
        if let Some(term) = &filter.search {
            rows = rows.bind(format!("%{term}%"));
        }
        if let Some(skill) = &filter.skill {
            rows = rows.bind(skill.clone());
        }
        if let Some(placed) = filter.placed {
            rows = rows.bind(placed);
        }
        if let Some(min) = filter.min_score {
            rows = rows.bind(min);
        }
        if let Some(cursor) = filter.cursor {
            rows = rows.bind(cursor);
        }
        rows = rows.bind(filter.page_size() as i64);

        let records = rows.fetch_all(&mut *self.tx).await?;
        Ok(records.into_iter().map(Student::from).collect())
    }

    async fn insert_student(
        &mut self,
        email: &str,
        profile: &StudentProfile,
    ) -> Result<i64, TrackerError> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO placement_tracker.students
            (email, name, phone, bio, skills, internships, projects, placed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(&profile.name)
        .bind(&profile.phone)
        .bind(&profile.bio)
        .bind(&profile.skills)
        .bind(&profile.internships)
        .bind(Json(&profile.projects))
        .bind(profile.placed)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                TrackerError::DuplicateKey(email.to_string())
            }
            _ => TrackerError::from(err),
        })?;
        Ok(row.0)
    }

    async fn update_student(
        &mut self,
        id: i64,
        profile: &StudentProfile,
    ) -> Result<bool, TrackerError> {
        let result = sqlx::query(
            r#"
            UPDATE placement_tracker.students
            SET name = $2, phone = $3, bio = $4, skills = $5, internships = $6,
                projects = $7, placed = $8, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&profile.name)
        .bind(&profile.phone)
        .bind(&profile.bio)
        .bind(&profile.skills)
        .bind(&profile.internships)
        .bind(Json(&profile.projects))
        .bind(profile.placed)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_student(&mut self, id: i64) -> Result<bool, TrackerError> {
        let result = sqlx::query("DELETE FROM placement_tracker.students WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_period_records(
        &mut self,
        student_id: i64,
    ) -> Result<Vec<PeriodRecord>, TrackerError> {
        let rows = sqlx::query_as::<_, PeriodRow>(
            r#"
            SELECT student_id, period, score, recorded_at
            FROM placement_tracker.period_records
            WHERE student_id = $1
            ORDER BY period
            "#,
        )
        .bind(student_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(PeriodRecord::from).collect())
    }

    async fn find_period_record(
        &mut self,
        student_id: i64,
        period: &str,
    ) -> Result<Option<PeriodRecord>, TrackerError> {
        let row = sqlx::query_as::<_, PeriodRow>(
            r#"
            SELECT student_id, period, score, recorded_at
            FROM placement_tracker.period_records
            WHERE student_id = $1 AND period = $2
            "#,
        )
        .bind(student_id)
        .bind(period)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(PeriodRecord::from))
    }

    async fn insert_period_record(
        &mut self,
        student_id: i64,
        period: &str,
        score: f64,
    ) -> Result<(), TrackerError> {
        sqlx::query(
            r#"
            INSERT INTO placement_tracker.period_records (student_id, period, score)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(student_id)
        .bind(period)
        .bind(score)
        .execute(&mut *self.tx)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                TrackerError::NotFound("student")
            }
            _ => TrackerError::from(err),
        })?;
        Ok(())
    }

    async fn update_period_score(
        &mut self,
        student_id: i64,
        period: &str,
        score: f64,
    ) -> Result<bool, TrackerError> {
        let result = sqlx::query(
            r#"
            UPDATE placement_tracker.period_records
            SET score = $3, recorded_at = NOW()
            WHERE student_id = $1 AND period = $2
            "#,
        )
        .bind(student_id)
        .bind(period)
        .bind(score)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_period_record(
        &mut self,
        student_id: i64,
        period: &str,
    ) -> Result<bool, TrackerError> {
        let result = sqlx::query(
            "DELETE FROM placement_tracker.period_records WHERE student_id = $1 AND period = $2",
        )
        .bind(student_id)
        .bind(period)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_overall_score(
        &mut self,
        student_id: i64,
        score: Option<f64>,
    ) -> Result<(), TrackerError> {
        let result =
            sqlx::query("UPDATE placement_tracker.students SET overall_score = $2 WHERE id = $1")
                .bind(student_id)
                .bind(score)
                .execute(&mut *self.tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(TrackerError::NotFound("student"));
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), TrackerError> {
        self.tx.commit().await?;
        Ok(())
    }
}
