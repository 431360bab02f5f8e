use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// One decoded input row: column name to raw cell value. Extra columns are
/// carried along and ignored by normalization.
pub type RawRow = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub title: String,
    pub link: String,
    pub description: String,
}

/// The mutable, comparable attribute set of a student. The change-aware
/// merge compares exactly these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub name: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub internships: Vec<String>,
    pub projects: Vec<Project>,
    pub placed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Student {
    pub id: i64,
    pub email: String,
    #[serde(flatten)]
    pub profile: StudentProfile,
    /// Mean of the student's period scores; `None` until one exists.
    pub overall_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodRecord {
    pub student_id: i64,
    pub period: String,
    pub score: f64,
    pub recorded_at: DateTime<Utc>,
}

/// A normalized batch row, consumed by one batch and then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub internships: Vec<String>,
    pub projects: Vec<Project>,
    pub placed: Option<bool>,
    pub score: Option<f64>,
    pub period: Option<String>,
}

impl Candidate {
    /// Resolve the candidate into a full profile. An absent placement flag
    /// keeps the stored value, or defaults to `false` for a new student.
    pub fn profile_over(&self, existing: Option<&StudentProfile>) -> StudentProfile {
        let placed = self
            .placed
            .or_else(|| existing.map(|p| p.placed))
            .unwrap_or(false);
        StudentProfile {
            name: self.name.clone(),
            phone: self.phone.clone(),
            bio: self.bio.clone(),
            skills: self.skills.clone(),
            internships: self.internships.clone(),
            projects: self.projects.clone(),
            placed,
        }
    }
}

/// A row that failed normalization, at its 0-based position in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRejection {
    pub row_index: usize,
    pub reason: TrackerError,
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub search: Option<String>,
    pub skill: Option<String>,
    pub placed: Option<bool>,
    pub min_score: Option<f64>,
    /// Only students with an id greater than this.
    pub cursor: Option<i64>,
    pub limit: Option<usize>,
}

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

impl StudentFilter {
    /// Requested page size, defaulted and clamped to `1..=MAX_PAGE_SIZE`.
    pub fn page_size(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn matches(&self, student: &Student) -> bool {
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            if !student.profile.name.to_lowercase().contains(&term)
                && !student.email.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        if let Some(skill) = &self.skill {
            if !student
                .profile
                .skills
                .iter()
                .any(|s| s.eq_ignore_ascii_case(skill))
            {
                return false;
            }
        }
        if let Some(placed) = self.placed {
            if student.profile.placed != placed {
                return false;
            }
        }
        if let Some(min) = self.min_score {
            match student.overall_score {
                Some(score) if score >= min => {}
                _ => return false,
            }
        }
        true
    }
}
