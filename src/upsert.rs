use crate::error::TrackerError;
use crate::models::{Candidate, StudentProfile};
use crate::store::StoreTx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted(i64),
    Updated(i64),
    Unchanged(i64),
}

impl MergeOutcome {
    pub fn student_id(self) -> i64 {
        match self {
            MergeOutcome::Inserted(id)
            | MergeOutcome::Updated(id)
            | MergeOutcome::Unchanged(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl MergeSummary {
    pub fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted(_) => self.inserted += 1,
            MergeOutcome::Updated(_) => self.updated += 1,
            MergeOutcome::Unchanged(_) => self.unchanged += 1,
        }
    }
}

/// Names of the profile fields that differ between `stored` and `incoming`.
pub fn changed_fields(stored: &StudentProfile, incoming: &StudentProfile) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if stored.name != incoming.name {
        changed.push("name");
    }
    if stored.phone != incoming.phone {
        changed.push("phone");
    }
    if stored.bio != incoming.bio {
        changed.push("bio");
    }
    if stored.skills != incoming.skills {
        changed.push("skills");
    }
    if stored.internships != incoming.internships {
        changed.push("internships");
    }
    if stored.projects != incoming.projects {
        changed.push("projects");
    }
    if stored.placed != incoming.placed {
        changed.push("placed");
    }
    changed
}

/// Write `incoming` over student `id` only if it differs from `stored`.
/// Returns whether a write happened.
pub async fn write_if_changed<T: StoreTx>(
    tx: &mut T,
    id: i64,
    stored: &StudentProfile,
    incoming: &StudentProfile,
) -> Result<bool, TrackerError> {
    let changed = changed_fields(stored, incoming);
    if changed.is_empty() {
        tracing::debug!(student_id = id, "profile unchanged, skipping write");
        return Ok(false);
    }
    if !tx.update_student(id, incoming).await? {
        return Err(TrackerError::NotFound("student"));
    }
    tracing::debug!(student_id = id, ?changed, "profile updated");
    Ok(true)
}

pub async fn merge_candidate<T: StoreTx>(
    tx: &mut T,
    candidate: &Candidate,
) -> Result<MergeOutcome, TrackerError> {
    match tx.find_student_by_email(&candidate.email).await? {
        None => {
            let profile = candidate.profile_over(None);
            let id = tx.insert_student(&candidate.email, &profile).await?;
            tracing::debug!(student_id = id, email = %candidate.email, "student inserted");
            Ok(MergeOutcome::Inserted(id))
        }
        Some(existing) => {
            let incoming = candidate.profile_over(Some(&existing.profile));
            if write_if_changed(tx, existing.id, &existing.profile, &incoming).await? {
                Ok(MergeOutcome::Updated(existing.id))
            } else {
                Ok(MergeOutcome::Unchanged(existing.id))
            }
        }
    }
}

/// Merge candidates in input order. The caller owns the transaction, so a
/// failure here leaves nothing applied once the transaction is dropped.
pub async fn merge_candidates<T: StoreTx>(
    tx: &mut T,
    candidates: &[Candidate],
) -> Result<(Vec<MergeOutcome>, MergeSummary), TrackerError> {
    let mut outcomes = Vec::with_capacity(candidates.len());
    let mut summary = MergeSummary::default();
    for candidate in candidates {
        let outcome = merge_candidate(tx, candidate).await?;
        summary.record(outcome);
        outcomes.push(outcome);
    }
    Ok((outcomes, summary))
}
