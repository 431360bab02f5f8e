use crate::models::{Candidate, RawRow, RowRejection};
use crate::normalize::normalize_row;

/// Result of normalizing a whole batch. `accepted` and `rejected` together
/// cover every input row exactly once.
#[derive(Debug, Clone, Default)]
pub struct ValidatedBatch {
    pub accepted: Vec<Candidate>,
    pub rejected: Vec<RowRejection>,
}

/// Normalize every row independently. A bad row is recorded with its
/// original 0-based position and evaluation moves on to the next one.
pub fn validate_batch(rows: &[RawRow]) -> ValidatedBatch {
    let mut batch = ValidatedBatch::default();

    for (row_index, row) in rows.iter().enumerate() {
        match normalize_row(row) {
            Ok(candidate) => batch.accepted.push(candidate),
            Err(reason) => {
                tracing::warn!(row_index, %reason, "row rejected");
                batch.rejected.push(RowRejection { row_index, reason });
            }
        }
    }

    tracing::debug!(
        accepted = batch.accepted.len(),
        rejected = batch.rejected.len(),
        "batch validated"
    );
    batch
}
