/// Errors surfaced by the reconciliation core.
///
/// Row-level validation failures (`MissingField`, `InvalidField`) are
/// collected into a batch's rejection report; everything else aborts the
/// operation that raised it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackerError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid field: {0}")]
    InvalidField(&'static str),
    #[error("duplicate key: a student with email {0} already exists")]
    DuplicateKey(String),
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl From<sqlx::Error> for TrackerError {
    fn from(err: sqlx::Error) -> Self {
        TrackerError::StorageFailure(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for TrackerError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        TrackerError::StorageFailure(format!("migration failed: {err}"))
    }
}

impl TrackerError {
    /// True for the per-row validation kinds that never abort a batch.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            TrackerError::MissingField(_) | TrackerError::InvalidField(_)
        )
    }
}

pub type Result<T, E = TrackerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlx_errors_become_storage_failures() {
        let err: TrackerError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, TrackerError::StorageFailure(_)));
        assert!(!err.is_row_level());
    }

    #[test]
    fn display_names_the_field() {
        assert_eq!(
            TrackerError::MissingField("name").to_string(),
            "missing field: name"
        );
        assert_eq!(
            TrackerError::InvalidField("email").to_string(),
            "invalid field: email"
        );
        assert!(TrackerError::InvalidField("score").is_row_level());
    }
}
