use sea_orm::error::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};

/// Step of a unit of work, reported when a store error aborts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LedgerStage {
    Header,
    Detail,
    Summary,
    Movement,
    History,
    Propagation,
    Activity,
    Commit,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Store error raised outside of a unit of work (connecting, plain reads).
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    /// An update matched zero rows. This is a no-op signal, not a failure to retry.
    #[error("No change detected: {0}")]
    NoChangeDetected(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transaction failed during {stage} stage: {source}")]
    TransactionFailure {
        stage: LedgerStage,
        #[source]
        source: DbErr,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<crate::config::AppConfigError> for ServiceError {
    fn from(err: crate::config::AppConfigError) -> Self {
        ServiceError::ConfigError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Wraps a store error raised inside `stage` of a unit of work.
    ///
    /// Duplicate keys are a caller problem rather than a store failure and come back as
    /// [`ServiceError::ConstraintViolation`].
    pub fn in_stage<E: IntoDbErr>(stage: LedgerStage, error: E) -> Self {
        let error = error.into_db_err();
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = error.sql_err() {
            return ServiceError::ConstraintViolation(format!(
                "duplicate key during {stage} stage: {detail}"
            ));
        }
        ServiceError::TransactionFailure {
            stage,
            source: error,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::NoChangeDetected(_) => "no_change_detected",
            Self::ConstraintViolation(_) => "constraint_violation",
            Self::TransactionFailure { .. } => "transaction_failure",
            Self::ValidationError(_) => "validation_error",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::ConfigError(_) => "config_error",
            Self::InternalError(_) | Self::Other(_) => "internal_error",
        }
    }

    pub fn is_no_change(&self) -> bool {
        matches!(self, Self::NoChangeDetected(_))
    }

    /// The failing stage, for transaction failures.
    pub fn stage(&self) -> Option<LedgerStage> {
        match self {
            Self::TransactionFailure { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Tags store errors with the unit-of-work stage they happened in.
///
/// Domain errors pass through untouched.
pub trait StageExt<T> {
    fn stage(self, stage: LedgerStage) -> Result<T, ServiceError>;
}

impl<T> StageExt<T> for Result<T, DbErr> {
    fn stage(self, stage: LedgerStage) -> Result<T, ServiceError> {
        self.map_err(|e| ServiceError::in_stage(stage, e))
    }
}

impl<T> StageExt<T> for Result<T, ServiceError> {
    fn stage(self, stage: LedgerStage) -> Result<T, ServiceError> {
        self.map_err(|e| match e {
            ServiceError::DatabaseError(db_err) => ServiceError::in_stage(stage, db_err),
            other => other,
        })
    }
}
