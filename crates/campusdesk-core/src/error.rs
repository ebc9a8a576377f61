use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy for every core operation. Policy denials and missing
/// records are terminal for the attempted operation and must reach the
/// caller; `Transient` wraps storage faults the caller may retry.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not signed in")]
    Unauthenticated,

    /// A session exists but no profile or role row is provisioned for it.
    /// Never downgraded to a default student identity.
    #[error("no profile provisioned for user {0}")]
    ProfileMissing(Uuid),

    #[error("not allowed")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("lost a concurrent update race")]
    Conflict,

    #[error("storage unavailable: {0}")]
    Transient(anyhow::Error),
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Transient(err)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
