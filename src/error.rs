use thiserror::Error;

/// Failures surfaced by the receipt engine.
///
/// Scoring never fails; everything else that can go wrong lands in one of
/// these variants so the UI shell can decide between retrying, prompting for
/// manual entry, or showing a message.
#[derive(Debug, Error)]
pub enum Error {
    /// The extraction collaborator errored, timed out, or returned content
    /// that could not be parsed.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// The caller cancelled an in-flight extraction.
    #[error("extraction cancelled")]
    Cancelled,

    /// A receipt or category id does not exist for the current user.
    #[error("not found: {0}")]
    NotFound(String),

    /// The storage mirror did not durably accept a mutation. The in-memory
    /// working set was left untouched.
    #[error("persist failed: {0}")]
    PersistFailed(String),

    /// Input rejected before it reached the repository.
    #[error("validation failed: {0}")]
    ValidationFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Error::ValidationFailed(message.into())
    }

    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Error::NotFound(what.into())
    }

    /// Wraps a collaborator failure, keeping the whole context chain.
    pub(crate) fn persist(err: anyhow::Error) -> Self {
        Error::PersistFailed(format!("{err:#}"))
    }

    pub(crate) fn extraction(err: anyhow::Error) -> Self {
        Error::ExtractionFailed(format!("{err:#}"))
    }

    /// Whether repeating the same call can succeed without different input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ExtractionFailed(_) | Error::PersistFailed(_) | Error::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_variants() {
        assert!(Error::ExtractionFailed("timeout".into()).is_recoverable());
        assert!(Error::PersistFailed("disk".into()).is_recoverable());
        assert!(Error::Cancelled.is_recoverable());
        assert!(!Error::not_found("receipt x").is_recoverable());
        assert!(!Error::validation("empty label").is_recoverable());
    }

    #[test]
    fn test_persist_keeps_context_chain() {
        let err = anyhow::anyhow!("connection reset").context("update receipt r1");
        let mapped = Error::persist(err);
        assert_eq!(
            mapped.to_string(),
            "persist failed: update receipt r1: connection reset"
        );
    }
}
