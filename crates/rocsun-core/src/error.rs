use thiserror::Error;

use crate::api::ApiError;
use crate::models::ValidationErrors;

/// Errors surfaced by the session, query and mutation controllers.
///
/// Superseded query replies are not errors; they show up as
/// [`crate::query::FetchOutcome::Superseded`].
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Session expired, please log in again")]
    AuthExpired,

    #[error("Not logged in")]
    NotAuthenticated,

    #[error(transparent)]
    Network(#[from] ApiError),

    #[error("Invalid input: {0}")]
    Validation(ValidationErrors),

    #[error("Another operation is still in progress")]
    Busy,

    #[error("User {0} not found")]
    NotFound(i64),
}

impl From<ValidationErrors> for ConsoleError {
    fn from(errors: ValidationErrors) -> Self {
        ConsoleError::Validation(errors)
    }
}

impl ConsoleError {
    /// True when the backend rejected our token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ConsoleError::Network(e) if e.is_unauthorized())
    }
}
