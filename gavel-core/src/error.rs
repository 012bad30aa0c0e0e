//! Error taxonomy for session transitions.

use crate::gateway::GatewayError;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Why a session operation did not happen.
///
/// Every variant is terminal for the invocation that produced it; the
/// guild's committed state is left exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The platform refused an action because the bot lacks a permission.
    #[error("I don't have permission to do this: {0}")]
    PermissionDenied(String),

    /// The guild is not in a state where the operation makes sense.
    #[error("{0}")]
    PreconditionFailed(String),

    /// A role or message was deleted out from under us.
    #[error("{0}")]
    NotFound(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl SessionError {
    pub fn precondition(message: impl Into<String>) -> Self {
        SessionError::PreconditionFailed(message.into())
    }
}

impl From<GatewayError> for SessionError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Forbidden(detail) => SessionError::PermissionDenied(detail),
            GatewayError::NotFound(detail) => SessionError::NotFound(detail),
            GatewayError::Other(detail) => SessionError::Unexpected(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_map_onto_taxonomy() {
        assert_eq!(
            SessionError::from(GatewayError::Forbidden("manage roles".into())),
            SessionError::PermissionDenied("manage roles".into())
        );
        assert_eq!(
            SessionError::from(GatewayError::NotFound("message 7".into())),
            SessionError::NotFound("message 7".into())
        );
        assert_eq!(
            SessionError::from(GatewayError::Other("timeout".into())),
            SessionError::Unexpected("timeout".into())
        );
    }

    #[test]
    fn permission_denied_reads_as_a_sentence() {
        let err = SessionError::PermissionDenied("missing Manage Roles".into());
        assert_eq!(
            err.to_string(),
            "I don't have permission to do this: missing Manage Roles"
        );
    }
}
