use crate::types::DbId;

/// Domain error shared by every layer of the service.
///
/// Validation always runs before any write, so every variant except
/// `Internal` is raised with no partial state change behind it.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// Malformed identifiers, out-of-range scores, unsupported criteria types.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The acting user does not own the resource they are changing.
    #[error("Unauthorised action: {0}")]
    UnauthorisedAction(String),

    /// A reference crosses a boundary it must not cross (space, proposal).
    #[error("Insecure operation: {0}")]
    InsecureOperation(String),

    /// The resource is in a state that forbids the operation.
    #[error("Undesirable operation: {0}")]
    UndesirableOperation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
