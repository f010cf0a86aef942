use crate::error::CoreError;

/// All primary keys are UUIDs.
pub type DbId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Parse a caller-supplied identifier, naming the field on failure.
pub fn parse_id(raw: &str, field: &str) -> Result<DbId, CoreError> {
    uuid::Uuid::parse_str(raw.trim())
        .map_err(|_| CoreError::InvalidInput(format!("Invalid {field}: '{raw}'")))
}
