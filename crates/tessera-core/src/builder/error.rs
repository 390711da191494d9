use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Duplicate field '{field}' in {builder}")]
    DuplicateField {
        builder: &'static str,
        field: &'static str,
    },

    #[error("Unset fields in {builder}: {}", fields.join(", "))]
    UnsetFields {
        builder: &'static str,
        fields: Vec<&'static str>,
    },

    #[error("Unknown field '{field}' for {builder}")]
    UnknownField { builder: &'static str, field: String },

    #[error("Invalid field '{field}' in {builder}: {reason}")]
    InvalidField {
        builder: &'static str,
        field: &'static str,
        reason: String,
    },
}
