//! Error types for the client object model.

use thiserror::Error;

/// Errors that can occur while talking to the control plane or
/// marshaling its responses.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The transport or the remote authority failed a call.
    ///
    /// Surfaced to the caller unmodified; this layer never retries.
    #[error("Remote call failed (code {code}): {message}")]
    Remote { code: i32, message: String },

    /// A payload could not be parsed, or its root element was not the
    /// one the schema expects.
    #[error("XML error: {0}")]
    Xml(String),

    /// A present node's text violated the field's declared type.
    #[error("Type mismatch for field '{field}': {value:?} is not an integer")]
    TypeMismatch { field: String, value: String },

    /// A state ordinal fell outside its decoder table.
    ///
    /// `code == len` usually means the authority added a new state that
    /// this table does not know yet; anything else is a malformed
    /// payload.
    #[error("State code {code} out of range for {table} (table has {len} entries)")]
    Decode {
        table: &'static str,
        code: i64,
        len: usize,
    },

    /// A field name was requested that the entity's schema does not
    /// declare. This is a programming error, not a remote condition.
    #[error("Unknown field '{0}' for this entity kind")]
    UnknownField(String),

    /// An operation needed a field the current tree does not carry
    /// (e.g. a lifecycle call on an element with no `ID` yet).
    #[error("Required field '{0}' is not set")]
    FieldNotSet(&'static str),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
