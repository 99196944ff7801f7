//! Transport seam between the object model and the control plane.
//!
//! Everything this crate knows about the network is the [`Transport`]
//! trait: a named remote procedure call with positional arguments that
//! returns an XML payload as text. Connection handling, authentication,
//! timeouts and retry policy all live behind the implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// A positional argument of a remote procedure call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallArg {
    /// Integer scalar (entity IDs, host IDs, disk IDs).
    Int(i64),
    /// String scalar (names, driver names, template payloads).
    Str(String),
    /// Boolean scalar (enable flags, live-migration flag).
    Bool(bool),
}

impl From<i64> for CallArg {
    fn from(value: i64) -> Self {
        CallArg::Int(value)
    }
}

impl From<&str> for CallArg {
    fn from(value: &str) -> Self {
        CallArg::Str(value.to_string())
    }
}

impl From<String> for CallArg {
    fn from(value: String) -> Self {
        CallArg::Str(value)
    }
}

impl From<bool> for CallArg {
    fn from(value: bool) -> Self {
        CallArg::Bool(value)
    }
}

/// Remote-call transport to the control plane.
///
/// Implementations perform exactly one round trip per `call` and report
/// transport or remote-side failures as
/// [`ClientError::Remote`](crate::ClientError::Remote). The object
/// model propagates those verbatim and performs no retries of its own.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Invoke `method` with the given positional arguments and return
    /// the raw response payload.
    async fn call(&self, method: &str, args: &[CallArg]) -> Result<String>;
}

/// Parse the integer ID an allocate call returns as its payload.
pub(crate) fn parse_allocated_id(payload: &str) -> Result<i64> {
    payload
        .trim()
        .parse::<i64>()
        .map_err(|_| ClientError::TypeMismatch {
            field: "allocated id".to_string(),
            value: payload.to_string(),
        })
}
