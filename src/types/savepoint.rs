use std::fmt;

use uuid::Uuid;

use crate::error::{PgTxError, Result};

/// PostgreSQL truncates identifiers longer than this.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Name of a savepoint, interpolated into SAVEPOINT / RELEASE / ROLLBACK TO statements.
///
/// Caller-supplied names must be plain SQL identifiers; generated names are
/// `sp_` followed by a v4 UUID without hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SavepointId(String);

impl SavepointId {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if !is_plain_identifier(&name) {
            return Err(PgTxError::argument(format!(
                "invalid savepoint name: {:?}",
                name
            )));
        }
        Ok(Self(name))
    }

    pub fn generate() -> Self {
        Self(format!("sp_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SavepointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SavepointId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    starts_ok
        && name.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// What a call to `begin` opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionLevel {
    /// A top-level `BEGIN` with no savepoint.
    Top,
    Savepoint(SavepointId),
}

impl TransactionLevel {
    pub fn savepoint(&self) -> Option<&SavepointId> {
        match self {
            TransactionLevel::Top => None,
            TransactionLevel::Savepoint(id) => Some(id),
        }
    }
}
