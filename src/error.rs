use crate::types::{ObjectId, ValueId};

/// Errors raised by the SMG core.
///
/// Every variant except [`Interrupted`](Self::Interrupted) signals a defect
/// in the graph handed to the core (or in the core itself) and must abort the
/// analysis. Two states that merely cannot be joined are not an error: the
/// join reports that as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SmgError {
    /// A structural invariant of the graph does not hold.
    #[error("malformed graph: {reason}")]
    MalformedGraph { reason: String },
    /// An object handle that the graph does not contain.
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),
    /// A value handle that the graph does not contain.
    #[error("unknown value {0}")]
    UnknownValue(ValueId),
    /// A read or write of an invalidated (freed or out-of-scope) object.
    #[error("access to invalid object {0}")]
    InvalidAccess(ObjectId),
    /// A variable that the configuration does not declare.
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    /// The enclosing analysis requested an interruption.
    #[error("analysis interrupted")]
    Interrupted,
    /// An object size that the core refuses to guess.
    #[error("unsupported object size: {reason}")]
    UnsupportedSize { reason: String },
}

impl SmgError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        SmgError::MalformedGraph {
            reason: reason.into(),
        }
    }

    /// Whether the error must abort the analysis (everything but interruption).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SmgError::Interrupted)
    }
}

pub type Result<T, E = SmgError> = std::result::Result<T, E>;
