use tessera_codecs::CodecError;
use thiserror::Error;

/// Tagged outcome of an engine call that did not produce `Ok(len)`.
///
/// No variant is ever retried inside the engine; growing the destination
/// and calling again is the caller's decision.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The data did not fit in the destination. Not a defect: discard
    /// `dest` and retry with at least `src.len() + MAX_OVERHEAD` bytes.
    #[error("data does not fit in the destination buffer")]
    Incompressible,

    #[error("destination buffer too small: need {needed} bytes, have {available}")]
    CapacityExceeded { needed: usize, available: usize },

    /// Unrecognized header or block data that fails validation.
    #[error("corrupt input: {0}")]
    Corrupt(String),

    /// Codec name, code, or header format not compiled into this build.
    #[error("unsupported codec: {0}")]
    Unsupported(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An invariant was violated. Should never happen; report it together
    /// with the input buffer and settings that produced it.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Legacy integer result for callers that speak the C-style convention:
    /// zero means "did not fit", negative means failure.
    pub fn code(&self) -> i32 {
        match self {
            Error::Incompressible | Error::CapacityExceeded { .. } => 0,
            Error::Corrupt(_) | Error::Unsupported(_) => -1,
            Error::InvalidParameter(_) => -2,
            Error::Internal(_) => -3,
        }
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        let text = e.to_string();
        match e {
            CodecError::Incompressible => Error::Incompressible,
            CodecError::Unsupported(name) => Error::Unsupported(name),
            CodecError::InvalidLevel(level) => Error::InvalidParameter(format!("compression level {level}")),
            CodecError::Corrupt { .. } => Error::Corrupt(text),
            CodecError::Internal { .. } => Error::Internal(text),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Collapse a call result into the legacy integer convention.
pub fn result_code(result: &Result<usize>) -> i64 {
    match result {
        Ok(n) => *n as i64,
        Err(e) => e.code() as i64,
    }
}
