use thiserror::Error;

/// Failure modes of a single codec call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The output did not fit in the destination slice. Not a failure of the
    /// data; callers store the input verbatim instead.
    #[error("output does not fit in the destination buffer")]
    Incompressible,

    /// Codec name or code is unknown or not compiled into this build.
    #[error("codec '{0}' is not supported by this build")]
    Unsupported(String),

    #[error("compression level {0} out of range 0..=9")]
    InvalidLevel(u8),

    /// Compressed input failed backend validation.
    #[error("corrupt {codec} stream: {msg}")]
    Corrupt { codec: &'static str, msg: String },

    /// The backend reported something other than a capacity or data problem.
    #[error("{codec} backend error: {msg}")]
    Internal { codec: &'static str, msg: String },
}

impl CodecError {
    /// Legacy integer code: 0 for "did not fit", -1 for everything else.
    pub fn code(&self) -> i32 {
        match self {
            CodecError::Incompressible => 0,
            _ => -1,
        }
    }

    pub(crate) fn corrupt(codec: &'static str, msg: impl ToString) -> Self {
        CodecError::Corrupt {
            codec,
            msg: msg.to_string(),
        }
    }
}
