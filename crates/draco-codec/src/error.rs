use thiserror::Error;

/// Errors produced by the codec. Every fallible operation reports one of
/// these kinds; none of them is recoverable inside the codec itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("unsupported bitstream version {0}.{1}")]
    UnsupportedVersion(u8, u8),
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("corrupt bitstream: {0}")]
    CorruptBitstream(String),
    #[error("read past end of buffer")]
    BufferUnderflow,
    #[error("mesh is not edge-manifold")]
    NonManifold,
    #[error("invalid coder state: {0}")]
    InvalidState(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;

pub(crate) fn invalid_parameter(msg: impl Into<String>) -> CodecError {
    CodecError::InvalidParameter(msg.into())
}

pub(crate) fn corrupt(msg: impl Into<String>) -> CodecError {
    CodecError::CorruptBitstream(msg.into())
}

pub(crate) fn internal(msg: impl Into<String>) -> CodecError {
    CodecError::InternalError(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind() {
        let err = CodecError::UnsupportedVersion(9, 1);
        assert_eq!(err.to_string(), "unsupported bitstream version 9.1");
        assert_eq!(
            corrupt("bad table").to_string(),
            "corrupt bitstream: bad table"
        );
    }
}
