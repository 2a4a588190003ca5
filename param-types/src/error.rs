//! Error types for mavparam message handling.

use thiserror::Error;

/// Errors produced while building or interpreting mavparam types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// MAV_PARAM_TYPE code outside the known range
    #[error("invalid parameter type: {0}")]
    InvalidParamType(u8),

    /// Parameter id empty or longer than the 16-byte PARAM_ID field
    #[error("invalid parameter id: {0:?}")]
    InvalidParamId(String),

    /// Memory-area action name not one of write/read/clear
    #[error("unknown memory-area action: {0}")]
    UnknownAction(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TypesError::InvalidParamType(42);
        assert_eq!(err.to_string(), "invalid parameter type: 42");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TypesError>();
    }
}
