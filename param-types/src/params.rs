//! Parameter representation shared by the link and the parameter store.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// Maximum length of a parameter id (MAVLink PARAM_ID field, not NUL-terminated when full).
pub const MAX_PARAM_ID_LEN: usize = 16;

/// On-vehicle storage type of a parameter (MAV_PARAM_TYPE).
///
/// Values always travel as `f32` on the parameter protocol; the type tells
/// the vehicle how to interpret the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ParamType {
    /// 8-bit unsigned integer
    Uint8 = 1,
    /// 8-bit signed integer
    Int8 = 2,
    /// 16-bit unsigned integer
    Uint16 = 3,
    /// 16-bit signed integer
    Int16 = 4,
    /// 32-bit unsigned integer
    Uint32 = 5,
    /// 32-bit signed integer
    Int32 = 6,
    /// 64-bit unsigned integer
    Uint64 = 7,
    /// 64-bit signed integer
    Int64 = 8,
    /// 32-bit float
    Real32 = 9,
    /// 64-bit float
    Real64 = 10,
}

impl ParamType {
    /// Wire code for this type.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether values of this type are integral.
    pub fn is_integer(self) -> bool {
        !matches!(self, ParamType::Real32 | ParamType::Real64)
    }
}

impl TryFrom<u8> for ParamType {
    type Error = TypesError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ParamType::Uint8),
            2 => Ok(ParamType::Int8),
            3 => Ok(ParamType::Uint16),
            4 => Ok(ParamType::Int16),
            5 => Ok(ParamType::Uint32),
            6 => Ok(ParamType::Int32),
            7 => Ok(ParamType::Uint64),
            8 => Ok(ParamType::Int64),
            9 => Ok(ParamType::Real32),
            10 => Ok(ParamType::Real64),
            _ => Err(TypesError::InvalidParamType(value)),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Uint8 => "UINT8",
            ParamType::Int8 => "INT8",
            ParamType::Uint16 => "UINT16",
            ParamType::Int16 => "INT16",
            ParamType::Uint32 => "UINT32",
            ParamType::Int32 => "INT32",
            ParamType::Uint64 => "UINT64",
            ParamType::Int64 => "INT64",
            ParamType::Real32 => "REAL32",
            ParamType::Real64 => "REAL64",
        };
        f.write_str(name)
    }
}

/// Check that a parameter id fits the PARAM_ID field.
pub fn validate_param_id(id: &str) -> Result<(), TypesError> {
    if id.is_empty() || id.len() > MAX_PARAM_ID_LEN || !id.is_ascii() {
        return Err(TypesError::InvalidParamId(id.to_string()));
    }
    Ok(())
}
