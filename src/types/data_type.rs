//! Sample data type definitions

use serde::{Deserialize, Serialize};

/// Sample data types understood by the buffer.
/// Maps to the buffer's `DATATYPE_*` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 8-bit character (DATATYPE_CHAR)
    Char,
    /// 8-bit unsigned integer
    UInt8,
    /// 16-bit unsigned integer
    UInt16,
    /// 32-bit unsigned integer
    UInt32,
    /// 64-bit unsigned integer
    UInt64,
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    Float64,
}

impl DataType {
    /// Look up a data type by its wire code.
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => DataType::Char,
            1 => DataType::UInt8,
            2 => DataType::UInt16,
            3 => DataType::UInt32,
            4 => DataType::UInt64,
            5 => DataType::Int8,
            6 => DataType::Int16,
            7 => DataType::Int32,
            8 => DataType::Int64,
            9 => DataType::Float32,
            10 => DataType::Float64,
            _ => return None,
        })
    }

    /// The wire code of this data type.
    pub const fn code(&self) -> u32 {
        match self {
            DataType::Char => 0,
            DataType::UInt8 => 1,
            DataType::UInt16 => 2,
            DataType::UInt32 => 3,
            DataType::UInt64 => 4,
            DataType::Int8 => 5,
            DataType::Int16 => 6,
            DataType::Int32 => 7,
            DataType::Int64 => 8,
            DataType::Float32 => 9,
            DataType::Float64 => 10,
        }
    }

    /// Returns the size in bytes of one value of this type.
    pub const fn size(&self) -> usize {
        match self {
            DataType::Char | DataType::UInt8 | DataType::Int8 => 1,
            DataType::UInt16 | DataType::Int16 => 2,
            DataType::UInt32 | DataType::Int32 | DataType::Float32 => 4,
            DataType::UInt64 | DataType::Int64 | DataType::Float64 => 8,
        }
    }
}
