use crate::fields::{FieldVal, IntField, StringField};

/// Default capacity, in bytes, of a `Type::String` field when none is given
/// explicitly. 128 bytes + 4-byte length is the typical shape for this storage layer.
pub const DEFAULT_STRING_CAPACITY: usize = 128;

/// Closed set of field types. Only INT and STRING are supported, matching
/// the teaching-grade scope of the storage core.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum Type {
    /// 4-byte signed big-endian integer.
    Int,
    /// 4-byte big-endian length prefix followed by a fixed byte capacity.
    String(usize),
}

impl Type {
    pub fn string() -> Type {
        Type::String(DEFAULT_STRING_CAPACITY)
    }

    // Get the size of the type in bytes
    pub fn get_len(&self) -> usize {
        match self {
            Type::Int => 4,
            Type::String(cap) => cap + 4,
        }
    }

    // Parse bytes into a FieldVal
    pub fn parse(&self, bytes: &[u8]) -> Result<FieldVal, String> {
        match self {
            Type::Int => {
                let mut int_bytes = [0; 4];
                int_bytes.copy_from_slice(&bytes[..4]);
                Ok(FieldVal::IntField(IntField::new(i32::from_be_bytes(int_bytes))))
            }
            Type::String(cap) => {
                let mut len_bytes = [0; 4];
                len_bytes.copy_from_slice(&bytes[..4]);
                let len = u32::from_be_bytes(len_bytes) as usize;
                if len > *cap {
                    return Err(format!("string length {} exceeds capacity {}", len, cap));
                }
                let string_bytes = bytes[4..4 + len].to_vec();
                let value = String::from_utf8(string_bytes)
                    .map_err(|e| format!("invalid utf8 in string field: {}", e))?;
                Ok(FieldVal::StringField(StringField::new(value, *cap)))
            }
        }
    }
}
