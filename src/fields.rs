use crate::types::Type;

// Wrapper for different types of fields
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum FieldVal {
    IntField(IntField),
    StringField(StringField),
}

impl FieldVal {
    // Extracts the inner IntField
    pub fn into_int(self) -> Option<IntField> {
        match self {
            FieldVal::IntField(int_field) => Some(int_field),
            _ => None,
        }
    }
    // Extracts the inner StringField
    pub fn into_string(self) -> Option<StringField> {
        match self {
            FieldVal::StringField(string_field) => Some(string_field),
            _ => None,
        }
    }

    pub fn get_type(&self) -> Type {
        match self {
            FieldVal::IntField(_) => Type::Int,
            FieldVal::StringField(s) => Type::String(s.capacity),
        }
    }
}

// Trait for different types of fields
pub trait Field {
    // Serialize the field into bytes
    fn serialize(&self) -> Vec<u8>;
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct IntField {
    value: i32,
}

impl IntField {
    pub fn new(value: i32) -> Self {
        IntField { value }
    }
    pub fn get_value(&self) -> i32 {
        self.value
    }
}

impl Field for IntField {
    fn serialize(&self) -> Vec<u8> {
        self.value.to_be_bytes().to_vec()
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct StringField {
    value: String,
    capacity: usize,
}

impl StringField {
    pub fn new(value: String, capacity: usize) -> Self {
        StringField { value, capacity }
    }

    pub fn get_value(&self) -> String {
        self.value.clone()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Field for StringField {
    fn serialize(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.capacity + 4];
        let str_bytes = self.value.as_bytes();
        let copy_len = std::cmp::min(str_bytes.len(), self.capacity);
        bytes[0..4].copy_from_slice(&(copy_len as u32).to_be_bytes());
        bytes[4..4 + copy_len].copy_from_slice(&str_bytes[..copy_len]);
        bytes
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_int_field() {
        let int_field = IntField::new(1);
        assert_eq!(FieldVal::IntField(int_field).get_type(), Type::Int);
        assert_eq!(int_field.serialize(), vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_string_field() {
        let string_field = StringField::new("hello".to_string(), 16);
        let mut serialized = vec![0u8; 20];
        serialized[3] = 5;
        serialized[4..9].copy_from_slice("hello".as_bytes());
        assert_eq!(string_field.serialize(), serialized);
        assert_eq!(
            FieldVal::StringField(StringField::new("hello".to_string(), 16)).get_type(),
            Type::String(16)
        );
    }

    #[test]
    fn test_string_field_truncates_to_capacity() {
        let string_field = StringField::new("abcdefgh".to_string(), 4);
        let serialized = string_field.serialize();
        assert_eq!(serialized.len(), 8);
        assert_eq!(&serialized[0..4], &[0, 0, 0, 4]);
        assert_eq!(&serialized[4..8], b"abcd");
    }
}
