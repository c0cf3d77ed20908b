//! Comparison operators shared between tuple-level filtering and histogram
//! selectivity estimation, so both speak the same vocabulary instead of two
//! disjoint ad hoc enums.

use crate::fields::FieldVal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
}

impl Op {
    /// Evaluates `lhs <op> rhs` for two field values of the same type.
    /// Mismatched field types never satisfy any operator.
    pub fn evaluate(&self, lhs: &FieldVal, rhs: &FieldVal) -> bool {
        match (lhs, rhs) {
            (FieldVal::IntField(a), FieldVal::IntField(b)) => {
                self.compare(a.get_value(), b.get_value())
            }
            (FieldVal::StringField(a), FieldVal::StringField(b)) => {
                self.compare(a.get_value(), b.get_value())
            }
            _ => false,
        }
    }

    fn compare<T: PartialOrd>(&self, lhs: T, rhs: T) -> bool {
        match self {
            Op::Equals => lhs == rhs,
            Op::NotEquals => lhs != rhs,
            Op::GreaterThan => lhs > rhs,
            Op::GreaterThanOrEq => lhs >= rhs,
            Op::LessThan => lhs < rhs,
            Op::LessThanOrEq => lhs <= rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::IntField;

    #[test]
    fn int_comparisons() {
        let a = FieldVal::IntField(IntField::new(3));
        let b = FieldVal::IntField(IntField::new(5));
        assert!(Op::LessThan.evaluate(&a, &b));
        assert!(!Op::GreaterThan.evaluate(&a, &b));
        assert!(Op::NotEquals.evaluate(&a, &b));
        assert!(Op::Equals.evaluate(&a, &a));
    }

    #[test]
    fn mismatched_types_never_match() {
        use crate::fields::StringField;
        let a = FieldVal::IntField(IntField::new(3));
        let b = FieldVal::StringField(StringField::new("3".to_string(), 16));
        assert!(!Op::Equals.evaluate(&a, &b));
    }
}
