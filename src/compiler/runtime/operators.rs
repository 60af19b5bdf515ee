//! The operator library.
//!
//! Each binary operator is a function over two values with a declared
//! domain; outside the domain it is a fatal type error, never a silent
//! coercion beyond the documented Int→Float promotion. The lowering
//! engine consults [binary_domain] / [unary_domain] with static tags to
//! pick the runtime call (and to reject statically-known violations at
//! compile time); the value-level functions here are the semantics both
//! for constant folding and for the generated program's runtime.

use crate::compiler::datatypes::TypeTag;
use crate::compiler::parsers::ast_nodes::{Operator, UnaryOperator};
use crate::compiler::runtime::collections::ListValue;
use crate::compiler::runtime::fault::RuntimeFault;
use crate::compiler::runtime::value::{RangeValue, Value};

// ---------------------------------------------------------------------
// Static domain rules
// ---------------------------------------------------------------------

/// Result tag of `left op right`, or an error message naming the domain
/// violation. `Any` on either side defers the check to runtime.
pub fn binary_domain(op: Operator, left: TypeTag, right: TypeTag) -> Result<TypeTag, String> {
    use Operator::*;

    if left == TypeTag::Any || right == TypeTag::Any {
        return Ok(match op {
            GreaterThan | GreaterEqual | LessThan | LessEqual | Equal | NotEqual | And | Or
            | In => TypeTag::Bool,
            _ => TypeTag::Any,
        });
    }

    match op {
        Add => match (left, right) {
            (TypeTag::Int, TypeTag::Int) => Ok(TypeTag::Int),
            (l, r) if l.is_numeric() && r.is_numeric() => Ok(TypeTag::Float),
            (TypeTag::String, TypeTag::String) => Ok(TypeTag::String),
            (l, r) if l.is_list() && l == r => Ok(l),
            _ => Err(format!("cannot add {left} and {right}")),
        },

        Subtract | Multiply | Divide | Modulo => match (left, right) {
            (TypeTag::Int, TypeTag::Int) => Ok(TypeTag::Int),
            (l, r) if l.is_numeric() && r.is_numeric() => Ok(TypeTag::Float),
            _ => Err(format!(
                "arithmetic needs numeric operands, found {left} and {right}"
            )),
        },

        GreaterThan | GreaterEqual | LessThan | LessEqual => match (left, right) {
            (l, r) if l.is_numeric() && r.is_numeric() => Ok(TypeTag::Bool),
            (TypeTag::String, TypeTag::String) => Ok(TypeTag::Bool),
            _ => Err(format!("cannot order {left} against {right}")),
        },

        // Equality is tag-and-value: any tag pair is a valid domain,
        // differing tags simply compare unequal.
        Equal | NotEqual => Ok(TypeTag::Bool),

        And | Or => match (left, right) {
            (TypeTag::Bool, TypeTag::Bool) => Ok(TypeTag::Bool),
            _ => Err(format!(
                "et/vel need Bool operands, found {left} and {right}"
            )),
        },

        BitAnd | BitOr | BitXor => match (left, right) {
            (TypeTag::Int, TypeTag::Int) => Ok(TypeTag::Int),
            _ => Err(format!(
                "bitwise operators need Int operands, found {left} and {right}"
            )),
        },

        In => match (left, right) {
            (TypeTag::String, TypeTag::String) => Ok(TypeTag::Bool),
            (TypeTag::String, TypeTag::Struct) => Ok(TypeTag::Bool),
            (needle, list) if list.is_list() => {
                let elem = list.element_tag().unwrap_or(TypeTag::Any);
                if elem == TypeTag::Any || elem == needle {
                    Ok(TypeTag::Bool)
                } else {
                    Err(format!("cannot search for {needle} in a list of {elem}"))
                }
            }
            _ => Err(format!("'in' is not defined for {left} in {right}")),
        },

        // Result tag is whichever side ends up chosen; statically we can
        // only promise the left tag when both sides agree.
        Elvis => {
            if left == right {
                Ok(left)
            } else {
                Ok(TypeTag::Any)
            }
        }
    }
}

pub fn unary_domain(op: UnaryOperator, operand: TypeTag) -> Result<TypeTag, String> {
    if operand == TypeTag::Any {
        return Ok(match op {
            UnaryOperator::Not => TypeTag::Bool,
            _ => TypeTag::Any,
        });
    }
    match op {
        UnaryOperator::Negate | UnaryOperator::Plus => {
            if operand.is_numeric() {
                Ok(operand)
            } else {
                Err(format!("unary {op:?} needs a numeric operand, found {operand}"))
            }
        }
        UnaryOperator::Not => {
            if operand == TypeTag::Bool {
                Ok(TypeTag::Bool)
            } else {
                Err(format!("non needs a Bool operand, found {operand}"))
            }
        }
    }
}

// ---------------------------------------------------------------------
// Value-level semantics
// ---------------------------------------------------------------------

enum NumericPair {
    Ints(i64, i64),
    Floats(f64, f64),
}

/// Int⊗Int stays Int; one Float promotes the other side to Float.
fn numeric_pair(op: &str, left: &Value, right: &Value) -> Result<NumericPair, RuntimeFault> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(NumericPair::Ints(*a, *b)),
        (Value::Float(a), Value::Float(b)) => Ok(NumericPair::Floats(*a, *b)),
        (Value::Int(a), Value::Float(b)) => Ok(NumericPair::Floats(*a as f64, *b)),
        (Value::Float(a), Value::Int(b)) => Ok(NumericPair::Floats(*a, *b as f64)),
        _ => Err(RuntimeFault::new(
            op,
            format!(
                "needs numeric operands, found {} and {}",
                left.describe(),
                right.describe()
            ),
        )),
    }
}

/// `+` also means concatenation for strings and same-element lists.
pub fn add(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => {
            Ok(Value::String(super::collections::string_concat(a, b)))
        }
        (Value::List(a), Value::List(b)) => {
            if a.element_tag() != b.element_tag() {
                return Err(RuntimeFault::new(
                    "add",
                    format!(
                        "cannot concatenate a list of {} with a list of {}",
                        a.element_tag(),
                        b.element_tag()
                    ),
                ));
            }
            let mut joined = ListValue::with_capacity(a.element_tag(), a.len() + b.len());
            for item in a.items().iter().chain(b.items()) {
                joined.push_unchecked(item.clone());
            }
            Ok(Value::List(joined))
        }
        _ => match numeric_pair("add", left, right)? {
            NumericPair::Ints(a, b) => Ok(Value::Int(a.wrapping_add(b))),
            NumericPair::Floats(a, b) => Ok(Value::Float(a + b)),
        },
    }
}

pub fn subtract(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    match numeric_pair("subtract", left, right)? {
        NumericPair::Ints(a, b) => Ok(Value::Int(a.wrapping_sub(b))),
        NumericPair::Floats(a, b) => Ok(Value::Float(a - b)),
    }
}

pub fn multiply(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    match numeric_pair("multiply", left, right)? {
        NumericPair::Ints(a, b) => Ok(Value::Int(a.wrapping_mul(b))),
        NumericPair::Floats(a, b) => Ok(Value::Float(a * b)),
    }
}

/// Integer division truncates; a zero divisor is fatal for both tags.
pub fn divide(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    match numeric_pair("divide", left, right)? {
        NumericPair::Ints(_, 0) => Err(RuntimeFault::new(
            "divide",
            format!("division of {} by zero", left.describe()),
        )),
        NumericPair::Ints(a, b) => Ok(Value::Int(a / b)),
        NumericPair::Floats(_, b) if b == 0.0 => Err(RuntimeFault::new(
            "divide",
            format!("division of {} by zero", left.describe()),
        )),
        NumericPair::Floats(a, b) => Ok(Value::Float(a / b)),
    }
}

pub fn modulo(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    match numeric_pair("modulo", left, right)? {
        NumericPair::Ints(_, 0) => Err(RuntimeFault::new(
            "modulo",
            format!("modulo of {} by zero", left.describe()),
        )),
        NumericPair::Ints(a, b) => Ok(Value::Int(a % b)),
        NumericPair::Floats(_, b) if b == 0.0 => Err(RuntimeFault::new(
            "modulo",
            format!("modulo of {} by zero", left.describe()),
        )),
        NumericPair::Floats(a, b) => Ok(Value::Float(a % b)),
    }
}

fn ordering(op: &str, left: &Value, right: &Value) -> Result<std::cmp::Ordering, RuntimeFault> {
    match (left, right) {
        // Byte-value lexicographic comparison
        (Value::String(a), Value::String(b)) => Ok(a.as_bytes().cmp(b.as_bytes())),
        _ => match numeric_pair(op, left, right)? {
            NumericPair::Ints(a, b) => Ok(a.cmp(&b)),
            NumericPair::Floats(a, b) => a.partial_cmp(&b).ok_or_else(|| {
                RuntimeFault::new(op, format!("{} is not ordered", left.describe()))
            }),
        },
    }
}

pub fn greater_than(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    Ok(Value::Bool(ordering("compare", left, right)?.is_gt()))
}

pub fn greater_equal(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    Ok(Value::Bool(ordering("compare", left, right)?.is_ge()))
}

pub fn less_than(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    Ok(Value::Bool(ordering("compare", left, right)?.is_lt()))
}

pub fn less_equal(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    Ok(Value::Bool(ordering("compare", left, right)?.is_le()))
}

/// Equality is strict: differing tags compare unequal, with no numeric
/// promotion. `1 == 1.0` is false.
pub fn equal(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    if left.tag() != right.tag() {
        return Ok(Value::Bool(false));
    }
    Ok(Value::Bool(left == right))
}

pub fn not_equal(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    match equal(left, right)? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        _ => unreachable!("equal always produces a Bool"),
    }
}

fn expect_bool(op: &str, value: &Value) -> Result<bool, RuntimeFault> {
    match value {
        Value::Bool(b) => Ok(*b),
        _ => Err(RuntimeFault::new(
            op,
            format!("needs a Bool operand, found {}", value.describe()),
        )),
    }
}

/// Value-level `et`. Short-circuit is the lowering engine's duty: by the
/// time this runs, both operands have already been evaluated.
pub fn logical_and(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    Ok(Value::Bool(
        expect_bool("et", left)? && expect_bool("et", right)?,
    ))
}

pub fn logical_or(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    Ok(Value::Bool(
        expect_bool("vel", left)? || expect_bool("vel", right)?,
    ))
}

pub fn logical_not(value: &Value) -> Result<Value, RuntimeFault> {
    Ok(Value::Bool(!expect_bool("non", value)?))
}

fn int_pair(op: &str, left: &Value, right: &Value) -> Result<(i64, i64), RuntimeFault> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok((*a, *b)),
        _ => Err(RuntimeFault::new(
            op,
            format!(
                "needs Int operands, found {} and {}",
                left.describe(),
                right.describe()
            ),
        )),
    }
}

pub fn bitwise_and(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    let (a, b) = int_pair("bitwise and", left, right)?;
    Ok(Value::Int(a & b))
}

pub fn bitwise_or(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    let (a, b) = int_pair("bitwise or", left, right)?;
    Ok(Value::Int(a | b))
}

pub fn bitwise_xor(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    let (a, b) = int_pair("bitwise xor", left, right)?;
    Ok(Value::Int(a ^ b))
}

pub fn negate(value: &Value) -> Result<Value, RuntimeFault> {
    match value {
        Value::Int(v) => Ok(Value::Int(v.wrapping_neg())),
        Value::Float(v) => Ok(Value::Float(-v)),
        _ => Err(RuntimeFault::new(
            "negate",
            format!("needs a numeric operand, found {}", value.describe()),
        )),
    }
}

/// Checked no-op: still rejects non-numeric operands.
pub fn unary_plus(value: &Value) -> Result<Value, RuntimeFault> {
    match value {
        Value::Int(_) | Value::Float(_) => Ok(value.clone()),
        _ => Err(RuntimeFault::new(
            "unary plus",
            format!("needs a numeric operand, found {}", value.describe()),
        )),
    }
}

/// `needle in haystack`: substring for strings, key existence for
/// structs, linear element-equality scan for lists.
pub fn contains(needle: &Value, haystack: &Value) -> Result<Value, RuntimeFault> {
    let found = match (needle, haystack) {
        (Value::String(n), Value::String(h)) => h.contains(n.as_str()),
        (Value::String(n), Value::Struct(h)) => h.contains_key(n),
        (n, Value::List(h)) => {
            let mut found = false;
            for item in h.items() {
                if let Value::Bool(true) = equal(item, n)? {
                    found = true;
                    break;
                }
            }
            found
        }
        _ => {
            return Err(RuntimeFault::new(
                "in",
                format!(
                    "'in' is not defined for {} in {}",
                    needle.describe(),
                    haystack.describe()
                ),
            ));
        }
    };
    Ok(Value::Bool(found))
}

/// Null-coalescing `?:`. Both sides Null is fatal.
pub fn elvis(left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    if !left.is_null() {
        return Ok(left.clone());
    }
    if !right.is_null() {
        return Ok(right.clone());
    }
    Err(RuntimeFault::new(
        "elvis",
        "cannot coalesce two Null values with '?:'",
    ))
}

/// `..` / `.<`: both ends must be Int.
pub fn make_range(left: &Value, right: &Value, inclusive: bool) -> Result<Value, RuntimeFault> {
    match (left, right) {
        (Value::Int(start), Value::Int(end)) => Ok(Value::Range(RangeValue {
            start: *start,
            end: *end,
            inclusive,
        })),
        _ => Err(RuntimeFault::new(
            "range",
            format!(
                "range ends must be Int, found {} and {}",
                left.describe(),
                right.describe()
            ),
        )),
    }
}

/// Value-level dispatch over the operator enum, used by constant folding.
/// And/Or are excluded: the lowering engine never folds through them
/// without honoring short-circuit order.
pub fn apply_binary(op: Operator, left: &Value, right: &Value) -> Result<Value, RuntimeFault> {
    match op {
        Operator::Add => add(left, right),
        Operator::Subtract => subtract(left, right),
        Operator::Multiply => multiply(left, right),
        Operator::Divide => divide(left, right),
        Operator::Modulo => modulo(left, right),
        Operator::GreaterThan => greater_than(left, right),
        Operator::GreaterEqual => greater_equal(left, right),
        Operator::LessThan => less_than(left, right),
        Operator::LessEqual => less_equal(left, right),
        Operator::Equal => equal(left, right),
        Operator::NotEqual => not_equal(left, right),
        Operator::And => logical_and(left, right),
        Operator::Or => logical_or(left, right),
        Operator::BitAnd => bitwise_and(left, right),
        Operator::BitOr => bitwise_or(left, right),
        Operator::BitXor => bitwise_xor(left, right),
        Operator::In => contains(left, right),
        Operator::Elvis => elvis(left, right),
    }
}

pub fn apply_unary(op: UnaryOperator, value: &Value) -> Result<Value, RuntimeFault> {
    match op {
        UnaryOperator::Negate => negate(value),
        UnaryOperator::Plus => unary_plus(value),
        UnaryOperator::Not => logical_not(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_add_stays_int_and_float_promotes() {
        assert_eq!(
            add(&Value::Int(2), &Value::Int(3)).unwrap(),
            Value::Int(5)
        );
        let promoted = add(&Value::Int(2), &Value::Float(0.5)).unwrap();
        assert_eq!(promoted.tag(), TypeTag::Float);
        assert_eq!(promoted, Value::Float(2.5));
    }

    #[test]
    fn integer_division_truncates() {
        assert_eq!(
            divide(&Value::Int(7), &Value::Int(2)).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            divide(&Value::Int(-7), &Value::Int(2)).unwrap(),
            Value::Int(-3)
        );
    }

    #[test]
    fn division_and_modulo_by_zero_are_fatal() {
        assert!(divide(&Value::Int(1), &Value::Int(0)).is_err());
        assert!(modulo(&Value::Int(1), &Value::Int(0)).is_err());
        assert!(divide(&Value::Float(1.0), &Value::Float(0.0)).is_err());
    }

    #[test]
    fn string_plus_concatenates() {
        assert_eq!(
            add(
                &Value::String("sal".to_string()),
                &Value::String("ve".to_string())
            )
            .unwrap(),
            Value::String("salve".to_string())
        );
    }

    #[test]
    fn list_concat_needs_matching_elements() {
        let ints =
            ListValue::from_values(TypeTag::Int, vec![Value::Int(1), Value::Int(2)]).unwrap();
        let more = ListValue::from_values(TypeTag::Int, vec![Value::Int(3)]).unwrap();
        let floats = ListValue::from_values(TypeTag::Float, vec![Value::Float(1.0)]).unwrap();

        let joined = add(&Value::List(ints.clone()), &Value::List(more)).unwrap();
        match joined {
            Value::List(list) => assert_eq!(list.len(), 3),
            other => panic!("expected a list, got {}", other.describe()),
        }
        assert!(add(&Value::List(ints), &Value::List(floats)).is_err());
    }

    #[test]
    fn equality_is_tag_and_value() {
        assert_eq!(
            equal(&Value::Int(1), &Value::Float(1.0)).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            equal(&Value::Int(1), &Value::Int(1)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            not_equal(&Value::Int(1), &Value::Float(1.0)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn strings_compare_by_byte_value() {
        assert_eq!(
            less_than(
                &Value::String("abc".to_string()),
                &Value::String("abd".to_string())
            )
            .unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn logical_ops_require_bools() {
        assert!(logical_and(&Value::Int(1), &Value::Bool(true)).is_err());
        assert_eq!(
            logical_or(&Value::Bool(false), &Value::Bool(true)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(logical_not(&Value::Bool(true)).unwrap(), Value::Bool(false));
    }

    #[test]
    fn bitwise_is_int_only() {
        assert_eq!(
            bitwise_xor(&Value::Int(0b1100), &Value::Int(0b1010)).unwrap(),
            Value::Int(0b0110)
        );
        assert!(bitwise_and(&Value::Float(1.0), &Value::Int(1)).is_err());
    }

    #[test]
    fn membership_covers_strings_structs_and_lists() {
        use crate::compiler::runtime::value::StructValue;

        assert_eq!(
            contains(
                &Value::String("al".to_string()),
                &Value::String("salve".to_string())
            )
            .unwrap(),
            Value::Bool(true)
        );

        let mut s = StructValue::new();
        s.set("claves".to_string(), Value::Int(1));
        assert_eq!(
            contains(&Value::String("claves".to_string()), &Value::Struct(s)).unwrap(),
            Value::Bool(true)
        );

        let list =
            ListValue::from_values(TypeTag::Int, vec![Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(
            contains(&Value::Int(2), &Value::List(list.clone())).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            contains(&Value::Int(9), &Value::List(list)).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn elvis_prefers_the_non_null_side() {
        assert_eq!(
            elvis(&Value::Int(1), &Value::Int(2)).unwrap(),
            Value::Int(1)
        );
        assert_eq!(elvis(&Value::Null, &Value::Int(2)).unwrap(), Value::Int(2));
        assert!(elvis(&Value::Null, &Value::Null).is_err());
    }

    #[test]
    fn ranges_need_int_ends() {
        assert!(make_range(&Value::Int(0), &Value::Int(5), true).is_ok());
        assert!(make_range(&Value::Float(0.0), &Value::Int(5), false).is_err());
    }

    #[test]
    fn static_domains_match_value_semantics() {
        use crate::compiler::parsers::ast_nodes::Operator::*;
        assert_eq!(binary_domain(Add, TypeTag::Int, TypeTag::Int), Ok(TypeTag::Int));
        assert_eq!(
            binary_domain(Add, TypeTag::Int, TypeTag::Float),
            Ok(TypeTag::Float)
        );
        assert_eq!(
            binary_domain(Add, TypeTag::String, TypeTag::String),
            Ok(TypeTag::String)
        );
        assert_eq!(
            binary_domain(Add, TypeTag::IntList, TypeTag::IntList),
            Ok(TypeTag::IntList)
        );
        assert!(binary_domain(Add, TypeTag::Int, TypeTag::String).is_err());
        assert!(binary_domain(And, TypeTag::Int, TypeTag::Bool).is_err());
        assert_eq!(
            binary_domain(Equal, TypeTag::Int, TypeTag::String),
            Ok(TypeTag::Bool)
        );
        assert!(binary_domain(BitAnd, TypeTag::Float, TypeTag::Int).is_err());
        assert_eq!(
            binary_domain(In, TypeTag::Int, TypeTag::IntList),
            Ok(TypeTag::Bool)
        );
        assert!(binary_domain(In, TypeTag::String, TypeTag::IntList).is_err());
    }
}
