//! The cast engine.
//!
//! `cast` is a pure function from (value, target tag) to value. The
//! lowering engine uses it at compile time to fold casts of known
//! constants and to decide which runtime cast call to emit; the
//! generated program's runtime implements exactly the same table.
//! Every pair outside the table is fatal; there is no silent fallback
//! and no Null-on-failure.

use crate::compiler::datatypes::TypeTag;
use crate::compiler::runtime::collections::ListValue;
use crate::compiler::runtime::fault::RuntimeFault;
use crate::compiler::runtime::value::Value;
use crate::settings::{FALSE_LITERAL, TRUE_LITERAL};

pub fn cast(value: &Value, target: TypeTag) -> Result<Value, RuntimeFault> {
    // Casting to Any never converts: Value is the Any representation.
    if target == TypeTag::Any {
        return Ok(value.clone());
    }

    // Same-tag cast is the identity.
    if value.tag() == target {
        return Ok(value.clone());
    }

    match (value, target) {
        // --- Numeric promotion / truncation ---
        (Value::Int(v), TypeTag::Float) => Ok(Value::Float(*v as f64)),
        // `as` truncates toward zero, which is exactly the contract
        (Value::Float(v), TypeTag::Int) => Ok(Value::Int(*v as i64)),

        // --- Int <-> String ---
        (Value::Int(v), TypeTag::String) => Ok(Value::String(v.to_string())),
        (Value::String(s), TypeTag::Int) => s.parse::<i64>().map(Value::Int).map_err(|_| {
            RuntimeFault::new("cast to Int", format!("\"{s}\" is not a valid integer"))
        }),

        // --- Float <-> String ---
        (Value::Float(v), TypeTag::String) => Ok(Value::String(format_float(*v))),
        (Value::String(s), TypeTag::Float) => s.parse::<f64>().map(Value::Float).map_err(|_| {
            RuntimeFault::new("cast to Float", format!("\"{s}\" is not a valid number"))
        }),

        // --- Bool <-> String: the verum/falsus literal pair only ---
        (Value::Bool(v), TypeTag::String) => Ok(Value::String(
            if *v { TRUE_LITERAL } else { FALSE_LITERAL }.to_string(),
        )),
        (Value::String(s), TypeTag::Bool) => match s.as_str() {
            s if s == TRUE_LITERAL => Ok(Value::Bool(true)),
            s if s == FALSE_LITERAL => Ok(Value::Bool(false)),
            _ => Err(RuntimeFault::new(
                "cast to Bool",
                format!("\"{s}\" is neither \"{TRUE_LITERAL}\" nor \"{FALSE_LITERAL}\""),
            )),
        },

        // --- Lists through Any ---
        // A typed list widens to an Any-list without touching elements.
        (Value::List(list), TypeTag::AnyList) => {
            let mut widened = ListValue::with_capacity(TypeTag::Any, list.len());
            for item in list.items() {
                widened.push_unchecked(item.clone());
            }
            Ok(Value::List(widened))
        }

        // An Any-list narrows only if every element already carries the
        // target element tag; the first mismatch is fatal.
        (Value::List(list), target) if target.is_list() => {
            if list.element_tag() != TypeTag::Any {
                return Err(incompatible(value, target));
            }
            let elem = target
                .element_tag()
                .ok_or_else(|| incompatible(value, target))?;
            let mut narrowed = ListValue::with_capacity(elem, list.len());
            for (index, item) in list.items().iter().enumerate() {
                if !item.matches_tag(elem) {
                    return Err(RuntimeFault::new(
                        format!("cast to {target}"),
                        format!("element {index} is {}, expected {elem}", item.describe()),
                    ));
                }
                narrowed.push_unchecked(item.clone());
            }
            Ok(Value::List(narrowed))
        }

        // --- Null never casts outside the return-coercion context ---
        (Value::Null, target) => Err(RuntimeFault::new(
            format!("cast to {target}"),
            "Null cannot be cast; only an empty redeo may produce a typed empty value",
        )),

        _ => Err(incompatible(value, target)),
    }
}

/// Return-type coercion for `redeo`. An empty `redeo` (no operand) is the
/// one context where "no value" may become the return type's declared
/// empty value.
pub fn cast_for_return(value: Option<&Value>, target: TypeTag) -> Result<Value, RuntimeFault> {
    match value {
        Some(v) => cast(v, target),
        None => Value::empty_of(target),
    }
}

/// Fixed-point style formatting: always shows a fractional part so the
/// Float→String→Float round trip stays unambiguous ("3" would parse as
/// an Int literal on the way back).
fn format_float(v: f64) -> String {
    if v == v.trunc() && v.is_finite() {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

fn incompatible(value: &Value, target: TypeTag) -> RuntimeFault {
    RuntimeFault::new(
        format!("cast to {target}"),
        format!("{} cannot be cast to {target}", value.describe()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::runtime::value::{RangeValue, StructValue};
    use proptest::prelude::*;

    #[test]
    fn int_to_float_is_exact_and_back() {
        assert_eq!(cast(&Value::Int(42), TypeTag::Float).unwrap(), Value::Float(42.0));
        assert_eq!(cast(&Value::Float(42.0), TypeTag::Int).unwrap(), Value::Int(42));
    }

    #[test]
    fn float_to_int_truncates_toward_zero() {
        assert_eq!(cast(&Value::Float(2.9), TypeTag::Int).unwrap(), Value::Int(2));
        assert_eq!(cast(&Value::Float(-2.9), TypeTag::Int).unwrap(), Value::Int(-2));
    }

    #[test]
    fn int_string_round_trip() {
        assert_eq!(
            cast(&Value::Int(5), TypeTag::String).unwrap(),
            Value::String("5".to_string())
        );
        assert_eq!(
            cast(&Value::String("7".to_string()), TypeTag::Int).unwrap(),
            Value::Int(7)
        );
    }

    #[test]
    fn unparsable_string_is_fatal_not_null() {
        assert!(cast(&Value::String("septem".to_string()), TypeTag::Int).is_err());
        assert!(cast(&Value::String("".to_string()), TypeTag::Float).is_err());
    }

    #[test]
    fn bool_string_uses_the_literal_pair() {
        assert_eq!(
            cast(&Value::Bool(true), TypeTag::String).unwrap(),
            Value::String("verum".to_string())
        );
        assert_eq!(
            cast(&Value::String("falsus".to_string()), TypeTag::Bool).unwrap(),
            Value::Bool(false)
        );
        assert!(cast(&Value::String("true".to_string()), TypeTag::Bool).is_err());
    }

    #[test]
    fn float_string_keeps_a_fractional_part() {
        assert_eq!(
            cast(&Value::Float(3.0), TypeTag::String).unwrap(),
            Value::String("3.0".to_string())
        );
        assert_eq!(
            cast(&Value::String("3.5".to_string()), TypeTag::Float).unwrap(),
            Value::Float(3.5)
        );
    }

    #[test]
    fn same_tag_cast_is_identity() {
        let list = Value::List(
            ListValue::from_values(TypeTag::Int, vec![Value::Int(1), Value::Int(2)]).unwrap(),
        );
        assert_eq!(cast(&list, TypeTag::IntList).unwrap(), list);
    }

    #[test]
    fn typed_list_to_other_typed_list_is_fatal() {
        let list = Value::List(
            ListValue::from_values(TypeTag::Int, vec![Value::Int(1)]).unwrap(),
        );
        assert!(cast(&list, TypeTag::FloatList).is_err());
        assert!(cast(&list, TypeTag::String).is_err());
    }

    #[test]
    fn any_list_narrowing_revalidates_every_element() {
        let ok = Value::List(
            ListValue::from_values(TypeTag::Any, vec![Value::Int(1), Value::Int(2)]).unwrap(),
        );
        assert_eq!(
            cast(&ok, TypeTag::IntList).unwrap().tag(),
            TypeTag::IntList
        );

        let mixed = Value::List(
            ListValue::from_values(
                TypeTag::Any,
                vec![Value::Int(1), Value::String("x".to_string())],
            )
            .unwrap(),
        );
        assert!(cast(&mixed, TypeTag::IntList).is_err());
    }

    #[test]
    fn struct_range_function_only_cast_to_themselves_or_any() {
        let s = Value::Struct(StructValue::new());
        let r = Value::Range(RangeValue {
            start: 0,
            end: 3,
            inclusive: false,
        });
        assert!(cast(&s, TypeTag::Int).is_err());
        assert!(cast(&r, TypeTag::IntList).is_err());
        assert_eq!(cast(&s, TypeTag::Any).unwrap(), s);
        assert_eq!(cast(&r, TypeTag::Range).unwrap(), r);
    }

    #[test]
    fn null_casts_only_through_empty_redeo() {
        assert!(cast(&Value::Null, TypeTag::Int).is_err());
        assert_eq!(cast_for_return(None, TypeTag::Int).unwrap(), Value::Int(0));
        assert_eq!(
            cast_for_return(None, TypeTag::String).unwrap(),
            Value::String(String::new())
        );
        assert_eq!(
            cast_for_return(Some(&Value::Int(3)), TypeTag::String).unwrap(),
            Value::String("3".to_string())
        );
    }

    proptest! {
        // cast(cast(v, Float), Int) == v for integers exactly
        // representable as f64
        #[test]
        fn int_float_round_trip(v in -(1i64 << 53)..(1i64 << 53)) {
            let as_float = cast(&Value::Int(v), TypeTag::Float).unwrap();
            let back = cast(&as_float, TypeTag::Int).unwrap();
            prop_assert_eq!(back, Value::Int(v));
        }

        #[test]
        fn int_string_round_trip_prop(v in any::<i64>()) {
            let as_string = cast(&Value::Int(v), TypeTag::String).unwrap();
            let back = cast(&as_string, TypeTag::Int).unwrap();
            prop_assert_eq!(back, Value::Int(v));
        }
    }
}
