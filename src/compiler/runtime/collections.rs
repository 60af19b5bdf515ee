//! The collection runtime.
//!
//! Lists are growable, manually sized buffers: {length, capacity, data}.
//! There is no reference counting and no collector; the lowering engine
//! emits an explicit free at the end of the owning scope for anything
//! whose ownership was not transferred out. Strings are immutable
//! fixed-length buffers; concat, substring and single-character access
//! each allocate a fresh one.

use crate::compiler::datatypes::TypeTag;
use crate::compiler::runtime::fault::RuntimeFault;
use crate::compiler::runtime::value::Value;
use serde::{Deserialize, Serialize};

/// Growth floor for the first append into an empty list.
const MIN_LIST_CAPACITY: usize = 4;

/// A typed, growable list. `elem` is the element tag; only an Any-list
/// may hold mixed tags. A typed list never contains a foreign tag;
/// `set`/`append` refuse it fatally rather than coercing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListValue {
    elem: TypeTag,
    items: Vec<Value>,
    capacity: usize,
}

impl ListValue {
    pub fn with_capacity(elem: TypeTag, capacity: usize) -> Self {
        ListValue {
            elem,
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn from_values(elem: TypeTag, items: Vec<Value>) -> Result<Self, RuntimeFault> {
        let capacity = items.len();
        for (index, item) in items.iter().enumerate() {
            if !item.matches_tag(elem) {
                return Err(RuntimeFault::new(
                    "list construction",
                    format!(
                        "element {index} is {} but the list holds {elem}",
                        item.describe()
                    ),
                ));
            }
        }
        Ok(ListValue {
            elem,
            items,
            capacity,
        })
    }

    pub fn element_tag(&self) -> TypeTag {
        self.elem
    }

    /// The list tag this value answers to (IntList, AnyList, ...).
    pub fn list_tag(&self) -> TypeTag {
        TypeTag::list_of(self.elem).unwrap_or(TypeTag::AnyList)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn get(&self, index: i64) -> Result<&Value, RuntimeFault> {
        if index < 0 || index as usize >= self.items.len() {
            return Err(RuntimeFault::new(
                "list get",
                format!(
                    "index {index} is out of range for a list of length {}",
                    self.items.len()
                ),
            ));
        }
        Ok(&self.items[index as usize])
    }

    pub fn set(&mut self, index: i64, value: Value) -> Result<(), RuntimeFault> {
        if index < 0 || index as usize >= self.items.len() {
            return Err(RuntimeFault::new(
                "list set",
                format!(
                    "index {index} is out of range for a list of length {}",
                    self.items.len()
                ),
            ));
        }
        if !value.matches_tag(self.elem) {
            return Err(RuntimeFault::new(
                "list set",
                format!(
                    "cannot store {} in a list of {}",
                    value.describe(),
                    self.elem
                ),
            ));
        }
        self.items[index as usize] = value;
        Ok(())
    }

    /// Append with amortized doubling growth (capacity × 2, floor 4).
    pub fn append(&mut self, value: Value) -> Result<(), RuntimeFault> {
        if !value.matches_tag(self.elem) {
            return Err(RuntimeFault::new(
                "list append",
                format!(
                    "cannot append {} to a list of {}",
                    value.describe(),
                    self.elem
                ),
            ));
        }
        if self.items.len() == self.capacity {
            self.capacity = (self.capacity * 2).max(MIN_LIST_CAPACITY);
            self.items.reserve(self.capacity - self.items.len());
        }
        self.items.push(value);
        Ok(())
    }

    /// Append without the element-tag check. Only for construction paths
    /// that have already validated the element (range materialization,
    /// cast re-validation).
    pub(crate) fn push_unchecked(&mut self, value: Value) {
        if self.items.len() == self.capacity {
            self.capacity = (self.capacity * 2).max(MIN_LIST_CAPACITY);
        }
        self.items.push(value);
    }

    /// Release the buffer. Using the list after this point is a bug in
    /// the lowering engine's ownership tracking, not in user code.
    pub fn free(self) {
        drop(self);
    }
}

// ---------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------

pub fn string_concat(a: &str, b: &str) -> String {
    let mut out = String::with_capacity(a.len() + b.len());
    out.push_str(a);
    out.push_str(b);
    out
}

pub fn string_length(s: &str) -> i64 {
    s.len() as i64
}

/// Single-character access. Allocates a new one-character string;
/// out-of-range is fatal, matching list indexing.
pub fn string_get(s: &str, index: i64) -> Result<String, RuntimeFault> {
    if index < 0 || index as usize >= s.len() {
        return Err(RuntimeFault::new(
            "string get",
            format!(
                "index {index} is out of range for a string of length {}",
                s.len()
            ),
        ));
    }
    let byte = s.as_bytes()[index as usize];
    Ok((byte as char).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_grows_length_by_one_and_keeps_prior_elements() {
        let mut list = ListValue::with_capacity(TypeTag::Int, 2);
        for i in 0..10 {
            let before = list.len();
            list.append(Value::Int(i)).unwrap();
            assert_eq!(list.len(), before + 1);
        }
        for i in 0..10 {
            assert_eq!(list.get(i).unwrap(), &Value::Int(i));
        }
    }

    #[test]
    fn get_is_fatal_outside_bounds() {
        let list = ListValue::from_values(
            TypeTag::Int,
            vec![Value::Int(1), Value::Int(2), Value::Int(3)],
        )
        .unwrap();
        for bad in [-1, 3, 4, i64::MAX] {
            assert!(list.get(bad).is_err(), "index {bad} should be fatal");
        }
    }

    #[test]
    fn set_rejects_out_of_range_and_wrong_tag() {
        let mut list =
            ListValue::from_values(TypeTag::Int, vec![Value::Int(1), Value::Int(2)]).unwrap();
        assert!(list.set(5, Value::Int(9)).is_err());
        assert!(list.set(0, Value::String("x".into())).is_err());
        list.set(0, Value::Int(9)).unwrap();
        assert_eq!(list.get(0).unwrap(), &Value::Int(9));
    }

    #[test]
    fn typed_list_never_holds_a_foreign_tag() {
        let mut list = ListValue::with_capacity(TypeTag::Float, 0);
        assert!(list.append(Value::Int(1)).is_err());
        assert!(list.append(Value::Float(1.0)).is_ok());
    }

    #[test]
    fn any_list_holds_mixed_tags() {
        let mut list = ListValue::with_capacity(TypeTag::Any, 0);
        list.append(Value::Int(1)).unwrap();
        list.append(Value::String("x".into())).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.list_tag(), TypeTag::AnyList);
    }

    #[test]
    fn capacity_doubles() {
        let mut list = ListValue::with_capacity(TypeTag::Int, 0);
        list.append(Value::Int(0)).unwrap();
        assert_eq!(list.capacity(), 4);
        for i in 1..5 {
            list.append(Value::Int(i)).unwrap();
        }
        assert_eq!(list.capacity(), 8);
    }

    #[test]
    fn string_get_allocates_single_characters() {
        assert_eq!(string_get("salve", 0).unwrap(), "s");
        assert_eq!(string_get("salve", 4).unwrap(), "e");
        assert!(string_get("salve", 5).is_err());
        assert!(string_get("", 0).is_err());
    }

    #[test]
    fn string_concat_allocates_sum_of_lengths() {
        let joined = string_concat("sal", "ve");
        assert_eq!(joined, "salve");
        assert_eq!(string_length(&joined), 5);
    }
}
