//! The runtime value model.
//!
//! One closed tagged union for every value an Ago program can produce.
//! The same type serves two masters: the lowering engine folds constants
//! and checks operator domains against it, and the generated program's
//! runtime library implements exactly these semantics. Every operator and
//! cast matches exhaustively over the variants, so an unhandled pair is a
//! compile error here rather than a surprise at runtime.

use crate::compiler::datatypes::TypeTag;
use crate::compiler::lir::nodes::FunctionId;
use crate::compiler::runtime::collections::ListValue;
use crate::compiler::runtime::fault::RuntimeFault;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),

    // Immutable byte sequence. Every concatenation, substring or
    // single-character access produces a fresh allocation.
    String(String),

    Null,

    List(ListValue),
    Struct(StructValue),
    Function(FunctionValue),
    Range(RangeValue),
}

/// Ordered string-key → value mapping. Insertion order is preserved so
/// membership tests and struct→string rendering are deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructValue {
    entries: Vec<(String, Value)>,
}

impl StructValue {
    pub fn new() -> Self {
        StructValue {
            entries: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Insert or overwrite. Overwriting keeps the key's original position.
    pub fn set(&mut self, key: String, value: Value) {
        for entry in &mut self.entries {
            if entry.0 == key {
                entry.1 = value;
                return;
            }
        }
        self.entries.push((key, value));
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }
}

/// A closure value. The captured environment is a read-only snapshot
/// taken at closure-creation time (copy-capture, never a live reference
/// into the defining scope).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionValue {
    pub function: FunctionId,
    pub params: Vec<String>,
    pub captured: Vec<(String, Value)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeValue {
    pub start: i64,
    pub end: i64,
    pub inclusive: bool,
}

impl RangeValue {
    /// Number of iterations a `pro` loop over this range performs.
    pub fn count(&self) -> i64 {
        let span = if self.inclusive {
            self.end - self.start + 1
        } else {
            self.end - self.start
        };
        span.max(0)
    }

    /// Materialize the range as an IntList (used when a range is bound
    /// to a list-suffixed stem).
    pub fn to_int_list(&self) -> ListValue {
        let mut list = ListValue::with_capacity(TypeTag::Int, self.count().max(0) as usize);
        let mut i = self.start;
        while i < self.end {
            list.push_unchecked(Value::Int(i));
            i += 1;
        }
        if self.inclusive && i == self.end {
            list.push_unchecked(Value::Int(i));
        }
        list
    }
}

impl Value {
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Bool(_) => TypeTag::Bool,
            Value::String(_) => TypeTag::String,
            Value::Struct(_) => TypeTag::Struct,
            Value::Function(_) => TypeTag::Function,
            Value::Range(_) => TypeTag::Range,
            Value::List(list) => list.list_tag(),
            // Null has no suffix of its own; NoReturn is the closest tag
            Value::Null => TypeTag::NoReturn,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value fits a binding of the given declared tag
    /// without conversion. `Any` accepts every tag.
    pub fn matches_tag(&self, tag: TypeTag) -> bool {
        if tag == TypeTag::Any {
            return true;
        }
        self.tag() == tag
    }

    /// The declared "empty" value of a tag, used only for return-type
    /// coercion of an empty `redeo`. Function has no empty value.
    pub fn empty_of(tag: TypeTag) -> Result<Value, RuntimeFault> {
        let value = match tag {
            TypeTag::Int => Value::Int(0),
            TypeTag::Float => Value::Float(0.0),
            TypeTag::Bool => Value::Bool(false),
            TypeTag::String => Value::String(String::new()),
            TypeTag::Struct => Value::Struct(StructValue::new()),
            TypeTag::Any => Value::Null,
            TypeTag::NoReturn => Value::Null,
            TypeTag::Range => Value::Range(RangeValue {
                start: 0,
                end: 0,
                inclusive: false,
            }),
            TypeTag::IntList
            | TypeTag::FloatList
            | TypeTag::BoolList
            | TypeTag::StringList
            | TypeTag::AnyList => {
                let elem = tag.element_tag().unwrap_or(TypeTag::Any);
                Value::List(ListValue::with_capacity(elem, 0))
            }
            TypeTag::Function => {
                return Err(RuntimeFault::new(
                    "empty value",
                    "a Function-typed binding has no empty value",
                ));
            }
        };
        Ok(value)
    }

    /// Human-readable rendering for diagnostics. Not the cast-to-String
    /// conversion; that lives in the cast engine with its own rules.
    pub fn describe(&self) -> String {
        match self {
            Value::Int(v) => format!("Int {v}"),
            Value::Float(v) => format!("Float {v:?}"),
            Value::Bool(v) => format!("Bool {v}"),
            Value::String(v) => format!("String \"{v}\""),
            Value::Null => "Null".to_string(),
            Value::List(list) => format!("{} of length {}", list.list_tag(), list.len()),
            Value::Struct(s) => format!("Struct with {} fields", s.len()),
            Value::Function(f) => format!("Function with {} parameters", f.params.len()),
            Value::Range(r) => {
                let op = if r.inclusive { ".." } else { ".<" };
                format!("Range {}{}{}", r.start, op, r.end)
            }
        }
    }
}
